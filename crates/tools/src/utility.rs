//! Utility and tab management tools

use std::sync::Arc;
use std::time::Duration;

use browser::{BrowserSession, TabId};
use serde_json::{json, Value};

use crate::{args, handler, Arguments, ToolDescriptor, ToolFault, ToolProvider, ToolResult};

pub struct UtilityTools {
    session: Arc<BrowserSession>,
}

impl UtilityTools {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

impl ToolProvider for UtilityTools {
    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "browser_wait",
                description: "Wait for a specified time or element",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "time": {
                            "type": "number",
                            "description": "Time to wait in seconds",
                        },
                        "selector": {
                            "type": "string",
                            "description": "CSS selector to wait for",
                        },
                        "text": {
                            "type": "string",
                            "description": "Text content to wait for",
                        },
                        "timeout": {
                            "type": "number",
                            "description": "Timeout in milliseconds",
                            "default": 30000,
                        },
                    },
                }),
                handler: handler(&self.session, wait),
            },
            ToolDescriptor {
                name: "browser_reload",
                description: "Reload the current page",
                input_schema: json!({ "type": "object", "properties": {} }),
                handler: handler(&self.session, reload),
            },
            ToolDescriptor {
                name: "browser_scroll",
                description: "Scroll the page",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "direction": {
                            "type": "string",
                            "enum": ["up", "down", "left", "right"],
                            "description": "Scroll direction",
                        },
                        "amount": {
                            "type": "number",
                            "description": "Scroll amount in pixels",
                            "default": 500,
                        },
                    },
                    "required": ["direction"],
                }),
                handler: handler(&self.session, scroll),
            },
            ToolDescriptor {
                name: "browser_evaluate",
                description: "Execute JavaScript code in the browser",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "code": {
                            "type": "string",
                            "description": "JavaScript code to execute",
                        },
                    },
                    "required": ["code"],
                }),
                handler: handler(&self.session, evaluate),
            },
            ToolDescriptor {
                name: "browser_tab_new",
                description: "Open a new browser tab",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "URL to open in new tab",
                        },
                    },
                }),
                handler: handler(&self.session, tab_new),
            },
            ToolDescriptor {
                name: "browser_tab_close",
                description: "Close current or specified tab",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "tab_id": {
                            "type": "string",
                            "description": "ID of tab to close (current tab if not specified)",
                        },
                    },
                }),
                handler: handler(&self.session, tab_close),
            },
            ToolDescriptor {
                name: "browser_tab_list",
                description: "List all open browser tabs",
                input_schema: json!({ "type": "object", "properties": {} }),
                handler: handler(&self.session, tab_list),
            },
            ToolDescriptor {
                name: "browser_tab_switch",
                description: "Switch to a specific tab",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "tab_id": {
                            "type": "string",
                            "description": "ID of tab to switch to",
                        },
                    },
                    "required": ["tab_id"],
                }),
                handler: handler(&self.session, tab_switch),
            },
        ]
    }
}

async fn wait(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let seconds = args::optional_number(&arguments, "time")?;
    let selector = args::optional_str(&arguments, "selector")?.map(str::to_string);
    let text = args::optional_str(&arguments, "text")?.map(str::to_string);
    let timeout_ms = args::optional_f64(&arguments, "timeout", 30_000.0)?;
    let timeout = Duration::from_millis(timeout_ms.max(0.0) as u64);

    let tab = session.current_tab().await?;

    if let Some(seconds) = seconds {
        tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
        return Ok(ToolResult::text(format!("Waited {seconds} seconds")));
    }
    if let Some(selector) = selector {
        let _guard = tab.op_guard().await;
        return match tab.page().wait_for_selector(&selector, timeout).await {
            Ok(()) => Ok(ToolResult::text(format!("Element appeared: {selector}"))),
            Err(e) => Ok(ToolResult::error(format!("Wait failed: {e}"))),
        };
    }
    if let Some(text) = text {
        let _guard = tab.op_guard().await;
        return match tab.page().wait_for_text(&text, timeout).await {
            Ok(()) => Ok(ToolResult::text(format!("Text appeared: {text}"))),
            Err(e) => Ok(ToolResult::error(format!("Wait failed: {e}"))),
        };
    }
    Ok(ToolResult::error("No wait condition specified"))
}

async fn reload(
    session: Arc<BrowserSession>,
    _arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    if let Err(e) = tab.page().reload().await {
        return Ok(ToolResult::error(format!("Reload failed: {e}")));
    }
    let title = tab.page().title().await.unwrap_or_default();
    Ok(ToolResult::text(format!("Page reloaded: {title}")))
}

async fn scroll(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let direction = args::required_str(&arguments, "direction")?.to_string();
    let amount = args::optional_f64(&arguments, "amount", 500.0)?;

    let (dx, dy) = match direction.as_str() {
        "down" => (0.0, amount),
        "up" => (0.0, -amount),
        "right" => (amount, 0.0),
        "left" => (-amount, 0.0),
        other => {
            return Err(ToolFault::InvalidArgument {
                name: "direction",
                message: format!("unknown direction {other:?}"),
            })
        }
    };

    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;
    match tab.page().evaluate(&format!("window.scrollBy({dx}, {dy})")).await {
        Ok(_) => Ok(ToolResult::text(format!("Scrolled {direction} by {amount}px"))),
        Err(e) => Ok(ToolResult::error(format!("Scroll failed: {e}"))),
    }
}

async fn evaluate(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let code = args::required_str(&arguments, "code")?.to_string();
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    match tab.page().evaluate(&code).await {
        Ok(value) => Ok(ToolResult::text(format!(
            "JavaScript result: {}",
            render_value(&value)
        ))),
        Err(e) => Ok(ToolResult::error(format!(
            "JavaScript execution failed: {e}"
        ))),
    }
}

/// Strings render bare; everything else as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

async fn tab_new(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let url = args::optional_str(&arguments, "url")?.map(str::to_string);

    match session.new_tab(url.as_deref()).await {
        Ok(tab) => Ok(ToolResult::text(format!("New tab opened: {}", tab.id()))),
        Err(e) => Ok(ToolResult::error(format!("New tab failed: {e}"))),
    }
}

async fn tab_close(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let requested = args::optional_str(&arguments, "tab_id")?.map(str::to_string);

    let id = match &requested {
        Some(raw) => match raw.parse::<TabId>() {
            Ok(id) => Some(id),
            Err(()) => return Ok(ToolResult::text(format!("No such tab: {raw}"))),
        },
        None => session.current_tab_id().await,
    };
    let Some(id) = id else {
        return Ok(ToolResult::text("No tabs open"));
    };

    match session.close_tab(id).await {
        Ok(true) => Ok(ToolResult::text(format!("Tab closed: {id}"))),
        Ok(false) => Ok(ToolResult::text(format!("No such tab: {id}"))),
        Err(e) => Ok(ToolResult::error(format!("Close tab failed: {e}"))),
    }
}

async fn tab_list(
    session: Arc<BrowserSession>,
    _arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let tabs = session.list_tabs().await;
    if tabs.is_empty() {
        return Ok(ToolResult::text("No tabs open"));
    }

    let mut text = String::from("Open tabs:\n");
    for tab in tabs {
        let marker = if tab.active { "*" } else { " " };
        text.push_str(&format!("{marker} {}: {} ({})\n", tab.id, tab.title, tab.url));
    }
    Ok(ToolResult::text(text))
}

async fn tab_switch(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let raw = args::required_str(&arguments, "tab_id")?.to_string();
    let Ok(id) = raw.parse::<TabId>() else {
        return Ok(ToolResult::text(format!("No such tab: {raw}")));
    };

    match session.switch_tab(id).await {
        Ok(true) => Ok(ToolResult::text(format!("Switched to tab: {id}"))),
        Ok(false) => Ok(ToolResult::text(format!("No such tab: {id}"))),
        Err(e) => Ok(ToolResult::error(format!("Switch tab failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{arguments, mock_session};
    use crate::Dispatcher;
    use serde_json::json;

    #[tokio::test]
    async fn wait_without_condition_is_an_error() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher.dispatch("browser_wait", Arguments::new()).await;
        assert!(result.is_error);
        assert_eq!(result.text_content(), "No wait condition specified");
    }

    #[tokio::test]
    async fn wait_for_selector_reports_the_appearance() {
        let (session, engine) = mock_session();
        engine.add_selector("#ready");
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch("browser_wait", arguments(json!({ "selector": "#ready" })))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.text_content(), "Element appeared: #ready");
    }

    #[tokio::test]
    async fn scroll_moves_the_viewport() {
        let (session, engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let down = dispatcher
            .dispatch(
                "browser_scroll",
                arguments(json!({ "direction": "down", "amount": 300 })),
            )
            .await;
        assert!(!down.is_error);
        assert_eq!(down.text_content(), "Scrolled down by 300px");

        let page = engine.last_page().unwrap();
        assert_eq!(page.scroll_y(), 300.0);
        assert!(page
            .evaluated_expressions()
            .contains(&"window.scrollBy(0, 300)".to_string()));

        dispatcher
            .dispatch("browser_scroll", arguments(json!({ "direction": "up" })))
            .await;
        assert_eq!(page.scroll_y(), 0.0);
    }

    #[tokio::test]
    async fn scroll_rejects_unknown_directions() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch(
                "browser_scroll",
                arguments(json!({ "direction": "sideways" })),
            )
            .await;
        assert!(result.is_error);
        assert!(result
            .text_content()
            .contains("invalid argument 'direction'"));
    }

    #[tokio::test]
    async fn evaluate_renders_strings_bare_and_objects_as_json() {
        let (session, engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let title = dispatcher
            .dispatch(
                "browser_evaluate",
                arguments(json!({ "code": "document.title" })),
            )
            .await;
        assert_eq!(title.text_content(), "JavaScript result: Test Page");

        engine.set_eval_result(json!({ "ok": true }));
        let object = dispatcher
            .dispatch("browser_evaluate", arguments(json!({ "code": "1 + 1" })))
            .await;
        assert_eq!(object.text_content(), r#"JavaScript result: {"ok":true}"#);
    }

    #[tokio::test]
    async fn tab_lifecycle_through_the_tools() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session.clone());

        let first = dispatcher.dispatch("browser_tab_new", Arguments::new()).await;
        assert_eq!(first.text_content(), "New tab opened: tab_1");
        let second = dispatcher
            .dispatch(
                "browser_tab_new",
                arguments(json!({ "url": "https://b.test" })),
            )
            .await;
        assert_eq!(second.text_content(), "New tab opened: tab_2");

        let listing = dispatcher.dispatch("browser_tab_list", Arguments::new()).await;
        let text = listing.text_content();
        assert!(text.starts_with("Open tabs:"));
        assert!(text.contains("tab_1"));
        assert!(text.contains("* tab_2"));

        let switched = dispatcher
            .dispatch("browser_tab_switch", arguments(json!({ "tab_id": "tab_1" })))
            .await;
        assert_eq!(switched.text_content(), "Switched to tab: tab_1");

        let closed = dispatcher
            .dispatch("browser_tab_close", Arguments::new())
            .await;
        assert_eq!(closed.text_content(), "Tab closed: tab_1");
        assert_eq!(
            session.current_tab_id().await.map(|id| id.to_string()),
            Some("tab_2".to_string())
        );
    }

    #[tokio::test]
    async fn switching_to_a_missing_tab_is_a_noop() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session.clone());

        dispatcher.dispatch("browser_tab_new", Arguments::new()).await;
        let result = dispatcher
            .dispatch("browser_tab_switch", arguments(json!({ "tab_id": "tab_9" })))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.text_content(), "No such tab: tab_9");
        assert_eq!(
            session.current_tab_id().await.map(|id| id.to_string()),
            Some("tab_1".to_string())
        );

        let garbage = dispatcher
            .dispatch(
                "browser_tab_switch",
                arguments(json!({ "tab_id": "not-a-tab" })),
            )
            .await;
        assert_eq!(garbage.text_content(), "No such tab: not-a-tab");
    }

    #[tokio::test]
    async fn closing_with_no_tabs_reports_nothing_open() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch("browser_tab_close", Arguments::new())
            .await;
        assert!(!result.is_error);
        assert_eq!(result.text_content(), "No tabs open");
    }
}
