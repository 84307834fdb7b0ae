//! Navigation tools

use std::sync::Arc;

use browser::BrowserSession;
use serde_json::json;

use crate::{args, handler, Arguments, ToolDescriptor, ToolFault, ToolProvider, ToolResult};

pub struct NavigationTools {
    session: Arc<BrowserSession>,
}

impl NavigationTools {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

impl ToolProvider for NavigationTools {
    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "browser_navigate",
                description: "Navigate to a URL",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "The URL to navigate to",
                        },
                    },
                    "required": ["url"],
                }),
                handler: handler(&self.session, navigate),
            },
            ToolDescriptor {
                name: "browser_navigate_back",
                description: "Go back to the previous page",
                input_schema: json!({ "type": "object", "properties": {} }),
                handler: handler(&self.session, navigate_back),
            },
            ToolDescriptor {
                name: "browser_navigate_forward",
                description: "Go forward to the next page",
                input_schema: json!({ "type": "object", "properties": {} }),
                handler: handler(&self.session, navigate_forward),
            },
        ]
    }
}

async fn navigate(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let url = args::required_str(&arguments, "url")?.to_string();
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    if let Err(e) = tab.page().goto(&url).await {
        return Ok(ToolResult::error(format!("Navigation failed: {e}")));
    }
    let title = tab.page().title().await.unwrap_or_default();
    let current = tab.page().url().await.unwrap_or_default();
    Ok(ToolResult::text(format!(
        "Navigated to: {url}\nPage title: {title}\nCurrent URL: {current}"
    )))
}

async fn navigate_back(
    session: Arc<BrowserSession>,
    _arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    if let Err(e) = tab.page().go_back().await {
        return Ok(ToolResult::error(format!("Cannot go back: {e}")));
    }
    let title = tab.page().title().await.unwrap_or_default();
    Ok(ToolResult::text(format!("Navigated back to: {title}")))
}

async fn navigate_forward(
    session: Arc<BrowserSession>,
    _arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    if let Err(e) = tab.page().go_forward().await {
        return Ok(ToolResult::error(format!("Cannot go forward: {e}")));
    }
    let title = tab.page().title().await.unwrap_or_default();
    Ok(ToolResult::text(format!("Navigated forward to: {title}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{arguments, mock_session};
    use crate::Dispatcher;
    use browser::Page;
    use serde_json::json;

    #[tokio::test]
    async fn navigate_reports_url_title_and_location() {
        let (session, engine) = mock_session();
        engine.set_title("Example Domain");
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch(
                "browser_navigate",
                arguments(json!({ "url": "https://example.test" })),
            )
            .await;

        assert!(!result.is_error);
        let text = result.text_content();
        assert!(text.contains("Navigated to: https://example.test"));
        assert!(text.contains("Page title: Example Domain"));
        assert!(text.contains("Current URL: https://example.test"));
    }

    #[tokio::test]
    async fn failed_navigation_is_an_error_envelope_not_a_fault() {
        let (session, engine) = mock_session();
        engine.fail_navigation_to("https://down.test");
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch(
                "browser_navigate",
                arguments(json!({ "url": "https://down.test/x" })),
            )
            .await;

        assert!(result.is_error);
        assert!(result.text_content().starts_with("Navigation failed:"));
    }

    #[tokio::test]
    async fn back_and_forward_walk_the_history() {
        let (session, engine) = mock_session();
        engine.set_title("Somewhere");
        let dispatcher = Dispatcher::for_session(session);

        dispatcher
            .dispatch("browser_navigate", arguments(json!({ "url": "https://a.test" })))
            .await;
        dispatcher
            .dispatch("browser_navigate", arguments(json!({ "url": "https://b.test" })))
            .await;

        let back = dispatcher
            .dispatch("browser_navigate_back", crate::Arguments::new())
            .await;
        assert!(!back.is_error);
        assert!(back.text_content().contains("Navigated back to: Somewhere"));

        let page = engine.last_page().unwrap();
        assert_eq!(
            page.evaluate("location.href").await.unwrap(),
            json!("https://a.test")
        );

        let forward = dispatcher
            .dispatch("browser_navigate_forward", crate::Arguments::new())
            .await;
        assert!(!forward.is_error);
        assert_eq!(
            page.evaluate("location.href").await.unwrap(),
            json!("https://b.test")
        );
    }

    #[tokio::test]
    async fn back_without_history_reports_the_failure() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch("browser_navigate_back", crate::Arguments::new())
            .await;
        assert!(result.is_error);
        assert!(result.text_content().starts_with("Cannot go back:"));
    }
}
