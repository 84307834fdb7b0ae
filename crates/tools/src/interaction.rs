//! Page interaction tools

use std::sync::Arc;

use browser::BrowserSession;
use serde_json::json;

use crate::{args, handler, Arguments, ToolDescriptor, ToolFault, ToolProvider, ToolResult};

pub struct InteractionTools {
    session: Arc<BrowserSession>,
}

impl InteractionTools {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

impl ToolProvider for InteractionTools {
    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "browser_click",
                description: "Click on an element",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "CSS selector or text to click",
                        },
                        "timeout": {
                            "type": "number",
                            "description": "Timeout in milliseconds",
                            "default": 30000,
                        },
                    },
                    "required": ["selector"],
                }),
                handler: handler(&self.session, click),
            },
            ToolDescriptor {
                name: "browser_type",
                description: "Type text into an input field",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "CSS selector of the input field",
                        },
                        "text": {
                            "type": "string",
                            "description": "Text to type",
                        },
                        "clear": {
                            "type": "boolean",
                            "description": "Clear field before typing",
                            "default": true,
                        },
                    },
                    "required": ["selector", "text"],
                }),
                handler: handler(&self.session, type_text),
            },
            ToolDescriptor {
                name: "browser_fill",
                description: "Fill an input field",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "CSS selector of the input field",
                        },
                        "value": {
                            "type": "string",
                            "description": "Value to fill",
                        },
                    },
                    "required": ["selector", "value"],
                }),
                handler: handler(&self.session, fill),
            },
            ToolDescriptor {
                name: "browser_select_option",
                description: "Select option from dropdown",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "CSS selector of the select element",
                        },
                        "value": {
                            "type": "string",
                            "description": "Value to select",
                        },
                    },
                    "required": ["selector", "value"],
                }),
                handler: handler(&self.session, select_option),
            },
        ]
    }
}

async fn click(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let selector = args::required_str(&arguments, "selector")?.to_string();
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    // CSS selector first, then visible text.
    match tab.page().click(&selector).await {
        Ok(()) => Ok(ToolResult::text(format!("Clicked on: {selector}"))),
        Err(_) => match tab.page().click_text(&selector).await {
            Ok(()) => Ok(ToolResult::text(format!("Clicked on: text '{selector}'"))),
            Err(e) => Ok(ToolResult::error(format!("Click failed: {e}"))),
        },
    }
}

async fn type_text(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let selector = args::required_str(&arguments, "selector")?.to_string();
    let text = args::required_str(&arguments, "text")?.to_string();
    let clear = args::optional_bool(&arguments, "clear", true)?;
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    match tab.page().type_text(&selector, &text, clear).await {
        Ok(()) => Ok(ToolResult::text(format!("Typed '{text}' into: {selector}"))),
        Err(e) => Ok(ToolResult::error(format!("Typing failed: {e}"))),
    }
}

async fn fill(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let selector = args::required_str(&arguments, "selector")?.to_string();
    let value = args::required_str(&arguments, "value")?.to_string();
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    match tab.page().fill(&selector, &value).await {
        Ok(()) => Ok(ToolResult::text(format!("Filled '{value}' into: {selector}"))),
        Err(e) => Ok(ToolResult::error(format!("Fill failed: {e}"))),
    }
}

async fn select_option(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let selector = args::required_str(&arguments, "selector")?.to_string();
    let value = args::required_str(&arguments, "value")?.to_string();
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    match tab.page().select_option(&selector, &value).await {
        Ok(()) => Ok(ToolResult::text(format!("Selected '{value}' in: {selector}"))),
        Err(e) => Ok(ToolResult::error(format!("Selection failed: {e}"))),
    }
}
