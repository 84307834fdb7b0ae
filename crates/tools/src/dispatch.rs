//! Tool dispatch
//!
//! The single chokepoint between the wire and the handlers. Unknown
//! names and handler faults both resolve to error envelopes; a dispatch
//! always returns a `ToolResult`.

use std::sync::Arc;

use browser::BrowserSession;

use crate::{Arguments, ToolRegistry, ToolResult};

pub struct Dispatcher {
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Dispatcher over the full default tool set, bound to `session`.
    pub fn for_session(session: Arc<BrowserSession>) -> Self {
        Self::new(ToolRegistry::with_defaults(session))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Wire-shape listing entries for `tools/list`.
    pub fn listings(&self) -> Vec<serde_json::Value> {
        self.registry.iter().map(|tool| tool.listing()).collect()
    }

    /// Run one tool call to completion.
    pub async fn dispatch(&self, name: &str, arguments: Arguments) -> ToolResult {
        let Some(tool) = self.registry.get(name) else {
            tracing::warn!(tool = name, "unknown tool requested");
            return ToolResult::error(format!("Tool '{name}' not found"));
        };

        tracing::debug!(tool = name, "dispatching tool call");
        match (tool.handler)(arguments).await {
            Ok(result) => result,
            Err(fault) => {
                tracing::warn!(tool = name, error = %fault, "tool call faulted");
                ToolResult::error(format!("Error executing {name}: {fault}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{arguments, mock_session};
    use serde_json::json;

    #[tokio::test]
    async fn unknown_tool_resolves_to_an_error_envelope() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch("browser_teleport", Arguments::new())
            .await;
        assert!(result.is_error);
        assert_eq!(result.text_content(), "Tool 'browser_teleport' not found");
    }

    #[tokio::test]
    async fn missing_argument_fault_is_collapsed_into_the_envelope() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch("browser_navigate", Arguments::new())
            .await;
        assert!(result.is_error);
        assert_eq!(
            result.text_content(),
            "Error executing browser_navigate: missing required argument 'url'"
        );
    }

    #[tokio::test]
    async fn broken_engine_launch_becomes_a_tool_error_envelope() {
        let (session, engine) = mock_session();
        engine.fail_launch();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch(
                "browser_navigate",
                arguments(json!({ "url": "https://a.test" })),
            )
            .await;
        assert!(result.is_error);
        assert_eq!(
            result.text_content(),
            "Error executing browser_navigate: engine launch failed: mock launch failure"
        );
    }

    #[tokio::test]
    async fn successful_call_passes_the_handler_envelope_through() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let result = dispatcher
            .dispatch(
                "browser_navigate",
                arguments(json!({ "url": "https://a.test" })),
            )
            .await;
        assert!(!result.is_error);
        assert!(result.text_content().contains("Navigated to: https://a.test"));
    }

    #[tokio::test]
    async fn listings_carry_name_description_and_schema() {
        let (session, _engine) = mock_session();
        let dispatcher = Dispatcher::for_session(session);

        let listings = dispatcher.listings();
        assert_eq!(listings.len(), 21);
        for entry in &listings {
            assert!(entry["name"].is_string());
            assert!(entry["description"].is_string());
            assert_eq!(entry["inputSchema"]["type"], "object");
        }
    }
}
