//! Tool registry
//!
//! Tools register in a stable order (the order categories are added, then
//! the order each category lists its tools) so `tools/list` output is
//! deterministic. Names are unique; a duplicate registration is a
//! programming error.

use std::collections::HashMap;
use std::sync::Arc;

use browser::BrowserSession;

use crate::capture::CaptureTools;
use crate::interaction::InteractionTools;
use crate::navigation::NavigationTools;
use crate::utility::UtilityTools;
use crate::{ToolDescriptor, ToolProvider};

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every tool category, bound to `session`.
    pub fn with_defaults(session: Arc<BrowserSession>) -> Self {
        let mut registry = Self::new();
        registry.register_provider(&NavigationTools::new(session.clone()));
        registry.register_provider(&InteractionTools::new(session.clone()));
        registry.register_provider(&CaptureTools::new(session.clone()));
        registry.register_provider(&UtilityTools::new(session));
        registry
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        debug_assert!(
            !self.index.contains_key(descriptor.name),
            "duplicate tool name: {}",
            descriptor.name
        );
        self.index.insert(descriptor.name, self.tools.len());
        self.tools.push(descriptor);
    }

    pub fn register_provider(&mut self, provider: &dyn ToolProvider) {
        for descriptor in provider.tools() {
            self.register(descriptor);
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// All descriptors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::mock_session;

    #[test]
    fn defaults_register_the_full_tool_set() {
        let (session, _engine) = mock_session();
        let registry = ToolRegistry::with_defaults(session);

        let names: Vec<&str> = registry.iter().map(|t| t.name).collect();
        assert_eq!(registry.len(), 21);
        assert_eq!(
            names,
            vec![
                "browser_navigate",
                "browser_navigate_back",
                "browser_navigate_forward",
                "browser_click",
                "browser_type",
                "browser_fill",
                "browser_select_option",
                "browser_screenshot",
                "browser_screenshot_pages",
                "browser_get_text",
                "browser_get_html",
                "browser_console_messages",
                "browser_download_pdf",
                "browser_wait",
                "browser_reload",
                "browser_scroll",
                "browser_evaluate",
                "browser_tab_new",
                "browser_tab_close",
                "browser_tab_list",
                "browser_tab_switch",
            ]
        );
    }

    #[test]
    fn lookup_by_name() {
        let (session, _engine) = mock_session();
        let registry = ToolRegistry::with_defaults(session);

        assert!(registry.get("browser_navigate").is_some());
        assert!(registry.get("browser_teleport").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate tool name")]
    fn duplicate_registration_is_caught() {
        let (session, _engine) = mock_session();
        let mut registry = ToolRegistry::new();
        registry.register_provider(&crate::navigation::NavigationTools::new(session.clone()));
        registry.register_provider(&crate::navigation::NavigationTools::new(session));
    }

    #[test]
    fn every_schema_is_an_object_schema() {
        let (session, _engine) = mock_session();
        let registry = ToolRegistry::with_defaults(session);

        for tool in registry.iter() {
            assert_eq!(
                tool.input_schema["type"], "object",
                "schema of {} is not an object",
                tool.name
            );
            assert!(!tool.description.is_empty());
        }
    }
}
