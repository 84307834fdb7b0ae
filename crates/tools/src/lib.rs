//! Browser tool surface
//!
//! Every operation the server exposes is a named, schema-described tool.
//! Handlers produce a uniform `ToolResult` envelope (text and image
//! content plus an error flag); argument and engine faults are typed as
//! `ToolFault` and collapsed into error envelopes by the dispatcher, so
//! no fault ever escapes a tool call.

pub mod args;
pub mod capture;
pub mod dispatch;
pub mod interaction;
pub mod navigation;
pub mod registry;
pub mod utility;

use std::sync::Arc;

use browser::BrowserSession;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{json, Map, Value};

pub use dispatch::Dispatcher;
pub use registry::ToolRegistry;

/// Flat argument object of a tool call.
pub type Arguments = Map<String, Value>;

/// One piece of tool output, in MCP wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: String, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data,
            mime_type: mime_type.into(),
        }
    }
}

/// The uniform result envelope every tool call resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub content: Vec<Content>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResult {
    pub fn new(content: Vec<Content>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// A successful single-text result.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![Content::text(text)])
    }

    /// A failed single-text result.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: true,
        }
    }

    /// Concatenated text content, for assertions and logs.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::Text { text } => Some(text.as_str()),
                Content::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Faults a handler can raise before (or instead of) producing an
/// envelope. The dispatcher turns these into error envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ToolFault {
    #[error("missing required argument '{0}'")]
    MissingArgument(&'static str),
    #[error("invalid argument '{name}': {message}")]
    InvalidArgument {
        name: &'static str,
        message: String,
    },
    #[error(transparent)]
    Browser(#[from] browser::BrowserError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Type-erased async tool handler.
pub type ToolHandler =
    Arc<dyn Fn(Arguments) -> BoxFuture<'static, std::result::Result<ToolResult, ToolFault>> + Send + Sync>;

/// A registered tool: name, description, JSON schema, handler.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    /// Listing entry in MCP wire shape (without the handler).
    pub fn listing(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema,
        })
    }
}

/// A category of tools bound to one browser session.
pub trait ToolProvider {
    fn tools(&self) -> Vec<ToolDescriptor>;
}

/// Wrap an async fn taking the session and arguments into a handler.
pub(crate) fn handler<F, Fut>(session: &Arc<BrowserSession>, f: F) -> ToolHandler
where
    F: Fn(Arc<BrowserSession>, Arguments) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = std::result::Result<ToolResult, ToolFault>> + Send + 'static,
{
    let session = session.clone();
    Arc::new(move |arguments| f(session.clone(), arguments).boxed())
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use browser::{BrowserSession, MockEngine, SessionConfig};

    pub(crate) fn mock_session() -> (Arc<BrowserSession>, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine::new());
        let session = Arc::new(BrowserSession::new(SessionConfig::default(), engine.clone()));
        (session, engine)
    }

    pub(crate) fn arguments(value: serde_json::Value) -> crate::Arguments {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("not an argument object: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_serializes_in_wire_shape() {
        let value = serde_json::to_value(Content::text("hello")).unwrap();
        assert_eq!(value, json!({ "type": "text", "text": "hello" }));
    }

    #[test]
    fn image_content_serializes_in_wire_shape() {
        let value = serde_json::to_value(Content::image("QUJD".to_string(), "image/png")).unwrap();
        assert_eq!(
            value,
            json!({ "type": "image", "data": "QUJD", "mimeType": "image/png" })
        );
    }

    #[test]
    fn error_envelope_sets_the_flag() {
        let result = ToolResult::error("boom");
        assert!(result.is_error);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], json!(true));
        assert_eq!(value["content"][0]["text"], json!("boom"));
    }

    #[test]
    fn text_content_concatenates_only_text() {
        let result = ToolResult::new(vec![
            Content::text("a"),
            Content::image("xx".to_string(), "image/png"),
            Content::text("b"),
        ]);
        assert_eq!(result.text_content(), "a\nb");
    }
}
