//! Error types for browser session and engine operations
//!
//! One flat enum per crate. Engine-launch failures and per-operation
//! failures share the type; callers decide which are fatal.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("unsupported engine kind: {0}")]
    UnsupportedEngine(String),

    #[error("engine launch failed: {0}")]
    Launch(String),

    #[error("not connected to a browser")]
    NotConnected,

    #[error("CDP protocol error: {code} - {message}")]
    Protocol { code: i32, message: String },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("script evaluation failed: {0}")]
    Evaluation(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid websocket URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
