//! Engine capability interface
//!
//! The browser engine is consumed through these traits and never touched
//! directly by tool code: `Engine` launches a browser, a `BrowserHandle`
//! opens isolated contexts, a `ContextHandle` opens pages, and `Page` is
//! the per-tab operation surface. `BrowserSession` is the only mutator of
//! engine and context; everything else reaches the engine through a `Tab`.
//!
//! Two implementations live in this crate: the CDP-backed engine
//! (`cdp::CdpEngine`) and an in-memory mock for tests (`mock::MockEngine`).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{BrowserError, Result};

/// The fixed enumeration of engine selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Chromium,
    Firefox,
    Webkit,
}

impl FromStr for EngineKind {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chromium" => Ok(Self::Chromium),
            "firefox" => Ok(Self::Firefox),
            "webkit" => Ok(Self::Webkit),
            other => Err(BrowserError::UnsupportedEngine(other.to_string())),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        };
        f.write_str(name)
    }
}

/// Options for launching a browser process.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub kind: EngineKind,
    pub headless: bool,
}

/// Options for creating an isolated browsing context.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Default timeout applied to every operation issued against the
    /// context's pages.
    pub timeout: Duration,
}

/// A clipped capture region, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScreenshotOptions {
    pub format: ImageFormat,
    /// JPEG quality, 0-100. Ignored for PNG.
    pub quality: Option<u32>,
    /// Capture the full scrollable page instead of the viewport.
    pub full_page: bool,
    /// Capture only this region. Takes precedence over `full_page`.
    pub clip: Option<Clip>,
    /// Capture only the bounding box of this element.
    pub element: Option<String>,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            format: ImageFormat::Png,
            quality: None,
            full_page: false,
            clip: None,
            element: None,
        }
    }
}

/// Paper formats accepted by the PDF export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperFormat {
    Letter,
    Legal,
    Tabloid,
    A3,
    A4,
    A5,
}

impl PaperFormat {
    /// Paper size in inches (width, height).
    pub fn size_inches(&self) -> (f64, f64) {
        match self {
            Self::Letter => (8.5, 11.0),
            Self::Legal => (8.5, 14.0),
            Self::Tabloid => (11.0, 17.0),
            Self::A3 => (11.69, 16.54),
            Self::A4 => (8.27, 11.69),
            Self::A5 => (5.83, 8.27),
        }
    }
}

impl std::fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Letter => "Letter",
            Self::Legal => "Legal",
            Self::Tabloid => "Tabloid",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
        };
        f.write_str(name)
    }
}

impl FromStr for PaperFormat {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Letter" => Ok(Self::Letter),
            "Legal" => Ok(Self::Legal),
            "Tabloid" => Ok(Self::Tabloid),
            "A3" => Ok(Self::A3),
            "A4" => Ok(Self::A4),
            "A5" => Ok(Self::A5),
            other => Err(BrowserError::Evaluation(format!(
                "unknown paper format: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub format: PaperFormat,
    pub landscape: bool,
    pub scale: f64,
    pub print_background: bool,
    pub display_header_footer: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: PaperFormat::A4,
            landscape: false,
            scale: 1.0,
            print_background: true,
            display_header_footer: false,
        }
    }
}

/// Sink for console messages emitted by a page. The engine formats each
/// entry as `[LEVEL] text` and the owning `Tab` drains the channel.
pub type ConsoleSink = mpsc::UnboundedSender<String>;

/// A launched browser engine.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserHandle>>;
}

/// A running browser instance.
#[async_trait]
pub trait BrowserHandle: Send + Sync {
    async fn new_context(&self, options: &ContextOptions) -> Result<Arc<dyn ContextHandle>>;

    async fn close(&self) -> Result<()>;
}

/// An isolated browsing context (cookies/storage) inside a browser.
#[async_trait]
pub trait ContextHandle: Send + Sync {
    /// Open a blank page. Console messages are forwarded into `console`.
    async fn new_page(&self, console: ConsoleSink) -> Result<Arc<dyn Page>>;

    async fn close(&self) -> Result<()>;
}

/// One open page. All methods suspend at the engine boundary.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate and wait for the DOM to be ready.
    async fn goto(&self, url: &str) -> Result<()>;

    async fn go_back(&self) -> Result<()>;

    async fn go_forward(&self) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    /// Click the first element matching a CSS selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Click the first element whose visible text contains `text`.
    async fn click_text(&self, text: &str) -> Result<()>;

    /// Type into an input, optionally clearing it first.
    async fn type_text(&self, selector: &str, text: &str, clear: bool) -> Result<()>;

    /// Set an input's value directly.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Select an option by value in a `<select>` element.
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    async fn wait_for_text(&self, text: &str, timeout: Duration) -> Result<()>;

    /// Evaluate a script expression, returning its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    /// Text content of the first element matching `selector`.
    async fn text_content(&self, selector: &str) -> Result<Option<String>>;

    /// Inner HTML of the first element matching `selector`.
    async fn inner_html(&self, selector: &str) -> Result<String>;

    /// Full page HTML.
    async fn content(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    async fn url(&self) -> Result<String>;

    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>>;

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>>;

    async fn bring_to_front(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_kind_parses_the_fixed_enumeration() {
        assert_eq!("chromium".parse::<EngineKind>().unwrap(), EngineKind::Chromium);
        assert_eq!("firefox".parse::<EngineKind>().unwrap(), EngineKind::Firefox);
        assert_eq!("webkit".parse::<EngineKind>().unwrap(), EngineKind::Webkit);
    }

    #[test]
    fn engine_kind_rejects_unknown_selection() {
        let err = "netscape".parse::<EngineKind>().unwrap_err();
        assert!(matches!(err, BrowserError::UnsupportedEngine(ref s) if s == "netscape"));
    }

    #[test]
    fn paper_format_sizes() {
        let (w, h) = PaperFormat::A4.size_inches();
        assert!((w - 8.27).abs() < 1e-9);
        assert!((h - 11.69).abs() < 1e-9);
        assert!("B7".parse::<PaperFormat>().is_err());
    }
}
