//! Browser session management
//!
//! One browser process per session, lazily started on first use. A
//! `BrowserSession` owns the engine handles and the tab registry; tabs
//! expose the `Page` operation surface. Engines are pluggable through
//! the `Engine` trait family, with a CDP-backed implementation for real
//! browsers and an in-memory mock for tests.

pub mod cdp;
pub mod engine;
pub mod error;
pub mod mock;
pub mod session;
pub mod tab;

pub use cdp::CdpEngine;
pub use engine::{
    BrowserHandle, Clip, ConsoleSink, ContextHandle, ContextOptions, Engine, EngineKind,
    ImageFormat, LaunchOptions, Page, PaperFormat, PdfOptions, ScreenshotOptions,
};
pub use error::{BrowserError, Result};
pub use mock::MockEngine;
pub use session::{BrowserSession, SessionConfig};
pub use tab::{Tab, TabId, TabInfo};
