//! Tab - owned handle around one open page
//!
//! A tab carries the page handle, the console log accumulated over the
//! page's lifetime, and the per-tab operation lock that serializes tool
//! handlers racing on the same page.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex, MutexGuard};

use crate::engine::Page;

/// Stable tab identifier, monotonically assigned and never reused within a
/// process lifetime. Rendered as `tab_N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TabId(pub(crate) u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab_{}", self.0)
    }
}

impl FromStr for TabId {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        let n = s.strip_prefix("tab_").ok_or(())?;
        n.parse::<u64>().map(TabId).map_err(|_| ())
    }
}

/// Snapshot of one tab for listings.
#[derive(Debug, Clone, Serialize)]
pub struct TabInfo {
    pub id: String,
    pub title: String,
    pub url: String,
    pub active: bool,
}

/// One open page within the session's context.
pub struct Tab {
    id: TabId,
    page: Arc<dyn Page>,
    /// Raw console feed from the engine.
    console_rx: Mutex<mpsc::UnboundedReceiver<String>>,
    /// Append-only log of everything drained so far.
    console_log: Mutex<Vec<String>>,
    /// Serializes operations against this page. Two interleaved handlers
    /// racing on one page corrupt each other's DOM-ready assumptions.
    op_lock: Mutex<()>,
}

impl Tab {
    pub(crate) fn new(
        id: TabId,
        page: Arc<dyn Page>,
        console_rx: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            id,
            page,
            console_rx: Mutex::new(console_rx),
            console_log: Mutex::new(Vec::new()),
            op_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    /// Acquire the per-tab operation lock. Handlers hold the guard across
    /// their engine calls; operations on different tabs stay concurrent.
    pub async fn op_guard(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().await
    }

    /// All console messages captured so far, in arrival order.
    pub async fn console_messages(&self) -> Vec<String> {
        self.drain_console().await;
        self.console_log.lock().await.clone()
    }

    pub async fn clear_console_messages(&self) {
        self.drain_console().await;
        self.console_log.lock().await.clear();
    }

    async fn drain_console(&self) {
        let mut rx = self.console_rx.lock().await;
        let mut log = self.console_log.lock().await;
        while let Ok(msg) = rx.try_recv() {
            log.push(msg);
        }
    }
}
