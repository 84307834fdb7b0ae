//! Browser session management
//!
//! `BrowserSession` is the sole owner of the engine, the browsing context,
//! and the tab set. It arbitrates access so exactly one tab is "current"
//! at a time, materializes the engine lazily on first use, and tears
//! everything down best-effort.
//!
//! Design: one lock around all session state instead of a lock per field,
//! so the invariant "the current id is always a key of the tab map" holds
//! atomically across creation, close, and switch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};

use crate::engine::{
    BrowserHandle, ContextHandle, ContextOptions, Engine, EngineKind, LaunchOptions,
};
use crate::error::{BrowserError, Result};
use crate::tab::{Tab, TabId, TabInfo};

/// Session configuration, supplied by the CLI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub engine: EngineKind,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Default timeout, in milliseconds, applied to every operation issued
    /// against the context.
    pub timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            timeout_ms: 30_000,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

struct SessionState {
    browser: Option<Arc<dyn BrowserHandle>>,
    context: Option<Arc<dyn ContextHandle>>,
    tabs: BTreeMap<TabId, Arc<Tab>>,
    current: Option<TabId>,
}

impl SessionState {
    fn empty() -> Self {
        Self {
            browser: None,
            context: None,
            tabs: BTreeMap::new(),
            current: None,
        }
    }
}

/// Owns zero-or-one running browser, zero-or-one context, and the tab map.
pub struct BrowserSession {
    config: SessionConfig,
    engine: Arc<dyn Engine>,
    state: RwLock<SessionState>,
    /// Monotonic id source; never reset, so ids are never reused even
    /// across shutdown/restart within one process.
    next_tab_id: AtomicU64,
}

impl BrowserSession {
    pub fn new(config: SessionConfig, engine: Arc<dyn Engine>) -> Self {
        Self {
            config,
            engine,
            state: RwLock::new(SessionState::empty()),
            next_tab_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Launch the engine and create the context if not already running.
    /// Idempotent.
    pub async fn ensure_started(&self) -> Result<()> {
        let mut state = self.state.write().await;
        self.ensure_started_locked(&mut state).await
    }

    async fn ensure_started_locked(&self, state: &mut SessionState) -> Result<()> {
        if state.context.is_some() {
            return Ok(());
        }

        if state.browser.is_none() {
            tracing::info!(
                engine = %self.config.engine,
                headless = self.config.headless,
                "launching browser"
            );
            let browser = self
                .engine
                .launch(&LaunchOptions {
                    kind: self.config.engine,
                    headless: self.config.headless,
                })
                .await?;
            state.browser = Some(browser);
        }

        let browser = state.browser.as_ref().ok_or(BrowserError::NotConnected)?;
        let context = browser
            .new_context(&ContextOptions {
                viewport_width: self.config.viewport_width,
                viewport_height: self.config.viewport_height,
                timeout: self.config.timeout(),
            })
            .await?;
        state.context = Some(context);
        Ok(())
    }

    /// Create a blank tab inside the running context and mark it current.
    /// Caller must hold the write lock and have started the session.
    async fn create_tab_locked(&self, state: &mut SessionState) -> Result<Arc<Tab>> {
        let context = state.context.as_ref().ok_or(BrowserError::NotConnected)?;

        let (console_tx, console_rx) = mpsc::unbounded_channel();
        let page = context.new_page(console_tx).await?;

        let id = TabId(self.next_tab_id.fetch_add(1, Ordering::SeqCst));
        let tab = Arc::new(Tab::new(id, page, console_rx));
        state.tabs.insert(id, tab.clone());
        state.current = Some(id);

        tracing::debug!(tab = %id, "created tab");
        Ok(tab)
    }

    /// The current tab. If none is marked (fresh session, or all tabs
    /// closed), a new blank tab is created and marked current atomically,
    /// so callers never observe a dangling current pointer.
    pub async fn current_tab(&self) -> Result<Arc<Tab>> {
        let mut state = self.state.write().await;
        if let Some(id) = state.current {
            if let Some(tab) = state.tabs.get(&id) {
                return Ok(tab.clone());
            }
        }
        self.ensure_started_locked(&mut state).await?;
        self.create_tab_locked(&mut state).await
    }

    /// Create a new tab, optionally navigating it. A navigation failure is
    /// reported to the caller but the tab stays registered and current.
    pub async fn new_tab(&self, url: Option<&str>) -> Result<Arc<Tab>> {
        let tab = {
            let mut state = self.state.write().await;
            self.ensure_started_locked(&mut state).await?;
            self.create_tab_locked(&mut state).await?
        };

        if let Some(url) = url {
            let _op = tab.op_guard().await;
            tab.page().goto(url).await?;
        }
        Ok(tab)
    }

    /// Close and unregister a tab. Absent ids are a no-op, so a double
    /// close never errors. Closing the current tab promotes the lowest
    /// remaining id, else clears the current slot.
    pub async fn close_tab(&self, id: TabId) -> Result<bool> {
        let tab = {
            let mut state = self.state.write().await;
            let Some(tab) = state.tabs.remove(&id) else {
                return Ok(false);
            };
            if state.current == Some(id) {
                state.current = state.tabs.keys().next().copied();
            }
            tab
        };

        // Bookkeeping is already consistent; a close failure propagates to
        // the calling tool but cannot resurrect the tab.
        tab.page().close().await?;
        tracing::debug!(tab = %id, "closed tab");
        Ok(true)
    }

    /// Mark a tab current and bring its page to the foreground. Unknown
    /// ids are a silent no-op; the return value says whether a switch
    /// happened.
    pub async fn switch_tab(&self, id: TabId) -> Result<bool> {
        let tab = {
            let mut state = self.state.write().await;
            let Some(tab) = state.tabs.get(&id).cloned() else {
                return Ok(false);
            };
            state.current = Some(id);
            tab
        };

        tab.page().bring_to_front().await?;
        Ok(true)
    }

    /// Snapshot of every registered tab in ascending-id order. A title the
    /// engine cannot produce is substituted with a placeholder rather than
    /// failing the listing.
    pub async fn list_tabs(&self) -> Vec<TabInfo> {
        let (entries, current) = {
            let state = self.state.read().await;
            let entries: Vec<_> = state.tabs.values().cloned().collect();
            (entries, state.current)
        };

        let mut infos = Vec::with_capacity(entries.len());
        for tab in entries {
            let title = tab
                .page()
                .title()
                .await
                .unwrap_or_else(|_| "Loading...".to_string());
            let url = tab
                .page()
                .url()
                .await
                .unwrap_or_else(|_| "about:blank".to_string());
            infos.push(TabInfo {
                id: tab.id().to_string(),
                title,
                url,
                active: current == Some(tab.id()),
            });
        }
        infos
    }

    /// The id currently marked current, if any.
    pub async fn current_tab_id(&self) -> Option<TabId> {
        self.state.read().await.current
    }

    /// Tear down context, then browser, then the underlying process, each
    /// step best-effort. The session is reusable after a later
    /// `ensure_started`.
    pub async fn shutdown(&self) {
        let (context, browser) = {
            let mut state = self.state.write().await;
            state.tabs.clear();
            state.current = None;
            (state.context.take(), state.browser.take())
        };

        if let Some(context) = context {
            if let Err(e) = context.close().await {
                tracing::warn!(error = %e, "context close failed during shutdown");
            }
        }
        if let Some(browser) = browser {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "browser close failed during shutdown");
            }
        }
        tracing::info!("browser session shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    fn session() -> (Arc<BrowserSession>, Arc<MockEngine>) {
        let engine = Arc::new(MockEngine::new());
        let session = Arc::new(BrowserSession::new(SessionConfig::default(), engine.clone()));
        (session, engine)
    }

    #[tokio::test]
    async fn ensure_started_is_idempotent() {
        let (session, engine) = session();
        session.ensure_started().await.unwrap();
        session.ensure_started().await.unwrap();
        assert_eq!(engine.launch_count(), 1);
        assert_eq!(engine.context_count(), 1);
    }

    #[tokio::test]
    async fn current_tab_creates_one_lazily() {
        let (session, engine) = session();
        assert_eq!(engine.launch_count(), 0);

        let tab = session.current_tab().await.unwrap();
        assert_eq!(tab.id().to_string(), "tab_1");
        assert_eq!(engine.launch_count(), 1);

        // Second call returns the same tab, no new pages.
        let again = session.current_tab().await.unwrap();
        assert_eq!(again.id(), tab.id());
        assert_eq!(engine.page_count(), 1);
    }

    #[tokio::test]
    async fn tab_ids_are_monotonic_and_never_reused() {
        let (session, _) = session();
        let t1 = session.new_tab(None).await.unwrap();
        let t2 = session.new_tab(None).await.unwrap();
        assert_eq!(t1.id().to_string(), "tab_1");
        assert_eq!(t2.id().to_string(), "tab_2");

        session.close_tab(t2.id()).await.unwrap();
        let t3 = session.new_tab(None).await.unwrap();
        assert_eq!(t3.id().to_string(), "tab_3");
    }

    #[tokio::test]
    async fn close_tab_is_idempotent() {
        let (session, engine) = session();
        let tab = session.new_tab(None).await.unwrap();
        assert!(session.close_tab(tab.id()).await.unwrap());
        assert!(engine.last_page().unwrap().is_closed());
        assert!(!session.close_tab(tab.id()).await.unwrap());
    }

    #[tokio::test]
    async fn closing_current_promotes_a_remaining_tab() {
        let (session, _) = session();
        let t1 = session.new_tab(None).await.unwrap();
        let t2 = session.new_tab(None).await.unwrap();
        assert_eq!(session.current_tab_id().await, Some(t2.id()));

        session.close_tab(t2.id()).await.unwrap();
        assert_eq!(session.current_tab_id().await, Some(t1.id()));

        session.close_tab(t1.id()).await.unwrap();
        assert_eq!(session.current_tab_id().await, None);
    }

    #[tokio::test]
    async fn current_is_always_a_registered_tab() {
        let (session, _) = session();
        let t1 = session.new_tab(None).await.unwrap();
        let t2 = session.new_tab(None).await.unwrap();
        let t3 = session.new_tab(None).await.unwrap();

        session.switch_tab(t1.id()).await.unwrap();
        session.close_tab(t1.id()).await.unwrap();
        session.switch_tab(t3.id()).await.unwrap();
        session.close_tab(t2.id()).await.unwrap();
        session.close_tab(t3.id()).await.unwrap();
        let _ = session.new_tab(None).await.unwrap();

        let tabs = session.list_tabs().await;
        if let Some(current) = session.current_tab_id().await {
            assert!(tabs.iter().any(|t| t.id == current.to_string()));
        }
    }

    #[tokio::test]
    async fn switch_to_unknown_tab_is_a_noop() {
        let (session, engine) = session();
        let tab = session.new_tab(None).await.unwrap();
        assert!(session.switch_tab(tab.id()).await.unwrap());
        assert_eq!(engine.last_page().unwrap().foreground_count(), 1);

        let switched = session.switch_tab(TabId(999)).await.unwrap();
        assert!(!switched);
        assert_eq!(session.current_tab_id().await, Some(tab.id()));
        // The unknown id brought nothing to the front.
        assert_eq!(engine.last_page().unwrap().foreground_count(), 1);
    }

    #[tokio::test]
    async fn failed_navigation_leaves_tab_registered() {
        let (session, engine) = session();
        engine.fail_navigation_to("https://unreachable.test");

        let result = session.new_tab(Some("https://unreachable.test")).await;
        assert!(result.is_err());

        let tabs = session.list_tabs().await;
        assert_eq!(tabs.len(), 1);
        assert!(tabs[0].active);
    }

    #[tokio::test]
    async fn shutdown_clears_state_and_session_is_reusable() {
        let (session, engine) = session();
        session.new_tab(None).await.unwrap();
        session.shutdown().await;

        assert!(session.list_tabs().await.is_empty());
        assert_eq!(session.current_tab_id().await, None);

        let tab = session.current_tab().await.unwrap();
        assert_eq!(tab.id().to_string(), "tab_2");
        assert_eq!(engine.launch_count(), 2);
    }

    #[tokio::test]
    async fn list_tabs_substitutes_placeholder_title() {
        let (session, engine) = session();
        session.new_tab(None).await.unwrap();
        engine.fail_titles();

        let tabs = session.list_tabs().await;
        assert_eq!(tabs[0].title, "Loading...");
    }
}
