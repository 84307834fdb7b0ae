//! Engine/browser/context handles over CDP

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Child;
use tokio::sync::Mutex;

use super::client::CdpClient;
use super::launcher;
use super::page::CdpPage;
use crate::engine::{
    BrowserHandle, ConsoleSink, ContextHandle, ContextOptions, Engine, LaunchOptions, Page,
};
use crate::error::{BrowserError, Result};

/// Timeout for browser-level control calls, which are not governed by the
/// context's configured default.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Extract a required string field from a CDP result payload.
pub(crate) fn field_str(value: &Value, field: &str) -> Result<String> {
    value[field]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| BrowserError::Protocol {
            code: -1,
            message: format!("missing field {field} in CDP result"),
        })
}

/// The CDP-backed engine: spawns a real browser process and drives it over
/// its DevTools websocket.
#[derive(Default)]
pub struct CdpEngine;

impl CdpEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Engine for CdpEngine {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserHandle>> {
        let launched = launcher::launch(options.kind, options.headless).await?;
        let client = CdpClient::connect(&launched.ws_url).await?;
        tracing::info!(ws_url = %launched.ws_url, "connected to browser");
        Ok(Arc::new(CdpBrowser {
            client,
            child: Mutex::new(Some(launched.child)),
        }))
    }
}

struct CdpBrowser {
    client: Arc<CdpClient>,
    child: Mutex<Option<Child>>,
}

#[async_trait]
impl BrowserHandle for CdpBrowser {
    async fn new_context(&self, options: &ContextOptions) -> Result<Arc<dyn ContextHandle>> {
        let result = self
            .client
            .send(
                "Target.createBrowserContext",
                Some(json!({ "disposeOnDetach": true })),
                None,
                CONTROL_TIMEOUT,
            )
            .await?;
        let context_id = field_str(&result, "browserContextId")?;
        Ok(Arc::new(CdpContext {
            client: self.client.clone(),
            context_id,
            options: options.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        // Polite close first, then make sure the process is gone.
        if let Err(e) = self
            .client
            .send("Browser.close", None, None, Duration::from_secs(5))
            .await
        {
            tracing::debug!(error = %e, "Browser.close failed, killing process");
        }
        if let Some(mut child) = self.child.lock().await.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
        let _ = self.client.close().await;
        Ok(())
    }
}

struct CdpContext {
    client: Arc<CdpClient>,
    context_id: String,
    options: ContextOptions,
}

#[async_trait]
impl ContextHandle for CdpContext {
    async fn new_page(&self, console: ConsoleSink) -> Result<Arc<dyn Page>> {
        let result = self
            .client
            .send(
                "Target.createTarget",
                Some(json!({
                    "url": "about:blank",
                    "browserContextId": self.context_id,
                })),
                None,
                CONTROL_TIMEOUT,
            )
            .await?;
        let target_id = field_str(&result, "targetId")?;
        let page = CdpPage::attach(self.client.clone(), target_id, console, &self.options).await?;
        Ok(Arc::new(page))
    }

    async fn close(&self) -> Result<()> {
        self.client
            .send(
                "Target.disposeBrowserContext",
                Some(json!({ "browserContextId": self.context_id })),
                None,
                CONTROL_TIMEOUT,
            )
            .await?;
        Ok(())
    }
}
