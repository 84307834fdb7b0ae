//! Page operations over an attached CDP target
//!
//! Design: every DOM interaction is expressed as a `Runtime.evaluate`
//! script so a single attached session covers the whole `Page` surface.
//! Selector and text arguments are embedded as JSON string literals,
//! never spliced raw into scripts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use super::client::{CdpClient, SubscriptionId};
use super::protocol::{AttachToTargetResult, SessionId, TargetId};
use crate::engine::{
    Clip, ConsoleSink, ContextOptions, ImageFormat, Page, PdfOptions, ScreenshotOptions,
};
use crate::error::{BrowserError, Result};

/// How often readiness and wait loops re-poll the page.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct CdpPage {
    client: Arc<CdpClient>,
    target_id: TargetId,
    session_id: SessionId,
    timeout: Duration,
    console_subscription: SubscriptionId,
}

impl CdpPage {
    /// Attach to a freshly created target and prepare it for use: enable
    /// the Page and Runtime domains, apply the viewport, and wire console
    /// events into `console`.
    pub async fn attach(
        client: Arc<CdpClient>,
        target_id: TargetId,
        console: ConsoleSink,
        options: &ContextOptions,
    ) -> Result<Self> {
        let attached = client
            .send(
                "Target.attachToTarget",
                Some(json!({ "targetId": target_id, "flatten": true })),
                None,
                options.timeout,
            )
            .await?;
        let attached: AttachToTargetResult = serde_json::from_value(attached)?;

        // Subscribed before Runtime.enable so no console event is missed.
        let session_id = attached.session_id.clone();
        let console_subscription = client.subscribe(
            "Runtime.consoleAPICalled",
            Arc::new(move |event| {
                if event.session_id.as_deref() != Some(session_id.as_str()) {
                    return;
                }
                if let Some(params) = &event.params {
                    if let Some(line) = format_console_event(params) {
                        // Receiver dropped means the tab is gone; nothing
                        // to deliver to.
                        let _ = console.send(line);
                    }
                }
            }),
        );

        let page = Self {
            client,
            target_id,
            session_id: attached.session_id,
            timeout: options.timeout,
            console_subscription,
        };

        page.send("Page.enable", None).await?;
        page.send("Runtime.enable", None).await?;
        page.send(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": options.viewport_width,
                "height": options.viewport_height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;

        Ok(page)
    }

    async fn send(&self, method: &str, params: Option<Value>) -> Result<Value> {
        self.client
            .send(method, params, Some(self.session_id.clone()), self.timeout)
            .await
    }

    /// Evaluate an expression in the page, returning its JSON value.
    /// Script exceptions surface as `Evaluation` errors.
    async fn eval(&self, expression: &str) -> Result<Value> {
        let result = self
            .send(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;
        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception["exception"]["description"]
                .as_str()
                .or_else(|| exception["text"].as_str())
                .unwrap_or("script threw an exception");
            return Err(BrowserError::Evaluation(text.to_string()));
        }
        Ok(result["result"]["value"].clone())
    }

    /// Poll until the document is interactive or the timeout elapses.
    async fn wait_ready(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let state = self.eval("document.readyState").await?;
            if matches!(state.as_str(), Some("interactive") | Some("complete")) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout("waiting for document".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Poll `expression` until it evaluates truthy or `timeout` elapses.
    async fn wait_truthy(&self, expression: &str, timeout: Duration, what: String) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.eval(expression).await?.as_bool() == Some(true) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(what));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn navigate_history(&self, delta: i64) -> Result<()> {
        let history = self.send("Page.getNavigationHistory", None).await?;
        let current = history["currentIndex"].as_i64().unwrap_or(0);
        let entries = history["entries"].as_array().cloned().unwrap_or_default();
        let index = current + delta;
        if index < 0 || index as usize >= entries.len() {
            // Nowhere to go; treated as a no-op like a browser button.
            return Ok(());
        }
        let entry_id = entries[index as usize]["id"].clone();
        self.send(
            "Page.navigateToHistoryEntry",
            Some(json!({ "entryId": entry_id })),
        )
        .await?;
        self.wait_ready().await
    }

    /// Bounding box of the first element matching `selector`, in page
    /// coordinates.
    async fn element_clip(&self, selector: &str) -> Result<Clip> {
        let sel = json!(selector);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             return {{ x: r.x + window.scrollX, y: r.y + window.scrollY, \
             width: r.width, height: r.height }}; }})()"
        );
        let value = self.eval(&script).await?;
        if value.is_null() {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let result = self.send("Page.navigate", Some(json!({ "url": url }))).await?;
        if let Some(error_text) = result["errorText"].as_str() {
            if !error_text.is_empty() {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: error_text.to_string(),
                });
            }
        }
        self.wait_ready().await
    }

    async fn go_back(&self) -> Result<()> {
        self.navigate_history(-1).await
    }

    async fn go_forward(&self) -> Result<()> {
        self.navigate_history(1).await
    }

    async fn reload(&self) -> Result<()> {
        self.send("Page.reload", Some(json!({}))).await?;
        self.wait_ready().await
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let sel = json!(selector);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; el.click(); return true; }})()"
        );
        if self.eval(&script).await?.as_bool() != Some(true) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn click_text(&self, text: &str) -> Result<()> {
        let needle = json!(text);
        let script = format!(
            "(() => {{ const candidates = document.querySelectorAll(\
             'a, button, [role=\"button\"], input[type=\"submit\"], input[type=\"button\"]'); \
             for (const el of candidates) {{ \
             if ((el.textContent || el.value || '').includes({needle})) {{ \
             el.click(); return true; }} }} return false; }})()"
        );
        if self.eval(&script).await?.as_bool() != Some(true) {
            return Err(BrowserError::ElementNotFound(format!("text={text}")));
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, clear: bool) -> Result<()> {
        let sel = json!(selector);
        let value = json!(text);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; el.focus(); \
             if ({clear}) el.value = ''; \
             el.value = (el.value || '') + {value}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()"
        );
        if self.eval(&script).await?.as_bool() != Some(true) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let sel = json!(selector);
        let val = json!(value);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return false; el.value = {val}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()"
        );
        if self.eval(&script).await?.as_bool() != Some(true) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let sel = json!(selector);
        let val = json!(value);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (!el) return 'missing'; \
             const option = Array.from(el.options || []).find(o => o.value === {val}); \
             if (!option) return 'no-option'; \
             el.value = {val}; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return 'ok'; }})()"
        );
        match self.eval(&script).await?.as_str() {
            Some("ok") => Ok(()),
            Some("no-option") => Err(BrowserError::Evaluation(format!(
                "no option with value {value:?} in {selector}"
            ))),
            _ => Err(BrowserError::ElementNotFound(selector.to_string())),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let sel = json!(selector);
        let script = format!("!!document.querySelector({sel})");
        self.wait_truthy(&script, timeout, format!("waiting for selector {selector}"))
            .await
    }

    async fn wait_for_text(&self, text: &str, timeout: Duration) -> Result<()> {
        let needle = json!(text);
        let script =
            format!("!!(document.body && document.body.innerText.includes({needle}))");
        self.wait_truthy(&script, timeout, format!("waiting for text {text:?}"))
            .await
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.eval(expression).await
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        let sel = json!(selector);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             return el ? el.textContent : null; }})()"
        );
        Ok(self.eval(&script).await?.as_str().map(|s| s.to_string()))
    }

    async fn inner_html(&self, selector: &str) -> Result<String> {
        let sel = json!(selector);
        let script = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             return el ? el.innerHTML : null; }})()"
        );
        match self.eval(&script).await? {
            Value::String(html) => Ok(html),
            _ => Err(BrowserError::ElementNotFound(selector.to_string())),
        }
    }

    async fn content(&self) -> Result<String> {
        let value = self.eval("document.documentElement.outerHTML").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn title(&self) -> Result<String> {
        let value = self.eval("document.title").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn url(&self) -> Result<String> {
        let value = self.eval("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>> {
        let mut params = serde_json::Map::new();
        params.insert(
            "format".to_string(),
            json!(match options.format {
                ImageFormat::Png => "png",
                ImageFormat::Jpeg => "jpeg",
            }),
        );
        if options.format == ImageFormat::Jpeg {
            if let Some(quality) = options.quality {
                params.insert("quality".to_string(), json!(quality));
            }
        }

        let clip = match (&options.clip, &options.element) {
            (Some(clip), _) => Some(*clip),
            (None, Some(selector)) => Some(self.element_clip(selector).await?),
            (None, None) => None,
        };
        if let Some(clip) = clip {
            params.insert(
                "clip".to_string(),
                json!({
                    "x": clip.x,
                    "y": clip.y,
                    "width": clip.width,
                    "height": clip.height,
                    "scale": 1,
                }),
            );
        } else if options.full_page {
            params.insert("captureBeyondViewport".to_string(), json!(true));
        }

        let result = self
            .send("Page.captureScreenshot", Some(Value::Object(params)))
            .await?;
        let data = result["data"]
            .as_str()
            .ok_or_else(|| BrowserError::Protocol {
                code: -1,
                message: "captureScreenshot returned no data".to_string(),
            })?;
        BASE64
            .decode(data)
            .map_err(|e| BrowserError::Evaluation(format!("invalid screenshot payload: {e}")))
    }

    async fn print_pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let (paper_width, paper_height) = options.format.size_inches();
        let result = self
            .send(
                "Page.printToPDF",
                Some(json!({
                    "paperWidth": paper_width,
                    "paperHeight": paper_height,
                    "landscape": options.landscape,
                    "scale": options.scale,
                    "printBackground": options.print_background,
                    "displayHeaderFooter": options.display_header_footer,
                })),
            )
            .await?;
        let data = result["data"]
            .as_str()
            .ok_or_else(|| BrowserError::Protocol {
                code: -1,
                message: "printToPDF returned no data".to_string(),
            })?;
        BASE64
            .decode(data)
            .map_err(|e| BrowserError::Evaluation(format!("invalid PDF payload: {e}")))
    }

    async fn bring_to_front(&self) -> Result<()> {
        self.send("Page.bringToFront", None).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client
            .unsubscribe("Runtime.consoleAPICalled", self.console_subscription);
        // Target-level call, issued outside the page session.
        self.client
            .send(
                "Target.closeTarget",
                Some(json!({ "targetId": self.target_id })),
                None,
                self.timeout,
            )
            .await?;
        Ok(())
    }
}

/// Format a `Runtime.consoleAPICalled` payload as `[LEVEL] text`.
pub(crate) fn format_console_event(params: &Value) -> Option<String> {
    let level = params["type"].as_str()?.to_uppercase();
    let args = params["args"].as_array();
    let text = args
        .map(|args| {
            args.iter()
                .map(render_remote_object)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    Some(format!("[{level}] {text}"))
}

fn render_remote_object(obj: &Value) -> String {
    if let Some(value) = obj.get("value") {
        return match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
    }
    if let Some(description) = obj["description"].as_str() {
        return description.to_string();
    }
    obj["type"].as_str().unwrap_or("object").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn console_event_formats_level_and_args() {
        let params = json!({
            "type": "error",
            "args": [
                { "type": "string", "value": "boom" },
                { "type": "number", "value": 42 },
            ],
        });
        assert_eq!(format_console_event(&params).unwrap(), "[ERROR] boom 42");
    }

    #[test]
    fn console_event_falls_back_to_description() {
        let params = json!({
            "type": "log",
            "args": [ { "type": "object", "description": "HTMLDivElement" } ],
        });
        assert_eq!(
            format_console_event(&params).unwrap(),
            "[LOG] HTMLDivElement"
        );
    }

    #[test]
    fn console_event_without_type_is_dropped() {
        assert!(format_console_event(&json!({ "args": [] })).is_none());
    }
}
