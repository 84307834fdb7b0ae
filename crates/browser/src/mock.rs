//! In-memory engine used by the test suites
//!
//! Implements the full capability interface against a small scripted page
//! model: configured body text, per-selector element text/HTML, clickable
//! selectors, and a scroll position that the usual `window.scrollTo` /
//! `scrollHeight` expressions read and write. No browser process involved.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::engine::{
    BrowserHandle, ConsoleSink, ContextHandle, ContextOptions, Engine, ImageFormat, LaunchOptions,
    Page, PdfOptions, ScreenshotOptions,
};
use crate::error::{BrowserError, Result};

#[derive(Clone)]
struct MockSettings {
    fail_launch: bool,
    fail_titles: bool,
    fail_navigation: Vec<String>,
    title: String,
    body_text: String,
    page_html: String,
    element_text: HashMap<String, String>,
    element_html: HashMap<String, String>,
    clickable: HashSet<String>,
    clickable_text: HashSet<String>,
    selectors: HashSet<String>,
    scroll_height: f64,
    viewport_width: f64,
    eval_result: Value,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_titles: false,
            fail_navigation: Vec::new(),
            title: "Test Page".to_string(),
            body_text: "Hello World".to_string(),
            page_html: "<html><body><h1>Hello World</h1></body></html>".to_string(),
            element_text: HashMap::new(),
            element_html: HashMap::new(),
            clickable: HashSet::new(),
            clickable_text: HashSet::new(),
            selectors: HashSet::new(),
            scroll_height: 720.0,
            viewport_width: 1280.0,
            eval_result: Value::Null,
        }
    }
}

struct Shared {
    launches: AtomicUsize,
    contexts: AtomicUsize,
    pages: Mutex<Vec<Arc<MockPage>>>,
    settings: Mutex<MockSettings>,
}

/// Scripted engine for tests. Clone the `Arc` and hand it to
/// `BrowserSession::new`; configure behavior through the setters.
pub struct MockEngine {
    shared: Arc<Shared>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                launches: AtomicUsize::new(0),
                contexts: AtomicUsize::new(0),
                pages: Mutex::new(Vec::new()),
                settings: Mutex::new(MockSettings::default()),
            }),
        }
    }

    pub fn launch_count(&self) -> usize {
        self.shared.launches.load(Ordering::SeqCst)
    }

    pub fn context_count(&self) -> usize {
        self.shared.contexts.load(Ordering::SeqCst)
    }

    pub fn page_count(&self) -> usize {
        self.shared.pages.lock().unwrap().len()
    }

    /// The page most recently opened, if any.
    pub fn last_page(&self) -> Option<Arc<MockPage>> {
        self.shared.pages.lock().unwrap().last().cloned()
    }

    pub fn fail_launch(&self) {
        self.shared.settings.lock().unwrap().fail_launch = true;
    }

    pub fn fail_titles(&self) {
        self.shared.settings.lock().unwrap().fail_titles = true;
    }

    /// Navigations to URLs starting with `prefix` fail.
    pub fn fail_navigation_to(&self, prefix: &str) {
        self.shared
            .settings
            .lock()
            .unwrap()
            .fail_navigation
            .push(prefix.to_string());
    }

    pub fn set_title(&self, title: &str) {
        self.shared.settings.lock().unwrap().title = title.to_string();
    }

    pub fn set_body_text(&self, text: &str) {
        self.shared.settings.lock().unwrap().body_text = text.to_string();
    }

    pub fn set_page_html(&self, html: &str) {
        self.shared.settings.lock().unwrap().page_html = html.to_string();
    }

    pub fn set_element_text(&self, selector: &str, text: &str) {
        self.shared
            .settings
            .lock()
            .unwrap()
            .element_text
            .insert(selector.to_string(), text.to_string());
    }

    pub fn set_element_html(&self, selector: &str, html: &str) {
        self.shared
            .settings
            .lock()
            .unwrap()
            .element_html
            .insert(selector.to_string(), html.to_string());
    }

    pub fn add_clickable(&self, selector: &str) {
        self.shared
            .settings
            .lock()
            .unwrap()
            .clickable
            .insert(selector.to_string());
    }

    pub fn add_clickable_text(&self, text: &str) {
        self.shared
            .settings
            .lock()
            .unwrap()
            .clickable_text
            .insert(text.to_string());
    }

    /// Make a selector resolvable for fill/type/select/wait operations.
    pub fn add_selector(&self, selector: &str) {
        self.shared
            .settings
            .lock()
            .unwrap()
            .selectors
            .insert(selector.to_string());
    }

    pub fn set_scroll_height(&self, height: f64) {
        self.shared.settings.lock().unwrap().scroll_height = height;
    }

    pub fn set_viewport_width(&self, width: f64) {
        self.shared.settings.lock().unwrap().viewport_width = width;
    }

    pub fn set_eval_result(&self, value: Value) {
        self.shared.settings.lock().unwrap().eval_result = value;
    }

    fn settings(&self) -> MockSettings {
        self.shared.settings.lock().unwrap().clone()
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Arc<dyn BrowserHandle>> {
        if self.settings().fail_launch {
            return Err(BrowserError::Launch("mock launch failure".to_string()));
        }
        self.shared.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockBrowser {
            shared: self.shared.clone(),
        }))
    }
}

struct MockBrowser {
    shared: Arc<Shared>,
}

#[async_trait]
impl BrowserHandle for MockBrowser {
    async fn new_context(&self, _options: &ContextOptions) -> Result<Arc<dyn ContextHandle>> {
        self.shared.contexts.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockContext {
            shared: self.shared.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct MockContext {
    shared: Arc<Shared>,
}

#[async_trait]
impl ContextHandle for MockContext {
    async fn new_page(&self, console: ConsoleSink) -> Result<Arc<dyn Page>> {
        let page = Arc::new(MockPage {
            shared: self.shared.clone(),
            state: Mutex::new(PageState::new()),
            console,
        });
        self.shared.pages.lock().unwrap().push(page.clone());
        Ok(page)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct PageState {
    history: Vec<String>,
    index: usize,
    scroll_y: f64,
    inputs: HashMap<String, String>,
    screenshots: Vec<ScreenshotOptions>,
    evaluated: Vec<String>,
    closed: bool,
    foregrounded: usize,
}

impl PageState {
    fn new() -> Self {
        Self {
            history: vec!["about:blank".to_string()],
            index: 0,
            scroll_y: 0.0,
            inputs: HashMap::new(),
            screenshots: Vec::new(),
            evaluated: Vec::new(),
            closed: false,
            foregrounded: 0,
        }
    }

    fn url(&self) -> String {
        self.history[self.index].clone()
    }
}

pub struct MockPage {
    shared: Arc<Shared>,
    state: Mutex<PageState>,
    console: ConsoleSink,
}

impl MockPage {
    fn settings(&self) -> MockSettings {
        self.shared.settings.lock().unwrap().clone()
    }

    /// Push a console message, as the engine would on a console API call.
    pub fn emit_console(&self, level: &str, text: &str) {
        let _ = self
            .console
            .send(format!("[{}] {}", level.to_uppercase(), text));
    }

    pub fn scroll_y(&self) -> f64 {
        self.state.lock().unwrap().scroll_y
    }

    pub fn set_scroll_y(&self, y: f64) {
        self.state.lock().unwrap().scroll_y = y;
    }

    pub fn input_value(&self, selector: &str) -> Option<String> {
        self.state.lock().unwrap().inputs.get(selector).cloned()
    }

    pub fn screenshot_count(&self) -> usize {
        self.state.lock().unwrap().screenshots.len()
    }

    pub fn screenshot_clips(&self) -> Vec<Option<crate::engine::Clip>> {
        self.state
            .lock()
            .unwrap()
            .screenshots
            .iter()
            .map(|o| o.clip)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn foreground_count(&self) -> usize {
        self.state.lock().unwrap().foregrounded
    }

    pub fn evaluated_expressions(&self) -> Vec<String> {
        self.state.lock().unwrap().evaluated.clone()
    }

    fn eval_scripted(&self, expression: &str) -> Value {
        let settings = self.settings();
        let mut state = self.state.lock().unwrap();
        state.evaluated.push(expression.to_string());

        if let Some(args) = expression
            .trim()
            .strip_prefix("window.scrollTo(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            if let Some(y) = args.split(',').nth(1) {
                if let Ok(y) = y.trim().parse::<f64>() {
                    state.scroll_y = y;
                }
            }
            return Value::Null;
        }
        if let Some(args) = expression
            .trim()
            .strip_prefix("window.scrollBy(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            if let Some(dy) = args.split(',').nth(1) {
                if let Ok(dy) = dy.trim().parse::<f64>() {
                    state.scroll_y = (state.scroll_y + dy).max(0.0);
                }
            }
            return Value::Null;
        }
        if expression.contains("scrollHeight") {
            return json!(settings.scroll_height);
        }
        if expression.contains("window.innerWidth") {
            return json!(settings.viewport_width);
        }
        if expression.contains("pageYOffset") {
            return json!(state.scroll_y);
        }
        if expression.contains("document.title") {
            return json!(settings.title);
        }
        if expression.contains("location.href") {
            return json!(state.url());
        }
        settings.eval_result
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str) -> Result<()> {
        let settings = self.settings();
        if settings.fail_navigation.iter().any(|p| url.starts_with(p)) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        let index = state.index;
        state.history.truncate(index + 1);
        state.history.push(url.to_string());
        state.index += 1;
        Ok(())
    }

    async fn go_back(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.index == 0 {
            return Err(BrowserError::Navigation {
                url: state.url(),
                message: "no previous history entry".to_string(),
            });
        }
        state.index -= 1;
        Ok(())
    }

    async fn go_forward(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.index + 1 >= state.history.len() {
            return Err(BrowserError::Navigation {
                url: state.url(),
                message: "no next history entry".to_string(),
            });
        }
        state.index += 1;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        if self.settings().clickable.contains(selector) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(selector.to_string()))
        }
    }

    async fn click_text(&self, text: &str) -> Result<()> {
        if self.settings().clickable_text.contains(text) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound(text.to_string()))
        }
    }

    async fn type_text(&self, selector: &str, text: &str, clear: bool) -> Result<()> {
        if !self.settings().selectors.contains(selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let entry = state.inputs.entry(selector.to_string()).or_default();
        if clear {
            entry.clear();
        }
        entry.push_str(text);
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        if !self.settings().selectors.contains(selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        self.state
            .lock()
            .unwrap()
            .inputs
            .insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.fill(selector, value).await
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<()> {
        if self.settings().selectors.contains(selector) {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!(
                "selector {selector} did not appear"
            )))
        }
    }

    async fn wait_for_text(&self, text: &str, _timeout: Duration) -> Result<()> {
        if self.settings().body_text.contains(text) {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!("text {text:?} did not appear")))
        }
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        Ok(self.eval_scripted(expression))
    }

    async fn text_content(&self, selector: &str) -> Result<Option<String>> {
        let settings = self.settings();
        if selector == "body" {
            return Ok(Some(settings.body_text));
        }
        match settings.element_text.get(selector) {
            Some(text) => Ok(Some(text.clone())),
            None => Err(BrowserError::ElementNotFound(selector.to_string())),
        }
    }

    async fn inner_html(&self, selector: &str) -> Result<String> {
        let settings = self.settings();
        settings
            .element_html
            .get(selector)
            .cloned()
            .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.settings().page_html)
    }

    async fn title(&self) -> Result<String> {
        let settings = self.settings();
        if settings.fail_titles {
            return Err(BrowserError::Timeout("title unavailable".to_string()));
        }
        Ok(settings.title)
    }

    async fn url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url())
    }

    async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.screenshots.push(options.clone());
        let bytes = match options.format {
            ImageFormat::Png => vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
            ImageFormat::Jpeg => vec![0xFF, 0xD8, 0xFF, 0xE0],
        };
        Ok(bytes)
    }

    async fn print_pdf(&self, _options: &PdfOptions) -> Result<Vec<u8>> {
        Ok(b"%PDF-1.4\nmock".to_vec())
    }

    async fn bring_to_front(&self) -> Result<()> {
        self.state.lock().unwrap().foregrounded += 1;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_scroll_expressions() {
        let engine = MockEngine::new();
        engine.set_scroll_height(2000.0);
        let browser = engine
            .launch(&LaunchOptions {
                kind: crate::engine::EngineKind::Chromium,
                headless: true,
            })
            .await
            .unwrap();
        let context = browser
            .new_context(&ContextOptions {
                viewport_width: 1280,
                viewport_height: 720,
                timeout: Duration::from_secs(30),
            })
            .await
            .unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let page = context.new_page(tx).await.unwrap();

        let height = page
            .evaluate("document.documentElement.scrollHeight")
            .await
            .unwrap();
        assert_eq!(height, json!(2000.0));

        page.evaluate("window.scrollTo(0, 750)").await.unwrap();
        let offset = page.evaluate("window.pageYOffset").await.unwrap();
        assert_eq!(offset, json!(750.0));
    }

    #[tokio::test]
    async fn history_navigation() {
        let engine = MockEngine::new();
        let browser = engine
            .launch(&LaunchOptions {
                kind: crate::engine::EngineKind::Chromium,
                headless: true,
            })
            .await
            .unwrap();
        let context = browser
            .new_context(&ContextOptions {
                viewport_width: 1280,
                viewport_height: 720,
                timeout: Duration::from_secs(30),
            })
            .await
            .unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let page = context.new_page(tx).await.unwrap();

        page.goto("https://a.test").await.unwrap();
        page.goto("https://b.test").await.unwrap();
        page.go_back().await.unwrap();
        assert_eq!(page.url().await.unwrap(), "https://a.test");
        page.go_forward().await.unwrap();
        assert_eq!(page.url().await.unwrap(), "https://b.test");
        assert!(page.go_forward().await.is_err());
    }
}
