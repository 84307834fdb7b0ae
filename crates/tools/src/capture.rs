//! Capture and extraction tools
//!
//! The tiled capture (`browser_screenshot_pages`) scrolls through the
//! document in fixed-height slices with a configurable overlap, saves
//! each slice to disk, and restores the original scroll offset whether
//! the pass succeeds or fails.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use browser::{BrowserSession, Clip, ImageFormat, Page, PaperFormat, PdfOptions, ScreenshotOptions};
use serde_json::json;

use crate::{
    args, handler, Arguments, Content, ToolDescriptor, ToolFault, ToolProvider, ToolResult,
};

/// Settle time after each scroll before capturing.
const RENDER_DELAY: Duration = Duration::from_millis(100);

/// How many tiles are returned inline as base64 images. Everything is
/// saved to disk regardless; inlining all of a long page would blow up
/// the response.
const MAX_INLINE_TILES: usize = 3;

pub struct CaptureTools {
    session: Arc<BrowserSession>,
}

impl CaptureTools {
    pub fn new(session: Arc<BrowserSession>) -> Self {
        Self { session }
    }
}

impl ToolProvider for CaptureTools {
    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor {
                name: "browser_screenshot",
                description: "Take a screenshot of the current page",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "filename": {
                            "type": "string",
                            "description": "Optional filename to save screenshot",
                        },
                        "full_page": {
                            "type": "boolean",
                            "description": "Capture full page",
                            "default": false,
                        },
                        "element_selector": {
                            "type": "string",
                            "description": "CSS selector to screenshot specific element",
                        },
                    },
                }),
                handler: handler(&self.session, screenshot),
            },
            ToolDescriptor {
                name: "browser_screenshot_pages",
                description: "Take screenshots page by page (useful for long pages)",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "folder": {
                            "type": "string",
                            "description": "Folder to save screenshots",
                            "default": "screenshots",
                        },
                        "filename_prefix": {
                            "type": "string",
                            "description": "Prefix for screenshot filenames",
                            "default": "page",
                        },
                        "viewport_height": {
                            "type": "number",
                            "description": "Height of each page in pixels",
                            "default": 800,
                        },
                        "overlap": {
                            "type": "number",
                            "description": "Overlap between pages in pixels",
                            "default": 50,
                        },
                        "max_pages": {
                            "type": "number",
                            "description": "Maximum number of pages to capture",
                            "default": 20,
                        },
                        "format": {
                            "type": "string",
                            "description": "Image format",
                            "enum": ["png", "jpeg"],
                            "default": "png",
                        },
                        "quality": {
                            "type": "number",
                            "description": "Image quality (for jpeg only, 0-100)",
                            "default": 90,
                        },
                    },
                }),
                handler: handler(&self.session, screenshot_pages),
            },
            ToolDescriptor {
                name: "browser_get_text",
                description: "Extract text content from page or element",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "CSS selector (optional, defaults to body)",
                        },
                    },
                }),
                handler: handler(&self.session, get_text),
            },
            ToolDescriptor {
                name: "browser_get_html",
                description: "Get HTML content of page or element",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "CSS selector (optional, defaults to full page)",
                        },
                    },
                }),
                handler: handler(&self.session, get_html),
            },
            ToolDescriptor {
                name: "browser_console_messages",
                description: "Get console messages from the page",
                input_schema: json!({ "type": "object", "properties": {} }),
                handler: handler(&self.session, console_messages),
            },
            ToolDescriptor {
                name: "browser_download_pdf",
                description: "Save the current page as a PDF file",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "folder": {
                            "type": "string",
                            "description": "Folder path where to save the PDF",
                            "default": "downloads",
                        },
                        "filename": {
                            "type": "string",
                            "description": "PDF filename (without extension)",
                        },
                        "format": {
                            "type": "string",
                            "description": "Paper format",
                            "enum": ["Letter", "Legal", "Tabloid", "A3", "A4", "A5"],
                            "default": "A4",
                        },
                        "landscape": {
                            "type": "boolean",
                            "description": "Page orientation",
                            "default": false,
                        },
                        "scale": {
                            "type": "number",
                            "description": "Scale of the webpage rendering",
                            "default": 1.0,
                        },
                        "display_header_footer": {
                            "type": "boolean",
                            "description": "Display header and footer",
                            "default": false,
                        },
                        "print_background": {
                            "type": "boolean",
                            "description": "Print background graphics",
                            "default": true,
                        },
                    },
                    "required": ["filename"],
                }),
                handler: handler(&self.session, download_pdf),
            },
        ]
    }
}

async fn screenshot(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let filename = args::optional_str(&arguments, "filename")?.map(str::to_string);
    let full_page = args::optional_bool(&arguments, "full_page", false)?;
    let element = args::optional_str(&arguments, "element_selector")?.map(str::to_string);

    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    let options = ScreenshotOptions {
        full_page,
        element: element.clone(),
        ..ScreenshotOptions::default()
    };
    let bytes = match tab.page().screenshot(&options).await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(ToolResult::error(format!("Screenshot failed: {e}"))),
    };

    let target = match &element {
        Some(selector) => format!("element '{selector}'"),
        None => "page".to_string(),
    };
    let saved = match &filename {
        Some(filename) => {
            if let Err(e) = tokio::fs::write(filename, &bytes).await {
                return Ok(ToolResult::error(format!("Screenshot failed: {e}")));
            }
            format!(" (saved as {filename})")
        }
        None => String::new(),
    };

    Ok(ToolResult::new(vec![
        Content::image(BASE64.encode(&bytes), options.format.mime_type()),
        Content::text(format!("Screenshot of {target}{saved}")),
    ]))
}

async fn screenshot_pages(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let folder = args::optional_str(&arguments, "folder")?
        .unwrap_or("screenshots")
        .to_string();
    let prefix = args::optional_str(&arguments, "filename_prefix")?
        .unwrap_or("page")
        .to_string();
    let viewport_height = args::optional_f64(&arguments, "viewport_height", 800.0)?;
    let overlap = args::optional_f64(&arguments, "overlap", 50.0)?;
    let max_pages = args::optional_u64(&arguments, "max_pages", 20)?;
    let format = match args::optional_str(&arguments, "format")?.unwrap_or("png") {
        "png" => ImageFormat::Png,
        "jpeg" => ImageFormat::Jpeg,
        other => {
            return Err(ToolFault::InvalidArgument {
                name: "format",
                message: format!("expected png or jpeg, got {other:?}"),
            })
        }
    };
    let quality = args::optional_u64(&arguments, "quality", 90)?;

    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;
    let page = tab.page();

    let run = async {
        tokio::fs::create_dir_all(&folder).await?;

        let page_height = eval_number(page, "document.documentElement.scrollHeight").await?;
        let viewport_width = eval_number(page, "window.innerWidth").await?;

        // Each tile advances by the viewport height minus the overlap.
        let effective = (viewport_height - overlap).max(1.0);
        let tiles = ((page_height / effective).ceil() as u64).min(max_pages);

        let original_scroll = eval_number(page, "window.pageYOffset").await?;

        let captured = capture_tiles(
            page,
            &folder,
            &prefix,
            tiles,
            effective,
            viewport_width,
            viewport_height,
            page_height,
            format,
            quality,
        )
        .await;

        // Restore the scroll offset on both the success and failure path.
        let restore = page
            .evaluate(&format!("window.scrollTo(0, {original_scroll})"))
            .await;
        let (filenames, inline) = captured?;
        restore?;

        let mut text = String::from("Page-by-page screenshots captured:\n");
        text.push_str(&format!("Folder: {folder}\n"));
        text.push_str(&format!("Pages captured: {tiles}\n"));
        text.push_str(&format!("Page size: {viewport_width}x{viewport_height}px\n"));
        text.push_str(&format!("Total height: {page_height}px\n"));
        text.push_str("Files saved:\n");
        for filename in &filenames {
            text.push_str(&format!("  - {filename}\n"));
        }

        let mut content = vec![Content::text(text)];
        content.extend(inline);
        Ok::<ToolResult, ToolFault>(ToolResult::new(content))
    };

    match run.await {
        Ok(result) => Ok(result),
        Err(ToolFault::Browser(e)) => {
            Ok(ToolResult::error(format!("Page screenshots failed: {e}")))
        }
        Err(ToolFault::Io(e)) => Ok(ToolResult::error(format!("Page screenshots failed: {e}"))),
        Err(fault) => Err(fault),
    }
}

#[allow(clippy::too_many_arguments)]
async fn capture_tiles(
    page: &Arc<dyn Page>,
    folder: &str,
    prefix: &str,
    tiles: u64,
    effective: f64,
    viewport_width: f64,
    viewport_height: f64,
    page_height: f64,
    format: ImageFormat,
    quality: u64,
) -> Result<(Vec<String>, Vec<Content>), ToolFault> {
    page.evaluate("window.scrollTo(0, 0)").await?;
    tokio::time::sleep(RENDER_DELAY).await;

    let mut filenames = Vec::new();
    let mut inline = Vec::new();

    for tile in 0..tiles {
        let scroll_y = tile as f64 * effective;
        page.evaluate(&format!("window.scrollTo(0, {scroll_y})"))
            .await?;
        tokio::time::sleep(RENDER_DELAY).await;

        let options = ScreenshotOptions {
            format,
            quality: match format {
                ImageFormat::Jpeg => Some(quality as u32),
                ImageFormat::Png => None,
            },
            clip: Some(Clip {
                x: 0.0,
                y: 0.0,
                width: viewport_width,
                height: viewport_height.min(page_height - scroll_y),
            }),
            ..ScreenshotOptions::default()
        };
        let bytes = page.screenshot(&options).await?;

        let filename = format!("{prefix}_{:03}.{}", tile + 1, format.extension());
        let path = Path::new(folder).join(&filename);
        tokio::fs::write(&path, &bytes).await?;
        filenames.push(path.display().to_string());

        if inline.len() < MAX_INLINE_TILES {
            inline.push(Content::image(BASE64.encode(&bytes), format.mime_type()));
        }
    }

    Ok((filenames, inline))
}

async fn eval_number(page: &Arc<dyn Page>, expression: &str) -> Result<f64, ToolFault> {
    let value = page.evaluate(expression).await?;
    Ok(value.as_f64().unwrap_or(0.0))
}

async fn get_text(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let selector = args::optional_str(&arguments, "selector")?
        .unwrap_or("body")
        .to_string();
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    let source = if selector == "body" {
        "page".to_string()
    } else {
        format!("element '{selector}'")
    };

    match tab.page().text_content(&selector).await {
        Ok(text) => {
            let text = match text {
                Some(text) if !text.is_empty() => text,
                _ => "(no text content found)".to_string(),
            };
            Ok(ToolResult::text(format!("Text from {source}:\n\n{text}")))
        }
        Err(e) => Ok(ToolResult::error(format!("Text extraction failed: {e}"))),
    }
}

async fn get_html(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let selector = args::optional_str(&arguments, "selector")?.map(str::to_string);
    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    let fetched = match &selector {
        Some(selector) => tab
            .page()
            .inner_html(selector)
            .await
            .map(|html| (html, format!("element '{selector}'"))),
        None => tab
            .page()
            .content()
            .await
            .map(|html| (html, "page".to_string())),
    };

    match fetched {
        Ok((html, source)) => Ok(ToolResult::text(format!(
            "HTML from {source}:\n\n```html\n{html}\n```"
        ))),
        Err(e) => Ok(ToolResult::error(format!("HTML extraction failed: {e}"))),
    }
}

async fn console_messages(
    session: Arc<BrowserSession>,
    _arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let tab = session.current_tab().await?;
    let messages = tab.console_messages().await;

    if messages.is_empty() {
        return Ok(ToolResult::text("No console messages"));
    }
    Ok(ToolResult::text(format!(
        "Console messages:\n\n{}",
        messages.join("\n")
    )))
}

async fn download_pdf(
    session: Arc<BrowserSession>,
    arguments: Arguments,
) -> Result<ToolResult, ToolFault> {
    let filename = args::required_str(&arguments, "filename")?.to_string();
    let folder = args::optional_str(&arguments, "folder")?
        .unwrap_or("downloads")
        .to_string();
    let format: PaperFormat = args::optional_str(&arguments, "format")?
        .unwrap_or("A4")
        .parse()
        .map_err(|e| ToolFault::InvalidArgument {
            name: "format",
            message: format!("{e}"),
        })?;
    let landscape = args::optional_bool(&arguments, "landscape", false)?;
    let scale = args::optional_f64(&arguments, "scale", 1.0)?;
    let display_header_footer = args::optional_bool(&arguments, "display_header_footer", false)?;
    let print_background = args::optional_bool(&arguments, "print_background", true)?;

    let tab = session.current_tab().await?;
    let _guard = tab.op_guard().await;

    let options = PdfOptions {
        format,
        landscape,
        scale,
        print_background,
        display_header_footer,
    };
    let bytes = match tab.page().print_pdf(&options).await {
        Ok(bytes) => bytes,
        Err(e) => return Ok(ToolResult::error(format!("PDF export failed: {e}"))),
    };

    tokio::fs::create_dir_all(&folder).await?;
    let path = Path::new(&folder).join(format!("{filename}.pdf"));
    tokio::fs::write(&path, &bytes).await?;

    let orientation = if landscape { " landscape" } else { "" };
    Ok(ToolResult::text(format!(
        "PDF saved: {}\nFormat: {format}{orientation}\nSize: {} bytes",
        path.display(),
        bytes.len()
    )))
}
