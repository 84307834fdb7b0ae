//! Browser process launcher
//!
//! Locates an engine binary, spawns it with a remote-debugging port, and
//! parses the DevTools websocket URL the process prints on stderr.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::engine::EngineKind;
use crate::error::{BrowserError, Result};

/// How long to wait for the process to announce its DevTools endpoint.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variable overriding binary discovery.
const EXECUTABLE_ENV: &str = "BROWSER_EXECUTABLE";

#[derive(Debug)]
pub struct LaunchedProcess {
    pub child: Child,
    pub ws_url: String,
}

/// Spawn the browser for `kind` and wait for its websocket endpoint.
pub async fn launch(kind: EngineKind, headless: bool) -> Result<LaunchedProcess> {
    if kind == EngineKind::Webkit {
        return Err(BrowserError::Launch(
            "webkit does not expose a DevTools protocol endpoint".to_string(),
        ));
    }

    let binary = find_binary(kind)?;
    let profile_dir = std::env::temp_dir().join(format!("browser-mcp-profile-{}", std::process::id()));
    std::fs::create_dir_all(&profile_dir)?;

    let mut command = Command::new(&binary);
    match kind {
        EngineKind::Chromium => {
            command
                .arg("--remote-debugging-port=0")
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .arg(format!("--user-data-dir={}", profile_dir.display()))
                .arg("about:blank");
            if headless {
                command.arg("--headless=new");
            }
        }
        EngineKind::Firefox => {
            command
                .arg("--remote-debugging-port=0")
                .arg("--profile")
                .arg(&profile_dir)
                .arg("--no-remote");
            if headless {
                command.arg("--headless");
            }
        }
        // Rejected above; kept for exhaustiveness.
        EngineKind::Webkit => unreachable!(),
    }

    tracing::info!(binary = %binary.display(), "spawning browser process");
    let mut child = command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BrowserError::Launch(format!("failed to spawn {}: {e}", binary.display())))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BrowserError::Launch("stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| BrowserError::Launch("stderr not captured".to_string()))?;

    let ws_url = tokio::time::timeout(STARTUP_TIMEOUT, read_ws_url(stdout, stderr))
        .await
        .map_err(|_| BrowserError::Launch("timed out waiting for DevTools endpoint".to_string()))??;

    Ok(LaunchedProcess { child, ws_url })
}

/// Scan both output streams for the `DevTools listening on ws://...`
/// announcement. Chromium prints it on stderr, Firefox's Remote Agent on
/// stdout.
async fn read_ws_url<O, E>(stdout: O, stderr: E) -> Result<String>
where
    O: tokio::io::AsyncRead + Unpin,
    E: tokio::io::AsyncRead + Unpin,
{
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        let line = tokio::select! {
            line = out_lines.next_line(), if out_open => match line? {
                Some(line) => Some(line),
                None => {
                    out_open = false;
                    None
                }
            },
            line = err_lines.next_line(), if err_open => match line? {
                Some(line) => Some(line),
                None => {
                    err_open = false;
                    None
                }
            },
        };
        if let Some(line) = line {
            tracing::trace!(line = %line, "browser output");
            if let Some(url) = parse_devtools_line(&line) {
                return Ok(url);
            }
        }
    }
    Err(BrowserError::Launch(
        "browser exited before announcing its DevTools endpoint".to_string(),
    ))
}

fn parse_devtools_line(line: &str) -> Option<String> {
    let idx = line.find("DevTools listening on ")?;
    let url = line[idx + "DevTools listening on ".len()..].trim();
    url.starts_with("ws://").then(|| url.to_string())
}

/// Locate the engine binary: explicit override, then PATH, then the
/// platform's conventional install locations.
fn find_binary(kind: EngineKind) -> Result<PathBuf> {
    if let Ok(path) = std::env::var(EXECUTABLE_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
        return Err(BrowserError::Launch(format!(
            "{EXECUTABLE_ENV} points at a missing binary: {}",
            path.display()
        )));
    }

    let names: &[&str] = match kind {
        EngineKind::Chromium => &[
            "chromium",
            "chromium-browser",
            "google-chrome",
            "google-chrome-stable",
        ],
        EngineKind::Firefox => &["firefox"],
        EngineKind::Webkit => &[],
    };

    for name in names {
        if let Some(found) = search_path(name) {
            return Ok(found);
        }
    }
    for fixed in fixed_locations(kind) {
        if fixed.is_file() {
            return Ok(fixed);
        }
    }

    Err(BrowserError::Launch(format!(
        "no {kind} binary found; set {EXECUTABLE_ENV} to its location"
    )))
}

fn search_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn fixed_locations(kind: EngineKind) -> Vec<PathBuf> {
    match kind {
        EngineKind::Chromium => vec![
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ],
        EngineKind::Firefox => vec![
            PathBuf::from("/usr/bin/firefox"),
            PathBuf::from("/Applications/Firefox.app/Contents/MacOS/firefox"),
        ],
        EngineKind::Webkit => Vec::new(),
    }
}
