//! browser-mcp: browser automation over MCP on stdio
//!
//! One browser session per process, started lazily on the first tool
//! call. Logs go to stderr; stdout carries only protocol traffic.

use std::process::ExitCode;
use std::sync::Arc;

use browser::{BrowserSession, CdpEngine, EngineKind, SessionConfig};
use clap::Parser;
use tools::Dispatcher;
use tracing_subscriber::EnvFilter;

mod rpc;

#[derive(Parser, Debug)]
#[command(name = "browser-mcp", version, about = "Browser automation MCP server")]
struct Cli {
    /// Browser engine to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Run the browser in headless mode
    #[arg(long)]
    headless: bool,

    /// Browser viewport width
    #[arg(long, default_value_t = 1280)]
    viewport_width: u32,

    /// Browser viewport height
    #[arg(long, default_value_t = 720)]
    viewport_height: u32,

    /// Default timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let engine: EngineKind = match cli.browser.parse() {
        Ok(kind) => kind,
        Err(e) => {
            tracing::error!(error = %e, "invalid engine selection");
            return ExitCode::FAILURE;
        }
    };

    let config = SessionConfig {
        engine,
        headless: cli.headless,
        viewport_width: cli.viewport_width,
        viewport_height: cli.viewport_height,
        timeout_ms: cli.timeout,
    };
    let session = Arc::new(BrowserSession::new(config, Arc::new(CdpEngine::new())));
    let dispatcher = Dispatcher::for_session(session.clone());

    tracing::info!(
        engine = %engine,
        headless = cli.headless,
        tools = dispatcher.registry().len(),
        "serving MCP on stdio"
    );

    let served = tokio::select! {
        result = rpc::serve(&dispatcher, tokio::io::stdin(), tokio::io::stdout()) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    };

    session.shutdown().await;

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "stdio transport error");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    // stdout is the protocol channel, so everything else goes to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
