//! CDP-backed engine implementation
//!
//! One WebSocket connection per browser process, multiplexed across page
//! sessions. Request/response matching via monotonic ids; events broadcast
//! to subscribers. No retries and no queuing - the caller decides.

pub mod client;
pub mod engine;
pub mod launcher;
pub mod page;
pub mod protocol;

pub use client::CdpClient;
pub use engine::CdpEngine;
pub use page::CdpPage;
pub use protocol::{CdpEvent, CdpRequest, CdpResponse};
