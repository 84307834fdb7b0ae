//! CDP client - the communication layer
//!
//! Single WebSocket per browser connection. Responses are matched to
//! requests by id through a lock-free pending map; events fan out to
//! subscribers. Every request is bounded by a timeout so no engine call
//! can hang the session indefinitely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::protocol::{CdpMessage, CdpRequest, CdpResponse, RequestId, SessionId};
use crate::error::{BrowserError, Result};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Event subscriber callback, invoked on the reader task.
pub type EventCallback = Arc<dyn Fn(super::protocol::CdpEvent) + Send + Sync>;

/// Token handed out on subscription, used to unsubscribe.
pub type SubscriptionId = u64;

/// Event subscribers keyed by method name. Entries carry a token so a
/// closing page can remove its callback instead of leaving a dead
/// closure behind for the rest of the connection.
struct Subscribers {
    entries: DashMap<String, Vec<(SubscriptionId, EventCallback)>>,
    next: AtomicU64,
}

impl Subscribers {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    fn add(&self, method: String, callback: EventCallback) -> SubscriptionId {
        let id = self.next.fetch_add(1, Ordering::SeqCst);
        self.entries.entry(method).or_default().push((id, callback));
        id
    }

    fn remove(&self, method: &str, id: SubscriptionId) {
        if let Some(mut callbacks) = self.entries.get_mut(method) {
            callbacks.retain(|(token, _)| *token != id);
        }
    }

    fn notify(&self, event: &super::protocol::CdpEvent) {
        if let Some(callbacks) = self.entries.get(&event.method) {
            for (_, callback) in callbacks.value() {
                callback(event.clone());
            }
        }
    }
}

pub struct CdpClient {
    next_id: AtomicU64,
    /// Requests awaiting a response, keyed by request id.
    pending: Arc<DashMap<RequestId, oneshot::Sender<CdpResponse>>>,
    subscribers: Arc<Subscribers>,
    ws_sink: RwLock<WsSink>,
}

impl CdpClient {
    /// Connect to a DevTools websocket endpoint and start the reader task.
    pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
        // Validate early for a readable error instead of a handshake fault.
        Url::parse(ws_url)?;

        let (ws_stream, _) = connect_async(ws_url).await?;
        let (sink, mut stream) = ws_stream.split();

        let client = Arc::new(Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            subscribers: Arc::new(Subscribers::new()),
            ws_sink: RwLock::new(sink),
        });

        let pending = client.pending.clone();
        let subscribers = client.subscribers.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = dispatch_message(&pending, &subscribers, &text) {
                            tracing::error!(error = %e, "failed to handle CDP message");
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::debug!("CDP websocket closed by peer");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "CDP websocket error");
                        break;
                    }
                    _ => {}
                }
            }
            // Wake every waiter; their sends resolve as Closed errors.
            pending.clear();
        });

        Ok(client)
    }

    /// Send a request and await its response, bounded by `timeout`.
    pub async fn send(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
        timeout: Duration,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let method = method.into();
        let request = CdpRequest {
            id,
            method: method.clone(),
            params,
            session_id,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let json = serde_json::to_string(&request)?;
        {
            let mut sink = self.ws_sink.write().await;
            let sent = sink.send(Message::Text(json)).await;
            if let Err(e) = sent {
                self.pending.remove(&id);
                return Err(BrowserError::WebSocket(e));
            }
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(BrowserError::Closed),
            Err(_) => {
                self.pending.remove(&id);
                return Err(BrowserError::Timeout(method));
            }
        };

        if let Some(error) = response.error {
            return Err(BrowserError::Protocol {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Subscribe to a CDP event method. Callbacks run on the reader task
    /// and must not block.
    pub fn subscribe(&self, method: impl Into<String>, callback: EventCallback) -> SubscriptionId {
        self.subscribers.add(method.into(), callback)
    }

    /// Drop a subscription registered with [`CdpClient::subscribe`].
    pub fn unsubscribe(&self, method: &str, id: SubscriptionId) {
        self.subscribers.remove(method, id);
    }

    /// Close the connection gracefully.
    pub async fn close(&self) -> Result<()> {
        let mut sink = self.ws_sink.write().await;
        sink.close().await?;
        Ok(())
    }
}

fn dispatch_message(
    pending: &DashMap<RequestId, oneshot::Sender<CdpResponse>>,
    subscribers: &Subscribers,
    text: &str,
) -> Result<()> {
    let msg: CdpMessage = serde_json::from_str(text)?;
    match msg {
        CdpMessage::Response(response) => {
            if let Some((_, tx)) = pending.remove(&response.id) {
                // Receiver may have timed out already; that's fine.
                let _ = tx.send(response);
            } else {
                tracing::warn!(id = response.id, "response for unknown request");
            }
        }
        CdpMessage::Event(event) => subscribers.notify(&event),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback() -> (EventCallback, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let callback: EventCallback = Arc::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, calls)
    }

    #[test]
    fn events_fan_out_to_method_subscribers() {
        let pending = DashMap::new();
        let subscribers = Subscribers::new();
        let (callback, calls) = counting_callback();
        subscribers.add("Runtime.consoleAPICalled".to_string(), callback);

        dispatch_message(
            &pending,
            &subscribers,
            r#"{"method":"Runtime.consoleAPICalled","params":{},"sessionId":"S"}"#,
        )
        .unwrap();
        dispatch_message(
            &pending,
            &subscribers,
            r#"{"method":"Page.loadEventFired","params":{}}"#,
        )
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_subscription_stops_receiving_events() {
        let pending = DashMap::new();
        let subscribers = Subscribers::new();
        let (first, first_calls) = counting_callback();
        let (second, second_calls) = counting_callback();
        let first_id = subscribers.add("Runtime.consoleAPICalled".to_string(), first);
        subscribers.add("Runtime.consoleAPICalled".to_string(), second);

        subscribers.remove("Runtime.consoleAPICalled", first_id);
        dispatch_message(
            &pending,
            &subscribers,
            r#"{"method":"Runtime.consoleAPICalled","params":{}}"#,
        )
        .unwrap();

        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }
}
