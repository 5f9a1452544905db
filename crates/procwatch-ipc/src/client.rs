//! Host-side helper for the monitor's message pipe.
//!
//! Writes requests with generated ids and correlates replies by id, so
//! concurrently issued commands may complete out of order. Event lines are
//! fanned out to subscribers.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::channel::write_loop;
use crate::{IpcError, Message};

/// Request/response timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Fan-out capacity for event subscribers
const EVENT_BUFFER: usize = 256;

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

struct ClientInner {
    outbound: mpsc::UnboundedSender<Message>,
    pending: Pending,
    events: broadcast::Sender<(String, Value)>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// The host end of the pipe: sends requests, receives replies and events.
#[derive(Clone)]
pub struct ChannelClient {
    inner: Arc<ClientInner>,
}

impl ChannelClient {
    /// Wrap the host side of a duplex byte stream.
    pub fn spawn<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(write_loop(writer, outbound_rx));
        let reader = tokio::spawn(read_loop(reader, pending.clone(), events.clone()));

        Self {
            inner: Arc::new(ClientInner {
                outbound,
                pending,
                events,
                reader,
                writer,
            }),
        }
    }

    /// Send a command and wait for the correlated reply.
    pub async fn request(&self, command: &str, payload: Value) -> Result<Value, IpcError> {
        self.request_with_timeout(command, payload, REQUEST_TIMEOUT)
            .await
    }

    /// Send a command with an explicit reply timeout.
    pub async fn request_with_timeout(
        &self,
        command: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, IpcError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id.clone(), tx);

        let sent = self.inner.outbound.send(Message::Request {
            id: id.clone(),
            command: command.to_string(),
            payload,
        });
        if sent.is_err() {
            self.inner.pending.lock().remove(&id);
            return Err(IpcError::ChannelClosed);
        }

        let reply = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(IpcError::ChannelClosed),
            Err(elapsed) => {
                self.inner.pending.lock().remove(&id);
                return Err(IpcError::Timeout(elapsed));
            }
        };

        match reply {
            Message::Response { payload, .. } => Ok(payload),
            Message::Error { code, message, .. } => Err(IpcError::Command { code, message }),
            // The read loop only resolves pending entries with replies.
            _ => Err(IpcError::ChannelClosed),
        }
    }

    /// Subscribe to event broadcasts as `(event name, payload)` pairs.
    /// Subscribers that lag behind the buffer miss events.
    pub fn events(&self) -> broadcast::Receiver<(String, Value)> {
        self.inner.events.subscribe()
    }
}

async fn read_loop<R>(reader: R, pending: Pending, events: broadcast::Sender<(String, Value)>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: Message = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed line");
                continue;
            }
        };

        match message {
            Message::Event { event, payload, .. } => {
                // No subscribers is fine.
                let _ = events.send((event, payload));
            }
            Message::Response { ref id, .. } | Message::Error { ref id, .. } => {
                let waiter = pending.lock().remove(id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(message);
                    }
                    None => tracing::debug!(id = %id, "reply for unknown request id"),
                }
            }
            Message::Request { .. } => {
                tracing::debug!("dropping request received on client side");
            }
        }
    }

    // Wake every waiter so in-flight requests fail fast instead of timing out.
    pending.lock().clear();
}
