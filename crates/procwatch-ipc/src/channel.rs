//! The duplex line channel: frames and deframes protocol messages over a
//! byte stream.
//!
//! Pure transport: no knowledge of what the commands mean. Incoming bytes
//! are split on newlines; lines that fail to parse, or that parse to a
//! non-request shape, are dropped without terminating the stream. Outgoing
//! messages are written by a single writer task fed from an in-order queue,
//! so writes are line-atomic and preserve call order.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{CommandResult, ErrorCode, Message};

/// Handles one parsed request and produces the reply payload or error.
///
/// The channel invokes the handler per line without waiting for earlier
/// invocations to finish, so handling may overlap.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &str, payload: Value) -> CommandResult;
}

type HandlerSlot = Arc<Mutex<Option<Arc<dyn CommandHandler>>>>;

struct ChannelInner {
    outbound: mpsc::UnboundedSender<Message>,
    handler: HandlerSlot,
    closed_rx: watch::Receiver<bool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Drop for ChannelInner {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// One side of the monitor's message pipe. Cheaply cloneable; the underlying
/// tasks stop when the last clone is dropped.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Wrap a readable and a writable byte stream.
    pub fn spawn<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (closed_tx, closed_rx) = watch::channel(false);
        let handler: HandlerSlot = Arc::new(Mutex::new(None));

        let writer = tokio::spawn(write_loop(writer, outbound_rx));
        let reader = tokio::spawn(read_loop(
            reader,
            handler.clone(),
            outbound.clone(),
            closed_tx,
        ));

        Self {
            inner: Arc::new(ChannelInner {
                outbound,
                handler,
                closed_rx,
                reader,
                writer,
            }),
        }
    }

    /// Register the command handler. Replaces any previously registered
    /// handler (last registration wins). Requests arriving before the first
    /// registration are dropped.
    pub fn bind(&self, handler: Arc<dyn CommandHandler>) {
        *self.inner.handler.lock() = Some(handler);
    }

    /// Write one response line.
    pub fn send_response(&self, id: impl Into<String>, payload: Value) {
        self.send(Message::Response {
            id: id.into(),
            payload,
        });
    }

    /// Write one error line.
    pub fn send_error(&self, id: impl Into<String>, code: ErrorCode, message: impl Into<String>) {
        self.send(Message::Error {
            id: id.into(),
            code,
            message: message.into(),
        });
    }

    /// Write one event line, stamped with the current wall clock.
    pub fn send_event(&self, event: impl Into<String>, payload: Value) {
        self.send(Message::event(event, payload));
    }

    fn send(&self, message: Message) {
        // Receiver gone means the transport died; transport errors never
        // crash the process.
        if self.inner.outbound.send(message).is_err() {
            tracing::debug!("dropping outbound message, transport closed");
        }
    }

    /// Resolves when the inbound side of the transport has closed (EOF or
    /// read error).
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub(crate) async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Message>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode outbound message");
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            tracing::debug!(error = %e, "transport write failed");
            break;
        }
        if let Err(e) = writer.flush().await {
            tracing::debug!(error = %e, "transport flush failed");
            break;
        }
    }
}

async fn read_loop<R>(
    reader: R,
    handler: HandlerSlot,
    outbound: mpsc::UnboundedSender<Message>,
    closed_tx: watch::Sender<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                dispatch_line(line, &handler, &outbound);
            }
            Ok(None) => {
                tracing::debug!("transport closed");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "transport read error");
                break;
            }
        }
    }

    let _ = closed_tx.send(true);
}

fn dispatch_line(line: &str, handler: &HandlerSlot, outbound: &mpsc::UnboundedSender<Message>) {
    let message: Message = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed line");
            return;
        }
    };

    let Message::Request {
        id,
        command,
        payload,
    } = message
    else {
        tracing::debug!("dropping non-request message");
        return;
    };

    let Some(handler) = handler.lock().clone() else {
        tracing::debug!(command = %command, "dropping request, no handler bound");
        return;
    };

    // Dispatch without waiting for earlier invocations.
    let outbound = outbound.clone();
    tokio::spawn(async move {
        let reply = match handler.handle(&command, payload).await {
            Ok(payload) => Message::Response { id, payload },
            Err(e) => Message::Error {
                id,
                code: e.code,
                message: e.message,
            },
        };
        let _ = outbound.send(reply);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandError;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    struct PingHandler;

    #[async_trait]
    impl CommandHandler for PingHandler {
        async fn handle(&self, command: &str, _payload: Value) -> CommandResult {
            match command {
                "ping" => Ok(json!({"pong": true})),
                other => Err(CommandError::unknown_command(other)),
            }
        }
    }

    struct TaggedHandler(&'static str);

    #[async_trait]
    impl CommandHandler for TaggedHandler {
        async fn handle(&self, _command: &str, _payload: Value) -> CommandResult {
            Ok(json!({"handler": self.0}))
        }
    }

    fn wire() -> (
        Channel,
        tokio::io::WriteHalf<tokio::io::DuplexStream>,
        tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
    ) {
        let (monitor_side, host_side) = tokio::io::duplex(4096);
        let (monitor_read, monitor_write) = tokio::io::split(monitor_side);
        let (host_read, host_write) = tokio::io::split(host_side);

        let channel = Channel::spawn(monitor_read, monitor_write);
        (channel, host_write, BufReader::new(host_read).lines())
    }

    async fn next_line(
        lines: &mut tokio::io::Lines<BufReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>>,
    ) -> Message {
        let line = tokio::time::timeout(Duration::from_secs(1), lines.next_line())
            .await
            .expect("timed out waiting for line")
            .unwrap()
            .expect("stream closed");
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let (channel, mut host_write, mut host_lines) = wire();
        channel.bind(Arc::new(PingHandler));

        host_write
            .write_all(b"{\"type\":\"request\",\"id\":\"test1\",\"command\":\"ping\",\"payload\":{\"foo\":\"bar\"}}\n")
            .await
            .unwrap();

        let reply = next_line(&mut host_lines).await;
        match reply {
            Message::Response { id, payload } => {
                assert_eq!(id, "test1");
                assert_eq!(payload["pong"], true);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_lines_are_dropped_without_killing_the_stream() {
        let (channel, mut host_write, mut host_lines) = wire();
        channel.bind(Arc::new(PingHandler));

        host_write.write_all(b"this is not json\n").await.unwrap();
        host_write.write_all(b"{\"half\": \n").await.unwrap();
        // Valid JSON but not a request shape.
        host_write
            .write_all(b"{\"type\":\"event\",\"event\":\"x\",\"payload\":{},\"ts\":0}\n")
            .await
            .unwrap();
        host_write
            .write_all(b"{\"type\":\"request\",\"id\":\"r2\",\"command\":\"ping\"}\n")
            .await
            .unwrap();

        let reply = next_line(&mut host_lines).await;
        assert!(matches!(reply, Message::Response { id, .. } if id == "r2"));
    }

    #[tokio::test]
    async fn test_unknown_command_gets_error_on_same_id() {
        let (channel, mut host_write, mut host_lines) = wire();
        channel.bind(Arc::new(PingHandler));

        host_write
            .write_all(b"{\"type\":\"request\",\"id\":\"r3\",\"command\":\"frobnicate\"}\n")
            .await
            .unwrap();

        let reply = next_line(&mut host_lines).await;
        match reply {
            Message::Error { id, code, .. } => {
                assert_eq!(id, "r3");
                assert_eq!(code, ErrorCode::UnknownCommand);
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let (channel, mut host_write, mut host_lines) = wire();
        channel.bind(Arc::new(TaggedHandler("first")));
        channel.bind(Arc::new(TaggedHandler("second")));

        host_write
            .write_all(b"{\"type\":\"request\",\"id\":\"r4\",\"command\":\"any\"}\n")
            .await
            .unwrap();

        let reply = next_line(&mut host_lines).await;
        match reply {
            Message::Response { payload, .. } => assert_eq!(payload["handler"], "second"),
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_events_preserve_send_order() {
        let (channel, _host_write, mut host_lines) = wire();

        for i in 0..20 {
            channel.send_event("tick", json!({"n": i}));
        }

        for i in 0..20 {
            let msg = next_line(&mut host_lines).await;
            match msg {
                Message::Event { event, payload, .. } => {
                    assert_eq!(event, "tick");
                    assert_eq!(payload["n"], i);
                }
                other => panic!("expected event, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_closed_resolves_on_eof() {
        let (channel, mut host_write, _host_lines) = wire();

        host_write.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), channel.closed())
            .await
            .expect("closed() did not resolve after EOF");
    }
}
