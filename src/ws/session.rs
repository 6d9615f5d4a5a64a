//! One live client connection.
//!
//! A session runs two workers over the split socket:
//!
//! - the **reader** decodes inbound frames and submits them to the hub,
//!   enforcing the read deadline and the frame size limit;
//! - the **writer** drains the session's outbound queue, coalescing every
//!   queued payload into a single flush, and sends keepalive pings.
//!
//! Whichever worker ends first tears the session down: the session is
//! unregistered, the other worker is stopped, and both socket halves are
//! dropped. Nothing is retried; reconnecting is up to the client.

use std::fmt::Display;

use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, timeout};

use super::messages::{ProtocolViolation, decode_inbound};
use crate::config::SessionSettings;
use crate::domain::{ChatMessage, Identity, SessionId};
use crate::error::ChatError;
use crate::hub::{HubHandle, SessionHandle};

/// Why the reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEnd {
    /// The client closed the connection.
    Closed,
    /// Nothing arrived within the read deadline.
    TimedOut,
    /// The transport reported an error.
    TransportError(String),
    /// The client broke the frame protocol.
    ProtocolViolation(ProtocolViolation),
    /// The hub stopped accepting events.
    HubGone,
}

/// Why the writer stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEnd {
    /// The hub closed the outbound queue; a close frame was sent.
    QueueClosed,
    /// A write did not complete within the write deadline.
    TimedOut,
    /// The transport reported an error.
    TransportError(String),
}

/// Registers a session for `identity` and runs it until either worker ends.
pub async fn run_session(
    socket: WebSocket,
    identity: Identity,
    hub: HubHandle,
    settings: SessionSettings,
) {
    let id = SessionId::new();
    let user_id = identity.user_id;
    let (outbound, queue) = mpsc::channel(settings.queue_capacity);

    if let Err(e) = hub.register(SessionHandle::new(id, identity.clone(), outbound)) {
        tracing::warn!(session_id = %id, error = %e, "session refused");
        return;
    }

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_pump(sink, queue, settings));
    let mut reader = tokio::spawn(read_pump(stream, identity, hub.clone(), settings));

    tokio::select! {
        end = &mut reader => {
            tracing::info!(
                session_id = %id,
                user_id = %user_id,
                reason = ?end,
                "session reader ended"
            );
            let _ = hub.unregister(id);
            // Unregistering closes the queue; give the writer one write
            // deadline to send its close frame.
            if timeout(settings.write_wait, &mut writer).await.is_err() {
                writer.abort();
            }
        }
        end = &mut writer => {
            tracing::info!(
                session_id = %id,
                user_id = %user_id,
                reason = ?end,
                "session writer ended"
            );
            reader.abort();
            let _ = hub.unregister(id);
        }
    }
}

/// Reads frames until the client leaves or misbehaves.
///
/// Every inbound frame, including pongs, resets the read deadline. Chat
/// submissions are handed to the hub one at a time, in arrival order; store
/// failures reported back by the hub are logged and the session continues.
pub async fn read_pump<S, E>(
    mut stream: S,
    identity: Identity,
    hub: HubHandle,
    settings: SessionSettings,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        let message = match timeout(settings.pong_wait, stream.next()).await {
            Err(_) => return ReadEnd::TimedOut,
            Ok(None) => return ReadEnd::Closed,
            Ok(Some(Err(e))) => return ReadEnd::TransportError(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                let frame = match decode_inbound(text.as_str(), settings.max_message_size) {
                    Ok(frame) => frame,
                    Err(violation) => return ReadEnd::ProtocolViolation(violation),
                };
                let conversation_id = frame.conversation_id;
                match hub.submit(ChatMessage::from_frame(identity.clone(), frame)).await {
                    Ok(()) => {}
                    Err(ChatError::HubUnavailable) => return ReadEnd::HubGone,
                    Err(e) => tracing::warn!(
                        user_id = %identity.user_id,
                        %conversation_id,
                        error = %e,
                        "message rejected"
                    ),
                }
            }
            Message::Binary(_) => return ReadEnd::ProtocolViolation(ProtocolViolation::Binary),
            Message::Close(_) => return ReadEnd::Closed,
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }
}

/// Drains `queue` into `sink` and keeps the connection alive with pings.
///
/// Returns [`WriteEnd::QueueClosed`] after sending a close frame once the
/// hub drops the queue's sender.
pub async fn write_pump<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<Utf8Bytes>,
    settings: SessionSettings,
) -> WriteEnd
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ping =
        tokio::time::interval_at(Instant::now() + settings.ping_period, settings.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let written = tokio::select! {
            payload = queue.recv() => {
                let Some(payload) = payload else {
                    let _ = timeout(settings.write_wait, sink.send(Message::Close(None))).await;
                    return WriteEnd::QueueClosed;
                };
                timeout(settings.write_wait, write_batch(&mut sink, &mut queue, payload)).await
            }
            _ = ping.tick() => {
                timeout(settings.write_wait, sink.send(Message::Ping(Bytes::new()))).await
            }
        };

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return WriteEnd::TransportError(e.to_string()),
            Err(_) => return WriteEnd::TimedOut,
        }
    }
}

/// Feeds `first` and everything already queued behind it, then flushes
/// once. Each payload stays its own text frame.
async fn write_batch<S>(
    sink: &mut S,
    queue: &mut mpsc::Receiver<Utf8Bytes>,
    first: Utf8Bytes,
) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    sink.feed(Message::Text(first)).await?;
    while let Ok(next) = queue.try_recv() {
        sink.feed(Message::Text(next)).await?;
    }
    sink.flush().await
}
