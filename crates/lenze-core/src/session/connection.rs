//! Connection task
//!
//! Drives one streaming connection: open, read frames, decode, and forward
//! typed events to the controller tagged with the connection id. Stops at the
//! first terminal outcome or as soon as its cancellation fires.

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::cancellation::ConnectionCancellation;
use crate::error::StreamError;
use crate::history::HistoryLoad;
use crate::stream::codec::{self, StreamEvent};
use crate::stream::transport::StreamTransport;
use crate::types::SessionId;

/// What a connection (or its history refresh) reports back
#[derive(Debug)]
pub(crate) enum ConnectionEvent {
    Opened,
    Event(StreamEvent),
    /// Peer ended the stream
    Closed,
    Failed(StreamError),
    History(HistoryLoad),
}

/// A [`ConnectionEvent`] plus the connection it belongs to
#[derive(Debug)]
pub(crate) struct Tagged {
    pub connection_id: u64,
    pub event: ConnectionEvent,
}

pub(crate) async fn run_connection(
    transport: Arc<dyn StreamTransport>,
    session_id: SessionId,
    query: String,
    cancellation: ConnectionCancellation,
    tx: mpsc::UnboundedSender<Tagged>,
) {
    let connection_id = cancellation.connection_id();
    // Stops the transport however this task exits
    let token = cancellation.task_token();
    let _guard = token.clone().drop_guard();
    let send = |event: ConnectionEvent| {
        tx.send(Tagged {
            connection_id,
            event,
        })
        .is_ok()
    };

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(connection_id, "Connection cancelled while opening");
            return;
        }
        opened = transport.open(&session_id, &query, token.clone()) => opened,
    };

    let mut frames = match opened {
        Ok(frames) => frames,
        Err(e) => {
            send(ConnectionEvent::Failed(e));
            return;
        }
    };
    if !send(ConnectionEvent::Opened) {
        return;
    }

    let mut applied = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(connection_id, applied, "Connection cancelled");
                return;
            }
            next = frames.next() => next,
        };

        match next {
            Some(Ok(frame)) => match codec::decode(&frame) {
                Ok(Some(event)) => {
                    let is_final = matches!(event, StreamEvent::Final { .. });
                    debug!(connection_id, kind = event.kind(), "Stream event");
                    if !send(ConnectionEvent::Event(event)) {
                        return;
                    }
                    applied += 1;
                    if is_final {
                        info!(connection_id, applied, "Stream finalized");
                        return;
                    }
                }
                Ok(None) => match frame.event.as_deref() {
                    Some(name) if name != "message" => {
                        warn!(connection_id, event = name, "Ignoring unknown stream event");
                    }
                    _ => debug!(connection_id, "Ignoring empty frame"),
                },
                Err(e) => {
                    warn!(connection_id, "Undecodable frame: {}", e);
                    send(ConnectionEvent::Failed(e));
                    return;
                }
            },
            Some(Err(e)) => {
                send(ConnectionEvent::Failed(e));
                return;
            }
            None => {
                info!(connection_id, applied, "Stream closed by peer");
                send(ConnectionEvent::Closed);
                return;
            }
        }
    }
}
