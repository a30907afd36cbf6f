//! Streaming transport
//!
//! Opens one push connection per query and yields its frames. The HTTP
//! implementation reads the body on its own task and stops it when the
//! connection's cancellation token fires.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sse::{RawFrame, SseFrameReader};
use crate::api::SearchApiClient;
use crate::error::StreamError;
use crate::types::SessionId;

/// Frames of one connection; the stream ends when the peer closes
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<RawFrame, StreamError>> + Send>>;

/// Frames buffered between the body reader and the controller
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Opens streaming connections
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open the stream for `query`
    ///
    /// Resolves once the server has accepted the request. `cancel` is bound to
    /// this connection only; once it fires the transport stops reading.
    async fn open(
        &self,
        session_id: &SessionId,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<FrameStream, StreamError>;
}

/// SSE over HTTP
pub struct HttpStreamTransport {
    client: SearchApiClient,
}

impl HttpStreamTransport {
    pub fn new(client: SearchApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn open(
        &self,
        session_id: &SessionId,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<FrameStream, StreamError> {
        let response = self.client.open_stream(session_id, query).await?;
        info!(
            session_id = %session_id,
            status = %response.status(),
            "Stream connection opened"
        );

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let mut body = Box::pin(response.bytes_stream());
        tokio::spawn(async move {
            let mut reader = SseFrameReader::new();
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Stream reader stopped by cancellation");
                        return;
                    }
                    chunk = body.next() => chunk,
                };

                match chunk {
                    Some(Ok(bytes)) => {
                        for frame in reader.process_chunk(&bytes) {
                            if tx.send(Ok(frame)).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Stream body error: {}", e);
                        let _ = tx.send(Err(StreamError::Transport(e.to_string()))).await;
                        return;
                    }
                    None => {
                        if let Some(frame) = reader.finish() {
                            let _ = tx.send(Ok(frame)).await;
                        }
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
