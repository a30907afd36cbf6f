//! Cancellation support for streaming connections
//!
//! Each connection gets its own token; superseding or tearing down a search
//! cancels exactly that connection. The connection task works on a child
//! token, so the task finishing on its own never reads as a cancel.

use tokio_util::sync::CancellationToken;

/// Cancellation handle bound 1:1 to a connection
#[derive(Clone, Debug)]
pub struct ConnectionCancellation {
    connection_id: u64,
    token: CancellationToken,
}

impl ConnectionCancellation {
    pub fn new(connection_id: u64) -> Self {
        Self {
            connection_id,
            token: CancellationToken::new(),
        }
    }

    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Cancel the connection; safe to call more than once
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token for the connection task and its transport
    ///
    /// Fires when this handle is cancelled. Cancelling it (or dropping a guard
    /// on it when the task exits) does not cancel this handle.
    pub fn task_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
