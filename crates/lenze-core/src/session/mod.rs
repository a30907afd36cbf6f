//! Streaming session control
//!
//! One controller per session view. It owns the live connection, applies the
//! codec and lifecycle to every frame in arrival order, and publishes
//! immutable snapshots. At most one connection is live at a time.

mod cancellation;
mod connection;
mod controller;
mod state;

pub use cancellation::ConnectionCancellation;
pub use controller::{SessionStreamController, SnapshotCallback, Subscription};
pub use state::SearchSnapshot;
