//! Wire protocol: SSE framing, event decoding, answer buffering, lifecycle,
//! and the transport that opens connections.

pub mod buffer;
pub mod codec;
pub mod lifecycle;
pub mod sse;
pub mod transport;

pub use buffer::PartialAnswerBuffer;
pub use codec::{decode, StreamEvent};
pub use lifecycle::{LifecycleInput, SearchLifecycle, SearchPhase};
pub use sse::{RawFrame, SseFrameReader};
pub use transport::{FrameStream, HttpStreamTransport, StreamTransport};
