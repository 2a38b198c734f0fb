//! Agent-run event streams.
//!
//! Frames arrive over server-sent events, are classified, and are handed to
//! caller callbacks by the session's [`StreamManager`].

mod frame;
mod manager;
mod registry;
mod sse;
mod transport;

pub use frame::{Frame, classify};
pub use manager::{StreamCallbacks, StreamHandle, StreamManager};
pub use registry::{ActiveStream, RunRegistry};
pub use sse::{SseDecoder, decode_events};
pub use transport::{FrameStream, HttpTransport, RunTransport};
