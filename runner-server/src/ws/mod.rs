//! WebSocket module
//!
//! `/Services.Stream` upgrades to a websocket and hands it to the
//! [`runner_core::StreamRelay`].

mod frames;
mod stream;

pub use frames::{close_code_for, close_frame_for, to_message};
pub use stream::stream_handler;
