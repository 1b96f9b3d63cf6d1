//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming device TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (connection id, lifecycle tracking)
//!     → frame.rs (length-prefixed messages in both directions)
//!     → Hand off to the device session
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Framing knows nothing about message content

pub mod connection;
pub mod frame;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use frame::{read_frame, write_frame, FrameError, MAX_FRAME_LEN};
pub use listener::{ConnectionPermit, Listener, ListenerError};
