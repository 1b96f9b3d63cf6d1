//! Device message protocol.
//!
//! # Data Flow
//! ```text
//! frame payload (UTF-8 text)
//!     → codec.rs (key|value pairs separated by ||)
//!     → message.rs (Registration / Report / Command)
//! ```
//!
//! # Design Decisions
//! - Wire format stays compatible with devices that never use `|` or `\`
//! - `\` escapes reserved characters instead of silently corrupting the mapping
//! - Reported values are keyed by a structured (type, key) pair

pub mod codec;
pub mod message;

pub use codec::{decode, decode_bytes, encode, CodecError, KvMap};
pub use message::{Command, CommandKind, CompositeKey, Registration, Report};
