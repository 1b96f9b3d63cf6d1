//! HTTP command bridge.
//!
//! # Data Flow
//! ```text
//! HTTP request (web control surface)
//!     → server.rs (Axum router, request id, tracing, timeout)
//!     → handlers.rs (validate query, look up device entry)
//!     → Entry::send (framed command to the device) / registry state
//!     → text or JSON response
//! ```
//!
//! # Design Decisions
//! - Handlers never hold the registry lock while writing to a socket
//! - A failed send is reported to the caller; the entry stays until its
//!   own session notices the broken connection
//! - Queries answer from the cache and otherwise poll: the device's report
//!   arrives asynchronously (see `handlers::query_parameter`)

pub mod handlers;
pub mod server;

pub use server::{AppState, BridgeServer};
