//! Madigan bridge library.
//!
//! Accepts framed TCP connections from device UIs, keeps a registry of who
//! is connected, and exposes an HTTP control surface for reading and
//! writing their parameters.

pub mod config;
pub mod controls;
pub mod device;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod paraminfo;
pub mod protocol;
pub mod registry;

pub use config::schema::BridgeConfig;
pub use error::BridgeError;
pub use http::BridgeServer;
pub use lifecycle::Shutdown;
pub use registry::Registry;
