//! Plugin parameter metadata.
//!
//! # Data Flow
//! ```text
//! plugin URI
//!     → ParameterSource::describe (external introspection, catalog file, ...)
//!     → AllInfo (control ports, MIDI CC parameters, patch parameters)
//!     → cached in the registry entry, rendered by controls.rs
//! ```
//!
//! # Design Decisions
//! - The core only consumes AllInfo; producing it is a collaborator's job
//! - describe() is synchronous so native-backed sources can block freely;
//!   async callers go through `describe_blocking`

pub mod source;
pub mod types;

pub use source::{describe_blocking, CatalogSource, EmptySource, ParameterSource, SourceError};
pub use types::{AllInfo, Info, Point};
