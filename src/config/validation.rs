//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listener addresses
//! - Validate value ranges (limits > 0, frame cap within the wire maximum)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::BridgeConfig;
use crate::net::frame::MAX_FRAME_LEN;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("protocol.max_frame_len {0} exceeds the wire maximum of {max}", max = MAX_FRAME_LEN)]
    FrameTooLarge(usize),
}

/// Check every semantic constraint and collect all failures.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "http.bind_address", &config.http.bind_address);
    check_address(&mut errors, "devices.bind_address", &config.devices.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.devices.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "devices.max_connections" });
    }
    if config.devices.registration_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "devices.registration_timeout_secs" });
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "http.request_timeout_secs" });
    }
    if config.protocol.history_capacity == 0 {
        errors.push(ValidationError::Zero { field: "protocol.history_capacity" });
    }
    if config.protocol.max_frame_len == 0 {
        errors.push(ValidationError::Zero { field: "protocol.max_frame_len" });
    } else if config.protocol.max_frame_len > MAX_FRAME_LEN {
        errors.push(ValidationError::FrameTooLarge(config.protocol.max_frame_len));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
