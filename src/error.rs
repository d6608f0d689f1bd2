//! Error taxonomy
//!
//! Lifecycle errors are returned from [`crate::Router::start`]. Mapping errors
//! are produced while loading a preset and only ever disable the offending
//! entry. Device errors come from the MIDI backend.

use std::fmt;

use thiserror::Error;

/// Direction of a MIDI port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// Errors reported by the MIDI backend
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("MIDI driver initialization failed: {0}")]
    Init(String),

    #[error("{direction} port {index} is no longer available")]
    PortUnavailable {
        direction: PortDirection,
        index: usize,
    },

    #[error("failed to open {direction} port '{port}': {reason}")]
    Open {
        direction: PortDirection,
        port: String,
        reason: String,
    },

    #[error("failed to send to '{port}': {reason}")]
    Send { port: String, reason: String },

    #[error("virtual ports are not supported on this platform")]
    VirtualUnsupported,
}

impl From<midir::InitError> for DeviceError {
    fn from(err: midir::InitError) -> Self {
        DeviceError::Init(err.to_string())
    }
}

/// Errors returned synchronously by the router lifecycle
#[derive(Debug, Error)]
pub enum RouterError {
    /// `start` was called while a session is active
    #[error("router is already running")]
    AlreadyRunning,

    /// The index does not address a currently enumerated port
    #[error("invalid {direction} device index {index} ({available} available)")]
    InvalidDeviceIndex {
        direction: PortDirection,
        index: usize,
        available: usize,
    },

    /// The driver failed to enumerate or open a port
    #[error(transparent)]
    DeviceOpen(#[from] DeviceError),
}

/// A single mapping entry that could not be turned into a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("malformed command at {location}: {reason}")]
    MalformedCommand { location: String, reason: String },

    #[error("invalid key {key} in {section} (must be 0-127)")]
    InvalidKey { section: &'static str, key: i64 },

    #[error("unknown noteoff action '{0}' (expected 'send')")]
    UnknownNoteOffAction(String),
}

impl MappingError {
    pub(crate) fn malformed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        MappingError::MalformedCommand {
            location: location.into(),
            reason: reason.into(),
        }
    }
}
