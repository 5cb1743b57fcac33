//! # Error Types
//!
//! Errors produced by the discovery and command core. Failures of the external
//! collaborators (network, broker, drivers) are reported through their own
//! associated error types and are only ever logged here, never propagated.

use core::fmt;

/// The primary error enum for the chime core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A topic did not fit into the fixed topic buffer.
    TopicTooLong,
    /// A payload did not fit into the fixed payload buffer.
    PayloadTooLarge,
    /// A payload could not be serialized to JSON.
    Serialize,
    /// An entity collection has no room for another entry.
    RegistryFull,
    /// An entity with the same identifier already exists in its collection.
    DuplicateEntity,
    /// Too many consecutive connectivity failures; the device was restarted.
    HardReset,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TopicTooLong => f.write_str("topic exceeds buffer capacity"),
            Error::PayloadTooLarge => f.write_str("payload exceeds buffer capacity"),
            Error::Serialize => f.write_str("failed to serialize payload"),
            Error::RegistryFull => f.write_str("entity collection is full"),
            Error::DuplicateEntity => f.write_str("entity identifier already registered"),
            Error::HardReset => f.write_str("connectivity retries exhausted, device restarted"),
        }
    }
}

/// Reasons an inbound command value is rejected by the command processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// The value is not the JSON document the control expects.
    Malformed,
    /// The payload bytes are not valid UTF-8.
    InvalidUtf8,
    /// A siren `ON` command did not name a tone.
    MissingTone,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Malformed => f.write_str("malformed command payload"),
            CommandError::InvalidUtf8 => f.write_str("command payload is not UTF-8"),
            CommandError::MissingTone => f.write_str("siren command without tone"),
        }
    }
}

/// Failures reported by actuator drivers (audio player, display).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// The requested tone file does not exist.
    ToneNotFound,
    /// The device is busy and rejected the request.
    Busy,
    /// Any other hardware or bus failure.
    Io,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::ToneNotFound => f.write_str("tone not found"),
            DriverError::Busy => f.write_str("device busy"),
            DriverError::Io => f.write_str("driver i/o failure"),
        }
    }
}
