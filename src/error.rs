//! Unified error types for the actuator firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! startup error handling in `main` uniform.  Subsystem errors are `Copy`
//! so they can be returned from request handlers without allocation.

use core::fmt;

use crate::adapters::wifi::ConnectivityError;
use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible startup operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Pulse output configuration or write failed.
    Pwm(PwmError),
    /// An actuator command was rejected.
    Actuator(ActuatorError),
    /// Wi-Fi bring-up failed.
    Comms(ConnectivityError),
    /// Persistent store could not be initialised.
    Storage(StorageError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pwm(e) => write!(f, "pwm: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Pulse output errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmError {
    /// Channel index outside the LEDC channel range.
    InvalidChannel(u8),
    /// GPIO cannot be used as an output.
    InvalidPin(i32),
    /// Frequency/resolution combination the timer cannot produce.
    InvalidTiming { frequency_hz: u32, resolution_bits: u8 },
    /// The shared timer is already running with different parameters,
    /// or the channel was already bound to another pin.
    ResourceConflict,
    /// Write to a channel that was never configured.
    NotConfigured(u8),
    /// Duty value above `max_duty`.
    DutyOutOfRange { duty: u32, max: u32 },
    /// The platform driver returned an error code.
    Driver(i32),
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel(ch) => write!(f, "invalid channel {ch}"),
            Self::InvalidPin(pin) => write!(f, "GPIO{pin} is not output-capable"),
            Self::InvalidTiming {
                frequency_hz,
                resolution_bits,
            } => write!(f, "{frequency_hz} Hz at {resolution_bits} bits is not achievable"),
            Self::ResourceConflict => write!(f, "timer/channel already in use"),
            Self::NotConfigured(ch) => write!(f, "channel {ch} not configured"),
            Self::DutyOutOfRange { duty, max } => write!(f, "duty {duty} exceeds {max}"),
            Self::Driver(rc) => write!(f, "LEDC driver error (rc={rc})"),
        }
    }
}

impl From<PwmError> for Error {
    fn from(e: PwmError) -> Self {
        Self::Pwm(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Requested actuator id is outside `1..=actuator_count`.
    InvalidActuatorId(u8),
    /// Duty-cycle write failed.
    Pwm(PwmError),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidActuatorId(id) => write!(f, "invalid actuator id {id}"),
            Self::Pwm(e) => write!(f, "PWM write failed: {e}"),
        }
    }
}

impl From<PwmError> for ActuatorError {
    fn from(e: PwmError) -> Self {
        Self::Pwm(e)
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Comms(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
