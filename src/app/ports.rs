//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService / ActuatorController (domain)
//! ```
//!
//! Driven adapters (pulse outputs, event sinks, storage) implement these
//! traits.  The domain consumes them via generics, so the controller never
//! touches LEDC registers directly and runs unchanged against test mocks.

use crate::config::SystemConfig;

// ───────────────────────────────────────────────────────────────
// Pulse output port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// LEDC channel index.
pub type ChannelId = u8;

/// Two-phase duty-cycle output: stage with [`set_duty`](PwmPort::set_duty),
/// apply with [`commit`](PwmPort::commit).
///
/// Staging every channel first and committing afterwards keeps the skew
/// between channels of one bridge down to a single register update.
pub trait PwmPort {
    /// Bind `channel` to `gpio` on the shared timer.  The first call sets up
    /// the timer; later calls must request the same frequency/resolution.
    /// The channel starts at duty 0, committed.
    fn configure(
        &mut self,
        channel: ChannelId,
        gpio: i32,
        frequency_hz: u32,
        resolution_bits: u8,
    ) -> Result<(), crate::error::PwmError>;

    /// Stage a duty value (0..=`max_duty`).  Not visible on the pin until
    /// [`commit`](PwmPort::commit).
    fn set_duty(&mut self, channel: ChannelId, duty: u32) -> Result<(), crate::error::PwmError>;

    /// Apply the staged duty value to the output.
    fn commit(&mut self, channel: ChannelId) -> Result<(), crate::error::PwmError>;

    /// Full-scale duty for the configured resolution (`2^bits − 1`).
    fn max_duty(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting and
/// reject invalid ranges with [`ConfigError::ValidationFailed`] rather than
/// silently clamping them.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from persistent store initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Flash init failed with a non-recoverable code.
    InitFailed(i32),
    /// Erasing the partition failed.
    EraseFailed(i32),
    /// Init still failed after one erase-and-retry.
    RetryFailed(i32),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InitFailed(rc) => write!(f, "NVS init failed (rc={})", rc),
            Self::EraseFailed(rc) => write!(f, "NVS erase failed (rc={})", rc),
            Self::RetryFailed(rc) => write!(f, "NVS init failed after erase (rc={})", rc),
        }
    }
}
