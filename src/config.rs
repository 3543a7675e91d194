//! System configuration parameters
//!
//! All tunable parameters for the actuator firmware.  Defaults come from
//! build-time environment (`WIFI_SSID`, `WIFI_PASS`, `WIFI_MODE`) and can be
//! overridden by a config blob stored in NVS.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// How the radio is brought up at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiMode {
    /// Broadcast our own network; clients join the board directly.
    AccessPoint,
    /// Join an existing network with bounded retries.
    Station,
}

impl WifiMode {
    /// Parse the `WIFI_MODE` build variable (`ap` / `sta`).
    pub fn from_env_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ap" | "softap" | "access_point" => Some(Self::AccessPoint),
            "sta" | "station" => Some(Self::Station),
            _ => None,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Wi-Fi ---
    pub wifi_mode: WifiMode,
    /// Network name (AP broadcast name or STA target).
    pub ssid: heapless::String<32>,
    /// Empty = open network.
    pub passphrase: heapless::String<64>,
    /// AP radio channel (1-13).
    pub ap_channel: u8,
    /// Concurrent AP client associations.
    pub ap_max_clients: u8,
    /// Consecutive station reconnect attempts before reporting failure.
    pub max_retries: u8,

    // --- PWM ---
    pub pwm_frequency_hz: u32,
    pub pwm_resolution_bits: u8,
    /// Number of wired actuators (1-4).
    pub actuator_count: u8,

    // --- Motion profile (`/activate`) ---
    /// Actuator driven by the timed profile.
    pub profile_actuator: u8,
    /// Forward hold (milliseconds)
    pub profile_extend_ms: u32,
    /// Reverse hold (milliseconds)
    pub profile_retract_ms: u32,

    // --- HTTP ---
    pub http_max_handlers: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let ssid = option_env!("WIFI_SSID").unwrap_or("actuators");
        let passphrase = option_env!("WIFI_PASS").unwrap_or("");
        let wifi_mode = option_env!("WIFI_MODE")
            .and_then(WifiMode::from_env_str)
            .unwrap_or(WifiMode::AccessPoint);

        Self {
            wifi_mode,
            ssid: truncated(ssid),
            passphrase: truncated(passphrase),
            ap_channel: 1,
            ap_max_clients: 4,
            max_retries: 5,

            pwm_frequency_hz: pins::PWM_FREQ_HZ,
            pwm_resolution_bits: pins::PWM_RESOLUTION_BITS,
            actuator_count: pins::MAX_ACTUATORS as u8,

            profile_actuator: 1,
            profile_extend_ms: 3_000,
            profile_retract_ms: 3_000,

            http_max_handlers: 8,
        }
    }
}

fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl SystemConfig {
    /// Range-check every field.  Called before persisting and after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() || !self.ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
            return Err(ConfigError::ValidationFailed(
                "ssid must be 1-32 printable ASCII bytes",
            ));
        }
        if !self.passphrase.is_empty() && self.passphrase.len() < 8 {
            return Err(ConfigError::ValidationFailed(
                "passphrase must be empty or 8-64 bytes",
            ));
        }
        if !(1..=13).contains(&self.ap_channel) {
            return Err(ConfigError::ValidationFailed("ap_channel must be 1-13"));
        }
        if !(1..=10).contains(&self.ap_max_clients) {
            return Err(ConfigError::ValidationFailed("ap_max_clients must be 1-10"));
        }
        if !(1..=20).contains(&self.pwm_resolution_bits) {
            return Err(ConfigError::ValidationFailed(
                "pwm_resolution_bits must be 1-20",
            ));
        }
        if self.pwm_frequency_hz == 0
            || (u64::from(self.pwm_frequency_hz) << self.pwm_resolution_bits)
                > pins::LEDC_SOURCE_CLOCK_HZ
        {
            return Err(ConfigError::ValidationFailed(
                "pwm_frequency_hz too high for resolution",
            ));
        }
        if !(1..=pins::MAX_ACTUATORS as u8).contains(&self.actuator_count) {
            return Err(ConfigError::ValidationFailed("actuator_count must be 1-4"));
        }
        if !(1..=self.actuator_count).contains(&self.profile_actuator) {
            return Err(ConfigError::ValidationFailed(
                "profile_actuator must be a wired actuator",
            ));
        }
        if self.profile_extend_ms > 60_000 || self.profile_retract_ms > 60_000 {
            return Err(ConfigError::ValidationFailed(
                "profile holds must be at most 60 s",
            ));
        }
        if self.http_max_handlers < 4 {
            return Err(ConfigError::ValidationFailed("http_max_handlers must be >= 4"));
        }
        Ok(())
    }

    /// Duty value for "fully on" at the configured resolution.
    pub fn max_duty(&self) -> u32 {
        (1u32 << self.pwm_resolution_bits) - 1
    }
}
