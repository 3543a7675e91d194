//! LEDC pulse output driver.
//!
//! Implements [`PwmPort`] on the ESP32 low-speed LEDC block: one shared
//! timer (frequency + resolution) feeding up to eight channels, each bound
//! to one GPIO.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: raw `ledc_*` sys calls, every return code checked.
//! On host/test: staged and committed duty registers are tracked in memory
//! so tests can read back exactly what would be on the pins.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

use crate::app::ports::{ChannelId, PwmPort};
use crate::error::PwmError;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimerConfig {
    frequency_hz: u32,
    resolution_bits: u8,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelSlot {
    gpio: Option<i32>,
    staged: u32,
    committed: u32,
}

/// LEDC driver owning the shared timer and all channel slots.
pub struct LedcPwm {
    timer: Option<TimerConfig>,
    channels: [ChannelSlot; pins::LEDC_CHANNEL_COUNT],
}

impl Default for LedcPwm {
    fn default() -> Self {
        Self::new()
    }
}

impl LedcPwm {
    pub fn new() -> Self {
        Self {
            timer: None,
            channels: [ChannelSlot::default(); pins::LEDC_CHANNEL_COUNT],
        }
    }

    /// Duty value currently driving the pin, `None` if unconfigured.
    pub fn committed_duty(&self, channel: ChannelId) -> Option<u32> {
        self.slot(channel)
            .ok()
            .filter(|s| s.gpio.is_some())
            .map(|s| s.committed)
    }

    /// Duty value staged but possibly not yet committed.
    pub fn staged_duty(&self, channel: ChannelId) -> Option<u32> {
        self.slot(channel)
            .ok()
            .filter(|s| s.gpio.is_some())
            .map(|s| s.staged)
    }

    /// GPIO bound to `channel`.
    pub fn gpio(&self, channel: ChannelId) -> Option<i32> {
        self.slot(channel).ok().and_then(|s| s.gpio)
    }

    fn slot(&self, channel: ChannelId) -> Result<&ChannelSlot, PwmError> {
        self.channels
            .get(channel as usize)
            .ok_or(PwmError::InvalidChannel(channel))
    }

    fn configured_slot_mut(&mut self, channel: ChannelId) -> Result<&mut ChannelSlot, PwmError> {
        let slot = self
            .channels
            .get_mut(channel as usize)
            .ok_or(PwmError::InvalidChannel(channel))?;
        if slot.gpio.is_none() {
            return Err(PwmError::NotConfigured(channel));
        }
        Ok(slot)
    }

    fn ensure_timer(&mut self, wanted: TimerConfig) -> Result<(), PwmError> {
        match self.timer {
            Some(current) if current == wanted => Ok(()),
            Some(_) => Err(PwmError::ResourceConflict),
            None => {
                validate_timing(wanted)?;
                platform_timer_config(wanted)?;
                self.timer = Some(wanted);
                info!(
                    "LEDC: timer 0 at {} Hz, {}-bit",
                    wanted.frequency_hz, wanted.resolution_bits
                );
                Ok(())
            }
        }
    }
}

fn validate_timing(t: TimerConfig) -> Result<(), PwmError> {
    let invalid = PwmError::InvalidTiming {
        frequency_hz: t.frequency_hz,
        resolution_bits: t.resolution_bits,
    };
    if t.frequency_hz == 0 || !(1..=20).contains(&t.resolution_bits) {
        return Err(invalid);
    }
    if (u64::from(t.frequency_hz) << t.resolution_bits) > pins::LEDC_SOURCE_CLOCK_HZ {
        return Err(invalid);
    }
    Ok(())
}

impl PwmPort for LedcPwm {
    fn configure(
        &mut self,
        channel: ChannelId,
        gpio: i32,
        frequency_hz: u32,
        resolution_bits: u8,
    ) -> Result<(), PwmError> {
        if channel as usize >= pins::LEDC_CHANNEL_COUNT {
            return Err(PwmError::InvalidChannel(channel));
        }
        if !(0..=pins::MAX_OUTPUT_GPIO).contains(&gpio) {
            return Err(PwmError::InvalidPin(gpio));
        }
        let pin_taken = self
            .channels
            .iter()
            .enumerate()
            .any(|(i, s)| i != channel as usize && s.gpio == Some(gpio));
        if pin_taken {
            return Err(PwmError::ResourceConflict);
        }
        if let Some(bound) = self.channels[channel as usize].gpio {
            if bound != gpio {
                return Err(PwmError::ResourceConflict);
            }
        }

        self.ensure_timer(TimerConfig {
            frequency_hz,
            resolution_bits,
        })?;
        platform_channel_config(channel, gpio)?;

        self.channels[channel as usize] = ChannelSlot {
            gpio: Some(gpio),
            staged: 0,
            committed: 0,
        };
        info!("LEDC: CH{} -> GPIO{}", channel, gpio);
        Ok(())
    }

    fn set_duty(&mut self, channel: ChannelId, duty: u32) -> Result<(), PwmError> {
        let max = self.max_duty();
        let slot = self.configured_slot_mut(channel)?;
        if duty > max {
            return Err(PwmError::DutyOutOfRange { duty, max });
        }
        platform_set_duty(channel, duty)?;
        slot.staged = duty;
        Ok(())
    }

    fn commit(&mut self, channel: ChannelId) -> Result<(), PwmError> {
        let slot = self.configured_slot_mut(channel)?;
        platform_update_duty(channel)?;
        slot.committed = slot.staged;
        Ok(())
    }

    fn max_duty(&self) -> u32 {
        self.timer
            .map_or(0, |t| (1u32 << t.resolution_bits) - 1)
    }
}

// ── Platform-specific ─────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn check(ret: esp_err_t) -> Result<(), PwmError> {
    if ret == ESP_OK as esp_err_t {
        Ok(())
    } else {
        Err(PwmError::Driver(ret))
    }
}

#[cfg(target_os = "espidf")]
fn platform_timer_config(t: TimerConfig) -> Result<(), PwmError> {
    let cfg = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: u32::from(t.resolution_bits),
        freq_hz: t.frequency_hz,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    // SAFETY: called from the single startup task before any channel exists.
    check(unsafe { ledc_timer_config(&cfg) })
}

#[cfg(not(target_os = "espidf"))]
fn platform_timer_config(_t: TimerConfig) -> Result<(), PwmError> {
    Ok(())
}

#[cfg(target_os = "espidf")]
fn platform_channel_config(channel: ChannelId, gpio: i32) -> Result<(), PwmError> {
    let cfg = ledc_channel_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        channel: ledc_channel_t_LEDC_CHANNEL_0 + u32::from(channel),
        timer_sel: ledc_timer_t_LEDC_TIMER_0,
        intr_type: ledc_intr_type_t_LEDC_INTR_DISABLE,
        gpio_num: gpio,
        duty: 0,
        hpoint: 0,
        ..Default::default()
    };
    // SAFETY: the timer was configured first; channel index validated above.
    check(unsafe { ledc_channel_config(&cfg) })
}

#[cfg(not(target_os = "espidf"))]
fn platform_channel_config(_channel: ChannelId, _gpio: i32) -> Result<(), PwmError> {
    Ok(())
}

#[cfg(target_os = "espidf")]
fn platform_set_duty(channel: ChannelId, duty: u32) -> Result<(), PwmError> {
    // SAFETY: channel configured; writes are serialized by the controller mutex.
    check(unsafe {
        ledc_set_duty(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0 + u32::from(channel),
            duty,
        )
    })
}

#[cfg(not(target_os = "espidf"))]
fn platform_set_duty(_channel: ChannelId, _duty: u32) -> Result<(), PwmError> {
    Ok(())
}

#[cfg(target_os = "espidf")]
fn platform_update_duty(channel: ChannelId) -> Result<(), PwmError> {
    // SAFETY: see platform_set_duty.
    check(unsafe {
        ledc_update_duty(
            ledc_mode_t_LEDC_LOW_SPEED_MODE,
            ledc_channel_t_LEDC_CHANNEL_0 + u32::from(channel),
        )
    })
}

#[cfg(not(target_os = "espidf"))]
fn platform_update_duty(_channel: ChannelId) -> Result<(), PwmError> {
    Ok(())
}
