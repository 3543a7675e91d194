//! Mock pulse output and event sink for integration tests.
//!
//! Records every PWM call so tests can assert on the full command history
//! and replay the committed register state step by step.

use std::sync::{Arc, Mutex};

use actuator_web::app::events::AppEvent;
use actuator_web::app::ports::{ChannelId, EventSink, PwmPort};
use actuator_web::error::PwmError;

// ── PWM call record ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmCall {
    Configure { channel: ChannelId, gpio: i32 },
    SetDuty { channel: ChannelId, duty: u32 },
    Commit { channel: ChannelId },
}

// ── MockPwm ───────────────────────────────────────────────────

pub struct MockPwm {
    pub calls: Vec<PwmCall>,
    staged: [u32; 8],
    committed: [u32; 8],
    max_duty: u32,
    /// Set to `Some(ch)` to make writes to `ch` fail.
    pub fail_channel: Option<ChannelId>,
    /// Number of duty writes that succeed before `fail_channel` kicks in.
    pub fail_after_writes: usize,
    /// Set once any forward/reverse pair is committed nonzero on both sides.
    pub pair_overlap_seen: bool,
}

#[allow(dead_code)]
impl MockPwm {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            staged: [0; 8],
            committed: [0; 8],
            max_duty: 0,
            fail_channel: None,
            fail_after_writes: 0,
            pair_overlap_seen: false,
        }
    }

    pub fn committed(&self, channel: ChannelId) -> u32 {
        self.committed[channel as usize]
    }

    /// Duty writes and commits only (configuration filtered out).
    pub fn writes(&self) -> Vec<PwmCall> {
        self.calls
            .iter()
            .copied()
            .filter(|c| !matches!(c, PwmCall::Configure { .. }))
            .collect()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Fail writes to `channel` once `after` duty writes have gone through.
    pub fn failing(channel: ChannelId, after: usize) -> Self {
        Self {
            fail_channel: Some(channel),
            fail_after_writes: after,
            ..Self::new()
        }
    }

    fn duty_writes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, PwmCall::SetDuty { .. }))
            .count()
    }
}

impl Default for MockPwm {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmPort for MockPwm {
    fn configure(
        &mut self,
        channel: ChannelId,
        gpio: i32,
        _frequency_hz: u32,
        resolution_bits: u8,
    ) -> Result<(), PwmError> {
        if channel as usize >= 8 {
            return Err(PwmError::InvalidChannel(channel));
        }
        self.max_duty = (1 << resolution_bits) - 1;
        self.calls.push(PwmCall::Configure { channel, gpio });
        Ok(())
    }

    fn set_duty(&mut self, channel: ChannelId, duty: u32) -> Result<(), PwmError> {
        if self.fail_channel == Some(channel) && self.duty_writes() >= self.fail_after_writes {
            return Err(PwmError::Driver(-1));
        }
        self.calls.push(PwmCall::SetDuty { channel, duty });
        self.staged[channel as usize] = duty;
        Ok(())
    }

    fn commit(&mut self, channel: ChannelId) -> Result<(), PwmError> {
        self.calls.push(PwmCall::Commit { channel });
        self.committed[channel as usize] = self.staged[channel as usize];
        for pair in self.committed.chunks(2) {
            if pair[0] != 0 && pair[1] != 0 {
                self.pair_overlap_seen = true;
            }
        }
        Ok(())
    }

    fn max_duty(&self) -> u32 {
        self.max_duty
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Event sink whose log can be inspected from another thread.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<AppEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
