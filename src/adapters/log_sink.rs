//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART in production, stderr on host).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ActuatorMoved { id, motion } => {
                info!("MOVE | actuator={} motion={}", id, motion);
            }
            AppEvent::CommandRejected { id } => {
                warn!("MOVE | rejected actuator={}", id);
            }
            AppEvent::ProfileQueued { id } => {
                info!("PROFILE | queued actuator={}", id);
            }
            AppEvent::ProfileStarted { id, steps } => {
                info!("PROFILE | start actuator={} steps={}", id, steps);
            }
            AppEvent::ProfileFinished { id, completed } => {
                if *completed {
                    info!("PROFILE | done actuator={}", id);
                } else {
                    warn!("PROFILE | aborted actuator={}", id);
                }
            }
        }
    }
}
