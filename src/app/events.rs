//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) and the motion worker emit
//! these through the [`EventSink`](super::ports::EventSink) port.

use crate::control::actuator::Motion;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// A motion was committed to an actuator's channel pair.
    ActuatorMoved { id: u8, motion: Motion },

    /// An actuator command was rejected.
    CommandRejected { id: u8 },

    /// A motion profile was accepted onto the worker queue.
    ProfileQueued { id: u8 },

    /// The motion worker started executing a profile.
    ProfileStarted { id: u8, steps: usize },

    /// The motion worker finished a profile (`completed = false` if a step
    /// failed and the actuator was stopped early).
    ProfileFinished { id: u8, completed: bool },
}
