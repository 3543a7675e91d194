//! Commands handed from the request context to the motion worker.
//!
//! Anything that needs a timed hold travels through the motion queue as a
//! [`MotionCommand`] so the HTTP handler can answer immediately.

use crate::control::profile::MotionProfile;

/// Work items for the [`MotionWorker`](crate::control::worker::MotionWorker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionCommand {
    /// Run a timed profile on one actuator.
    Profile { id: u8, profile: MotionProfile },
}
