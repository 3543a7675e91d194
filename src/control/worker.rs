//! Motion worker: executes timed profiles off the HTTP request context.
//!
//! ```text
//! ┌─────────────┐ MotionCommand ┌──────────────┐  apply()  ┌────────────┐
//! │ HTTP handler│──────────────▶│ MotionWorker │──────────▶│ Controller │
//! │ (try_send)  │   depth 4     │ (own thread) │  + delay  │ (Mutex)    │
//! └─────────────┘               └──────────────┘           └────────────┘
//! ```
//!
//! The controller lock is taken per step, never across a hold, so manual
//! commands still get through while a profile is running.

use std::sync::{Arc, Mutex};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use super::actuator::{ActuatorController, Motion};
use super::profile::MotionProfile;
use crate::app::commands::MotionCommand;
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, PwmPort};
use crate::error::ActuatorError;

/// Queue depth between request handlers and the worker.
pub const QUEUE_DEPTH: usize = 4;

pub type MotionQueue = Channel<CriticalSectionRawMutex, MotionCommand, QUEUE_DEPTH>;

/// Controller shared between request handlers and the worker.
pub type SharedController<P> = Arc<Mutex<ActuatorController<P>>>;

pub struct MotionWorker<P: PwmPort, D: DelayNs, S: EventSink> {
    controller: SharedController<P>,
    queue: Arc<MotionQueue>,
    delay: D,
    sink: S,
}

impl<P: PwmPort, D: DelayNs, S: EventSink> MotionWorker<P, D, S> {
    pub fn new(controller: SharedController<P>, queue: Arc<MotionQueue>, delay: D, sink: S) -> Self {
        Self {
            controller,
            queue,
            delay,
            sink,
        }
    }

    /// Block on the queue forever.
    pub fn run(&mut self) -> ! {
        info!("Motion worker: waiting for commands");
        loop {
            let cmd = futures_lite::future::block_on(self.queue.receive());
            self.execute(cmd);
        }
    }

    /// Drain whatever is queued right now.  Returns the number executed.
    pub fn run_pending(&mut self) -> usize {
        let mut n = 0;
        while let Ok(cmd) = self.queue.try_receive() {
            self.execute(cmd);
            n += 1;
        }
        n
    }

    pub fn execute(&mut self, cmd: MotionCommand) {
        match cmd {
            MotionCommand::Profile { id, profile } => self.run_profile(id, &profile),
        }
    }

    fn run_profile(&mut self, id: u8, profile: &MotionProfile) {
        self.sink.emit(&AppEvent::ProfileStarted {
            id,
            steps: profile.len(),
        });

        let mut completed = true;
        for step in profile.steps() {
            match self.apply(id, step.motion) {
                Ok(()) => self.sink.emit(&AppEvent::ActuatorMoved {
                    id,
                    motion: step.motion,
                }),
                Err(e) => {
                    error!("Motion worker: actuator {} {} failed: {}", id, step.motion, e);
                    if let Err(e) = self.apply(id, Motion::Stop) {
                        warn!("Motion worker: stop after failure also failed: {}", e);
                    }
                    completed = false;
                    break;
                }
            }
            if step.hold_ms > 0 {
                self.delay.delay_ms(step.hold_ms);
            }
        }

        self.sink.emit(&AppEvent::ProfileFinished { id, completed });
    }

    fn apply(&self, id: u8, motion: Motion) -> Result<(), ActuatorError> {
        let mut ctl = self
            .controller
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        ctl.apply(id, motion).map(|_| ())
    }
}
