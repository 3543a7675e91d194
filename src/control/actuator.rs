//! H-bridge actuator controller.
//!
//! Each linear actuator is wired to a bridge with two inputs: driving IN1
//! extends, driving IN2 retracts, both low stops.  The controller maps the
//! logical actuator id (1-based) to its forward/reverse LEDC channel pair
//! and turns a [`Motion`] into a pair of duty values.
//!
//! ## Safety contract
//!
//! At most one channel of a pair is ever committed nonzero.  Both duties are
//! staged first, then the channel going to zero is committed before the one
//! being driven, so the bridge never sees both inputs high.
//!
//! When a pair write fails part way, every channel whose target is zero is
//! released on its own before the error is returned.  A `Stop` therefore
//! zeroes whichever side still accepts writes.
//!
//! Open loop: there is no position feedback and no interlock against rapid
//! repeated commands.  Last write wins.

use core::fmt;
use core::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{ChannelId, PwmPort};
use crate::error::{ActuatorError, PwmError};

// ───────────────────────────────────────────────────────────────
// Motion
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Motion {
    Extend,
    Retract,
    Stop,
}

impl Motion {
    /// `(forward, reverse)` duty for this motion.
    pub const fn duties(self, max_duty: u32) -> (u32, u32) {
        match self {
            Self::Extend => (max_duty, 0),
            Self::Retract => (0, max_duty),
            Self::Stop => (0, 0),
        }
    }

    /// Path keyword (`/extend_1`, ...).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Extend => "extend",
            Self::Retract => "retract",
            Self::Stop => "stop",
        }
    }

    /// Word used in acknowledgements.
    pub const fn past_tense(self) -> &'static str {
        match self {
            Self::Extend => "extended",
            Self::Retract => "retracted",
            Self::Stop => "stopped",
        }
    }
}

impl FromStr for Motion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extend" => Ok(Self::Extend),
            "retract" => Ok(Self::Retract),
            "stop" => Ok(Self::Stop),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ───────────────────────────────────────────────────────────────
// Channel pairs and acknowledgements
// ───────────────────────────────────────────────────────────────

/// Forward/reverse LEDC channels of one bridge.  Fixed at configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPair {
    pub forward: ChannelId,
    pub reverse: ChannelId,
}

impl ChannelPair {
    /// Channel layout for actuator `id` (1-based): `2(id-1)`, `2(id-1)+1`.
    pub const fn for_actuator(id: u8) -> Self {
        let base = (id - 1) * 2;
        Self {
            forward: base,
            reverse: base + 1,
        }
    }
}

/// Result of a committed motion.  Displays as `actuator 2 extended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub id: u8,
    pub motion: Motion,
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actuator {} {}", self.id, self.motion.past_tense())
    }
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// Upper bound on bridges the controller tracks.
pub const MAX_PAIRS: usize = 4;

pub struct ActuatorController<P: PwmPort> {
    pwm: P,
    pairs: heapless::Vec<ChannelPair, MAX_PAIRS>,
}

impl<P: PwmPort> ActuatorController<P> {
    /// Configure one channel pair per `(forward_gpio, reverse_gpio)` entry.
    ///
    /// Every channel starts at duty 0.  Any configuration failure is
    /// returned as-is; the caller treats it as fatal.
    pub fn configure(
        mut pwm: P,
        gpios: &[(i32, i32)],
        frequency_hz: u32,
        resolution_bits: u8,
    ) -> Result<Self, PwmError> {
        let mut pairs = heapless::Vec::new();
        for (i, &(fwd_gpio, rev_gpio)) in gpios.iter().enumerate() {
            let id = (i + 1) as u8;
            let pair = ChannelPair::for_actuator(id);
            pwm.configure(pair.forward, fwd_gpio, frequency_hz, resolution_bits)?;
            pwm.configure(pair.reverse, rev_gpio, frequency_hz, resolution_bits)?;
            pairs
                .push(pair)
                .map_err(|_| PwmError::InvalidChannel(pair.forward))?;
        }
        info!(
            "Actuators: {} configured at {} Hz / {}-bit (max duty {})",
            pairs.len(),
            frequency_hz,
            resolution_bits,
            pwm.max_duty()
        );
        Ok(Self { pwm, pairs })
    }

    pub fn actuator_count(&self) -> u8 {
        self.pairs.len() as u8
    }

    /// Channel pair for `id`, or `InvalidActuatorId`.
    pub fn pair(&self, id: u8) -> Result<ChannelPair, ActuatorError> {
        id.checked_sub(1)
            .and_then(|idx| self.pairs.get(idx as usize))
            .copied()
            .ok_or(ActuatorError::InvalidActuatorId(id))
    }

    /// Drive actuator `id` with `motion`.
    ///
    /// An unknown id returns [`ActuatorError::InvalidActuatorId`] before any
    /// duty register is touched.
    pub fn apply(&mut self, id: u8, motion: Motion) -> Result<Ack, ActuatorError> {
        let pair = self.pair(id).inspect_err(|_| {
            warn!("Actuator {}: rejected {} (no such actuator)", id, motion);
        })?;
        let (fwd, rev) = motion.duties(self.pwm.max_duty());

        if let Err(e) = self.write_pair(pair, fwd, rev) {
            warn!("Actuator {}: {} failed: {}", id, motion, e);
            for (channel, duty) in [(pair.forward, fwd), (pair.reverse, rev)] {
                if duty == 0 {
                    self.release(id, channel);
                }
            }
            return Err(e.into());
        }

        info!("Actuator {}: {} (fwd={} rev={})", id, motion, fwd, rev);
        Ok(Ack { id, motion })
    }

    /// Stage both duties, then commit the channel going to zero first.
    fn write_pair(&mut self, pair: ChannelPair, fwd: u32, rev: u32) -> Result<(), PwmError> {
        self.pwm.set_duty(pair.forward, fwd)?;
        self.pwm.set_duty(pair.reverse, rev)?;
        if fwd == 0 {
            self.pwm.commit(pair.forward)?;
            self.pwm.commit(pair.reverse)
        } else {
            self.pwm.commit(pair.reverse)?;
            self.pwm.commit(pair.forward)
        }
    }

    /// Zero a single channel after a failed pair write.
    fn release(&mut self, id: u8, channel: ChannelId) {
        let result = self
            .pwm
            .set_duty(channel, 0)
            .and_then(|()| self.pwm.commit(channel));
        if let Err(e) = result {
            warn!("Actuator {}: release of channel {} failed: {}", id, channel, e);
        }
    }

    /// Stop every actuator.  Returns the first error but still tries the rest.
    pub fn stop_all(&mut self) -> Result<(), ActuatorError> {
        let mut first_err = None;
        for id in 1..=self.actuator_count() {
            if let Err(e) = self.apply(id, Motion::Stop) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }
}
