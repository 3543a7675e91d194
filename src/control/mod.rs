//! Actuator control: H-bridge duty mapping, timed profiles, motion worker.

pub mod actuator;
pub mod profile;
pub mod worker;
