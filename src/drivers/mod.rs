//! Peripheral drivers: LEDC pulse outputs, delay providers and task pinning.

pub mod delay;
pub mod pwm;
pub mod task_pin;
