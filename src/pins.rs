//! GPIO / peripheral pin assignments for the actuator board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// H-bridge inputs (two per actuator: IN1 = forward, IN2 = reverse)
// ---------------------------------------------------------------------------

pub const MOTOR_IN1_GPIO: i32 = 12;
pub const MOTOR_IN2_GPIO: i32 = 13;
pub const MOTOR_IN3_GPIO: i32 = 14;
pub const MOTOR_IN4_GPIO: i32 = 15;
pub const MOTOR_IN5_GPIO: i32 = 16;
pub const MOTOR_IN6_GPIO: i32 = 17;
pub const MOTOR_IN7_GPIO: i32 = 18;
pub const MOTOR_IN8_GPIO: i32 = 19;

/// `(forward, reverse)` GPIO pairs, indexed by actuator id − 1.
/// Actuator `k` drives LEDC channels `2(k-1)` and `2(k-1)+1`.
pub const ACTUATOR_GPIOS: [(i32, i32); MAX_ACTUATORS] = [
    (MOTOR_IN1_GPIO, MOTOR_IN2_GPIO),
    (MOTOR_IN3_GPIO, MOTOR_IN4_GPIO),
    (MOTOR_IN5_GPIO, MOTOR_IN6_GPIO),
    (MOTOR_IN7_GPIO, MOTOR_IN8_GPIO),
];

/// Upper bound on wired actuators (8 LEDC channels / 2 per bridge).
pub const MAX_ACTUATORS: usize = 4;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC carrier frequency shared by all bridge inputs.
pub const PWM_FREQ_HZ: u32 = 5_000;
/// LEDC timer resolution (bits).  12-bit gives 0 – 4095 duty levels.
pub const PWM_RESOLUTION_BITS: u8 = 12;
/// Number of low-speed LEDC channels on the ESP32.
pub const LEDC_CHANNEL_COUNT: usize = 8;
/// LEDC source clock (APB, 80 MHz).  `freq << bits` must not exceed it.
pub const LEDC_SOURCE_CLOCK_HZ: u64 = 80_000_000;
/// Highest GPIO that can drive an output (34 – 39 are input-only).
pub const MAX_OUTPUT_GPIO: i32 = 33;
