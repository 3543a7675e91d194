//! Host delay provider.
//!
//! On the chip the worker uses `esp_idf_svc::hal::delay::FreeRtos`, which
//! yields to the scheduler.  Host builds and simulations use this thread
//! sleep instead.

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
