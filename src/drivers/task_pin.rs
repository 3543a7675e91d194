//! Core-pinned thread spawning for the dual-core ESP32.
//!
//! ESP-IDF backs `std::thread` with pthreads on top of FreeRTOS tasks.
//! `esp_pthread_set_cfg()` sets thread-local configuration for the *next*
//! `pthread_create()` from the calling thread, so the config→spawn pair must
//! not be interleaved with other thread creation on the same thread.
//!
//! On non-ESP targets the core and priority are ignored.

use std::io;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// PRO_CPU: Wi-Fi, lwIP and httpd live here.
    Pro = 0,
    /// APP_CPU: actuator timing.
    App = 1,
}

/// Spawn `f` on `core` with the given FreeRTOS priority and stack.
///
/// `name` must be NUL-terminated (`"motion\0"`).
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: `cfg` lives across the call and `name` is a 'static,
    // NUL-terminated string as the pthread config requires.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = i32::from(priority);
        cfg.stack_size = (stack_kb * 1024) as i32;
        cfg.thread_name = name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        core,
        priority,
        stack_kb
    );

    thread::Builder::new().name(display_name.into()).spawn(f)
}

#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    let display_name = name.trim_end_matches('\0');
    log::info!("Spawning '{}' (sim, stack={}KB)", display_name, stack_kb);

    thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_kb * 1024)
        .spawn(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_spawn_runs_and_names_thread() {
        let handle = spawn_on_core(Core::App, 5, 64, "motion\0", || {
            assert_eq!(thread::current().name(), Some("motion"));
        })
        .unwrap();
        handle.join().unwrap();
    }
}
