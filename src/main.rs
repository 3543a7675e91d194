//! Actuator web firmware — main entry point.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                     │
//! │  EspStationLink   NvsAdapter   LogEventSink   EspHttpServer   │
//! │  (WifiLink)       (Config)     (EventSink)    (/* handler)    │
//! │  ─────────────────── Port Trait Boundary ───────────────────  │
//! │  AppService (Router · ActuatorController) ──▶ MotionWorker    │
//! │                        LedcPwm (PwmPort)                      │
//! └───────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use actuator_web::adapters::log_sink::LogEventSink;
use actuator_web::adapters::nvs::NvsAdapter;
use actuator_web::adapters::time::MonotonicClock;
use actuator_web::adapters::wifi::{
    AccessPointConfig, ConnectionManager, ConnectionOutcome, EspStationLink, WirelessCredentials,
    register_event_handlers,
};
use actuator_web::app::ports::ConfigPort;
use actuator_web::app::service::AppService;
use actuator_web::config::{SystemConfig, WifiMode};
use actuator_web::control::actuator::ActuatorController;
use actuator_web::control::profile::MotionProfile;
use actuator_web::control::worker::{MotionQueue, MotionWorker};
use actuator_web::drivers::pwm::LedcPwm;
use actuator_web::drivers::task_pin::{Core, spawn_on_core};
use actuator_web::error::Error;
use actuator_web::http::{router::Router, server};
use actuator_web::pins;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("Actuator web v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. NVS + config ───────────────────────────────────────
    let nvs = NvsAdapter::init().map_err(Error::from)?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    config.validate().map_err(Error::from)?;

    // ── 3. Networking ─────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let link = EspStationLink::new(peripherals.modem, sysloop, nvs_partition)?;
    let wifi: &'static ConnectionManager<EspStationLink> =
        Box::leak(Box::new(ConnectionManager::new(link)));
    register_event_handlers(wifi).map_err(Error::from)?;

    match config.wifi_mode {
        WifiMode::AccessPoint => {
            let ap = AccessPointConfig::from_config(&config).map_err(Error::from)?;
            wifi.start_access_point(&ap).map_err(Error::from)?;
        }
        WifiMode::Station => {
            let creds = WirelessCredentials::from_config(&config).map_err(Error::from)?;
            match wifi.connect(&creds).map_err(Error::from)? {
                ConnectionOutcome::Connected => {}
                ConnectionOutcome::Failed => {
                    warn!("Station not connected; serving anyway, recovery in background");
                }
            }
        }
    }

    // ── 4. Actuators ──────────────────────────────────────────
    let gpios = &pins::ACTUATOR_GPIOS[..usize::from(config.actuator_count)];
    let mut controller = ActuatorController::configure(
        LedcPwm::new(),
        gpios,
        config.pwm_frequency_hz,
        config.pwm_resolution_bits,
    )
    .map_err(Error::from)?;
    controller.stop_all().map_err(Error::from)?;
    let controller = Arc::new(Mutex::new(controller));

    // ── 5. Motion worker ──────────────────────────────────────
    let queue = Arc::new(MotionQueue::new());
    let mut worker = MotionWorker::new(controller.clone(), queue.clone(), FreeRtos, LogEventSink);
    spawn_on_core(Core::App, 5, 8, "motion\0", move || worker.run())?;

    // ── 6. HTTP ───────────────────────────────────────────────
    let router = Router::standard(config.actuator_count)
        .map_err(|e| anyhow::anyhow!("route table: {e}"))?;
    let service = Arc::new(Mutex::new(AppService::new(
        router,
        controller,
        queue,
        config.profile_actuator,
        MotionProfile::from_config(&config),
        LogEventSink::new(),
    )));
    let _server = server::start(service, config.http_max_handlers)?;

    info!("System ready.");

    // ── 7. Idle loop ──────────────────────────────────────────
    let clock = MonotonicClock::new();
    loop {
        std::thread::sleep(Duration::from_secs(1));
        if config.wifi_mode == WifiMode::Station {
            wifi.poll_recovery(clock.uptime_ms());
        }
    }
}
