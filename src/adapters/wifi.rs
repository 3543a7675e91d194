//! Wi-Fi connection manager.
//!
//! Brings the radio up either as an access point (clients join the board
//! directly) or as a station joining an existing network.
//!
//! ## Station state machine
//!
//! ```text
//!            StaStarted                 GotIp
//!   Idle ───────────────▶ Connecting ───────────▶ Connected
//!                          │    ▲                    │
//!          disconnect,     │    │ disconnect,        │ disconnect
//!          retry == max    │    │ retry < max        │ (fresh counter)
//!                          ▼    └────────────────────┘
//!                        Failed ──(poll_recovery, backoff)──▶ connect
//! ```
//!
//! The startup task blocks in [`ConnectionManager::connect`] until the
//! machine first resolves to Connected or Failed.  Later transitions do
//! not re-arm that wait.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`EspStationLink`] drives `EspWifi` and
//!   forwards raw WIFI_EVENT / IP_EVENT callbacks into
//!   [`ConnectionManager::on_event`].
//! - **all other targets**: [`SimWifiLink`] records requests for tests.

use core::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{error, info, warn};

use crate::config::SystemConfig;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    InvalidSsid,
    InvalidPassword,
    /// AP channel or client limit out of range.
    InvalidApSettings,
    /// Driver refused the configuration or failed to start.
    StartFailed(i32),
    /// A connect request was rejected by the driver.
    ConnectFailed(i32),
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::InvalidApSettings => write!(f, "AP channel must be 1-13 and clients 1-10"),
            Self::StartFailed(rc) => write!(f, "Wi-Fi start failed (rc={rc})"),
            Self::ConnectFailed(rc) => write!(f, "Wi-Fi connect request failed (rc={rc})"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

fn copy_str<const N: usize>(
    s: &str,
    err: ConnectivityError,
) -> Result<heapless::String<N>, ConnectivityError> {
    let mut out = heapless::String::new();
    out.push_str(s).map_err(|_| err)?;
    Ok(out)
}

// ───────────────────────────────────────────────────────────────
// Credentials and AP settings
// ───────────────────────────────────────────────────────────────

/// Station credentials.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirelessCredentials {
    ssid: heapless::String<32>,
    passphrase: heapless::String<64>,
    max_retries: u8,
}

impl WirelessCredentials {
    pub fn new(ssid: &str, passphrase: &str, max_retries: u8) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(passphrase)?;
        Ok(Self {
            ssid: copy_str(ssid, ConnectivityError::InvalidSsid)?,
            passphrase: copy_str(passphrase, ConnectivityError::InvalidPassword)?,
            max_retries,
        })
    }

    pub fn from_config(cfg: &SystemConfig) -> Result<Self, ConnectivityError> {
        Self::new(&cfg.ssid, &cfg.passphrase, cfg.max_retries)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointConfig {
    ssid: heapless::String<32>,
    passphrase: heapless::String<64>,
    channel: u8,
    max_clients: u8,
}

impl AccessPointConfig {
    pub fn new(
        ssid: &str,
        passphrase: &str,
        channel: u8,
        max_clients: u8,
    ) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(passphrase)?;
        if !(1..=13).contains(&channel) || !(1..=10).contains(&max_clients) {
            return Err(ConnectivityError::InvalidApSettings);
        }
        Ok(Self {
            ssid: copy_str(ssid, ConnectivityError::InvalidSsid)?,
            passphrase: copy_str(passphrase, ConnectivityError::InvalidPassword)?,
            channel,
            max_clients,
        })
    }

    pub fn from_config(cfg: &SystemConfig) -> Result<Self, ConnectivityError> {
        Self::new(&cfg.ssid, &cfg.passphrase, cfg.ap_channel, cfg.ap_max_clients)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn max_clients(&self) -> u8 {
        self.max_clients
    }

    /// Open authentication when no passphrase is set, WPA2-PSK otherwise.
    pub fn is_open(&self) -> bool {
        self.passphrase.is_empty()
    }

    /// WPA2 networks require protected management frames.
    pub fn requires_pmf(&self) -> bool {
        !self.is_open()
    }
}

// ───────────────────────────────────────────────────────────────
// Station state machine
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Failed,
}

/// What the blocked startup task is told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Connected,
    Failed,
}

/// Platform events the manager reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    StaStarted,
    StaDisconnected { reason: u16 },
    GotIp { ip: [u8; 4] },
    ApStationJoined { mac: [u8; 6], aid: u8 },
    ApStationLeft { mac: [u8; 6], aid: u8, reason: u16 },
}

/// Actions requested by one [`StationMachine::handle`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Step {
    /// Issue a (re)connect attempt.
    pub connect: bool,
    /// Wake the blocked caller with this outcome.
    pub resolved: Option<ConnectionOutcome>,
}

const RECOVERY_INITIAL_MS: u32 = 2_000;
const RECOVERY_MAX_MS: u32 = 60_000;

pub struct StationMachine {
    state: ConnectionState,
    retry: u8,
    max_retries: u8,
    /// A caller is blocked in `connect` and has not been resolved yet.
    awaiting: bool,
    backoff_ms: u32,
    next_recovery_ms: Option<u64>,
}

impl StationMachine {
    pub fn new(max_retries: u8) -> Self {
        Self {
            state: ConnectionState::Idle,
            retry: 0,
            max_retries,
            awaiting: false,
            backoff_ms: RECOVERY_INITIAL_MS,
            next_recovery_ms: None,
        }
    }

    /// Prepare for a blocking connect.
    pub fn arm(&mut self, max_retries: u8) {
        self.state = ConnectionState::Idle;
        self.retry = 0;
        self.max_retries = max_retries;
        self.awaiting = true;
        self.backoff_ms = RECOVERY_INITIAL_MS;
        self.next_recovery_ms = None;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u8 {
        self.retry
    }

    pub fn handle(&mut self, event: LinkEvent) -> Step {
        let mut step = Step::default();
        match event {
            LinkEvent::StaStarted => {
                self.state = ConnectionState::Connecting;
                step.connect = true;
            }
            LinkEvent::StaDisconnected { .. } if self.state == ConnectionState::Failed => {}
            LinkEvent::StaDisconnected { .. } => {
                if self.retry < self.max_retries {
                    self.retry += 1;
                    self.state = ConnectionState::Connecting;
                    step.connect = true;
                } else {
                    self.state = ConnectionState::Failed;
                    step.resolved = self.resolve(ConnectionOutcome::Failed);
                }
            }
            LinkEvent::GotIp { .. } => {
                self.retry = 0;
                self.state = ConnectionState::Connected;
                self.backoff_ms = RECOVERY_INITIAL_MS;
                self.next_recovery_ms = None;
                step.resolved = self.resolve(ConnectionOutcome::Connected);
            }
            LinkEvent::ApStationJoined { .. } | LinkEvent::ApStationLeft { .. } => {}
        }
        step
    }

    /// Background reconnect while Failed.  Returns `true` when an attempt
    /// is due; the delay doubles after each attempt up to 60 s.
    pub fn poll_recovery(&mut self, now_ms: u64) -> bool {
        if self.state != ConnectionState::Failed {
            return false;
        }
        match self.next_recovery_ms {
            None => {
                self.next_recovery_ms = Some(now_ms + u64::from(self.backoff_ms));
                false
            }
            Some(due) if now_ms >= due => {
                self.backoff_ms = (self.backoff_ms * 2).min(RECOVERY_MAX_MS);
                self.next_recovery_ms = Some(now_ms + u64::from(self.backoff_ms));
                true
            }
            Some(_) => false,
        }
    }

    fn resolve(&mut self, outcome: ConnectionOutcome) -> Option<ConnectionOutcome> {
        core::mem::take(&mut self.awaiting).then_some(outcome)
    }
}

// ───────────────────────────────────────────────────────────────
// Link port and manager
// ───────────────────────────────────────────────────────────────

/// Radio driver operations used by the manager.
pub trait WifiLink {
    /// Configure station mode and start the interface.  The driver later
    /// reports [`LinkEvent::StaStarted`].
    fn start_station(&mut self, creds: &WirelessCredentials) -> Result<(), ConnectivityError>;
    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError>;
    fn request_connect(&mut self) -> Result<(), ConnectivityError>;
}

pub struct ConnectionManager<L: WifiLink> {
    machine: Mutex<StationMachine>,
    link: Mutex<L>,
    outcome: Signal<CriticalSectionRawMutex, ConnectionOutcome>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<L: WifiLink> ConnectionManager<L> {
    pub fn new(link: L) -> Self {
        Self {
            machine: Mutex::new(StationMachine::new(0)),
            link: Mutex::new(link),
            outcome: Signal::new(),
        }
    }

    /// Join `creds.ssid()` and block until the first Connected/Failed.
    pub fn connect(
        &self,
        creds: &WirelessCredentials,
    ) -> Result<ConnectionOutcome, ConnectivityError> {
        lock(&self.machine).arm(creds.max_retries());
        self.outcome.reset();

        info!(
            "WiFi: connecting to '{}' (max {} retries)",
            creds.ssid(),
            creds.max_retries()
        );
        lock(&self.link).start_station(creds)?;

        let outcome = futures_lite::future::block_on(self.outcome.wait());
        match outcome {
            ConnectionOutcome::Connected => info!("WiFi: connected to '{}'", creds.ssid()),
            ConnectionOutcome::Failed => error!(
                "WiFi: failed to connect to '{}' after {} retries",
                creds.ssid(),
                creds.max_retries()
            ),
        }
        Ok(outcome)
    }

    /// Start the board's own network.  Returns immediately.
    pub fn start_access_point(&self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        lock(&self.link).start_access_point(ap)?;
        info!(
            "WiFi: AP '{}' up on channel {} ({}, max {} clients)",
            ap.ssid(),
            ap.channel(),
            if ap.requires_pmf() { "WPA2-PSK, PMF required" } else { "open" },
            ap.max_clients()
        );
        Ok(())
    }

    /// Feed one platform event.  Called from the event-loop context.
    pub fn on_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::StaDisconnected { reason } => {
                warn!("WiFi: station disconnected (reason {})", reason);
            }
            LinkEvent::GotIp { ip: [a, b, c, d] } => info!("WiFi: got ip {a}.{b}.{c}.{d}"),
            LinkEvent::ApStationJoined { mac, aid } => {
                info!("WiFi: station {} joined, AID={}", fmt_mac(&mac), aid);
            }
            LinkEvent::ApStationLeft { mac, aid, reason } => {
                info!(
                    "WiFi: station {} left, AID={}, reason={}",
                    fmt_mac(&mac),
                    aid,
                    reason
                );
            }
            LinkEvent::StaStarted => {}
        }

        let (step, retry) = {
            let mut m = lock(&self.machine);
            let step = m.handle(event);
            (step, m.retry_count())
        };

        if step.connect {
            if retry > 0 {
                info!("WiFi: retry {} to connect to the AP", retry);
            }
            self.request_connect();
        }
        if let Some(outcome) = step.resolved {
            self.outcome.signal(outcome);
        }
    }

    /// Called periodically from the main loop.
    pub fn poll_recovery(&self, now_ms: u64) {
        let due = lock(&self.machine).poll_recovery(now_ms);
        if due {
            info!("WiFi: background reconnect attempt");
            self.request_connect();
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.machine).state()
    }

    pub fn retry_count(&self) -> u8 {
        lock(&self.machine).retry_count()
    }

    /// Run `f` with the link locked.
    pub fn with_link<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        f(&mut lock(&self.link))
    }

    fn request_connect(&self) {
        if let Err(e) = lock(&self.link).request_connect() {
            warn!("WiFi: {}", e);
        }
    }
}

fn fmt_mac(mac: &[u8; 6]) -> heapless::String<17> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = write!(
        s,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}

// ───────────────────────────────────────────────────────────────
// Host simulation link
// ───────────────────────────────────────────────────────────────

/// Records driver requests instead of touching a radio.
#[derive(Debug, Default)]
pub struct SimWifiLink {
    pub station_starts: u32,
    pub ap_starts: u32,
    pub connect_requests: u32,
    pub last_ssid: heapless::String<32>,
}

impl WifiLink for SimWifiLink {
    fn start_station(&mut self, creds: &WirelessCredentials) -> Result<(), ConnectivityError> {
        self.station_starts += 1;
        self.last_ssid = copy_str(creds.ssid(), ConnectivityError::InvalidSsid)?;
        Ok(())
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
        self.ap_starts += 1;
        self.last_ssid = copy_str(ap.ssid(), ConnectivityError::InvalidSsid)?;
        Ok(())
    }

    fn request_connect(&mut self) -> Result<(), ConnectivityError> {
        self.connect_requests += 1;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF link
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp_impl::{EspStationLink, register_event_handlers};

#[cfg(target_os = "espidf")]
mod esp_impl {
    use core::ffi::c_void;
    use core::ptr;

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::*;
    use esp_idf_svc::wifi::{
        AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
    };

    use super::{
        AccessPointConfig, ConnectionManager, ConnectivityError, LinkEvent, WifiLink,
        WirelessCredentials,
    };

    pub struct EspStationLink {
        wifi: EspWifi<'static>,
    }

    impl EspStationLink {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
        ) -> Result<Self, EspError> {
            Ok(Self {
                wifi: EspWifi::new(modem, sysloop, Some(nvs))?,
            })
        }
    }

    impl WifiLink for EspStationLink {
        fn start_station(&mut self, creds: &WirelessCredentials) -> Result<(), ConnectivityError> {
            let cfg = Configuration::Client(ClientConfiguration {
                ssid: creds
                    .ssid()
                    .try_into()
                    .map_err(|_| ConnectivityError::InvalidSsid)?,
                password: creds
                    .passphrase()
                    .try_into()
                    .map_err(|_| ConnectivityError::InvalidPassword)?,
                auth_method: if creds.is_open() {
                    AuthMethod::None
                } else {
                    AuthMethod::WPA2Personal
                },
                ..Default::default()
            });
            self.wifi
                .set_configuration(&cfg)
                .map_err(|e| ConnectivityError::StartFailed(e.code()))?;
            self.wifi
                .start()
                .map_err(|e| ConnectivityError::StartFailed(e.code()))
        }

        fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), ConnectivityError> {
            let cfg = Configuration::AccessPoint(AccessPointConfiguration {
                ssid: ap.ssid().try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
                password: ap
                    .passphrase()
                    .try_into()
                    .map_err(|_| ConnectivityError::InvalidPassword)?,
                channel: ap.channel(),
                auth_method: if ap.is_open() {
                    AuthMethod::None
                } else {
                    AuthMethod::WPA2Personal
                },
                max_connections: u16::from(ap.max_clients()),
                ..Default::default()
            });
            self.wifi
                .set_configuration(&cfg)
                .map_err(|e| ConnectivityError::StartFailed(e.code()))?;
            if ap.requires_pmf() {
                require_ap_pmf()?;
            }
            self.wifi
                .start()
                .map_err(|e| ConnectivityError::StartFailed(e.code()))
        }

        fn request_connect(&mut self) -> Result<(), ConnectivityError> {
            // SAFETY: the driver was started by start_station.
            let ret = unsafe { esp_wifi_connect() };
            if ret == ESP_OK as esp_err_t {
                Ok(())
            } else {
                Err(ConnectivityError::ConnectFailed(ret))
            }
        }
    }

    /// Require protected management frames on the WPA2 soft-AP.  The
    /// high-level configuration has no field for it.
    fn require_ap_pmf() -> Result<(), ConnectivityError> {
        // SAFETY: the driver is initialised by set_configuration and `raw`
        // outlives both calls; the AP arm is the active union member.
        let ret = unsafe {
            let mut raw: wifi_config_t = core::mem::zeroed();
            let ret = esp_wifi_get_config(wifi_interface_t_WIFI_IF_AP, &mut raw);
            if ret == ESP_OK as esp_err_t {
                raw.ap.pmf_cfg.required = true;
                esp_wifi_set_config(wifi_interface_t_WIFI_IF_AP, &mut raw)
            } else {
                ret
            }
        };
        if ret == ESP_OK as esp_err_t {
            Ok(())
        } else {
            Err(ConnectivityError::StartFailed(ret))
        }
    }

    /// Route WIFI_EVENT and IP_EVENT into `manager.on_event`.
    pub fn register_event_handlers(
        manager: &'static ConnectionManager<EspStationLink>,
    ) -> Result<(), ConnectivityError> {
        let arg = ptr::from_ref(manager).cast_mut().cast::<c_void>();
        // SAFETY: `manager` is 'static and Sync; the handler only borrows it.
        let ret = unsafe {
            esp_event_handler_instance_register(
                WIFI_EVENT,
                ESP_EVENT_ANY_ID,
                Some(on_system_event),
                arg,
                ptr::null_mut(),
            )
        };
        if ret != ESP_OK as esp_err_t {
            return Err(ConnectivityError::StartFailed(ret));
        }
        // SAFETY: as above.
        let ret = unsafe {
            esp_event_handler_instance_register(
                IP_EVENT,
                ip_event_t_IP_EVENT_STA_GOT_IP as i32,
                Some(on_system_event),
                arg,
                ptr::null_mut(),
            )
        };
        if ret != ESP_OK as esp_err_t {
            return Err(ConnectivityError::StartFailed(ret));
        }
        Ok(())
    }

    unsafe extern "C" fn on_system_event(
        arg: *mut c_void,
        base: esp_event_base_t,
        id: i32,
        data: *mut c_void,
    ) {
        // SAFETY: `arg` was registered from a &'static ConnectionManager.
        let manager = unsafe { &*arg.cast::<ConnectionManager<EspStationLink>>() };
        // SAFETY: `data` points at the payload type matching (base, id).
        if let Some(event) = unsafe { decode(base, id, data) } {
            manager.on_event(event);
        }
    }

    #[allow(non_upper_case_globals)]
    unsafe fn decode(base: esp_event_base_t, id: i32, data: *mut c_void) -> Option<LinkEvent> {
        // SAFETY: reading the extern event-base statics.
        let (wifi_base, ip_base) = unsafe { (WIFI_EVENT, IP_EVENT) };
        if base == wifi_base {
            match id as u32 {
                wifi_event_t_WIFI_EVENT_STA_START => Some(LinkEvent::StaStarted),
                wifi_event_t_WIFI_EVENT_STA_DISCONNECTED => {
                    let d = unsafe { &*data.cast::<wifi_event_sta_disconnected_t>() };
                    Some(LinkEvent::StaDisconnected {
                        reason: d.reason as u16,
                    })
                }
                wifi_event_t_WIFI_EVENT_AP_STACONNECTED => {
                    let d = unsafe { &*data.cast::<wifi_event_ap_staconnected_t>() };
                    Some(LinkEvent::ApStationJoined {
                        mac: d.mac,
                        aid: d.aid as u8,
                    })
                }
                wifi_event_t_WIFI_EVENT_AP_STADISCONNECTED => {
                    let d = unsafe { &*data.cast::<wifi_event_ap_stadisconnected_t>() };
                    Some(LinkEvent::ApStationLeft {
                        mac: d.mac,
                        aid: d.aid as u8,
                        reason: d.reason as u16,
                    })
                }
                _ => None,
            }
        } else if base == ip_base && id as u32 == ip_event_t_IP_EVENT_STA_GOT_IP {
            let d = unsafe { &*data.cast::<ip_event_got_ip_t>() };
            Some(LinkEvent::GotIp {
                ip: d.ip_info.ip.addr.to_le_bytes(),
            })
        } else {
            None
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
