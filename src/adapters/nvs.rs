//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the actuator firmware.
//!
//! - Flash init: on "no free pages" or "new version found" the partition is
//!   erased and initialised once more.  Anything else is fatal.
//! - Config blob: postcard-encoded [`SystemConfig`] under namespace
//!   `actuators`, key `syscfg`.  A missing, corrupted or out-of-range blob
//!   falls back to defaults.
//! - Host builds keep blobs in an in-memory map.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError};
use crate::config::SystemConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "actuators";
const CONFIG_KEY: &str = "syscfg";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 512;

// ───────────────────────────────────────────────────────────────
// Init with one erase-and-retry
// ───────────────────────────────────────────────────────────────

/// Classified result of one flash init call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Ok,
    NoFreePages,
    NewVersionFound,
    Failed(i32),
}

/// Run `init`; if it reports a recoverable layout problem, `erase` and run
/// `init` exactly once more.  Returns whether the partition was erased.
pub fn init_with_retry(
    mut init: impl FnMut() -> InitStatus,
    erase: impl FnOnce() -> Result<(), i32>,
) -> Result<bool, StorageError> {
    match init() {
        InitStatus::Ok => Ok(false),
        InitStatus::Failed(rc) => Err(StorageError::InitFailed(rc)),
        status @ (InitStatus::NoFreePages | InitStatus::NewVersionFound) => {
            warn!("NVS: {:?}, erasing and re-initialising partition", status);
            erase().map_err(StorageError::EraseFailed)?;
            match init() {
                InitStatus::Ok => Ok(true),
                InitStatus::Failed(rc) => Err(StorageError::RetryFailed(rc)),
                InitStatus::NoFreePages | InitStatus::NewVersionFound => {
                    Err(StorageError::RetryFailed(-1))
                }
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash and return the adapter.
    pub fn init() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the startup task before any NVS user.
            let erased = init_with_retry(
                || classify(unsafe { nvs_flash_init() }),
                || match unsafe { nvs_flash_erase() } {
                    ret if ret == ESP_OK as esp_err_t => Ok(()),
                    ret => Err(ret),
                },
            )?;
            info!("NvsAdapter: ESP-IDF NVS initialised (erased={})", erased);
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// Store raw bytes under the config key (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn put_raw(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes.to_vec());
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        Ok(self
            .store
            .borrow()
            .get(&composite_key(CONFIG_NAMESPACE, CONFIG_KEY))
            .cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        self.store
            .borrow_mut()
            .insert(composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
            let key = b"syscfg\0";
            let mut size: usize = 0;
            // SAFETY: null buffer queries the stored length.
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
            }
            let mut buf = vec![0u8; size];
            // SAFETY: `buf` holds `size` bytes.
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
            let key = b"syscfg\0";
            // SAFETY: pointer/length pair taken from a live Vec.
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len())
            };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            // SAFETY: handle is open read-write.
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as esp_err_t {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }
}

#[cfg(not(target_os = "espidf"))]
fn composite_key(namespace: &str, key: &str) -> String {
    format!("{}::{}", namespace, key)
}

#[cfg(target_os = "espidf")]
fn classify(ret: esp_err_t) -> InitStatus {
    match ret {
        r if r == ESP_OK as esp_err_t => InitStatus::Ok,
        r if r == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t => InitStatus::NoFreePages,
        r if r == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t => InitStatus::NewVersionFound,
        r => InitStatus::Failed(r),
    }
}

/// Open an NVS namespace, run `f` with the handle, then close it.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
where
    F: FnOnce(nvs_handle_t) -> Result<T, i32>,
{
    let mut ns_buf = [0u8; 16];
    let ns_bytes = namespace.as_bytes();
    let len = ns_bytes.len().min(15);
    ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

    let mut handle: nvs_handle_t = 0;
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };

    // SAFETY: `ns_buf` is NUL-terminated.
    let ret = unsafe { nvs_open(ns_buf.as_ptr().cast(), mode, &mut handle) };
    if ret != ESP_OK as esp_err_t {
        return Err(ret);
    }

    let result = f(handle);
    // SAFETY: handle came from nvs_open above.
    unsafe {
        nvs_close(handle);
    }
    result
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.read_blob()? else {
            info!("NvsAdapter: no stored config in '{}', using defaults", CONFIG_NAMESPACE);
            return Ok(SystemConfig::default());
        };
        let cfg: SystemConfig = match postcard::from_bytes(&bytes) {
            Ok(cfg) => cfg,
            Err(_) => {
                warn!("NvsAdapter: stored config corrupted, using defaults");
                return Ok(SystemConfig::default());
            }
        };
        if let Err(e) = cfg.validate() {
            warn!("NvsAdapter: stored config rejected ({}), using defaults", e);
            return Ok(SystemConfig::default());
        }
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        let len = bytes.len();
        self.write_blob(bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", len);
        Ok(())
    }
}
