//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements   | Connects to                   |
//! |------------|--------------|-------------------------------|
//! | `log_sink` | EventSink    | Serial log output             |
//! | `nvs`      | ConfigPort   | NVS / in-memory store         |
//! | `time`     |              | ESP32 system timer            |
//! | `wifi`     | WifiLink     | ESP-IDF Wi-Fi (AP or STA)     |

pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
