//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                    |
//! |----------------|--------------------|--------------------------------|
//! | `env`          | Settings + Store + HRV | bundles the three below    |
//! | `hrv`          | HrvAnalyzer        | on-device RR summary           |
//! | `log_sink`     | EventSink          | Serial log output              |
//! | `memory_store` | RecordingStore     | postcard blobs in RAM          |
//! | `nvs`          | ConfigPort         | NVS / in-memory blob           |
//! | `settings`     | SettingsPort       | fixed user settings            |
//! | `sim_afe`      | SensorControlPort  | simulated AFE (control half)   |
//! |                | SensorReadPort     | simulated AFE (read half)      |
//! | `time`         | (none)             | ESP32 system timer / Instant   |

pub mod env;
pub mod hrv;
pub mod log_sink;
pub mod memory_store;
pub mod nvs;
pub mod settings;
pub mod sim_afe;
pub mod time;
