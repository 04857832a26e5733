//! The node's functional units, each implementing
//! [`NodeModule`](crate::runtime::NodeModule):
//!
//! - [`ClimateModule`]: temperature/humidity publisher + thermal relay guard
//! - [`PowerModule`]: power meter publisher + energy reset sequence
//! - [`SystemInfoModule`]: RSSI/IP/uptime/heap round-robin
//! - [`RelayModule`]: relay commands, status/event/stats publication
//! - [`DisplayModule`]: snapshot screens and transient notices

pub mod climate;
pub mod display;
pub mod power;
pub mod relay;
pub mod sysinfo;

pub use climate::{CLIMATE_INTERVAL, ClimateModule, ThermalLimits};
pub use display::{DISPLAY_REFRESH_INTERVAL, DisplayModule, SCREEN_HOLD};
pub use power::{
    LED_BLINK_INTERVAL, LED_BLINK_TOTAL, POWER_INTERVAL, PowerModule, RESET_RESULT_HOLD,
    RESET_SETTLE_DELAY,
};
pub use relay::{RELAY_STATS_INTERVAL, RelayModule};
pub use sysinfo::{SYSTEM_INFO_INTERVAL, SystemInfoModule};
