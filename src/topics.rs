//! # Topic Set
//!
//! Static mapping from each of the node's logical channels to its MQTT
//! topic string. Modules hold a `&'static TopicSet` and never build topic
//! strings at runtime; a deployment that needs a different namespace
//! declares its own `TopicSet` constant and wires it in.

/// The full set of topics the node consumes and produces.
#[derive(Debug, Clone, Copy)]
pub struct TopicSet {
    /// Connection status, backed by the Last-Will ("0" offline, "1" online).
    pub status: &'static str,

    /// Climate readings (out, non-retained).
    pub temperature: &'static str,
    pub humidity: &'static str,

    /// Power meter quantities (out, non-retained).
    pub voltage: &'static str,
    pub current: &'static str,
    pub power: &'static str,
    pub energy: &'static str,
    pub frequency: &'static str,
    pub power_factor: &'static str,

    /// Relay control (in) and its status/event/stats outputs.
    pub relay_control: &'static str,
    pub relay_status: &'static str,
    pub relay_event: &'static str,
    pub relay_stats: &'static str,

    /// Energy-counter reset command (in) and its result status (out).
    pub meter_reset: &'static str,
    pub meter_status: &'static str,

    /// Rotated system metrics (out; only `system_ip` is retained).
    pub system_rssi: &'static str,
    pub system_ip: &'static str,
    pub system_uptime: &'static str,
    pub system_heap: &'static str,
}

impl TopicSet {
    /// The default `home/...` namespace.
    pub const HOME: TopicSet = TopicSet {
        status: "home/system/mqtt",

        temperature: "home/temperature",
        humidity: "home/humidity",

        voltage: "home/voltage",
        current: "home/current",
        power: "home/power",
        energy: "home/energy",
        frequency: "home/frequency",
        power_factor: "home/powerfactor",

        relay_control: "home/relay/control",
        relay_status: "home/relay/status",
        relay_event: "home/relay/event",
        relay_stats: "home/relay/stats",

        meter_reset: "home/pzem/reset",
        meter_status: "home/pzem/status",

        system_rssi: "home/system/rssi",
        system_ip: "home/system/ip",
        system_uptime: "home/system/uptime",
        system_heap: "home/system/heap",
    };
}
