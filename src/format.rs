//! # Payload Formatting Utilities
//!
//! Helpers for rendering outbound payloads into fixed-capacity strings:
//! fixed-precision decimals for sensor quantities, plain integers for the
//! system metrics, and the composite relay stats line.

use core::fmt::Write;
use core::net::Ipv4Addr;

use heapless::String;

/// Capacity of a formatted payload. Generous for every producer in the
/// crate, including the stats line with two full `u64` counters.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// A formatted outbound payload.
pub type Payload = String<MAX_PAYLOAD_LEN>;

/// Renders `value` with exactly `places` decimal places, e.g. `231.5`.
pub fn decimal(value: f32, places: usize) -> Payload {
    let mut out = Payload::new();
    if write!(out, "{:.*}", places, value).is_err() {
        out.clear();
    }
    out
}

/// Renders a plain integer payload.
pub fn integer(value: i64) -> Payload {
    let mut out = Payload::new();
    if write!(out, "{}", value).is_err() {
        out.clear();
    }
    out
}

/// Renders a dotted IPv4 address.
pub fn dotted(addr: Ipv4Addr) -> Payload {
    let mut out = Payload::new();
    if write!(out, "{}", addr).is_err() {
        out.clear();
    }
    out
}

/// The relay state token used on the status and event topics.
pub fn relay_state(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

/// The composite relay stats line, `ON:<seconds>,OFF:<seconds>`.
pub fn relay_stats(on_secs: u64, off_secs: u64) -> Payload {
    let mut out = Payload::new();
    if write!(out, "ON:{},OFF:{}", on_secs, off_secs).is_err() {
        out.clear();
    }
    out
}
