//! # Peripheral Seams
//!
//! Traits abstracting the sensors, the system monitor, and the character
//! display. Driver internals (I²C/serial protocols, bus timing) live below
//! these seams; the core consumes readings and success/failure results.
//!
//! Sensor traits are synchronous on purpose: module callbacks run to
//! completion on the single cooperative thread, so a driver is expected to
//! hand back its most recent sample immediately. Readings use `f32::NAN` to
//! signal an invalid sample, which is how the underlying meter and climate
//! parts report trouble.
//!
//! The relay, the reset-indicator LED, and the button are not abstracted
//! here; they are plain `embedded-hal` digital pins.

use core::net::Ipv4Addr;

/// Character width of the attached display (16×2 panel).
pub const DISPLAY_WIDTH: usize = 16;

/// One temperature/humidity sample.
#[derive(Debug, Clone, Copy)]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// One power meter sample, all six quantities at once.
///
/// Quantities fail independently on the wire, so any single field may be
/// NaN while the others are valid.
#[derive(Debug, Clone, Copy)]
pub struct PowerReading {
    pub voltage_v: f32,
    pub current_a: f32,
    pub power_w: f32,
    pub energy_kwh: f32,
    pub frequency_hz: f32,
    pub power_factor: f32,
}

/// Temperature/humidity sensor seam.
pub trait ClimateSensor {
    fn read(&mut self) -> ClimateReading;
}

/// Power meter seam (PZEM-class energy monitor).
pub trait PowerMeter {
    type Error: core::fmt::Debug;

    fn read(&mut self) -> PowerReading;

    /// Clears the meter's accumulated energy counter.
    fn reset_energy(&mut self) -> Result<(), Self::Error>;
}

/// Source for the rotated system metrics.
pub trait SystemMonitor {
    /// Received signal strength in dBm.
    fn rssi_dbm(&mut self) -> i32;

    /// Local address, once configuration has completed.
    fn ip_address(&mut self) -> Option<Ipv4Addr>;

    /// Free heap in kilobytes.
    fn free_heap_kb(&mut self) -> u32;
}

/// Two-line character display seam.
///
/// Lines longer than [`DISPLAY_WIDTH`] are clipped by the panel; the
/// renderer already formats within that budget.
pub trait DisplayOutput {
    fn show(&mut self, top: &str, bottom: &str);
}
