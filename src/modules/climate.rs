//! Climate publisher: temperature and humidity every two seconds, plus the
//! over-temperature relay guard.

use embassy_time::{Duration, Instant};
use log::{info, warn};

use crate::format;
use crate::peripherals::ClimateSensor;
use crate::runtime::{NodeModule, PublishOutbox, TopicCollector};
use crate::session::InboundMessage;
use crate::state::NodeState;
use crate::topics::TopicSet;

/// Read/publish cadence.
pub const CLIMATE_INTERVAL: Duration = Duration::from_millis(2000);

/// Over-temperature cutoff for the relay guard.
///
/// The guard trips the relay off at `cutoff_c` and re-enables it once the
/// temperature has fallen below `cutoff_c - hysteresis_c`, so a reading
/// hovering at the threshold cannot chatter the relay.
#[derive(Debug, Clone, Copy)]
pub struct ThermalLimits {
    pub cutoff_c: f32,
    pub hysteresis_c: f32,
}

impl Default for ThermalLimits {
    fn default() -> Self {
        Self {
            cutoff_c: 35.0,
            hysteresis_c: 2.0,
        }
    }
}

/// Reads the climate sensor, updates the snapshot, publishes both values.
///
/// An invalid reading (NaN on either quantity) aborts the whole cycle: no
/// partial publish, no snapshot update.
pub struct ClimateModule<C: ClimateSensor> {
    sensor: C,
    topics: &'static TopicSet,
    thermal: Option<ThermalLimits>,
    tripped: bool,
}

impl<C: ClimateSensor> ClimateModule<C> {
    pub fn new(sensor: C, topics: &'static TopicSet) -> Self {
        Self {
            sensor,
            topics,
            thermal: None,
            tripped: false,
        }
    }

    /// Enables the over-temperature relay guard.
    pub fn with_thermal_cutoff(mut self, limits: ThermalLimits) -> Self {
        self.thermal = Some(limits);
        self
    }

    fn check_thermal(&mut self, temperature: f32, state: &mut NodeState) {
        let Some(limits) = self.thermal else {
            return;
        };
        if !self.tripped && temperature >= limits.cutoff_c && state.snapshot.relay_on {
            warn!(
                "temperature {:.1}C at or over cutoff, requesting relay off",
                temperature
            );
            self.tripped = true;
            state.relay_request = Some(false);
        } else if self.tripped && temperature < limits.cutoff_c - limits.hysteresis_c {
            info!(
                "temperature {:.1}C back under cutoff, re-enabling relay",
                temperature
            );
            self.tripped = false;
            state.relay_request = Some(true);
        }
    }
}

impl<C: ClimateSensor> NodeModule for ClimateModule<C> {
    fn register(&self, _collector: &mut dyn TopicCollector) {}

    fn on_message(&mut self, _msg: &InboundMessage<'_>, _state: &mut NodeState, _now: Instant) {}

    fn on_tick(
        &mut self,
        state: &mut NodeState,
        outbox: &mut dyn PublishOutbox,
        _now: Instant,
    ) -> Duration {
        let reading = self.sensor.read();
        if reading.temperature_c.is_nan() || reading.humidity_pct.is_nan() {
            warn!("climate read invalid, skipping publish");
            return CLIMATE_INTERVAL;
        }

        state.snapshot.temperature = reading.temperature_c;
        state.snapshot.humidity = reading.humidity_pct;

        outbox.publish(
            self.topics.temperature,
            format::decimal(reading.temperature_c, 2).as_bytes(),
            false,
        );
        outbox.publish(
            self.topics.humidity,
            format::decimal(reading.humidity_pct, 2).as_bytes(),
            false,
        );

        self.check_thermal(reading.temperature_c, state);
        CLIMATE_INTERVAL
    }
}
