//! Power meter publisher and the energy-counter reset sequence.
//!
//! The six meter quantities publish every three seconds, each behind its
//! own NaN guard so one bad register never suppresses the others. The
//! reset sequence (commanded over MQTT or by the hardware button) is a
//! small state machine advanced by scheduler ticks: announce with the LED
//! indicator and a display notice, clear the counter after a settle delay,
//! show the result, resume. Nothing blocks the loop.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::StatefulOutputPin;
use log::{debug, info, warn};

use crate::format;
use crate::peripherals::PowerMeter;
use crate::runtime::{NodeModule, PublishOutbox, TopicCollector};
use crate::session::InboundMessage;
use crate::state::{NodeState, Notice};
use crate::topics::TopicSet;

/// Read/publish cadence.
pub const POWER_INTERVAL: Duration = Duration::from_millis(3000);

/// Delay between announcing a reset and clearing the counter.
pub const RESET_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How long the reset result stays on the display.
pub const RESET_RESULT_HOLD: Duration = Duration::from_millis(1500);

/// Reset indicator blink cadence and toggle count.
pub const LED_BLINK_INTERVAL: Duration = Duration::from_millis(300);
pub const LED_BLINK_TOTAL: u8 = 6;

const RESETTING_NOTICE: Notice = Notice {
    top: "RESETTING...",
    bottom: "PZEM ENERGY",
};
const RESET_OK_NOTICE: Notice = Notice {
    top: "RESET SUCCESS!",
    bottom: "Energy: 0.000kWh",
};
const RESET_FAILED_NOTICE: Notice = Notice {
    top: "RESET FAILED!",
    bottom: "Check PZEM",
};

#[derive(Debug, Clone, Copy)]
enum ResetPhase {
    Idle,
    /// Announced; the counter clears once the settle delay elapses.
    Announced { execute_at: Instant },
    /// Result on display until `clear_at`.
    ShowingResult { clear_at: Instant },
}

/// Blink bookkeeping for the reset indicator LED. Starts high, toggles on
/// a fixed cadence, and self-terminates after [`LED_BLINK_TOTAL`] toggles
/// with the pin driven low.
#[derive(Debug, Clone, Copy)]
struct LedBlink {
    active: bool,
    toggles: u8,
    last_toggle: Instant,
}

impl LedBlink {
    fn idle() -> Self {
        Self {
            active: false,
            toggles: 0,
            last_toggle: Instant::from_ticks(0),
        }
    }

    fn start<E: StatefulOutputPin>(&mut self, led: &mut E, now: Instant) {
        if let Err(e) = led.set_high() {
            warn!("reset LED write failed: {:?}", e);
        }
        self.active = true;
        self.toggles = 0;
        self.last_toggle = now;
    }

    /// Advances the blink. Returns the time until it next wants a tick, or
    /// `None` once finished.
    fn tick<E: StatefulOutputPin>(&mut self, led: &mut E, now: Instant) -> Option<Duration> {
        if !self.active {
            return None;
        }
        if now - self.last_toggle < LED_BLINK_INTERVAL {
            return Some(LED_BLINK_INTERVAL - (now - self.last_toggle));
        }
        if self.toggles < LED_BLINK_TOTAL {
            if let Err(e) = led.toggle() {
                warn!("reset LED toggle failed: {:?}", e);
            }
            self.toggles += 1;
            self.last_toggle = now;
            Some(LED_BLINK_INTERVAL)
        } else {
            if let Err(e) = led.set_low() {
                warn!("reset LED write failed: {:?}", e);
            }
            self.active = false;
            None
        }
    }
}

/// Power meter module: periodic readings plus the reset sequence.
pub struct PowerModule<P: PowerMeter, E: StatefulOutputPin> {
    meter: P,
    led: E,
    topics: &'static TopicSet,
    phase: ResetPhase,
    blink: LedBlink,
    last_read: Option<Instant>,
    pending_reset: bool,
}

impl<P: PowerMeter, E: StatefulOutputPin> PowerModule<P, E> {
    pub fn new(meter: P, mut led: E, topics: &'static TopicSet) -> Self {
        if let Err(e) = led.set_low() {
            warn!("reset LED write failed: {:?}", e);
        }
        Self {
            meter,
            led,
            topics,
            phase: ResetPhase::Idle,
            blink: LedBlink::idle(),
            last_read: None,
            pending_reset: false,
        }
    }

    fn read_due(&self, now: Instant) -> bool {
        match self.last_read {
            None => true,
            Some(t) => now - t >= POWER_INTERVAL,
        }
    }

    fn publish_readings(&mut self, state: &mut NodeState, outbox: &mut dyn PublishOutbox) {
        let reading = self.meter.read();

        // The snapshot mirrors the raw sample; only the publishes are
        // guarded per quantity.
        state.snapshot.voltage = reading.voltage_v;
        state.snapshot.current = reading.current_a;
        state.snapshot.power = reading.power_w;
        state.snapshot.energy = reading.energy_kwh;
        state.snapshot.frequency = reading.frequency_hz;
        state.snapshot.power_factor = reading.power_factor;

        publish_quantity(outbox, self.topics.voltage, reading.voltage_v, 1, "voltage");
        publish_quantity(outbox, self.topics.current, reading.current_a, 3, "current");
        publish_quantity(outbox, self.topics.power, reading.power_w, 1, "power");
        publish_quantity(outbox, self.topics.energy, reading.energy_kwh, 3, "energy");
        publish_quantity(
            outbox,
            self.topics.frequency,
            reading.frequency_hz,
            1,
            "frequency",
        );
        publish_quantity(
            outbox,
            self.topics.power_factor,
            reading.power_factor,
            2,
            "power factor",
        );
    }

    fn begin_reset(&mut self, state: &mut NodeState, now: Instant) {
        info!("starting energy counter reset");
        self.blink.start(&mut self.led, now);
        state.post_notice(RESETTING_NOTICE);
        self.phase = ResetPhase::Announced {
            execute_at: now + RESET_SETTLE_DELAY,
        };
    }

    fn execute_reset(&mut self, state: &mut NodeState, outbox: &mut dyn PublishOutbox) {
        match self.meter.reset_energy() {
            Ok(()) => {
                info!("energy counter reset");
                outbox.publish(self.topics.meter_status, b"RESET_SUCCESS", false);
                outbox.publish(self.topics.energy, b"0.000", false);
                state.snapshot.energy = 0.0;
                state.post_notice(RESET_OK_NOTICE);
            }
            Err(e) => {
                warn!("energy counter reset failed: {:?}", e);
                outbox.publish(self.topics.meter_status, b"RESET_FAILED", false);
                state.post_notice(RESET_FAILED_NOTICE);
            }
        }
    }

    /// Advances the reset machine. Returns the time until its next
    /// deadline while a sequence is in flight.
    fn advance_reset(
        &mut self,
        state: &mut NodeState,
        outbox: &mut dyn PublishOutbox,
        now: Instant,
    ) -> Option<Duration> {
        match self.phase {
            ResetPhase::Idle => None,
            ResetPhase::Announced { execute_at } => {
                if now < execute_at {
                    return Some(execute_at - now);
                }
                self.execute_reset(state, outbox);
                self.phase = ResetPhase::ShowingResult {
                    clear_at: now + RESET_RESULT_HOLD,
                };
                Some(RESET_RESULT_HOLD)
            }
            ResetPhase::ShowingResult { clear_at } => {
                if now < clear_at {
                    return Some(clear_at - now);
                }
                self.phase = ResetPhase::Idle;
                state.clear_notice();
                None
            }
        }
    }
}

fn publish_quantity(
    outbox: &mut dyn PublishOutbox,
    topic: &str,
    value: f32,
    places: usize,
    label: &str,
) {
    if value.is_nan() {
        warn!("invalid {} reading, skipping publish", label);
        return;
    }
    outbox.publish(topic, format::decimal(value, places).as_bytes(), false);
}

impl<P: PowerMeter, E: StatefulOutputPin> NodeModule for PowerModule<P, E> {
    fn register(&self, collector: &mut dyn TopicCollector) {
        let _ = collector.add(self.topics.meter_reset);
    }

    fn on_message(&mut self, msg: &InboundMessage<'_>, _state: &mut NodeState, _now: Instant) {
        if msg.topic != self.topics.meter_reset {
            return;
        }
        match msg.payload {
            b"RESET" | b"reset" | b"RESET_ENERGY" => {
                info!("energy reset commanded");
                self.pending_reset = true;
            }
            other => warn!(
                "invalid energy reset command: {}",
                core::str::from_utf8(other).unwrap_or("<non-utf8>")
            ),
        }
    }

    fn on_tick(
        &mut self,
        state: &mut NodeState,
        outbox: &mut dyn PublishOutbox,
        now: Instant,
    ) -> Duration {
        if state.reset_requested {
            state.reset_requested = false;
            self.pending_reset = true;
        }
        if self.pending_reset {
            self.pending_reset = false;
            if matches!(self.phase, ResetPhase::Idle) {
                self.begin_reset(state, now);
            } else {
                debug!("energy reset already in progress");
            }
        }

        let mut next = POWER_INTERVAL;

        if let Some(wait) = self.advance_reset(state, outbox, now) {
            next = next.min(wait);
        }

        // Periodic readings pause while a reset sequence is in flight.
        if matches!(self.phase, ResetPhase::Idle) {
            if self.read_due(now) {
                self.last_read = Some(now);
                self.publish_readings(state, outbox);
            }
            if let Some(t) = self.last_read {
                let deadline = t + POWER_INTERVAL;
                let wait = if deadline > now {
                    deadline - now
                } else {
                    Duration::from_ticks(0)
                };
                next = next.min(wait);
            }
        }

        if let Some(wait) = self.blink.tick(&mut self.led, now) {
            next = next.min(wait);
        }

        next
    }

    fn needs_immediate_tick(&self, state: &NodeState) -> bool {
        self.pending_reset || state.reset_requested
    }
}
