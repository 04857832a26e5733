//! Relay command handling, status/event publication, and runtime stats.
//!
//! The relay drives an active-low line: logical ON pulls the pin low.
//! Commands arrive on the control topic; the thermal guard injects the
//! same requests through the shared state. Every applied state change is
//! announced with a retained status and a non-retained event, and the
//! accumulated on/off time publishes once a minute.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::format;
use crate::runtime::{NodeModule, PublishOutbox, TopicCollector};
use crate::session::InboundMessage;
use crate::state::NodeState;
use crate::topics::TopicSet;

/// Cadence of the accumulated on/off time publication.
pub const RELAY_STATS_INTERVAL: Duration = Duration::from_millis(60_000);

/// Relay module: command decoding, inverted pin drive, announcements.
pub struct RelayModule<R: OutputPin> {
    pin: R,
    topics: &'static TopicSet,
    pending_announce: bool,
    last_stats: Option<Instant>,
}

impl<R: OutputPin> RelayModule<R> {
    /// Takes ownership of the relay pin and parks it in the OFF state
    /// (physical high, since the drive is inverted).
    pub fn new(mut pin: R, topics: &'static TopicSet) -> Self {
        if let Err(e) = pin.set_high() {
            warn!("relay pin write failed: {:?}", e);
        }
        Self {
            pin,
            topics,
            pending_announce: false,
            last_stats: None,
        }
    }

    fn set_relay(&mut self, on: bool, state: &mut NodeState, now: Instant) {
        // Logical ON drives the physical line low.
        let drive = if on {
            self.pin.set_low()
        } else {
            self.pin.set_high()
        };
        if let Err(e) = drive {
            warn!("relay pin write failed: {:?}", e);
            return;
        }

        state.apply_relay_state(on, now);
        info!("relay {}", format::relay_state(on));
        self.pending_announce = true;
    }
}

impl<R: OutputPin> NodeModule for RelayModule<R> {
    fn register(&self, collector: &mut dyn TopicCollector) {
        let _ = collector.add(self.topics.relay_control);
    }

    fn on_message(&mut self, msg: &InboundMessage<'_>, state: &mut NodeState, now: Instant) {
        if msg.topic != self.topics.relay_control {
            return;
        }
        match msg.payload {
            b"ON" | b"1" => self.set_relay(true, state, now),
            b"OFF" | b"0" => self.set_relay(false, state, now),
            b"TOGGLE" => {
                let next = !state.snapshot.relay_on;
                self.set_relay(next, state, now);
            }
            other => warn!(
                "invalid relay command: {}",
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
        if let Some(on) = state.relay_request.take() {
            self.set_relay(on, state, now);
        }

        if self.pending_announce {
            self.pending_announce = false;
            let token = format::relay_state(state.snapshot.relay_on);
            outbox.publish(self.topics.relay_status, token.as_bytes(), true);
            outbox.publish(self.topics.relay_event, token.as_bytes(), false);
        }

        let stats_due = match self.last_stats {
            None => {
                // Anchor the first stats window at the first tick.
                self.last_stats = Some(now);
                false
            }
            Some(t) => now - t >= RELAY_STATS_INTERVAL,
        };
        if stats_due {
            self.last_stats = Some(now);
            state.relay_stats.flush(now);
            let line = format::relay_stats(state.relay_stats.on_secs(), state.relay_stats.off_secs());
            outbox.publish(self.topics.relay_stats, line.as_bytes(), false);
        }

        match self.last_stats {
            Some(t) => {
                let deadline = t + RELAY_STATS_INTERVAL;
                if deadline > now {
                    deadline - now
                } else {
                    Duration::from_ticks(0)
                }
            }
            None => RELAY_STATS_INTERVAL,
        }
    }

    fn on_start(&mut self, state: &mut NodeState, outbox: &mut dyn PublishOutbox) {
        // Re-announce the retained status after every connect, so a broker
        // restart cannot leave a stale state behind.
        let token = format::relay_state(state.snapshot.relay_on);
        outbox.publish(self.topics.relay_status, token.as_bytes(), true);
    }

    fn needs_immediate_tick(&self, state: &NodeState) -> bool {
        self.pending_announce || state.relay_request.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::BufferedOutbox;
    use crate::testing::FakePin;

    type Outbox = BufferedOutbox<8, 64, 64>;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn module() -> RelayModule<FakePin> {
        RelayModule::new(FakePin::new(false), &TopicSet::HOME)
    }

    fn command(payload: &'static [u8]) -> InboundMessage<'static> {
        InboundMessage {
            topic: TopicSet::HOME.relay_control,
            payload,
        }
    }

    #[test]
    fn accepts_the_five_command_tokens() {
        let mut m = module();
        let mut state = NodeState::new(at(0));

        m.on_message(&command(b"ON"), &mut state, at(0));
        assert!(state.snapshot.relay_on);
        assert!(!m.pin.level_high);

        m.on_message(&command(b"0"), &mut state, at(0));
        assert!(!state.snapshot.relay_on);
        assert!(m.pin.level_high);

        m.on_message(&command(b"1"), &mut state, at(0));
        assert!(state.snapshot.relay_on);

        m.on_message(&command(b"OFF"), &mut state, at(0));
        assert!(!state.snapshot.relay_on);

        m.on_message(&command(b"TOGGLE"), &mut state, at(0));
        assert!(state.snapshot.relay_on);
    }

    #[test]
    fn unknown_commands_change_nothing_and_publish_nothing() {
        let mut m = module();
        let mut state = NodeState::new(at(0));
        let mut outbox = Outbox::new();

        let writes_before = m.pin.history.len();
        for payload in [b"on" as &[u8], b"On", b"2", b"toggle", b""] {
            m.on_message(&command(payload), &mut state, at(0));
        }
        assert!(!state.snapshot.relay_on);
        assert_eq!(m.pin.history.len(), writes_before);
        assert!(!m.needs_immediate_tick(&state));

        m.on_tick(&mut state, &mut outbox, at(0));
        assert!(outbox.is_empty());
    }

    #[test]
    fn toggling_twice_restores_the_physical_level() {
        let mut m = module();
        let mut state = NodeState::new(at(0));

        let level_before = m.pin.level_high;
        m.on_message(&command(b"TOGGLE"), &mut state, at(1_000));
        m.on_message(&command(b"TOGGLE"), &mut state, at(2_000));
        assert_eq!(m.pin.level_high, level_before);
        assert!(!state.snapshot.relay_on);
    }

    #[test]
    fn applied_command_announces_status_and_event() {
        let mut m = module();
        let mut state = NodeState::new(at(0));
        let mut outbox = Outbox::new();

        m.on_message(&command(b"ON"), &mut state, at(0));
        assert!(m.needs_immediate_tick(&state));

        m.on_tick(&mut state, &mut outbox, at(0));
        let requests = outbox.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].topic.as_str(), "home/relay/status");
        assert_eq!(requests[0].payload.as_slice(), b"ON");
        assert!(requests[0].retain);
        assert_eq!(requests[1].topic.as_str(), "home/relay/event");
        assert_eq!(requests[1].payload.as_slice(), b"ON");
        assert!(!requests[1].retain);

        // Announced once, not every tick.
        outbox.clear();
        m.on_tick(&mut state, &mut outbox, at(10));
        assert!(outbox.is_empty());
    }

    #[test]
    fn stats_publish_after_a_minute_with_credited_intervals() {
        let mut m = module();
        let mut state = NodeState::new(at(0));
        let mut outbox = Outbox::new();

        // Anchor the stats window.
        m.on_tick(&mut state, &mut outbox, at(0));

        // Off for 10 s, on for 5 s, off again until the stats tick.
        m.on_message(&command(b"ON"), &mut state, at(10_000));
        m.on_message(&command(b"OFF"), &mut state, at(15_000));
        outbox.clear();
        m.on_tick(&mut state, &mut outbox, at(15_000));
        outbox.clear();

        m.on_tick(&mut state, &mut outbox, at(60_000));
        let requests = outbox.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].topic.as_str(), "home/relay/stats");
        assert_eq!(requests[0].payload.as_slice(), b"ON:5,OFF:55");
        assert!(!requests[0].retain);
    }

    #[test]
    fn stats_are_gated_by_elapsed_time_not_tick_count() {
        let mut m = module();
        let mut state = NodeState::new(at(0));
        let mut outbox = Outbox::new();

        m.on_tick(&mut state, &mut outbox, at(0));
        for ms in [10, 30_000, 59_999] {
            m.on_tick(&mut state, &mut outbox, at(ms));
        }
        assert!(outbox.is_empty());

        m.on_tick(&mut state, &mut outbox, at(60_000));
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn thermal_request_is_applied_like_a_command() {
        let mut m = module();
        let mut state = NodeState::new(at(0));
        let mut outbox = Outbox::new();
        m.on_tick(&mut state, &mut outbox, at(0));

        state.snapshot.relay_on = true;
        state.relay_request = Some(false);
        assert!(m.needs_immediate_tick(&state));

        m.on_tick(&mut state, &mut outbox, at(5_000));
        assert!(!state.snapshot.relay_on);
        assert!(m.pin.level_high);
        let requests = outbox.requests();
        assert_eq!(requests[0].payload.as_slice(), b"OFF");
    }

    #[test]
    fn on_start_reannounces_the_retained_status() {
        let mut m = module();
        let mut state = NodeState::new(at(0));
        let mut outbox = Outbox::new();

        m.on_start(&mut state, &mut outbox);
        let requests = outbox.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].topic.as_str(), "home/relay/status");
        assert_eq!(requests[0].payload.as_slice(), b"OFF");
        assert!(requests[0].retain);
    }
}
