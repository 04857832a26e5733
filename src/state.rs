//! # Shared Node State
//!
//! The explicit context object passed to every module callback, instead of
//! free-standing globals: the sensor snapshot the display renders from, the
//! relay runtime accounting, the transient display notice, and the
//! cross-module request flags.
//!
//! No synchronization is needed: every reader and writer executes on the
//! single cooperative thread of the runtime, and re-entrancy within one
//! tick is impossible.

use embassy_time::{Duration, Instant};

/// Cached most-recent sensor readings, rendered by the display rotator
/// without re-querying hardware on every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct SensorSnapshot {
    pub voltage: f32,
    pub current: f32,
    pub power: f32,
    pub energy: f32,
    pub frequency: f32,
    pub power_factor: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub relay_on: bool,
}

/// Accumulated relay on/off time.
///
/// Elapsed time is credited to the state the relay was in *before* each
/// transition, so no interval is ever counted twice. Accounting is anchored
/// at boot and survives only until restart; there is no persistence.
#[derive(Debug, Clone, Copy)]
pub struct RelayRuntimeStats {
    on_ms: u64,
    off_ms: u64,
    relay_on: bool,
    last_change: Instant,
}

impl RelayRuntimeStats {
    pub fn new(boot: Instant) -> Self {
        Self {
            on_ms: 0,
            off_ms: 0,
            relay_on: false,
            last_change: boot,
        }
    }

    /// Credits the elapsed interval to the previous state, then records the
    /// new one. Safe to call with an unchanged state.
    pub fn record_transition(&mut self, on: bool, now: Instant) {
        self.credit(now);
        self.relay_on = on;
    }

    /// Credits the open interval without changing state. Called before
    /// reading the accumulators for the stats publish.
    pub fn flush(&mut self, now: Instant) {
        self.credit(now);
    }

    pub fn on_secs(&self) -> u64 {
        self.on_ms / 1000
    }

    pub fn off_secs(&self) -> u64 {
        self.off_ms / 1000
    }

    fn credit(&mut self, now: Instant) {
        let elapsed = if now > self.last_change {
            now - self.last_change
        } else {
            Duration::from_ticks(0)
        };
        if self.relay_on {
            self.on_ms += elapsed.as_millis();
        } else {
            self.off_ms += elapsed.as_millis();
        }
        self.last_change = now;
    }
}

/// A transient two-line display message that preempts screen rotation
/// (reset feedback). All notices are fixed strings.
#[derive(Debug, Clone, Copy)]
pub struct Notice {
    pub top: &'static str,
    pub bottom: &'static str,
}

/// Shared state handed to every module callback.
#[derive(Debug)]
pub struct NodeState {
    pub snapshot: SensorSnapshot,
    pub relay_stats: RelayRuntimeStats,

    /// Active display notice, if any.
    pub notice: Option<Notice>,
    /// Set whenever the notice changes, so the display re-renders without
    /// waiting for its refresh tick.
    pub notice_dirty: bool,

    /// Set by the debounced button; consumed by the power module.
    pub reset_requested: bool,
    /// Requested relay state from the thermal guard; consumed by the relay
    /// module, which applies it like any other command.
    pub relay_request: Option<bool>,
}

impl NodeState {
    pub fn new(boot: Instant) -> Self {
        Self {
            snapshot: SensorSnapshot::default(),
            relay_stats: RelayRuntimeStats::new(boot),
            notice: None,
            notice_dirty: false,
            reset_requested: false,
            relay_request: None,
        }
    }

    pub fn post_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
        self.notice_dirty = true;
    }

    pub fn clear_notice(&mut self) {
        if self.notice.take().is_some() {
            self.notice_dirty = true;
        }
    }

    /// Records a relay transition in both the snapshot and the runtime
    /// accounting.
    pub fn apply_relay_state(&mut self, on: bool, now: Instant) {
        self.relay_stats.record_transition(on, now);
        self.snapshot.relay_on = on;
    }
}
