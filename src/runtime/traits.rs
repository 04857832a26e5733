//! Node module trait and supporting outbox/collector traits.
//!
//! Every periodic publisher, the command handlers, and the display rotator
//! implement the object-safe `NodeModule` trait and are driven by the
//! `NodeRuntime` from a single cooperative thread of control.
//!
//! # Object Safety
//!
//! `NodeModule` is designed to be dyn-compatible, so modules can be stored
//! as `&mut dyn NodeModule` trait objects. This keeps the runtime free of
//! per-module type parameters and lets firmware compose its module list in
//! plain arrays.
//!
//! # Publishing Pattern
//!
//! Modules never perform async I/O. They queue publish requests on the
//! `PublishOutbox` handed to `on_tick`/`on_start`; the runtime drains the
//! queue through the session after the callback returns. A module that must
//! respond to a command it received in `on_message` sets internal state and
//! reports `needs_immediate_tick`, and the runtime calls `on_tick` in the
//! same scheduler pass.

use embassy_time::{Duration, Instant};

use crate::session::InboundMessage;
use crate::state::NodeState;

/// Object-safe trait for queuing MQTT publish requests.
///
/// Synchronous and returns immediately; the runtime performs the actual
/// publish after the module method returns. Requests queued while the
/// session is offline are dropped, which matches the node's overall
/// error policy: the next periodic tick produces fresher data anyway.
pub trait PublishOutbox {
    /// Queue a message for publishing at QoS 0 with the given retain flag.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool);
}

/// Object-safe trait for collecting control topics during registration.
///
/// The runtime provides this to modules during `register()`. Modules call
/// `add()` for each topic they want to receive commands on.
pub trait TopicCollector {
    /// Add a topic to subscribe to. The string is copied internally.
    ///
    /// Returns `true` if the topic was added, `false` if the collector is
    /// full.
    fn add(&mut self, topic: &str) -> bool;
}

/// Object-safe trait for the node's functional units.
///
/// All callbacks run on the runtime's single thread and receive the shared
/// [`NodeState`] context plus the scheduler's monotonic `now`, so every
/// module is deterministic under an injected clock. Callbacks must be
/// short: a slow callback starves every other module.
pub trait NodeModule {
    /// Register the control topics this module consumes.
    ///
    /// Called once when the module is added to the runtime. Modules without
    /// inbound commands register nothing.
    fn register(&self, collector: &mut dyn TopicCollector);

    /// Handle an inbound command message.
    ///
    /// Every module sees every message and filters by topic itself.
    /// Responses cannot be published from here; set a flag, return `true`
    /// from [`needs_immediate_tick`](NodeModule::needs_immediate_tick), and
    /// publish from `on_tick`.
    fn on_message(&mut self, msg: &InboundMessage<'_>, state: &mut NodeState, now: Instant);

    /// Perform periodic work and return the delay until this module next
    /// wants a tick.
    ///
    /// A module juggling several internal deadlines (sensor cadence, a
    /// multi-step sequence, an indicator) returns the nearest one; the
    /// runtime may also call earlier than requested after an immediate-tick
    /// request, so time-sensitive work must gate on `now`, not on call
    /// count.
    fn on_tick(
        &mut self,
        state: &mut NodeState,
        outbox: &mut dyn PublishOutbox,
        now: Instant,
    ) -> Duration;

    /// Called after each successful broker connection, once the control
    /// topics are subscribed. Use for re-announcing retained state.
    fn on_start(&mut self, _state: &mut NodeState, _outbox: &mut dyn PublishOutbox) {}

    /// Whether this module wants an out-of-schedule tick in the current
    /// pass (pending command response, freshly posted notice, ...).
    fn needs_immediate_tick(&self, _state: &NodeState) -> bool {
        false
    }
}

/// A module that does nothing. Useful as a placeholder and in tests.
pub struct NoopModule;

impl NodeModule for NoopModule {
    fn register(&self, _collector: &mut dyn TopicCollector) {}

    fn on_message(&mut self, _msg: &InboundMessage<'_>, _state: &mut NodeState, _now: Instant) {}

    fn on_tick(
        &mut self,
        _state: &mut NodeState,
        _outbox: &mut dyn PublishOutbox,
        _now: Instant,
    ) -> Duration {
        Duration::from_secs(60)
    }
}
