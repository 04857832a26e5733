//! The cooperative node runtime.
//!
//! One loop drives everything in a fixed order each iteration: connection
//! maintenance, inbound command dispatch, heartbeat, button debouncing, due
//! module ticks, and the publish queues. Module callbacks run to completion
//! between iterations; there is no parallelism and therefore no locking on
//! the shared [`NodeState`].
//!
//! All scheduling decisions take an explicit `now`, so the whole runtime
//! can be stepped deterministically in tests via [`NodeRuntime::step`];
//! only [`NodeRuntime::run`] reads the wall clock.

use core::pin::pin;

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::InputPin;
use futures::future::{Either, select};
use heapless::Vec;
use log::{debug, info, warn};

use super::publisher::{BufferedOutbox, PUBLISH_QUEUE_DEPTH, PublishRequestReceiver};
use super::registry::{MAX_TOPIC_LEN, TopicRegistry};
use super::traits::NodeModule;
use crate::button::Debouncer;
use crate::connection::ConnectionManager;
use crate::format::MAX_PAYLOAD_LEN;
use crate::session::{MqttSession, NetworkLink};
use crate::state::NodeState;

/// Pause between loop iterations.
pub const LOOP_PAUSE: Duration = Duration::from_millis(10);

/// Upper bound on one inbound poll, so a misbehaving session cannot stall
/// the scheduler.
pub const INBOUND_POLL_BUDGET: Duration = Duration::from_millis(50);

/// Capacity of the per-tick publish outbox.
pub const OUTBOX_CAPACITY: usize = 16;

/// The node runtime: session, link, button, connection manager, and the
/// module table with its tick deadlines.
///
/// # Type Parameters
///
/// - `S`: the MQTT session implementation
/// - `L`: the network link query
/// - `B`: the reset button input pin
/// - `MAX_MODULES`: module table capacity
/// - `MAX_TOPICS`: control-topic registry capacity
/// - `BUF_SIZE`: inbound message buffer size
pub struct NodeRuntime<
    'a,
    S,
    L,
    B,
    const MAX_MODULES: usize = 8,
    const MAX_TOPICS: usize = 8,
    const BUF_SIZE: usize = 1024,
> where
    S: MqttSession,
    L: NetworkLink,
    B: InputPin,
{
    session: S,
    link: L,
    button: B,
    debounce: Debouncer,
    connection: ConnectionManager<'a>,
    registry: TopicRegistry<MAX_TOPICS>,
    modules: Vec<&'a mut dyn NodeModule, MAX_MODULES>,
    deadlines: Vec<Instant, MAX_MODULES>,
    state: NodeState,
    outbox: BufferedOutbox<OUTBOX_CAPACITY, MAX_TOPIC_LEN, MAX_PAYLOAD_LEN>,
    inject_rx: Option<PublishRequestReceiver<'static, PUBLISH_QUEUE_DEPTH>>,
    recv_buf: [u8; BUF_SIZE],
}

impl<'a, S, L, B, const MAX_MODULES: usize, const MAX_TOPICS: usize, const BUF_SIZE: usize>
    NodeRuntime<'a, S, L, B, MAX_MODULES, MAX_TOPICS, BUF_SIZE>
where
    S: MqttSession,
    L: NetworkLink,
    B: InputPin,
{
    pub fn new(
        session: S,
        link: L,
        mut button: B,
        connection: ConnectionManager<'a>,
        now: Instant,
    ) -> Self {
        let pressed = button.is_low().unwrap_or(false);
        Self {
            session,
            link,
            button,
            debounce: Debouncer::new(pressed, now),
            connection,
            registry: TopicRegistry::new(),
            modules: Vec::new(),
            deadlines: Vec::new(),
            state: NodeState::new(now),
            outbox: BufferedOutbox::new(),
            inject_rx: None,
            recv_buf: [0; BUF_SIZE],
        }
    }

    /// Adds a module, registering its control topics. The module's first
    /// tick runs on the next scheduler pass.
    ///
    /// Returns `false` if the module table is full.
    pub fn add_module(&mut self, module: &'a mut dyn NodeModule) -> bool {
        module.register(&mut self.registry);
        if self.modules.push(module).is_err() {
            warn!("module table full");
            return false;
        }
        let _ = self.deadlines.push(Instant::from_ticks(0));
        true
    }

    /// Attaches the receiving end of a cross-task publish channel; drained
    /// once per scheduler pass.
    pub fn attach_publisher(&mut self, rx: PublishRequestReceiver<'static, PUBLISH_QUEUE_DEPTH>) {
        self.inject_rx = Some(rx);
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// One scheduler pass at the given instant.
    pub async fn step(&mut self, now: Instant) {
        let fresh = self
            .connection
            .maintain(&mut self.session, &self.link, &self.registry, now)
            .await;
        if fresh {
            self.start_modules().await;
        }

        self.poll_inbound(now).await;
        self.connection.heartbeat(&mut self.session, now).await;
        self.check_button(now);

        self.run_due_ticks(now).await;
        self.run_immediate_ticks(now).await;

        self.drain_injected().await;
    }

    /// Runs the node forever: step, short pause, repeat.
    pub async fn run(&mut self) -> ! {
        loop {
            self.step(Instant::now()).await;
            Timer::after(LOOP_PAUSE).await;
        }
    }

    async fn start_modules(&mut self) {
        for index in 0..self.modules.len() {
            {
                let Self {
                    modules,
                    state,
                    outbox,
                    ..
                } = self;
                modules[index].on_start(state, outbox);
            }
            self.flush_outbox().await;
        }
    }

    async fn run_due_ticks(&mut self, now: Instant) {
        for index in 0..self.modules.len() {
            if now >= self.deadlines[index] {
                self.tick_module(index, now).await;
            }
        }
    }

    async fn run_immediate_ticks(&mut self, now: Instant) {
        for index in 0..self.modules.len() {
            if self.modules[index].needs_immediate_tick(&self.state) {
                self.tick_module(index, now).await;
            }
        }
    }

    async fn tick_module(&mut self, index: usize, now: Instant) {
        let next = {
            let Self {
                modules,
                state,
                outbox,
                ..
            } = self;
            modules[index].on_tick(state, outbox, now)
        };
        self.deadlines[index] = now + next;
        self.flush_outbox().await;
    }

    /// Drains the outbox through the session. Failures are logged and the
    /// request dropped; while offline the drop is silent apart from a debug
    /// line, per the node's error policy.
    async fn flush_outbox(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        let Self {
            session, outbox, ..
        } = self;
        for request in outbox.requests() {
            if !session.is_connected() {
                debug!("offline, dropping publish to {}", request.topic);
                continue;
            }
            if let Err(e) = session
                .publish(request.topic.as_str(), &request.payload, request.retain)
                .await
            {
                warn!("publish to {} failed: {:?}", request.topic, e);
            }
        }
        outbox.clear();
    }

    /// Polls the session for one inbound command, bounded by
    /// [`INBOUND_POLL_BUDGET`], and broadcasts it to every module.
    async fn poll_inbound(&mut self, now: Instant) {
        if !self.session.is_connected() {
            return;
        }
        let Self {
            session,
            recv_buf,
            modules,
            state,
            ..
        } = self;

        let poll = session.poll(recv_buf);
        let budget = Timer::after(INBOUND_POLL_BUDGET);
        match select(pin!(poll), pin!(budget)).await {
            Either::Left((Ok(Some(message)), _)) => {
                debug!(
                    "command on {} ({} bytes)",
                    message.topic,
                    message.payload.len()
                );
                for module in modules.iter_mut() {
                    module.on_message(&message, state, now);
                }
            }
            Either::Left((Ok(None), _)) => {}
            Either::Left((Err(e), _)) => warn!("inbound poll failed: {:?}", e),
            Either::Right(((), _)) => debug!("inbound poll exceeded budget"),
        }
    }

    fn check_button(&mut self, now: Instant) {
        let pressed = match self.button.is_low() {
            Ok(level) => level,
            Err(e) => {
                warn!("button read failed: {:?}", e);
                return;
            }
        };
        if self.debounce.update(pressed, now) == Some(true) {
            info!("reset button pressed");
            self.state.reset_requested = true;
        }
    }

    async fn drain_injected(&mut self) {
        let Self {
            session, inject_rx, ..
        } = self;
        let Some(rx) = inject_rx else {
            return;
        };
        while let Ok(request) = rx.try_receive() {
            if !session.is_connected() {
                debug!("offline, dropping injected publish to {}", request.topic);
                continue;
            }
            if let Err(e) = session
                .publish(request.topic, request.payload, request.retain)
                .await
            {
                warn!("injected publish to {} failed: {:?}", request.topic, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionManager, ConnectionOptions};
    use crate::error::ConnectReasonCode;
    use crate::modules::{ClimateModule, PowerModule, RelayModule};
    use crate::peripherals::{ClimateReading, PowerReading};
    use crate::runtime::publisher::{PublishRequestChannel, PublisherHandle};
    use crate::runtime::traits::NoopModule;
    use crate::testing::{FakeClimate, FakeLink, FakeMeter, FakePin, FakeSession, SharedPin};
    use crate::topics::TopicSet;
    use embassy_sync::channel::Channel;
    use futures::executor::block_on;

    type Runtime<'a> = NodeRuntime<'a, FakeSession, FakeLink, SharedPin>;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn manager() -> ConnectionManager<'static> {
        ConnectionManager::new(ConnectionOptions::new("node-test", "home/system/mqtt"))
    }

    fn sample() -> PowerReading {
        PowerReading {
            voltage_v: 230.0,
            current_a: 0.5,
            power_w: 115.0,
            energy_kwh: 1.5,
            frequency_hz: 50.0,
            power_factor: 0.99,
        }
    }

    #[test]
    fn first_step_connects_subscribes_and_announces() {
        let mut relay = RelayModule::new(FakePin::new(false), &TopicSet::HOME);
        let mut power = PowerModule::new(
            FakeMeter::new(sample()),
            FakePin::new(false),
            &TopicSet::HOME,
        );

        let mut runtime: Runtime<'_> = NodeRuntime::new(
            FakeSession::new(),
            FakeLink { up: true },
            SharedPin::new(true),
            manager(),
            at(0),
        );
        assert!(runtime.add_module(&mut relay));
        assert!(runtime.add_module(&mut power));

        block_on(runtime.step(at(0)));

        let session = runtime.session();
        assert!(session.connected);
        assert_eq!(session.subscribed, ["home/relay/control", "home/pzem/reset"]);

        // Online announcement, retained relay status from on_start, and the
        // first round of meter readings.
        let status = session.published_on("home/system/mqtt");
        assert_eq!(status[0].payload, b"1");
        assert!(status[0].retain);
        let relay_status = session.published_on("home/relay/status");
        assert_eq!(relay_status[0].payload, b"OFF");
        assert!(relay_status[0].retain);
        assert_eq!(session.published_on("home/voltage").len(), 1);
    }

    #[test]
    fn inbound_command_applies_and_announces_in_the_same_step() {
        let mut relay = RelayModule::new(FakePin::new(false), &TopicSet::HOME);

        let mut session = FakeSession::new();
        session.queue_inbound("home/relay/control", b"ON");

        let mut runtime: Runtime<'_> = NodeRuntime::new(
            session,
            FakeLink { up: true },
            SharedPin::new(true),
            manager(),
            at(0),
        );
        runtime.add_module(&mut relay);

        block_on(runtime.step(at(0)));

        assert!(runtime.state().snapshot.relay_on);
        let session = runtime.session();
        let statuses = session.published_on("home/relay/status");
        assert_eq!(statuses.last().unwrap().payload, b"ON");
        let events = session.published_on("home/relay/event");
        assert_eq!(events.len(), 1);
        assert!(!events[0].retain);
    }

    #[test]
    fn debounced_button_press_starts_the_reset_sequence() {
        let mut power = PowerModule::new(
            FakeMeter::new(sample()),
            FakePin::new(false),
            &TopicSet::HOME,
        );

        let button = SharedPin::new(true);
        let mut runtime: Runtime<'_> = NodeRuntime::new(
            FakeSession::new(),
            FakeLink { up: true },
            button.clone(),
            manager(),
            at(0),
        );
        runtime.add_module(&mut power);

        block_on(runtime.step(at(0)));

        // Press and hold through the debounce interval.
        button.set_level(false);
        block_on(runtime.step(at(10)));
        assert!(runtime.state().notice.is_none());
        block_on(runtime.step(at(60)));
        assert_eq!(runtime.state().notice.unwrap().top, "RESETTING...");

        // The counter clears after the settle delay.
        block_on(runtime.step(at(560)));
        let session = runtime.session();
        let results = session.published_on("home/pzem/status");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].payload, b"RESET_SUCCESS");
        assert_eq!(session.published_on("home/energy").last().unwrap().payload, b"0.000");
    }

    #[test]
    fn offline_steps_tick_modules_and_drop_publishes() {
        let mut climate = ClimateModule::new(
            FakeClimate {
                reading: ClimateReading {
                    temperature_c: 21.5,
                    humidity_pct: 40.0,
                },
            },
            &TopicSet::HOME,
        );

        let mut session = FakeSession::new();
        session.refuse_connect = Some(ConnectReasonCode::ServerUnavailable);

        let mut runtime: Runtime<'_> = NodeRuntime::new(
            session,
            FakeLink { up: true },
            SharedPin::new(true),
            manager(),
            at(0),
        );
        runtime.add_module(&mut climate);

        block_on(runtime.step(at(0)));
        block_on(runtime.step(at(2_000)));

        // The snapshot keeps updating for the display; nothing reaches the
        // broker and nothing crashes.
        assert_eq!(runtime.state().snapshot.temperature, 21.5);
        assert!(runtime.session().published.is_empty());
    }

    #[test]
    fn reset_executes_while_disconnected_without_publishing() {
        let mut power = PowerModule::new(
            FakeMeter::new(sample()),
            FakePin::new(false),
            &TopicSet::HOME,
        );

        let mut session = FakeSession::new();
        session.refuse_connect = Some(ConnectReasonCode::ServerUnavailable);

        let button = SharedPin::new(true);
        let mut runtime: Runtime<'_> = NodeRuntime::new(
            session,
            FakeLink { up: true },
            button.clone(),
            manager(),
            at(0),
        );
        runtime.add_module(&mut power);

        block_on(runtime.step(at(0)));
        button.set_level(false);
        block_on(runtime.step(at(10)));
        block_on(runtime.step(at(60)));
        block_on(runtime.step(at(560)));

        // The sequence does not gate on connectivity: it ran to the result
        // screen, while the status publish was dropped.
        assert_eq!(runtime.state().notice.unwrap().top, "RESET SUCCESS!");
        assert!(runtime.session().published.is_empty());
    }

    #[test]
    fn injected_publishes_drain_through_the_session() {
        static CHANNEL: PublishRequestChannel<'static, PUBLISH_QUEUE_DEPTH> = Channel::new();

        let mut noop = NoopModule;
        let mut runtime: Runtime<'_> = NodeRuntime::new(
            FakeSession::new(),
            FakeLink { up: true },
            SharedPin::new(true),
            manager(),
            at(0),
        );
        runtime.add_module(&mut noop);
        runtime.attach_publisher(CHANNEL.receiver());

        let handle = PublisherHandle::new(CHANNEL.sender());
        assert!(handle.try_publish("home/system/note", b"hello", false));

        block_on(runtime.step(at(0)));

        let notes = runtime.session().published_on("home/system/note");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].payload, b"hello");
    }
}
