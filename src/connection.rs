//! # Connection Lifecycle
//!
//! Owns everything about the broker session that is not message traffic:
//! reconnecting with a fixed retry gate, registering the Last-Will,
//! re-subscribing the control topics, announcing the node online, and the
//! periodic heartbeat.
//!
//! The manager is driven once per scheduler tick and never blocks beyond
//! the session calls themselves. Retries are unbounded: a node that cannot
//! reach its broker keeps trying forever, logging as it goes. There is no
//! backoff growth, no jitter, and no giving-up signal; for this class of
//! device the retained status topic (or its absence) is the health surface.

use embassy_time::{Duration, Instant};
use log::{debug, info, warn};

use crate::runtime::TopicRegistry;
use crate::session::{ConnectRequest, Credentials, MqttSession, NetworkLink, QoS, Will};

/// Minimum gap between connect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Interval between retained "online" heartbeats while connected.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default keep-alive passed to the session.
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;

/// Connection parameters. All externally supplied configuration; the
/// defaults cover the status payload convention ("0" offline, "1" online)
/// and the keep-alive.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions<'a> {
    /// Client identifier, typically derived from the hardware address.
    pub client_id: &'a str,
    /// Optional broker credentials.
    pub credentials: Option<Credentials<'a>>,
    /// Status topic. Doubles as the Last-Will topic.
    pub status_topic: &'a str,
    /// Retained payload announcing the node online.
    pub online_payload: &'a str,
    /// Last-Will payload announcing the node offline.
    pub offline_payload: &'a str,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
}

impl<'a> ConnectionOptions<'a> {
    pub fn new(client_id: &'a str, status_topic: &'a str) -> Self {
        Self {
            client_id,
            credentials: None,
            status_topic,
            online_payload: "1",
            offline_payload: "0",
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
        }
    }

    pub fn with_credentials(mut self, username: &'a str, password: &'a str) -> Self {
        self.credentials = Some(Credentials { username, password });
        self
    }
}

/// Reconnect, Last-Will, and heartbeat state machine.
#[derive(Debug)]
pub struct ConnectionManager<'a> {
    options: ConnectionOptions<'a>,
    last_attempt: Option<Instant>,
    last_heartbeat: Option<Instant>,
    was_connected: bool,
}

impl<'a> ConnectionManager<'a> {
    pub fn new(options: ConnectionOptions<'a>) -> Self {
        Self {
            options,
            last_attempt: None,
            last_heartbeat: None,
            was_connected: false,
        }
    }

    /// Called once per scheduler tick. Detects lost connections after the
    /// fact, and attempts a reconnect when the session is down, the network
    /// link is up, and the retry gate has elapsed.
    ///
    /// Returns `true` only on the tick where a connection was freshly
    /// established, so the runtime can fan out module `on_start` hooks.
    pub async fn maintain<S, L, const MAX_TOPICS: usize>(
        &mut self,
        session: &mut S,
        link: &L,
        registry: &TopicRegistry<MAX_TOPICS>,
        now: Instant,
    ) -> bool
    where
        S: MqttSession,
        L: NetworkLink,
    {
        let connected = session.is_connected();

        if self.was_connected && !connected {
            warn!("MQTT connection lost");
            self.was_connected = false;
        }
        if connected {
            return false;
        }

        if !link.is_up() {
            // Nothing to do until the network comes back; the retry gate is
            // not consumed by a down link.
            return false;
        }
        if !self.attempt_due(now) {
            return false;
        }
        self.last_attempt = Some(now);

        info!("connecting to MQTT broker as {}", self.options.client_id);
        let request = ConnectRequest {
            client_id: self.options.client_id,
            credentials: self.options.credentials,
            keep_alive_secs: self.options.keep_alive_secs,
            will: Will {
                topic: self.options.status_topic,
                payload: self.options.offline_payload.as_bytes(),
                qos: QoS::AtLeastOnce,
                retain: true,
            },
        };

        match session.connect(&request).await {
            Ok(()) => {
                info!("MQTT connected");
                for topic in registry.iter() {
                    // A failed subscription is logged and skipped; the
                    // remaining topics still get their turn.
                    match session.subscribe(topic).await {
                        Ok(()) => debug!("subscribed to {}", topic),
                        Err(e) => warn!("subscribe to {} failed: {:?}", topic, e),
                    }
                }
                self.publish_status(session, self.options.online_payload)
                    .await;
                // The online announcement counts as the first heartbeat.
                self.last_heartbeat = Some(now);
                self.was_connected = true;
                true
            }
            Err(e) => {
                warn!("MQTT connect failed: {:?}", e);
                false
            }
        }
    }

    /// Called once per scheduler tick. Publishes the retained online
    /// payload every [`HEARTBEAT_INTERVAL`] while connected; never fires
    /// while disconnected.
    pub async fn heartbeat<S>(&mut self, session: &mut S, now: Instant)
    where
        S: MqttSession,
    {
        if !session.is_connected() {
            return;
        }
        let due = match self.last_heartbeat {
            None => true,
            Some(t) => now - t >= HEARTBEAT_INTERVAL,
        };
        if !due {
            return;
        }
        self.last_heartbeat = Some(now);
        debug!("publishing heartbeat");
        self.publish_status(session, self.options.online_payload)
            .await;
    }

    /// Retained publish to the status topic. Logged, never retried here;
    /// the next heartbeat or reconnect covers it.
    pub async fn publish_status<S>(&self, session: &mut S, payload: &str) -> bool
    where
        S: MqttSession,
    {
        match session
            .publish(self.options.status_topic, payload.as_bytes(), true)
            .await
        {
            Ok(()) => {
                debug!("status published: {} -> {}", self.options.status_topic, payload);
                true
            }
            Err(e) => {
                warn!("status publish failed: {:?}", e);
                false
            }
        }
    }

    fn attempt_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(t) => now - t >= RECONNECT_DELAY,
        }
    }
}
