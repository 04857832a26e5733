//! # MQTT Session and Network Link Seams
//!
//! This module defines the `MqttSession` trait, which abstracts the broker
//! session (connect with Last-Will, subscribe, publish, inbound delivery),
//! and the `NetworkLink` trait, which answers the single question the
//! reconnect logic asks of the network stack: is the link usable right now?
//!
//! The wire protocol, TLS, and TCP live below `MqttSession`; the node core
//! only consumes success/failure results and payload bytes. With the Rust
//! 2024 Edition both traits use native `async fn`, removing the need for the
//! `#[async_trait]` macro.

use crate::error::SessionError;

/// Represents the Quality of Service (QoS) levels for MQTT messages.
///
/// Regular node publishes go out at QoS 0; the enum exists so the Last-Will
/// registration can request QoS 1 delivery of the offline announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// Username/password pair passed through to the broker on connect.
#[derive(Debug, Clone, Copy)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// A Last-Will registration carried in the connect request.
///
/// The broker publishes `payload` on `topic` if this session drops
/// uncleanly, announcing the node offline without its cooperation.
#[derive(Debug, Clone, Copy)]
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
}

/// Everything a session implementation needs to issue a CONNECT.
#[derive(Debug, Clone, Copy)]
pub struct ConnectRequest<'a> {
    /// Client identifier, typically derived from the hardware address.
    pub client_id: &'a str,
    /// Optional broker credentials.
    pub credentials: Option<Credentials<'a>>,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Last-Will registration. Always present: a node that connects without
    /// announcing its own death is indistinguishable from a healthy one.
    pub will: Will<'a>,
}

/// An inbound application message delivered by [`MqttSession::poll`].
///
/// Borrows from the caller-provided buffer, not from the session.
#[derive(Debug, Clone, Copy)]
pub struct InboundMessage<'m> {
    pub topic: &'m str,
    pub payload: &'m [u8],
}

/// A trait representing an MQTT broker session.
///
/// Implementations own the client, its transport, and the protocol
/// housekeeping (keep-alive pings, acknowledgements). The node core drives
/// the session strictly from its single cooperative loop, so no method is
/// ever called re-entrantly.
#[allow(async_fn_in_trait)]
pub trait MqttSession {
    /// The error type produced by the underlying transport/protocol stack.
    type TransportError: core::fmt::Debug;

    /// Whether the session currently holds a live broker connection.
    fn is_connected(&self) -> bool;

    /// Establishes a connection as described by `request`.
    async fn connect(
        &mut self,
        request: &ConnectRequest<'_>,
    ) -> Result<(), SessionError<Self::TransportError>>;

    /// Subscribes to a single topic filter.
    async fn subscribe(
        &mut self,
        topic: &str,
    ) -> Result<(), SessionError<Self::TransportError>>;

    /// Publishes `payload` to `topic` at QoS 0 with the given retain flag.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), SessionError<Self::TransportError>>;

    /// Services protocol I/O and returns at most one pending inbound
    /// application message, copied into `buf`.
    ///
    /// Must return promptly when nothing is pending and must be
    /// cancel-safe: the runtime bounds each poll with a timer and may drop
    /// the future.
    async fn poll<'m>(
        &mut self,
        buf: &'m mut [u8],
    ) -> Result<Option<InboundMessage<'m>>, SessionError<Self::TransportError>>;
}

/// A trait answering whether the underlying network link is usable.
///
/// The reconnect gate consults this before spending a connect attempt; a
/// down link defers the attempt without consuming the retry interval.
pub trait NetworkLink {
    fn is_up(&self) -> bool;
}

/// `embassy-net` stack implementation: the link is usable once the
/// interface is up and configuration (DHCP or static) has completed.
impl NetworkLink for embassy_net::Stack<'_> {
    fn is_up(&self) -> bool {
        self.is_link_up() && self.is_config_up()
    }
}
