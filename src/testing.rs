//! Shared fakes for unit tests: a scriptable session, link, peripherals,
//! and pins. Everything records what the core did to it, so tests assert
//! on observable behavior with an injected clock.

use core::net::Ipv4Addr;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};

use crate::error::{ConnectReasonCode, SessionError};
use crate::peripherals::{
    ClimateReading, ClimateSensor, DisplayOutput, PowerMeter, PowerReading, SystemMonitor,
};
use crate::session::{ConnectRequest, InboundMessage, MqttSession, NetworkLink, QoS};

/// Transport error type used by every fake.
#[derive(Debug)]
pub struct FakeError;

/// One publish observed by the fake session.
#[derive(Debug, Clone)]
pub struct PublishedRecord {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// One connect request observed by the fake session.
#[derive(Debug, Clone)]
pub struct ConnectRecord {
    pub client_id: String,
    pub username: Option<String>,
    pub keep_alive_secs: u16,
    pub will_topic: String,
    pub will_payload: Vec<u8>,
    pub will_qos: QoS,
    pub will_retain: bool,
}

/// Scriptable MQTT session: records traffic, delivers queued inbound
/// messages, and fails on demand.
#[derive(Debug, Default)]
pub struct FakeSession {
    pub connected: bool,
    pub refuse_connect: Option<ConnectReasonCode>,
    pub fail_subscribe: Vec<String>,
    pub fail_publish: bool,

    pub connect_requests: Vec<ConnectRecord>,
    pub subscribed: Vec<String>,
    pub published: Vec<PublishedRecord>,
    pub inbound: VecDeque<(String, Vec<u8>)>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back((topic.into(), payload.to_vec()));
    }

    /// Publishes observed on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<&PublishedRecord> {
        self.published.iter().filter(|p| p.topic == topic).collect()
    }
}

impl MqttSession for FakeSession {
    type TransportError = FakeError;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(
        &mut self,
        request: &ConnectRequest<'_>,
    ) -> Result<(), SessionError<FakeError>> {
        self.connect_requests.push(ConnectRecord {
            client_id: request.client_id.into(),
            username: request.credentials.map(|c| c.username.into()),
            keep_alive_secs: request.keep_alive_secs,
            will_topic: request.will.topic.into(),
            will_payload: request.will.payload.to_vec(),
            will_qos: request.will.qos,
            will_retain: request.will.retain,
        });
        if let Some(code) = self.refuse_connect {
            return Err(SessionError::Refused(code));
        }
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError<FakeError>> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.fail_subscribe.iter().any(|t| t == topic) {
            return Err(SessionError::Transport(FakeError));
        }
        self.subscribed.push(topic.into());
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), SessionError<FakeError>> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.fail_publish {
            return Err(SessionError::Transport(FakeError));
        }
        self.published.push(PublishedRecord {
            topic: topic.into(),
            payload: payload.to_vec(),
            retain,
        });
        Ok(())
    }

    async fn poll<'m>(
        &mut self,
        buf: &'m mut [u8],
    ) -> Result<Option<InboundMessage<'m>>, SessionError<FakeError>> {
        let Some((topic, payload)) = self.inbound.pop_front() else {
            return Ok(None);
        };
        if topic.len() + payload.len() > buf.len() {
            return Err(SessionError::Transport(FakeError));
        }
        let (topic_buf, rest) = buf.split_at_mut(topic.len());
        topic_buf.copy_from_slice(topic.as_bytes());
        rest[..payload.len()].copy_from_slice(&payload);
        Ok(Some(InboundMessage {
            topic: core::str::from_utf8(topic_buf).unwrap(),
            payload: &rest[..payload.len()],
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FakeLink {
    pub up: bool,
}

impl NetworkLink for FakeLink {
    fn is_up(&self) -> bool {
        self.up
    }
}

#[derive(Debug)]
pub struct FakeClimate {
    pub reading: ClimateReading,
}

impl ClimateSensor for FakeClimate {
    fn read(&mut self) -> ClimateReading {
        self.reading
    }
}

#[derive(Debug)]
pub struct FakeMeter {
    pub reading: PowerReading,
    pub reset_ok: bool,
    pub resets: usize,
}

impl FakeMeter {
    pub fn new(reading: PowerReading) -> Self {
        Self {
            reading,
            reset_ok: true,
            resets: 0,
        }
    }
}

impl PowerMeter for FakeMeter {
    type Error = FakeError;

    fn read(&mut self) -> PowerReading {
        self.reading
    }

    fn reset_energy(&mut self) -> Result<(), FakeError> {
        self.resets += 1;
        if self.reset_ok { Ok(()) } else { Err(FakeError) }
    }
}

#[derive(Debug)]
pub struct FakeMonitor {
    pub rssi: i32,
    pub ip: Option<Ipv4Addr>,
    pub heap_kb: u32,
}

impl SystemMonitor for FakeMonitor {
    fn rssi_dbm(&mut self) -> i32 {
        self.rssi
    }

    fn ip_address(&mut self) -> Option<Ipv4Addr> {
        self.ip
    }

    fn free_heap_kb(&mut self) -> u32 {
        self.heap_kb
    }
}

#[derive(Debug, Default)]
pub struct FakeDisplay {
    pub frames: Vec<(String, String)>,
}

impl FakeDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplayOutput for FakeDisplay {
    fn show(&mut self, top: &str, bottom: &str) {
        self.frames.push((top.into(), bottom.into()));
    }
}

/// Output/stateful pin recording every write; also usable as an input pin
/// (the reset button) by scripting `level_high`.
#[derive(Debug)]
pub struct FakePin {
    pub level_high: bool,
    pub history: Vec<bool>,
}

impl FakePin {
    pub fn new(level_high: bool) -> Self {
        Self {
            level_high,
            history: Vec::new(),
        }
    }
}

impl ErrorType for FakePin {
    type Error = core::convert::Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level_high = false;
        self.history.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level_high = true;
        self.history.push(true);
        Ok(())
    }
}

impl StatefulOutputPin for FakePin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level_high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level_high)
    }
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level_high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level_high)
    }
}

/// Input pin with a shared level, so a test can hold one handle while the
/// runtime owns the other (the pull-up button: high = released).
#[derive(Debug, Clone)]
pub struct SharedPin {
    level_high: std::rc::Rc<core::cell::Cell<bool>>,
}

impl SharedPin {
    pub fn new(level_high: bool) -> Self {
        Self {
            level_high: std::rc::Rc::new(core::cell::Cell::new(level_high)),
        }
    }

    pub fn set_level(&self, high: bool) {
        self.level_high.set(high);
    }
}

impl ErrorType for SharedPin {
    type Error = core::convert::Infallible;
}

impl InputPin for SharedPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level_high.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level_high.get())
    }
}
