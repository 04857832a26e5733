//! Publish request handling and outbox implementations.
//!
//! Two paths feed the session with outbound messages:
//!
//! - [`BufferedOutbox`] collects requests synchronously during module
//!   callbacks; the runtime drains it immediately afterwards.
//! - [`PublisherHandle`] wraps a channel sender so firmware tasks outside
//!   the runtime (an OTA agent, a diagnostics console) can inject
//!   publishes; the runtime drains the channel once per scheduler tick.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::Vec;

use super::traits::PublishOutbox;

/// Depth of the cross-task publish channel.
pub const PUBLISH_QUEUE_DEPTH: usize = 8;

/// A request to publish a message, sent via channel from other tasks to the
/// runtime.
///
/// Holds references to the topic and payload, which must outlive the
/// request. For static topics/payloads (common in firmware), use `'static`.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    /// The topic to publish to.
    pub topic: &'a str,
    /// The payload bytes.
    pub payload: &'a [u8],
    /// Broker retain flag.
    pub retain: bool,
}

pub type PublishRequestChannel<'a, const DEPTH: usize> =
    Channel<CriticalSectionRawMutex, PublishRequest<'a>, DEPTH>;

pub type PublishRequestSender<'a, const DEPTH: usize> =
    Sender<'a, CriticalSectionRawMutex, PublishRequest<'a>, DEPTH>;

pub type PublishRequestReceiver<'a, const DEPTH: usize> =
    Receiver<'a, CriticalSectionRawMutex, PublishRequest<'a>, DEPTH>;

/// A handle that lets tasks publish MQTT messages without access to the
/// session. Cloneable; the runtime performs the actual publish.
#[derive(Clone, Copy)]
pub struct PublisherHandle<'a, const DEPTH: usize> {
    tx: PublishRequestSender<'a, DEPTH>,
}

impl<'a, const DEPTH: usize> PublisherHandle<'a, DEPTH> {
    /// Create a new `PublisherHandle` from a channel sender.
    pub fn new(tx: PublishRequestSender<'a, DEPTH>) -> Self {
        Self { tx }
    }

    /// Publish a message, waiting if the channel is full.
    pub async fn publish(&self, topic: &'a str, payload: &'a [u8], retain: bool) {
        self.tx
            .send(PublishRequest {
                topic,
                payload,
                retain,
            })
            .await;
    }

    /// Try to publish without waiting. Returns `false` if the channel is
    /// full.
    pub fn try_publish(&self, topic: &'a str, payload: &'a [u8], retain: bool) -> bool {
        self.tx
            .try_send(PublishRequest {
                topic,
                payload,
                retain,
            })
            .is_ok()
    }
}

/// An owned publish request with inline storage for topic and payload, so
/// the outbox can hold requests after the module's borrowed data is gone.
#[derive(Debug, Clone)]
pub struct OwnedPublishRequest<const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> {
    pub topic: heapless::String<TOPIC_SIZE>,
    pub payload: heapless::Vec<u8, PAYLOAD_SIZE>,
    pub retain: bool,
}

/// A buffered outbox that collects publish requests during module
/// callbacks.
///
/// Requests that do not fit (outbox full, topic or payload too large) are
/// dropped; there is no retry path for them, by the same contract as a
/// failed publish. The runtime clears the buffer after every drain.
#[derive(Debug, Default)]
pub struct BufferedOutbox<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
{
    requests: Vec<OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, CAPACITY>,
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// The buffered requests, in queue order.
    pub fn requests(&self) -> &[OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>] {
        &self.requests
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> PublishOutbox
    for BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) {
        let mut topic_str = heapless::String::new();
        if topic_str.push_str(topic).is_err() {
            log::debug!("outbox: topic too long, dropping {}", topic);
            return;
        }

        let mut payload_vec = heapless::Vec::new();
        if payload_vec.extend_from_slice(payload).is_err() {
            log::debug!("outbox: payload too large, dropping {}", topic);
            return;
        }

        if self
            .requests
            .push(OwnedPublishRequest {
                topic: topic_str,
                payload: payload_vec,
                retain,
            })
            .is_err()
        {
            log::debug!("outbox full, dropping publish to {}", topic);
        }
    }
}
