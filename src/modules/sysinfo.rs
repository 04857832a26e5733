//! System info publisher: RSSI, IP, uptime, and free heap, one metric per
//! tick in a fixed round-robin.

use embassy_time::{Duration, Instant};
use log::debug;

use crate::format;
use crate::peripherals::SystemMonitor;
use crate::runtime::{NodeModule, PublishOutbox, TopicCollector};
use crate::session::InboundMessage;
use crate::state::NodeState;
use crate::topics::TopicSet;

/// Publish cadence; one sub-metric per tick.
pub const SYSTEM_INFO_INTERVAL: Duration = Duration::from_millis(5000);

const METRIC_COUNT: u8 = 4;

/// Rotates through the four system metrics. The address is retained so a
/// dashboard can find the node immediately; the rest are plain samples.
pub struct SystemInfoModule<M: SystemMonitor> {
    monitor: M,
    topics: &'static TopicSet,
    cursor: u8,
}

impl<M: SystemMonitor> SystemInfoModule<M> {
    pub fn new(monitor: M, topics: &'static TopicSet) -> Self {
        Self {
            monitor,
            topics,
            cursor: 0,
        }
    }
}

impl<M: SystemMonitor> NodeModule for SystemInfoModule<M> {
    fn register(&self, _collector: &mut dyn TopicCollector) {}

    fn on_message(&mut self, _msg: &InboundMessage<'_>, _state: &mut NodeState, _now: Instant) {}

    fn on_tick(
        &mut self,
        _state: &mut NodeState,
        outbox: &mut dyn PublishOutbox,
        now: Instant,
    ) -> Duration {
        match self.cursor {
            0 => outbox.publish(
                self.topics.system_rssi,
                format::integer(self.monitor.rssi_dbm() as i64).as_bytes(),
                false,
            ),
            1 => match self.monitor.ip_address() {
                Some(addr) => {
                    outbox.publish(self.topics.system_ip, format::dotted(addr).as_bytes(), true)
                }
                None => debug!("no local address yet, skipping publish"),
            },
            2 => outbox.publish(
                self.topics.system_uptime,
                format::integer(now.as_secs() as i64).as_bytes(),
                false,
            ),
            _ => outbox.publish(
                self.topics.system_heap,
                format::integer(self.monitor.free_heap_kb() as i64).as_bytes(),
                false,
            ),
        }
        self.cursor = (self.cursor + 1) % METRIC_COUNT;
        SYSTEM_INFO_INTERVAL
    }
}
