//! Runs the node core on the host with simulated peripherals.
//!
//! The session prints outbound traffic instead of talking to a broker, the
//! meter and climate sensor replay slowly drifting values, and the display
//! frames go to stdout. Demonstrates the full wiring: modules, connection
//! manager, runtime, and an injected publish.
//!
//! ```sh
//! cargo run --example simulated_node
//! ```

use core::net::Ipv4Addr;

use embassy_time::Instant;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, StatefulOutputPin};
use futures::executor::block_on;

use powernode::connection::{ConnectionManager, ConnectionOptions};
use powernode::error::SessionError;
use powernode::modules::{
    ClimateModule, DisplayModule, PowerModule, RelayModule, SystemInfoModule, ThermalLimits,
};
use powernode::peripherals::{
    ClimateReading, ClimateSensor, DisplayOutput, PowerMeter, PowerReading, SystemMonitor,
};
use powernode::runtime::{NodeRuntime, PublishRequestChannel, PublisherHandle, PUBLISH_QUEUE_DEPTH};
use powernode::session::{ConnectRequest, InboundMessage, MqttSession, NetworkLink};
use powernode::topics::TopicSet;

#[derive(Debug)]
struct SimError;

/// Broker session that logs traffic to stdout and feeds one scripted
/// relay command back to the node.
struct SimSession {
    connected: bool,
    scripted: Vec<(&'static str, &'static [u8])>,
}

impl MqttSession for SimSession {
    type TransportError = SimError;

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(
        &mut self,
        request: &ConnectRequest<'_>,
    ) -> Result<(), SessionError<SimError>> {
        println!(
            "[broker] CONNECT {} (will {} -> {:?})",
            request.client_id,
            request.will.topic,
            core::str::from_utf8(request.will.payload).unwrap_or("?")
        );
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError<SimError>> {
        println!("[broker] SUBSCRIBE {}", topic);
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), SessionError<SimError>> {
        println!(
            "[broker] PUBLISH {} {} {}",
            topic,
            core::str::from_utf8(payload).unwrap_or("<bytes>"),
            if retain { "(retained)" } else { "" }
        );
        Ok(())
    }

    async fn poll<'m>(
        &mut self,
        buf: &'m mut [u8],
    ) -> Result<Option<InboundMessage<'m>>, SessionError<SimError>> {
        let Some((topic, payload)) = self.scripted.pop() else {
            return Ok(None);
        };
        let (topic_buf, rest) = buf.split_at_mut(topic.len());
        topic_buf.copy_from_slice(topic.as_bytes());
        rest[..payload.len()].copy_from_slice(payload);
        Ok(Some(InboundMessage {
            topic: core::str::from_utf8(topic_buf).unwrap(),
            payload: &rest[..payload.len()],
        }))
    }
}

struct SimLink;

impl NetworkLink for SimLink {
    fn is_up(&self) -> bool {
        true
    }
}

#[derive(Default)]
struct SimPin {
    high: bool,
}

impl ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

impl StatefulOutputPin for SimPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

struct SimClimate {
    t: f32,
}

impl ClimateSensor for SimClimate {
    fn read(&mut self) -> ClimateReading {
        self.t += 0.05;
        ClimateReading {
            temperature_c: 24.0 + (self.t % 3.0),
            humidity_pct: 58.0 + (self.t % 7.0),
        }
    }
}

struct SimMeter {
    energy: f32,
}

impl PowerMeter for SimMeter {
    type Error = SimError;

    fn read(&mut self) -> PowerReading {
        self.energy += 0.001;
        PowerReading {
            voltage_v: 231.2,
            current_a: 0.52,
            power_w: 119.8,
            energy_kwh: self.energy,
            frequency_hz: 50.0,
            power_factor: 0.97,
        }
    }

    fn reset_energy(&mut self) -> Result<(), SimError> {
        self.energy = 0.0;
        Ok(())
    }
}

struct SimMonitor;

impl SystemMonitor for SimMonitor {
    fn rssi_dbm(&mut self) -> i32 {
        -61
    }

    fn ip_address(&mut self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(192, 168, 1, 23))
    }

    fn free_heap_kb(&mut self) -> u32 {
        187
    }
}

#[derive(Default)]
struct SimDisplay {
    last: (String, String),
}

impl DisplayOutput for SimDisplay {
    fn show(&mut self, top: &str, bottom: &str) {
        if self.last.0 != top || self.last.1 != bottom {
            println!("[lcd] |{:<16}|{:<16}|", top, bottom);
            self.last = (top.into(), bottom.into());
        }
    }
}

static PUBLISH_CHANNEL: PublishRequestChannel<'static, PUBLISH_QUEUE_DEPTH> =
    PublishRequestChannel::new();

fn main() {
    let mut climate = ClimateModule::new(SimClimate { t: 0.0 }, &TopicSet::HOME)
        .with_thermal_cutoff(ThermalLimits::default());
    let mut power = PowerModule::new(SimMeter { energy: 4.2 }, SimPin::default(), &TopicSet::HOME);
    let mut sysinfo = SystemInfoModule::new(SimMonitor, &TopicSet::HOME);
    let mut relay = RelayModule::new(SimPin::default(), &TopicSet::HOME);
    let mut display = DisplayModule::new(SimDisplay::default());

    let session = SimSession {
        connected: false,
        scripted: vec![("home/relay/control", b"ON" as &[u8])],
    };
    let options =
        ConnectionOptions::new("powernode-sim", TopicSet::HOME.status).with_credentials("sim", "sim");

    let mut runtime: NodeRuntime<_, _, _> = NodeRuntime::new(
        session,
        SimLink,
        SimPin { high: true },
        ConnectionManager::new(options),
        Instant::now(),
    );
    runtime.add_module(&mut climate);
    runtime.add_module(&mut power);
    runtime.add_module(&mut sysinfo);
    runtime.add_module(&mut relay);
    runtime.add_module(&mut display);
    runtime.attach_publisher(PUBLISH_CHANNEL.receiver());

    // Something a firmware task outside the runtime might say.
    let handle = PublisherHandle::new(PUBLISH_CHANNEL.sender());
    handle.try_publish("home/system/note", b"simulation online", false);

    // Ten simulated seconds.
    block_on(async {
        for _ in 0..1000 {
            runtime.step(Instant::now()).await;
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    });
}
