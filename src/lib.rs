//! # Power Monitoring Node Core
//!
//! `powernode` is a `no_std` compatible implementation of an MQTT-connected
//! power and climate monitoring node (power meter, temperature/humidity
//! sensor, relay, reset button, reset-indicator LED, 16×2 display), built
//! upon the [Embassy](https://embassy.dev/) async ecosystem.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Designed to run on bare-metal
//!   microcontrollers without requiring a standard library or dynamic
//!   memory allocation. Buffers are managed using `heapless`.
//! - **Single cooperative loop:** Connection maintenance, command dispatch,
//!   button debouncing, and every periodic publisher run to completion on
//!   one thread of control. Shared state needs no locking.
//! - **Deterministic by construction:** All scheduling takes an explicit
//!   monotonic instant; only the outermost loop reads the wall clock, so
//!   the entire core is unit-testable with an injected clock.
//! - **Session resilience:** Reconnect on a fixed retry gate with a
//!   Last-Will registration, retained online/offline status, and a
//!   periodic heartbeat.
//! - **Hardware behind seams:** The MQTT session, network link, sensors,
//!   system monitor, and display are traits; the relay, LED, and button are
//!   plain `embedded-hal` pins. Rust 2024 Edition native `async fn` in
//!   traits, no `async-trait` macro.
//!
//! ## Architecture
//!
//! Functionality is split into modules implementing the object-safe
//! [`NodeModule`](runtime::NodeModule) trait, driven by the
//! [`NodeRuntime`](runtime::NodeRuntime):
//!
//! ```ignore
//! use powernode::connection::{ConnectionManager, ConnectionOptions};
//! use powernode::modules::{
//!     ClimateModule, DisplayModule, PowerModule, RelayModule, SystemInfoModule, ThermalLimits,
//! };
//! use powernode::runtime::NodeRuntime;
//! use powernode::topics::TopicSet;
//!
//! let mut climate = ClimateModule::new(sht31, &TopicSet::HOME)
//!     .with_thermal_cutoff(ThermalLimits::default());
//! let mut power = PowerModule::new(pzem, reset_led, &TopicSet::HOME);
//! let mut sysinfo = SystemInfoModule::new(wifi_monitor, &TopicSet::HOME);
//! let mut relay = RelayModule::new(relay_pin, &TopicSet::HOME);
//! let mut display = DisplayModule::new(lcd);
//!
//! let options = ConnectionOptions::new(client_id, TopicSet::HOME.status)
//!     .with_credentials(username, password);
//! let mut runtime: NodeRuntime<_, _, _> = NodeRuntime::new(
//!     session,
//!     stack,
//!     button_pin,
//!     ConnectionManager::new(options),
//!     Instant::now(),
//! );
//! runtime.add_module(&mut climate);
//! runtime.add_module(&mut power);
//! runtime.add_module(&mut sysinfo);
//! runtime.add_module(&mut relay);
//! runtime.add_module(&mut display);
//! runtime.run().await
//! ```
//!
//! Modules queue outbound messages on a
//! [`PublishOutbox`](runtime::PublishOutbox) and never touch the session;
//! the runtime drains the outbox after each callback. Inbound commands are
//! broadcast to every module, which filters by topic. Cross-module
//! coordination (the button requesting an energy reset, the thermal guard
//! requesting a relay state) flows through the explicit [`NodeState`]
//! context instead of globals.
//!
//! ## Error Policy
//!
//! Every failure — invalid sensor reading, publish, subscribe, or connect
//! trouble, a down link — is logged via the `log` facade and the affected
//! step is skipped for that cycle. Nothing panics, nothing escalates, and
//! nothing is retried out of band: the periodic schedule is the retry
//! mechanism.

#![cfg_attr(not(test), no_std)]

pub mod button;
pub mod connection;
pub mod error;
pub mod format;
pub mod modules;
pub mod peripherals;
pub mod runtime;
pub mod session;
pub mod state;
pub mod topics;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for easier access at the crate root.
pub use connection::{ConnectionManager, ConnectionOptions};
pub use error::{ConnectReasonCode, SessionError};
pub use runtime::{NodeModule, NodeRuntime, PublisherHandle};
pub use session::{MqttSession, NetworkLink, QoS};
pub use state::{NodeState, SensorSnapshot};
pub use topics::TopicSet;
