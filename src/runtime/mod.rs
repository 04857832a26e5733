//! Node Runtime
//!
//! The cooperative scheduling layer: an object-safe module trait, the
//! control-topic registry, the publish queues, and the event loop that
//! drives connection maintenance, command dispatch, and periodic ticks
//! from a single thread of control.
//!
//! # Design
//!
//! Modules are `&mut dyn NodeModule` trait objects so the runtime carries
//! no per-module type parameters. Module callbacks are synchronous and
//! short; all async I/O (connect, subscribe, publish, inbound poll) happens
//! in the runtime between callbacks. Shared state travels through the
//! explicit [`NodeState`](crate::state::NodeState) context, never through
//! globals.
//!
//! # Timing
//!
//! Every scheduling decision takes an injected `now`, making the whole
//! layer deterministic under test. See `NodeRuntime::step`.

pub(crate) mod event_loop;
pub(crate) mod publisher;
pub(crate) mod registry;
pub(crate) mod traits;

pub use event_loop::{INBOUND_POLL_BUDGET, LOOP_PAUSE, NodeRuntime, OUTBOX_CAPACITY};
pub use publisher::{
    BufferedOutbox, OwnedPublishRequest, PUBLISH_QUEUE_DEPTH, PublishRequest,
    PublishRequestChannel, PublishRequestReceiver, PublishRequestSender, PublisherHandle,
};
pub use registry::{MAX_TOPIC_LEN, TopicRegistry};
pub use traits::{NodeModule, NoopModule, PublishOutbox, TopicCollector};
