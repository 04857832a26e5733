//! Control-topic registration for node modules.

use heapless::{String, Vec};

use super::traits::TopicCollector;

/// Maximum length for a single topic string.
pub const MAX_TOPIC_LEN: usize = 64;

/// The set of control topics the connection manager subscribes to after
/// every successful connect.
///
/// Owns its topic strings (copied on add), which keeps the object-safe
/// `TopicCollector` trait free of lifetime parameters. Filled once at
/// startup while modules register, then only iterated.
#[derive(Debug, Default)]
pub struct TopicRegistry<const MAX_TOPICS: usize> {
    topics: Vec<String<MAX_TOPIC_LEN>, MAX_TOPICS>,
}

impl<const MAX_TOPICS: usize> TopicRegistry<MAX_TOPICS> {
    /// Create a new empty topic registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic by copying the string.
    ///
    /// Returns `true` if successful, `false` if the registry is full or the
    /// topic is too long.
    pub fn add_topic(&mut self, topic: &str) -> bool {
        if topic.len() > MAX_TOPIC_LEN {
            return false;
        }

        let mut owned = String::new();
        if owned.push_str(topic).is_err() {
            return false;
        }

        self.topics.push(owned).is_ok()
    }

    /// Iterate over the registered topics in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl<const MAX_TOPICS: usize> TopicCollector for TopicRegistry<MAX_TOPICS> {
    fn add(&mut self, topic: &str) -> bool {
        self.add_topic(topic)
    }
}
