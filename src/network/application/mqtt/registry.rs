//! Topic to command-table registry.
//!
//! Each subscription the session makes is recorded together with the
//! commands that may arrive on its topic. An inbound PUBLISH is matched by
//! exact topic comparison (no wildcard expansion) and its payload is then
//! compared against the command names of the matching entry.
//!
//! # Examples
//!
//! ```rust
//! use smartled_mqtt::network::application::mqtt::{
//!     Command, PublishPacket, QoS, SubscriptionEntry, SubscriptionRegistry,
//! };
//!
//! fn led_on(_publish: &PublishPacket) {}
//! fn led_off(_publish: &PublishPacket) {}
//!
//! const LED_COMMANDS: &[Command] = &[
//!     Command { name: "on", handler: led_on },
//!     Command { name: "off", handler: led_off },
//! ];
//!
//! let mut registry = SubscriptionRegistry::new();
//! let entry = SubscriptionEntry::new("home/led", QoS::AtLeastOnce, LED_COMMANDS).unwrap();
//! registry.insert(entry).unwrap();
//!
//! let entry = registry.match_topic("home/led").unwrap();
//! assert_eq!(entry.matching_commands(b"on").count(), 1);
//! assert!(registry.match_topic("home/+").is_none());
//! ```

use heapless::{String, Vec};

use super::error::RegistryError;
use super::packet::{MAX_TOPIC_LEN, PublishPacket, QoS};

/// Maximum number of commands attached to one subscription.
pub const MAX_COMMANDS: usize = 10;
/// Maximum number of subscriptions held by a registry.
pub const MAX_SUBSCRIPTIONS: usize = 8;

/// Type alias for command handler functions.
///
/// The handler receives the PUBLISH that triggered it and runs synchronously
/// on the session's read loop, so it should return quickly.
pub type CommandFn = fn(publish: &PublishPacket);

/// A named command.
///
/// A command fires when a PUBLISH payload equals its name byte for byte.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    /// Payload that triggers the command, e.g. `"on"`.
    pub name: &'static str,
    /// Function called with the triggering PUBLISH.
    pub handler: CommandFn,
}

/// A recorded subscription and its commands.
///
/// Entries are immutable once created and live as long as the registry.
#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    topic: String<MAX_TOPIC_LEN>,
    qos: QoS,
    commands: Vec<Command, MAX_COMMANDS>,
}

impl SubscriptionEntry {
    /// Creates an entry, copying the topic and the command table.
    pub fn new(topic: &str, qos: QoS, commands: &[Command]) -> Result<Self, RegistryError> {
        if topic.is_empty() {
            return Err(RegistryError::EmptyTopic);
        }
        let topic = String::try_from(topic).map_err(|_| RegistryError::TopicTooLong)?;
        let commands = Vec::from_slice(commands).map_err(|_| RegistryError::TooManyCommands)?;
        Ok(Self {
            topic,
            qos,
            commands,
        })
    }

    /// The subscribed topic filter.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The requested QoS.
    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// The command table in registration order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Commands whose name equals `payload`, in registration order.
    pub fn matching_commands<'s>(
        &'s self,
        payload: &'s [u8],
    ) -> impl Iterator<Item = &'s Command> + 's {
        self.commands
            .iter()
            .filter(move |command| command.name.as_bytes() == payload)
    }
}

/// Ordered collection of [`SubscriptionEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry, MAX_SUBSCRIPTIONS>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends an entry.
    ///
    /// A topic that is already registered is rejected with
    /// [`RegistryError::Duplicate`] so lookups stay unambiguous.
    pub fn insert(&mut self, entry: SubscriptionEntry) -> Result<(), RegistryError> {
        if self.match_topic(entry.topic()).is_some() {
            return Err(RegistryError::Duplicate);
        }
        self.entries.push(entry).map_err(|_| RegistryError::Full)
    }

    /// Finds the entry whose topic equals `topic` exactly.
    pub fn match_topic(&self, topic: &str) -> Option<&SubscriptionEntry> {
        self.entries.iter().find(|entry| entry.topic() == topic)
    }

    /// Number of recorded subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No subscription recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// No further subscription can be recorded.
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SubscriptionEntry> {
        self.entries.iter()
    }
}
