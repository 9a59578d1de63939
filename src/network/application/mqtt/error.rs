//! Error types for the MQTT codec, the subscription registry and the client
//! session.

use super::packet::{ConnectReturnCode, PacketType};
use crate::network::error::Error as NetworkError;

/// Failure of a pack or unpack operation.
///
/// Every variant has a stable negative code (see [`Error::code`]) so the
/// result of a decode can still be reported as a single integer on targets
/// that log numeric status words.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Unknown or reserved packet type nibble.
    GenericError,
    /// Fixed-header flags do not match the value the packet type requires.
    IncorrectFlags,
    /// The packet violates a protocol rule or a length does not add up.
    MalformedPacket,
    /// A field does not fit into its fixed-capacity buffer.
    FailedAlloc,
    /// The packet type cannot be used in this position.
    InvalidPacketType,
    /// A read ran past the end of the input buffer.
    OutOfBounds,
    /// QoS 2 was requested; only QoS 0 and 1 are supported.
    QosNotSupported,
    /// A packet identifier of zero was found where a non-zero one is required.
    PacketIdNotAllowed,
    /// A remaining length larger than 268,435,455 cannot be encoded.
    EncodingOverflow,
}

impl Error {
    /// Returns the numeric status code for this error.
    ///
    /// ```rust
    /// use smartled_mqtt::network::application::mqtt::Error;
    ///
    /// assert_eq!(Error::OutOfBounds.code(), -6);
    /// ```
    pub const fn code(self) -> i8 {
        match self {
            Error::GenericError => -1,
            Error::IncorrectFlags => -2,
            Error::MalformedPacket => -3,
            Error::FailedAlloc => -4,
            Error::InvalidPacketType => -5,
            Error::OutOfBounds => -6,
            Error::QosNotSupported => -7,
            Error::PacketIdNotAllowed => -8,
            Error::EncodingOverflow => -9,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::GenericError => "unknown packet type",
            Error::IncorrectFlags => "incorrect fixed header flags",
            Error::MalformedPacket => "malformed packet",
            Error::FailedAlloc => "field exceeds buffer capacity",
            Error::InvalidPacketType => "invalid packet type",
            Error::OutOfBounds => "read past end of buffer",
            Error::QosNotSupported => "QoS level not supported",
            Error::PacketIdNotAllowed => "packet identifier must be non-zero",
            Error::EncodingOverflow => "remaining length too large to encode",
        };
        write!(f, "{} ({})", msg, self.code())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::GenericError => defmt::write!(f, "GenericError"),
            Error::IncorrectFlags => defmt::write!(f, "IncorrectFlags"),
            Error::MalformedPacket => defmt::write!(f, "MalformedPacket"),
            Error::FailedAlloc => defmt::write!(f, "FailedAlloc"),
            Error::InvalidPacketType => defmt::write!(f, "InvalidPacketType"),
            Error::OutOfBounds => defmt::write!(f, "OutOfBounds"),
            Error::QosNotSupported => defmt::write!(f, "QosNotSupported"),
            Error::PacketIdNotAllowed => defmt::write!(f, "PacketIdNotAllowed"),
            Error::EncodingOverflow => defmt::write!(f, "EncodingOverflow"),
        }
    }
}

/// Failure while building a [`SubscriptionRegistry`](super::SubscriptionRegistry).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RegistryError {
    /// The topic filter is empty.
    EmptyTopic,
    /// The topic filter exceeds [`MAX_TOPIC_LEN`](super::MAX_TOPIC_LEN) bytes.
    TopicTooLong,
    /// More commands than [`MAX_COMMANDS`](super::MAX_COMMANDS) were given.
    TooManyCommands,
    /// The topic filter is already registered.
    Duplicate,
    /// The registry already holds [`MAX_SUBSCRIPTIONS`](super::MAX_SUBSCRIPTIONS) entries.
    Full,
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RegistryError::EmptyTopic => write!(f, "topic filter is empty"),
            RegistryError::TopicTooLong => write!(f, "topic filter is too long"),
            RegistryError::TooManyCommands => write!(f, "too many commands for one topic"),
            RegistryError::Duplicate => write!(f, "topic filter already registered"),
            RegistryError::Full => write!(f, "subscription registry is full"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RegistryError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            RegistryError::EmptyTopic => defmt::write!(f, "EmptyTopic"),
            RegistryError::TopicTooLong => defmt::write!(f, "TopicTooLong"),
            RegistryError::TooManyCommands => defmt::write!(f, "TooManyCommands"),
            RegistryError::Duplicate => defmt::write!(f, "Duplicate"),
            RegistryError::Full => defmt::write!(f, "Full"),
        }
    }
}

/// Fatal condition reported by a [`ClientSession`](super::ClientSession).
///
/// Every variant ends the session: the caller is expected to drop the
/// connection and start over.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SessionError {
    /// The transport failed.
    Network(NetworkError),
    /// A packet could not be encoded or decoded.
    Codec(Error),
    /// A subscription could not be recorded.
    Registry(RegistryError),
    /// The JSON configuration could not be parsed.
    InvalidConfig,
    /// The first packet after connecting was not a CONNACK.
    MissingConnack,
    /// A second CONNACK arrived on the same connection.
    DuplicateConnack,
    /// The broker refused the connection.
    ConnectionRefused(ConnectReturnCode),
    /// A PUBLISH arrived for a topic that is not in the registry.
    UnknownTopic,
    /// The broker sent a packet a client never expects.
    UnexpectedPacket(PacketType),
}

impl From<NetworkError> for SessionError {
    fn from(e: NetworkError) -> Self {
        SessionError::Network(e)
    }
}

impl From<Error> for SessionError {
    fn from(e: Error) -> Self {
        SessionError::Codec(e)
    }
}

impl From<RegistryError> for SessionError {
    fn from(e: RegistryError) -> Self {
        SessionError::Registry(e)
    }
}

impl core::fmt::Display for SessionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SessionError::Network(e) => write!(f, "network: {}", e),
            SessionError::Codec(e) => write!(f, "codec: {}", e),
            SessionError::Registry(e) => write!(f, "registry: {}", e),
            SessionError::InvalidConfig => write!(f, "invalid configuration"),
            SessionError::MissingConnack => write!(f, "first packet was not CONNACK"),
            SessionError::DuplicateConnack => write!(f, "duplicate CONNACK"),
            SessionError::ConnectionRefused(code) => {
                write!(f, "connection refused: {:?}", code)
            }
            SessionError::UnknownTopic => write!(f, "publish to unknown topic"),
            SessionError::UnexpectedPacket(t) => write!(f, "unexpected packet {:?}", t),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SessionError::Network(e) => defmt::write!(f, "Network({})", e),
            SessionError::Codec(e) => defmt::write!(f, "Codec({})", e),
            SessionError::Registry(e) => defmt::write!(f, "Registry({})", e),
            SessionError::InvalidConfig => defmt::write!(f, "InvalidConfig"),
            SessionError::MissingConnack => defmt::write!(f, "MissingConnack"),
            SessionError::DuplicateConnack => defmt::write!(f, "DuplicateConnack"),
            SessionError::ConnectionRefused(code) => {
                defmt::write!(f, "ConnectionRefused({})", code)
            }
            SessionError::UnknownTopic => defmt::write!(f, "UnknownTopic"),
            SessionError::UnexpectedPacket(t) => defmt::write!(f, "UnexpectedPacket({})", t),
        }
    }
}
