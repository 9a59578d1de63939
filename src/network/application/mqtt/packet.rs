//! Typed MQTT 3.1.1 control packets.
//!
//! Every variable-length field is a `heapless` container sized by one of the
//! capacity constants below, so a decoded packet owns all of its data and
//! never borrows from the input buffer.

use heapless::{String, Vec};
use serde::Deserialize;

use super::cursor::Reader;
use super::error::Error;
use super::varint::decode_remaining_length;

/// Largest encoded packet (fixed header included) the crate builds or reads.
pub const MAX_PACKET_SIZE: usize = 1024;
/// Maximum length of a topic name or topic filter in bytes.
pub const MAX_TOPIC_LEN: usize = 256;
/// Maximum size of a PUBLISH payload in bytes.
pub const MAX_PAYLOAD_LEN: usize = 1024;
/// Maximum length of a client identifier in bytes.
pub const MAX_CLIENT_ID_LEN: usize = 64;
/// Maximum length of a CONNECT user name in bytes.
pub const MAX_USERNAME_LEN: usize = 64;
/// Maximum length of a CONNECT password in bytes.
pub const MAX_PASSWORD_LEN: usize = 64;
/// Maximum length of a will message in bytes.
pub const MAX_WILL_MESSAGE_LEN: usize = 256;
/// Maximum number of topic tuples or return codes carried by one packet.
pub const MAX_TOPICS: usize = 8;
/// Capacity of the protocol name field of a CONNECT packet.
pub const MAX_PROTOCOL_NAME_LEN: usize = 8;

/// Protocol name carried in every CONNECT packet.
pub const PROTOCOL_NAME: &str = "MQTT";
/// MQTT protocol level for version 3.1.1.
pub const PROTOCOL_LEVEL: u8 = 4;

/// Owned buffer holding one encoded packet.
pub type PacketBuffer = Vec<u8, MAX_PACKET_SIZE>;

/// MQTT control packet type, the high nibble of the first header byte.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    /// Client request to connect to a server.
    Connect = 1,
    /// Connect acknowledgment.
    Connack = 2,
    /// Publish message.
    Publish = 3,
    /// Publish acknowledgment (QoS 1).
    Puback = 4,
    /// Publish received (QoS 2, part 1).
    Pubrec = 5,
    /// Publish release (QoS 2, part 2).
    Pubrel = 6,
    /// Publish complete (QoS 2, part 3).
    Pubcomp = 7,
    /// Subscribe request.
    Subscribe = 8,
    /// Subscribe acknowledgment.
    Suback = 9,
    /// Unsubscribe request.
    Unsubscribe = 10,
    /// Unsubscribe acknowledgment.
    Unsuback = 11,
    /// Ping request.
    Pingreq = 12,
    /// Ping response.
    Pingresp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl PacketType {
    /// Builds the first header byte from this type and the low flag nibble.
    pub const fn header_byte(self, flags: u8) -> u8 {
        ((self as u8) << 4) | (flags & 0x0F)
    }
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    /// Converts a type nibble (`0..=15`); `0` and `15` are reserved.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => PacketType::Connect,
            2 => PacketType::Connack,
            3 => PacketType::Publish,
            4 => PacketType::Puback,
            5 => PacketType::Pubrec,
            6 => PacketType::Pubrel,
            7 => PacketType::Pubcomp,
            8 => PacketType::Subscribe,
            9 => PacketType::Suback,
            10 => PacketType::Unsubscribe,
            11 => PacketType::Unsuback,
            12 => PacketType::Pingreq,
            13 => PacketType::Pingresp,
            14 => PacketType::Disconnect,
            _ => return Err(Error::InvalidPacketType),
        })
    }
}

/// The fixed header present at the start of every packet.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FixedHeader {
    /// Packet type from the high nibble of byte 0.
    pub packet_type: PacketType,
    /// Flag bits from the low nibble of byte 0.
    pub flags: u8,
    /// Number of bytes following the fixed header.
    pub remaining_length: u32,
}

impl FixedHeader {
    /// Parses the fixed header at the start of `buf`.
    ///
    /// Returns the header and the number of bytes it occupies (2 to 5), which
    /// lets a caller decide whether a complete frame has been received.
    ///
    /// ```rust
    /// use smartled_mqtt::network::application::mqtt::{FixedHeader, PacketType};
    ///
    /// let (header, len) = FixedHeader::parse(&[0x30, 0xC1, 0x02]).unwrap();
    /// assert_eq!(header.packet_type, PacketType::Publish);
    /// assert_eq!(header.remaining_length, 321);
    /// assert_eq!(len, 3);
    /// ```
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), Error> {
        let mut reader = Reader::new(buf);
        let header = Self::read(&mut reader)?;
        Ok((header, reader.position()))
    }

    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let byte = reader.read_u8()?;
        let remaining_length = decode_remaining_length(reader)?;
        let packet_type = PacketType::try_from(byte >> 4).map_err(|_| Error::GenericError)?;
        Ok(Self {
            packet_type,
            flags: byte & 0x0F,
            remaining_length,
        })
    }
}

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. Only QoS 0
/// and 1 flows are implemented; QoS 2 is representable so that it can be
/// recognised and rejected.
///
/// # Examples
///
/// ```rust
/// use smartled_mqtt::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::try_from(1), Ok(QoS::AtLeastOnce));
/// assert!(QoS::try_from(3).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(try_from = "u8")]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    #[default]
    AtMostOnce = 0,
    /// **QoS 1**: At least once delivery, acknowledged with PUBACK.
    AtLeastOnce = 1,
    /// **QoS 2**: Exactly once delivery. Not supported by the session.
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(Error::MalformedPacket),
        }
    }
}

/// The connect flags byte of a CONNECT packet.
///
/// The flags are stored raw so a decoded packet reproduces the wire byte
/// exactly; the encoder checks that they agree with the optional fields.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct ConnectFlags(pub u8);

impl ConnectFlags {
    /// Reserved bit, must be zero.
    pub const RESERVED: u8 = 0x01;
    /// Start a clean session.
    pub const CLEAN_SESSION: u8 = 0x02;
    /// A will topic and message follow the client identifier.
    pub const WILL: u8 = 0x04;
    /// Two-bit will QoS field.
    pub const WILL_QOS_MASK: u8 = 0x18;
    /// The will message is retained.
    pub const WILL_RETAIN: u8 = 0x20;
    /// A password is present.
    pub const PASSWORD: u8 = 0x40;
    /// A user name is present.
    pub const USERNAME: u8 = 0x80;

    /// Raw flag byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    const fn has(self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    /// Reserved bit is set.
    pub const fn reserved(self) -> bool {
        self.has(Self::RESERVED)
    }

    /// Clean session requested.
    pub const fn clean_session(self) -> bool {
        self.has(Self::CLEAN_SESSION)
    }

    /// Will flag set.
    pub const fn will(self) -> bool {
        self.has(Self::WILL)
    }

    /// Raw two-bit will QoS value (may be 3 on malformed input).
    pub const fn will_qos(self) -> u8 {
        (self.0 & Self::WILL_QOS_MASK) >> 3
    }

    /// Will retain flag set.
    pub const fn will_retain(self) -> bool {
        self.has(Self::WILL_RETAIN)
    }

    /// Password flag set.
    pub const fn password(self) -> bool {
        self.has(Self::PASSWORD)
    }

    /// User name flag set.
    pub const fn username(self) -> bool {
        self.has(Self::USERNAME)
    }
}

/// Will topic and message declared in a CONNECT packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LastWill {
    /// Topic the broker publishes the will to.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Will payload.
    pub message: Vec<u8, MAX_WILL_MESSAGE_LEN>,
}

/// CONNECT: the first packet a client sends.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ConnectPacket {
    /// Protocol name, `"MQTT"` for 3.1.1.
    pub protocol_name: String<MAX_PROTOCOL_NAME_LEN>,
    /// Protocol level, `4` for 3.1.1.
    pub protocol_level: u8,
    /// Connect flags; must agree with `will`, `username` and `password`.
    pub flags: ConnectFlags,
    /// Keep-alive interval in seconds, `0` disables it.
    pub keep_alive: u16,
    /// Client identifier, never empty.
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    /// Will topic and message, present iff the will flag is set.
    pub will: Option<LastWill>,
    /// User name, present iff the user name flag is set.
    pub username: Option<String<MAX_USERNAME_LEN>>,
    /// Password, present iff the password flag is set.
    pub password: Option<Vec<u8, MAX_PASSWORD_LEN>>,
}

impl ConnectPacket {
    /// Creates a clean-session CONNECT with keep-alive disabled.
    ///
    /// ```rust
    /// use smartled_mqtt::network::application::mqtt::ConnectPacket;
    ///
    /// let connect = ConnectPacket::new("Subscriber").unwrap();
    /// assert!(connect.flags.clean_session());
    /// assert_eq!(connect.keep_alive, 0);
    /// assert_eq!(connect.protocol_level, 4);
    /// ```
    pub fn new(client_id: &str) -> Result<Self, Error> {
        Ok(Self {
            protocol_name: to_string(PROTOCOL_NAME)?,
            protocol_level: PROTOCOL_LEVEL,
            flags: ConnectFlags(ConnectFlags::CLEAN_SESSION),
            keep_alive: 0,
            client_id: to_string(client_id)?,
            will: None,
            username: None,
            password: None,
        })
    }

    /// Sets or clears the clean session flag.
    pub fn set_clean_session(&mut self, clean: bool) {
        if clean {
            self.flags.0 |= ConnectFlags::CLEAN_SESSION;
        } else {
            self.flags.0 &= !ConnectFlags::CLEAN_SESSION;
        }
    }

    /// Attaches a will and updates the will flags to match.
    pub fn set_will(
        &mut self,
        topic: &str,
        message: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Error> {
        self.will = Some(LastWill {
            topic: to_string(topic)?,
            message: to_vec(message)?,
        });
        self.flags.0 &= !(ConnectFlags::WILL_QOS_MASK | ConnectFlags::WILL_RETAIN);
        self.flags.0 |= ConnectFlags::WILL | ((qos as u8) << 3);
        if retain {
            self.flags.0 |= ConnectFlags::WILL_RETAIN;
        }
        Ok(())
    }

    /// Attaches a user name and optional password and sets their flags.
    pub fn set_credentials(&mut self, username: &str, password: Option<&[u8]>) -> Result<(), Error> {
        self.username = Some(to_string(username)?);
        self.flags.0 |= ConnectFlags::USERNAME;
        self.flags.0 &= !ConnectFlags::PASSWORD;
        self.password = None;
        if let Some(password) = password {
            self.password = Some(to_vec(password)?);
            self.flags.0 |= ConnectFlags::PASSWORD;
        }
        Ok(())
    }
}

/// CONNACK return code.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ConnectReturnCode {
    /// Connection accepted.
    Accepted = 0,
    /// The server does not support protocol level 4.
    UnacceptableProtocolVersion = 1,
    /// The client identifier is not allowed.
    IdentifierRejected = 2,
    /// The MQTT service is unavailable.
    ServerUnavailable = 3,
    /// User name or password is malformed.
    BadUsernameOrPassword = 4,
    /// The client is not authorized to connect.
    NotAuthorized = 5,
}

impl TryFrom<u8> for ConnectReturnCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => ConnectReturnCode::Accepted,
            1 => ConnectReturnCode::UnacceptableProtocolVersion,
            2 => ConnectReturnCode::IdentifierRejected,
            3 => ConnectReturnCode::ServerUnavailable,
            4 => ConnectReturnCode::BadUsernameOrPassword,
            5 => ConnectReturnCode::NotAuthorized,
            _ => return Err(Error::MalformedPacket),
        })
    }
}

/// CONNACK: the broker's answer to CONNECT.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ConnackPacket {
    /// The broker resumed a stored session.
    pub session_present: bool,
    /// Whether the connection was accepted.
    pub return_code: ConnectReturnCode,
}

/// An MQTT PUBLISH packet.
///
/// # Examples
///
/// ```rust
/// use smartled_mqtt::network::application::mqtt::{PublishPacket, QoS};
///
/// let packet = PublishPacket::new("sensors/temperature", b"23.5").unwrap();
///
/// assert_eq!(packet.topic.as_str(), "sensors/temperature");
/// assert_eq!(&packet.payload[..], b"23.5");
/// assert_eq!(packet.qos, QoS::AtMostOnce);
/// assert_eq!(packet.packet_id, None);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    /// Redelivery of an earlier attempt.
    pub dup: bool,
    /// Delivery guarantee.
    pub qos: QoS,
    /// The broker should retain the message.
    pub retain: bool,
    /// The topic on which the message was published.
    ///
    /// Maximum length is 256 bytes to fit within embedded memory constraints.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Packet identifier, present iff `qos` is 1 or 2.
    pub packet_id: Option<u16>,
    /// The message payload data, possibly empty.
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl PublishPacket {
    /// Creates a QoS 0 publish without DUP or RETAIN.
    pub fn new(topic: &str, payload: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: to_string(topic)?,
            packet_id: None,
            payload: to_vec(payload)?,
        })
    }

    /// Flag nibble of the fixed header.
    pub const fn header_flags(&self) -> u8 {
        ((self.dup as u8) << 3) | ((self.qos as u8) << 1) | (self.retain as u8)
    }
}

/// PUBACK: acknowledges a QoS 1 PUBLISH.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PubackPacket {
    /// Identifier of the acknowledged PUBLISH.
    pub packet_id: u16,
}

/// UNSUBACK: acknowledges an UNSUBSCRIBE.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct UnsubackPacket {
    /// Identifier of the acknowledged UNSUBSCRIBE.
    pub packet_id: u16,
}

/// Per-topic result in a SUBACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeReturnCode {
    /// Subscription granted at the given maximum QoS.
    Success(QoS),
    /// Subscription refused (`0x80`).
    Failure,
}

impl SubscribeReturnCode {
    /// Wire value of the return code.
    pub const fn to_u8(self) -> u8 {
        match self {
            SubscribeReturnCode::Success(qos) => qos as u8,
            SubscribeReturnCode::Failure => 0x80,
        }
    }
}

impl TryFrom<u8> for SubscribeReturnCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(SubscribeReturnCode::Failure),
            v => QoS::try_from(v).map(SubscribeReturnCode::Success),
        }
    }
}

/// One topic filter of a SUBSCRIBE packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribeTuple {
    /// Topic filter.
    pub topic: String<MAX_TOPIC_LEN>,
    /// Requested maximum QoS.
    pub qos: QoS,
    /// Validation result, filled in by the decoder and ignored by the encoder.
    ///
    /// An empty topic or a QoS 2 request is kept with
    /// [`SubscribeReturnCode::Failure`] so a SUBACK with mixed results can be
    /// built from the decoded packet.
    pub status: Option<SubscribeReturnCode>,
}

impl SubscribeTuple {
    /// Creates a tuple for encoding.
    pub fn new(topic: &str, qos: QoS) -> Result<Self, Error> {
        Ok(Self {
            topic: to_string(topic)?,
            qos,
            status: None,
        })
    }
}

/// SUBSCRIBE: requests one or more subscriptions.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribePacket {
    /// Non-zero packet identifier echoed by the SUBACK.
    pub packet_id: u16,
    /// Requested topic filters in order.
    pub tuples: Vec<SubscribeTuple, MAX_TOPICS>,
}

/// SUBACK: one return code per requested topic filter.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubackPacket {
    /// Identifier of the acknowledged SUBSCRIBE.
    pub packet_id: u16,
    /// Return codes in the order of the SUBSCRIBE tuples.
    pub return_codes: Vec<SubscribeReturnCode, MAX_TOPICS>,
}

/// UNSUBSCRIBE: removes one or more subscriptions.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UnsubscribePacket {
    /// Non-zero packet identifier echoed by the UNSUBACK.
    pub packet_id: u16,
    /// Topic filters to remove.
    pub topics: Vec<String<MAX_TOPIC_LEN>, MAX_TOPICS>,
}

/// A decoded or to-be-encoded MQTT control packet.
///
/// QoS 2 handshake packets (PUBREC, PUBREL, PUBCOMP) have no variant; the
/// decoder rejects them with [`Error::QosNotSupported`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Packet {
    /// CONNECT
    Connect(ConnectPacket),
    /// CONNACK
    Connack(ConnackPacket),
    /// PUBLISH
    Publish(PublishPacket),
    /// PUBACK
    Puback(PubackPacket),
    /// SUBSCRIBE
    Subscribe(SubscribePacket),
    /// SUBACK
    Suback(SubackPacket),
    /// UNSUBSCRIBE
    Unsubscribe(UnsubscribePacket),
    /// UNSUBACK
    Unsuback(UnsubackPacket),
    /// PINGREQ
    Pingreq,
    /// PINGRESP
    Pingresp,
    /// DISCONNECT
    Disconnect,
}

impl Packet {
    /// The control packet type of this packet.
    pub const fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Connack(_) => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::Puback(_) => PacketType::Puback,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::Suback(_) => PacketType::Suback,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::Unsuback(_) => PacketType::Unsuback,
            Packet::Pingreq => PacketType::Pingreq,
            Packet::Pingresp => PacketType::Pingresp,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }
}

fn to_string<const N: usize>(s: &str) -> Result<String<N>, Error> {
    String::try_from(s).map_err(|_| Error::FailedAlloc)
}

fn to_vec<const N: usize>(bytes: &[u8]) -> Result<Vec<u8, N>, Error> {
    Vec::from_slice(bytes).map_err(|_| Error::FailedAlloc)
}
