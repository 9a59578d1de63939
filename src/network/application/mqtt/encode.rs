//! Packet encoders.
//!
//! Each `pack_*` function validates its packet completely before writing a
//! single byte, then returns the encoded frame in a fresh [`PacketBuffer`].
//! A caller therefore gets either a whole packet or an error, never both.

use super::cursor::Writer;
use super::error::Error;
use super::packet::{
    ConnackPacket, ConnectPacket, Packet, PacketBuffer, PacketType, PubackPacket,
    PublishPacket, QoS, SubackPacket, SubscribePacket, UnsubackPacket, UnsubscribePacket,
};

/// Flag nibble SUBSCRIBE and UNSUBSCRIBE must carry.
pub(crate) const SUBSCRIBE_FLAGS: u8 = 0x02;

/// Encodes any packet by dispatching to its `pack_*` function.
pub fn pack(packet: &Packet) -> Result<PacketBuffer, Error> {
    match packet {
        Packet::Connect(p) => pack_connect(p),
        Packet::Connack(p) => pack_connack(p),
        Packet::Publish(p) => pack_publish(p),
        Packet::Puback(p) => pack_puback(p),
        Packet::Subscribe(p) => pack_subscribe(p),
        Packet::Suback(p) => pack_suback(p),
        Packet::Unsubscribe(p) => pack_unsubscribe(p),
        Packet::Unsuback(p) => pack_unsuback(p),
        Packet::Pingreq => pack_pingreq(),
        Packet::Pingresp => pack_pingresp(),
        Packet::Disconnect => pack_disconnect(),
    }
}

fn validate_connect(packet: &ConnectPacket) -> Result<(), Error> {
    let flags = packet.flags;
    if packet.protocol_name.is_empty() || packet.client_id.is_empty() || flags.reserved() {
        return Err(Error::MalformedPacket);
    }
    match &packet.will {
        Some(will) => {
            if !flags.will() || will.topic.is_empty() || will.message.is_empty() {
                return Err(Error::MalformedPacket);
            }
            if flags.will_qos() > 2 {
                return Err(Error::MalformedPacket);
            }
        }
        None => {
            if flags.will() || flags.will_qos() != 0 || flags.will_retain() {
                return Err(Error::MalformedPacket);
            }
        }
    }
    if flags.username() != packet.username.is_some()
        || flags.password() != packet.password.is_some()
        || (packet.password.is_some() && packet.username.is_none())
    {
        return Err(Error::MalformedPacket);
    }
    Ok(())
}

/// Encodes a CONNECT packet.
///
/// The protocol name and client identifier must be non-empty, the reserved
/// flag must be clear, and the will, user name and password flags must match
/// the optional fields they announce. A password requires a user name.
///
/// ```rust
/// use smartled_mqtt::network::application::mqtt::{pack_connect, ConnectPacket};
///
/// let connect = ConnectPacket::new("Subscriber").unwrap();
/// let bytes = pack_connect(&connect).unwrap();
/// assert_eq!(&bytes[..2], &[0x10, 22]);
/// ```
pub fn pack_connect(packet: &ConnectPacket) -> Result<PacketBuffer, Error> {
    validate_connect(packet)?;

    let mut w = Writer::new();
    w.write_str(&packet.protocol_name)?;
    w.write_u8(packet.protocol_level)?;
    w.write_u8(packet.flags.bits())?;
    w.write_u16(packet.keep_alive)?;
    w.write_str(&packet.client_id)?;
    if let Some(will) = &packet.will {
        w.write_str(&will.topic)?;
        w.write_prefixed(&will.message)?;
    }
    if let Some(username) = &packet.username {
        w.write_str(username)?;
    }
    if let Some(password) = &packet.password {
        w.write_prefixed(password)?;
    }
    w.finish(PacketType::Connect.header_byte(0))
}

/// Encodes a CONNACK packet.
pub fn pack_connack(packet: &ConnackPacket) -> Result<PacketBuffer, Error> {
    let mut w = Writer::new();
    w.write_u8(packet.session_present as u8)?;
    w.write_u8(packet.return_code as u8)?;
    w.finish(PacketType::Connack.header_byte(0))
}

/// Encodes a PUBLISH packet.
///
/// The topic must be non-empty. QoS 2 is [`Error::QosNotSupported`]. A QoS 1
/// publish needs a packet identifier (missing is [`Error::MalformedPacket`],
/// zero is [`Error::PacketIdNotAllowed`]); a QoS 0 publish must not carry one.
pub fn pack_publish(packet: &PublishPacket) -> Result<PacketBuffer, Error> {
    if packet.topic.is_empty() {
        return Err(Error::MalformedPacket);
    }
    match (packet.qos, packet.packet_id) {
        (QoS::ExactlyOnce, _) => return Err(Error::QosNotSupported),
        (QoS::AtLeastOnce, None) | (QoS::AtMostOnce, Some(_)) => {
            return Err(Error::MalformedPacket);
        }
        (QoS::AtLeastOnce, Some(0)) => return Err(Error::PacketIdNotAllowed),
        _ => {}
    }

    let mut w = Writer::new();
    w.write_str(&packet.topic)?;
    if let Some(packet_id) = packet.packet_id {
        w.write_u16(packet_id)?;
    }
    w.write_bytes(&packet.payload)?;
    w.finish(PacketType::Publish.header_byte(packet.header_flags()))
}

fn pack_id_only(packet_type: PacketType, packet_id: u16) -> Result<PacketBuffer, Error> {
    if packet_id == 0 {
        return Err(Error::MalformedPacket);
    }
    let mut w = Writer::new();
    w.write_u16(packet_id)?;
    w.finish(packet_type.header_byte(0))
}

/// Encodes a PUBACK packet. The packet identifier must be non-zero.
pub fn pack_puback(packet: &PubackPacket) -> Result<PacketBuffer, Error> {
    pack_id_only(PacketType::Puback, packet.packet_id)
}

/// Encodes an UNSUBACK packet. The packet identifier must be non-zero.
pub fn pack_unsuback(packet: &UnsubackPacket) -> Result<PacketBuffer, Error> {
    pack_id_only(PacketType::Unsuback, packet.packet_id)
}

/// Encodes a SUBSCRIBE packet.
///
/// Needs a non-zero packet identifier and at least one tuple; every topic
/// filter must be non-empty. Requested QoS 0 and 1 are accepted, QoS 2 is
/// [`Error::QosNotSupported`]. The decoded `status` of a tuple is ignored.
pub fn pack_subscribe(packet: &SubscribePacket) -> Result<PacketBuffer, Error> {
    if packet.packet_id == 0 || packet.tuples.is_empty() {
        return Err(Error::MalformedPacket);
    }
    for tuple in &packet.tuples {
        if tuple.topic.is_empty() {
            return Err(Error::MalformedPacket);
        }
        if tuple.qos == QoS::ExactlyOnce {
            return Err(Error::QosNotSupported);
        }
    }

    let mut w = Writer::new();
    w.write_u16(packet.packet_id)?;
    for tuple in &packet.tuples {
        w.write_str(&tuple.topic)?;
        w.write_u8(tuple.qos as u8)?;
    }
    w.finish(PacketType::Subscribe.header_byte(SUBSCRIBE_FLAGS))
}

/// Encodes a SUBACK packet with a non-zero identifier and at least one code.
pub fn pack_suback(packet: &SubackPacket) -> Result<PacketBuffer, Error> {
    if packet.packet_id == 0 || packet.return_codes.is_empty() {
        return Err(Error::MalformedPacket);
    }

    let mut w = Writer::new();
    w.write_u16(packet.packet_id)?;
    for code in &packet.return_codes {
        w.write_u8(code.to_u8())?;
    }
    w.finish(PacketType::Suback.header_byte(0))
}

/// Encodes an UNSUBSCRIBE packet.
///
/// Needs a non-zero packet identifier and at least one non-empty topic filter.
pub fn pack_unsubscribe(packet: &UnsubscribePacket) -> Result<PacketBuffer, Error> {
    if packet.packet_id == 0
        || packet.topics.is_empty()
        || packet.topics.iter().any(|t| t.is_empty())
    {
        return Err(Error::MalformedPacket);
    }

    let mut w = Writer::new();
    w.write_u16(packet.packet_id)?;
    for topic in &packet.topics {
        w.write_str(topic)?;
    }
    w.finish(PacketType::Unsubscribe.header_byte(SUBSCRIBE_FLAGS))
}

/// Encodes a PINGREQ packet.
pub fn pack_pingreq() -> Result<PacketBuffer, Error> {
    Writer::new().finish(PacketType::Pingreq.header_byte(0))
}

/// Encodes a PINGRESP packet.
pub fn pack_pingresp() -> Result<PacketBuffer, Error> {
    Writer::new().finish(PacketType::Pingresp.header_byte(0))
}

/// Encodes a DISCONNECT packet.
pub fn pack_disconnect() -> Result<PacketBuffer, Error> {
    Writer::new().finish(PacketType::Disconnect.header_byte(0))
}
