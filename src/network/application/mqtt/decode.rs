//! Packet decoder and dispatcher.
//!
//! [`unpack`] is the single entry point: it parses the fixed header, checks
//! the flag nibble and length rules of the packet type, and hands the rest
//! of the frame to the matching decoder. Input is treated as hostile; every
//! read is bounds checked and no partially decoded packet is ever returned.

use heapless::Vec;

use super::cursor::Reader;
use super::encode::SUBSCRIBE_FLAGS;
use super::error::Error;
use super::packet::{
    ConnackPacket, ConnectFlags, ConnectPacket, ConnectReturnCode, FixedHeader, LastWill,
    MAX_CLIENT_ID_LEN, MAX_PASSWORD_LEN, MAX_TOPIC_LEN, MAX_USERNAME_LEN,
    MAX_WILL_MESSAGE_LEN, PROTOCOL_NAME, Packet, PacketType, PubackPacket, PublishPacket, QoS,
    SubackPacket, SubscribePacket, SubscribeReturnCode, SubscribeTuple, UnsubackPacket,
    UnsubscribePacket,
};

/// Decodes the packet at the start of `buf`.
///
/// Bytes after the end of the frame are ignored. The returned variant is the
/// packet type tag; errors carry the reason decoding stopped.
///
/// ```rust
/// use smartled_mqtt::network::application::mqtt::{unpack, Error, Packet};
///
/// assert_eq!(unpack(&[0xD0, 0x00]), Ok(Packet::Pingresp));
/// assert_eq!(unpack(&[0x21, 0x02, 0x00, 0x00]), Err(Error::IncorrectFlags));
/// assert_eq!(unpack(&[0x20, 0x02, 0x00]), Err(Error::OutOfBounds));
/// ```
pub fn unpack(buf: &[u8]) -> Result<Packet, Error> {
    let mut reader = Reader::new(buf);
    let header = FixedHeader::read(&mut reader)?;
    let frame_end = reader
        .position()
        .checked_add(header.remaining_length as usize)
        .ok_or(Error::MalformedPacket)?;

    match header.packet_type {
        PacketType::Connect => {
            expect_flags(&header, 0)?;
            unpack_connect(&mut reader, frame_end).map(Packet::Connect)
        }
        PacketType::Connack => {
            expect_flags(&header, 0)?;
            expect_length(&header, 2)?;
            unpack_connack(&mut reader).map(Packet::Connack)
        }
        PacketType::Publish => unpack_publish(&mut reader, &header).map(Packet::Publish),
        PacketType::Puback => {
            expect_flags(&header, 0)?;
            expect_length(&header, 2)?;
            let packet_id = read_packet_id(&mut reader)?;
            Ok(Packet::Puback(PubackPacket { packet_id }))
        }
        PacketType::Subscribe => {
            expect_flags(&header, SUBSCRIBE_FLAGS)?;
            unpack_subscribe(&mut reader, frame_end).map(Packet::Subscribe)
        }
        PacketType::Suback => {
            expect_flags(&header, 0)?;
            unpack_suback(&mut reader, frame_end).map(Packet::Suback)
        }
        PacketType::Unsubscribe => {
            expect_flags(&header, SUBSCRIBE_FLAGS)?;
            unpack_unsubscribe(&mut reader, frame_end).map(Packet::Unsubscribe)
        }
        PacketType::Unsuback => {
            expect_flags(&header, 0)?;
            expect_length(&header, 2)?;
            let packet_id = read_packet_id(&mut reader)?;
            Ok(Packet::Unsuback(UnsubackPacket { packet_id }))
        }
        PacketType::Pingreq => empty_packet(&header, Packet::Pingreq),
        PacketType::Pingresp => empty_packet(&header, Packet::Pingresp),
        PacketType::Disconnect => empty_packet(&header, Packet::Disconnect),
        PacketType::Pubrec | PacketType::Pubrel | PacketType::Pubcomp => {
            Err(Error::QosNotSupported)
        }
    }
}

fn expect_flags(header: &FixedHeader, flags: u8) -> Result<(), Error> {
    if header.flags != flags {
        return Err(Error::IncorrectFlags);
    }
    Ok(())
}

fn expect_length(header: &FixedHeader, len: u32) -> Result<(), Error> {
    if header.remaining_length != len {
        return Err(Error::MalformedPacket);
    }
    Ok(())
}

fn expect_frame_end(reader: &Reader<'_>, frame_end: usize) -> Result<(), Error> {
    if reader.position() != frame_end {
        return Err(Error::MalformedPacket);
    }
    Ok(())
}

fn empty_packet(header: &FixedHeader, packet: Packet) -> Result<Packet, Error> {
    expect_flags(header, 0)?;
    expect_length(header, 0)?;
    Ok(packet)
}

fn read_packet_id(reader: &mut Reader<'_>) -> Result<u16, Error> {
    match reader.read_u16()? {
        0 => Err(Error::PacketIdNotAllowed),
        id => Ok(id),
    }
}

fn unpack_connect(reader: &mut Reader<'_>, frame_end: usize) -> Result<ConnectPacket, Error> {
    if reader.read_prefixed()? != PROTOCOL_NAME.as_bytes() {
        return Err(Error::MalformedPacket);
    }
    let protocol_level = reader.read_u8()?;
    let flags = ConnectFlags(reader.read_u8()?);
    if flags.reserved()
        || flags.will_qos() > 2
        || (!flags.will() && (flags.will_qos() != 0 || flags.will_retain()))
        || (flags.password() && !flags.username())
    {
        return Err(Error::MalformedPacket);
    }
    let keep_alive = reader.read_u16()?;

    let client_id = reader.read_str::<MAX_CLIENT_ID_LEN>()?;
    if client_id.is_empty() {
        return Err(Error::MalformedPacket);
    }

    let will = if flags.will() {
        let topic = reader.read_str::<MAX_TOPIC_LEN>()?;
        let message = reader.read_binary::<MAX_WILL_MESSAGE_LEN>()?;
        if topic.is_empty() || message.is_empty() {
            return Err(Error::MalformedPacket);
        }
        Some(LastWill { topic, message })
    } else {
        None
    };
    let username = if flags.username() {
        Some(reader.read_str::<MAX_USERNAME_LEN>()?)
    } else {
        None
    };
    let password = if flags.password() {
        Some(reader.read_binary::<MAX_PASSWORD_LEN>()?)
    } else {
        None
    };
    expect_frame_end(reader, frame_end)?;

    let mut protocol_name = heapless::String::new();
    protocol_name
        .push_str(PROTOCOL_NAME)
        .map_err(|_| Error::FailedAlloc)?;

    Ok(ConnectPacket {
        protocol_name,
        protocol_level,
        flags,
        keep_alive,
        client_id,
        will,
        username,
        password,
    })
}

fn unpack_connack(reader: &mut Reader<'_>) -> Result<ConnackPacket, Error> {
    let ack_flags = reader.read_u8()?;
    let return_code = reader.read_u8()?;
    if ack_flags & 0xFE != 0 {
        return Err(Error::MalformedPacket);
    }
    Ok(ConnackPacket {
        session_present: ack_flags & 0x01 != 0,
        return_code: ConnectReturnCode::try_from(return_code)?,
    })
}

fn unpack_publish(reader: &mut Reader<'_>, header: &FixedHeader) -> Result<PublishPacket, Error> {
    let qos = QoS::try_from((header.flags >> 1) & 0x03)?;
    let start = reader.position();

    let topic = reader.read_str::<MAX_TOPIC_LEN>()?;
    let packet_id = match qos {
        QoS::AtMostOnce => None,
        QoS::AtLeastOnce | QoS::ExactlyOnce => Some(read_packet_id(reader)?),
    };
    if topic.is_empty() {
        return Err(Error::MalformedPacket);
    }

    let consumed = reader.position() - start;
    let payload_len = (header.remaining_length as usize)
        .checked_sub(consumed)
        .ok_or(Error::MalformedPacket)?;
    let payload = Vec::from_slice(reader.read_bytes(payload_len)?).map_err(|_| Error::FailedAlloc)?;

    Ok(PublishPacket {
        dup: header.flags & 0x08 != 0,
        qos,
        retain: header.flags & 0x01 != 0,
        topic,
        packet_id,
        payload,
    })
}

fn unpack_subscribe(reader: &mut Reader<'_>, frame_end: usize) -> Result<SubscribePacket, Error> {
    let packet_id = read_packet_id(reader)?;
    let mut tuples = Vec::new();

    while reader.position() < frame_end {
        let topic = reader.read_str::<MAX_TOPIC_LEN>()?;
        let qos = QoS::try_from(reader.read_u8()?)?;
        let status = if topic.is_empty() || qos == QoS::ExactlyOnce {
            SubscribeReturnCode::Failure
        } else {
            SubscribeReturnCode::Success(qos)
        };
        tuples
            .push(SubscribeTuple {
                topic,
                qos,
                status: Some(status),
            })
            .map_err(|_| Error::FailedAlloc)?;
    }
    if tuples.is_empty() {
        return Err(Error::MalformedPacket);
    }
    expect_frame_end(reader, frame_end)?;

    Ok(SubscribePacket { packet_id, tuples })
}

fn unpack_unsubscribe(
    reader: &mut Reader<'_>,
    frame_end: usize,
) -> Result<UnsubscribePacket, Error> {
    let packet_id = read_packet_id(reader)?;
    let mut topics = Vec::new();

    while reader.position() < frame_end {
        let topic = reader.read_str::<MAX_TOPIC_LEN>()?;
        if topic.is_empty() {
            return Err(Error::MalformedPacket);
        }
        topics.push(topic).map_err(|_| Error::FailedAlloc)?;
    }
    if topics.is_empty() {
        return Err(Error::MalformedPacket);
    }
    expect_frame_end(reader, frame_end)?;

    Ok(UnsubscribePacket { packet_id, topics })
}

fn unpack_suback(reader: &mut Reader<'_>, frame_end: usize) -> Result<SubackPacket, Error> {
    let packet_id = read_packet_id(reader)?;
    let mut return_codes = Vec::new();

    while reader.position() < frame_end {
        let code = SubscribeReturnCode::try_from(reader.read_u8()?)?;
        return_codes.push(code).map_err(|_| Error::FailedAlloc)?;
    }
    if return_codes.is_empty() {
        return Err(Error::MalformedPacket);
    }
    expect_frame_end(reader, frame_end)?;

    Ok(SubackPacket {
        packet_id,
        return_codes,
    })
}
