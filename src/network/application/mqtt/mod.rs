//! MQTT 3.1.1 protocol implementation for embedded systems.
//!
//! This module provides an MQTT 3.1.1 packet codec and a small client session
//! designed for `no_std` environments. MQTT (Message Queuing Telemetry
//! Transport) is a lightweight publish-subscribe messaging protocol ideal for
//! IoT applications.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Connection  │──▶│   unpack     │──▶│ ClientSession │──▶│ Subscription  │
//! │ (bytes in)  │   │ (dispatcher) │   │  (dispatch)   │   │   Registry    │
//! └─────────────┘   └──────────────┘   └──────────────┘   └───────────────┘
//!        ▲                                    │
//!        │          ┌──────────────┐          │
//!        └──────────│  pack_*      │◀─────────┘
//!     (bytes out)   │  (encoders)  │  replies: PUBACK, SUBSCRIBE, ...
//!                   └──────────────┘
//! ```
//!
//! - **[`cursor`]**: bounds-checked readers and writers for wire fields
//! - **Remaining Length**: [`encode_remaining_length`] / [`decode_remaining_length`]
//! - **Codec**: one `pack_*` function per packet type plus [`pack`], and the
//!   [`unpack`] dispatcher returning a [`Packet`]
//! - **Session**: [`ClientSession`], [`SubscriptionRegistry`], [`Options`]
//!
//! # Supported Packets
//!
//! CONNECT, CONNACK, PUBLISH, PUBACK, SUBSCRIBE, SUBACK, UNSUBSCRIBE,
//! UNSUBACK, PINGREQ, PINGRESP and DISCONNECT are encoded and decoded. The
//! QoS 2 handshake packets are recognised and rejected with
//! [`Error::QosNotSupported`].
//!
//! # Usage
//!
//! ```rust
//! use smartled_mqtt::network::application::mqtt::{
//!     pack_publish, unpack, Packet, PublishPacket, QoS,
//! };
//!
//! let mut publish = PublishPacket::new("home/chris/smart_led", b"on").unwrap();
//! publish.qos = QoS::AtLeastOnce;
//! publish.packet_id = Some(7);
//!
//! let bytes = pack_publish(&publish).unwrap();
//! assert_eq!(unpack(&bytes), Ok(Packet::Publish(publish)));
//! ```

/// Client session, configuration and events.
pub mod client;

/// Bounds-checked byte cursors.
pub mod cursor;

mod decode;
mod encode;
mod error;
mod packet;
mod registry;
mod varint;

pub use client::{ClientSession, Event, EventFn, Options, Subscription, WillOptions};
pub use decode::unpack;
pub use encode::{
    pack, pack_connack, pack_connect, pack_disconnect, pack_pingreq, pack_pingresp, pack_puback,
    pack_publish, pack_suback, pack_subscribe, pack_unsuback, pack_unsubscribe,
};
pub use error::{Error, RegistryError, SessionError};
pub use packet::{
    ConnackPacket, ConnectFlags, ConnectPacket, ConnectReturnCode, FixedHeader, LastWill,
    MAX_CLIENT_ID_LEN, MAX_PACKET_SIZE, MAX_PASSWORD_LEN, MAX_PAYLOAD_LEN,
    MAX_PROTOCOL_NAME_LEN, MAX_TOPIC_LEN, MAX_TOPICS, MAX_USERNAME_LEN, MAX_WILL_MESSAGE_LEN,
    PROTOCOL_LEVEL, PROTOCOL_NAME, Packet, PacketBuffer, PacketType, PubackPacket,
    PublishPacket, QoS, SubackPacket, SubscribePacket, SubscribeReturnCode, SubscribeTuple,
    UnsubackPacket, UnsubscribePacket,
};
pub use registry::{
    Command, CommandFn, MAX_COMMANDS, MAX_SUBSCRIPTIONS, SubscriptionEntry, SubscriptionRegistry,
};
pub use varint::{
    MAX_REMAINING_LENGTH, decode_remaining_length, encode_remaining_length, encoded_len,
};
