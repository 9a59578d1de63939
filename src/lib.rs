//! # smartled-mqtt - MQTT 3.1.1 for smart LED controllers
//!
//! A Rust library that lets a small device talk to an MQTT broker and turn
//! published commands (`"on"`, `"off"`, ...) into local actions. It is designed
//! for embedded systems and supports `no_std` environments without a heap.
//!
//! ## Features
//!
//! ### Packet Codec
//! - **Encoding**: CONNECT, CONNACK, PUBLISH, PUBACK, SUBSCRIBE, SUBACK,
//!   UNSUBSCRIBE, UNSUBACK, PINGREQ, PINGRESP and DISCONNECT
//! - **Decoding**: strict, bounds-checked parsing of untrusted buffers with
//!   protocol-rule validation
//! - **Remaining Length**: the 1-4 byte variable-length quantity
//!
//! ### Client Session
//! - Connect handshake with CONNACK ordering checks
//! - Subscription registry mapping topics to command tables
//! - PUBLISH dispatch to command callbacks with PUBACK replies
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! smartled-mqtt = "0.1.0"
//! ```
//!
//! ### Decoding a Packet
//!
//! ```rust
//! use smartled_mqtt::network::application::mqtt::{unpack, Packet};
//!
//! let connack = [0x20, 0x02, 0x00, 0x00];
//! match unpack(&connack) {
//!     Ok(Packet::Connack(ack)) => assert!(!ack.session_present),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```
//!
//! ### Running a Session
//!
//! ```rust,no_run
//! use smartled_mqtt::network::application::mqtt::{
//!     ClientSession, Command, Options, PublishPacket, QoS, Subscription,
//! };
//! # use smartled_mqtt::network::Connection;
//! # struct MockConnection;
//! # impl Connection for MockConnection {}
//! # impl smartled_mqtt::network::Read for MockConnection {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl smartled_mqtt::network::Write for MockConnection {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl smartled_mqtt::network::Close for MockConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! fn led_on(_publish: &PublishPacket) { /* drive the GPIO */ }
//! fn led_off(_publish: &PublishPacket) { /* drive the GPIO */ }
//!
//! static LED_COMMANDS: &[Command] = &[
//!     Command { name: "on", handler: led_on },
//!     Command { name: "off", handler: led_off },
//! ];
//! static SUBSCRIPTIONS: &[Subscription] = &[Subscription {
//!     topic: "home/chris/smart_led",
//!     qos: QoS::AtLeastOnce,
//!     commands: LED_COMMANDS,
//! }];
//!
//! let options = Options::new("Subscriber").with_subscriptions(SUBSCRIPTIONS);
//! let mut session = ClientSession::new(MockConnection, options);
//! session.connect().unwrap();
//! let fatal = session.run();
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ESP32, ARM Cortex-M, RISC-V, etc.)
//! - Linux-based gateways (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt formatting and logging for embedded debugging
//! - `log`: Route session logging through the `log` facade

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer providing the transport traits and the MQTT
/// protocol implementation.
///
/// The transport traits describe the byte-oriented socket the session runs
/// on; the protocol itself lives in [`network::application::mqtt`].
pub mod network;
