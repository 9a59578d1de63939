//! MQTT 3.1.1 client session for command-driven devices.
//!
//! A [`ClientSession`] owns one broker connection. It sends CONNECT, waits for
//! the CONNACK, subscribes to a fixed set of topics, and then turns every
//! inbound PUBLISH into calls of the [`Command`] handlers registered for the
//! topic, acknowledging QoS 1 messages with PUBACK.
//!
//! # Session Rules
//!
//! - The first packet after connecting must be CONNACK; anything else ends
//!   the session with [`SessionError::MissingConnack`].
//! - A second CONNACK ends the session with [`SessionError::DuplicateConnack`].
//! - A refused CONNACK ends the session with
//!   [`SessionError::ConnectionRefused`].
//! - A PUBLISH to a topic that is not registered is an error, not a no-op.
//!
//! There is a single thread of control: one frame is decoded and dispatched,
//! handlers included, before the next read is issued.
//!
//! # Examples
//!
//! ## Configuration from JSON
//!
//! ```rust
//! use smartled_mqtt::network::application::mqtt::{Options, QoS};
//!
//! let json = r#"{
//!     "client_id": "Subscriber",
//!     "keep_alive_seconds": 30,
//!     "will": { "topic": "home/led/status", "message": "offline", "qos": 1 }
//! }"#;
//!
//! let options = Options::from_json(json).unwrap();
//! assert_eq!(options.client_id, "Subscriber");
//! assert!(options.clean_session);
//! assert_eq!(options.will.unwrap().qos, QoS::AtLeastOnce);
//! ```
//!
//! ## Driving the Session
//!
//! ```rust,no_run
//! use smartled_mqtt::network::application::mqtt::{
//!     ClientSession, Command, Event, Options, PublishPacket, QoS, Subscription,
//! };
//! # use smartled_mqtt::network::Connection;
//! # struct TcpConnection;
//! # impl Connection for TcpConnection {}
//! # impl smartled_mqtt::network::Read for TcpConnection {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl smartled_mqtt::network::Write for TcpConnection {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl smartled_mqtt::network::Close for TcpConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! fn led_on(_publish: &PublishPacket) {}
//! fn led_off(_publish: &PublishPacket) {}
//!
//! fn on_event(event: &Event<'_>) {
//!     if let Event::Connected { session_present } = event {
//!         // broker accepted us
//!         let _ = session_present;
//!     }
//! }
//!
//! const COMMANDS: &[Command] = &[
//!     Command { name: "on", handler: led_on },
//!     Command { name: "off", handler: led_off },
//! ];
//! const SUBSCRIPTIONS: &[Subscription<'static>] = &[Subscription {
//!     topic: "home/chris/smart_led",
//!     qos: QoS::AtLeastOnce,
//!     commands: COMMANDS,
//! }];
//!
//! let options = Options::new("Subscriber")
//!     .with_subscriptions(SUBSCRIPTIONS)
//!     .with_event_handler(on_event);
//!
//! let mut session = ClientSession::new(TcpConnection, options);
//! session.connect().unwrap();
//! let reason = session.run();
//! ```

use heapless::Vec;
use serde::Deserialize;

use super::decode::unpack;
use super::encode::{
    pack_connect, pack_disconnect, pack_pingreq, pack_puback, pack_publish, pack_subscribe,
};
use super::error::{Error, RegistryError, SessionError};
use super::packet::{
    ConnackPacket, ConnectPacket, ConnectReturnCode, FixedHeader, MAX_PACKET_SIZE, Packet,
    PacketBuffer, PubackPacket, PublishPacket, QoS, SubackPacket, SubscribePacket,
    SubscribeReturnCode, SubscribeTuple,
};
use super::registry::{Command, SubscriptionEntry, SubscriptionRegistry};
use crate::network::error::Error as NetworkError;
use crate::network::{Close, Connection, Read, Write};

/// Will declared in the CONNECT packet.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WillOptions<'a> {
    /// Topic the broker publishes the will to.
    pub topic: &'a str,
    /// Will payload.
    pub message: &'a str,
    /// Will QoS.
    #[serde(default)]
    pub qos: QoS,
    /// Whether the broker retains the will.
    #[serde(default)]
    pub retain: bool,
}

/// A topic the session subscribes to once the broker accepted the connection.
#[derive(Debug, Clone, Copy)]
pub struct Subscription<'a> {
    /// Exact topic filter.
    pub topic: &'a str,
    /// Requested QoS, 0 or 1.
    pub qos: QoS,
    /// Commands that may arrive on this topic.
    pub commands: &'a [Command],
}

/// Something the session wants the application to know about.
#[derive(Debug)]
pub enum Event<'p> {
    /// The broker accepted the connection.
    Connected {
        /// The broker resumed a stored session.
        session_present: bool,
    },
    /// A SUBACK arrived.
    Subscribed(&'p SubackPacket),
    /// A PUBLISH on a registered topic was dispatched.
    Message(&'p PublishPacket),
    /// The broker acknowledged a QoS 1 publish.
    Published {
        /// Identifier of the acknowledged publish.
        packet_id: u16,
    },
    /// The broker answered a PINGREQ.
    PingResponse,
}

/// Type alias for session event handlers.
pub type EventFn = fn(event: &Event<'_>);

fn default_clean_session() -> bool {
    true
}

/// Configuration for a [`ClientSession`].
///
/// The plain fields can be read from a provisioning document with
/// [`Options::from_json`]; subscriptions and the event handler are attached
/// in code.
///
/// # Examples
///
/// ```rust
/// use smartled_mqtt::network::application::mqtt::Options;
///
/// let options = Options::new("my_iot_device");
/// assert_eq!(options.keep_alive_seconds, 0);
/// assert!(options.clean_session);
/// assert!(options.subscriptions.is_empty());
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Options<'a> {
    /// The client identifier, must be unique within the broker.
    pub client_id: &'a str,

    /// The keep-alive time interval in seconds; `0` disables keep-alive.
    #[serde(default)]
    pub keep_alive_seconds: u16,

    /// Whether to start a clean session.
    #[serde(default = "default_clean_session")]
    pub clean_session: bool,

    /// Optional will.
    #[serde(borrow, default)]
    pub will: Option<WillOptions<'a>>,

    /// Optional user name.
    #[serde(borrow, default)]
    pub username: Option<&'a str>,

    /// Optional password; requires a user name.
    #[serde(borrow, default)]
    pub password: Option<&'a str>,

    /// Topics subscribed to after an accepted CONNACK, in order.
    #[serde(skip)]
    pub subscriptions: &'a [Subscription<'a>],

    /// Receives session events synchronously.
    #[serde(skip)]
    pub on_event: Option<EventFn>,
}

impl<'a> Options<'a> {
    /// Options with the given client id and everything else at its default.
    pub const fn new(client_id: &'a str) -> Self {
        Self {
            client_id,
            keep_alive_seconds: 0,
            clean_session: true,
            will: None,
            username: None,
            password: None,
            subscriptions: &[],
            on_event: None,
        }
    }

    /// Parses options from a JSON document.
    ///
    /// Strings are borrowed from `json`, so they must not contain escape
    /// sequences.
    pub fn from_json(json: &'a str) -> Result<Self, SessionError> {
        let (options, _) =
            serde_json_core::from_str::<Self>(json).map_err(|_| SessionError::InvalidConfig)?;
        Ok(options)
    }

    /// Sets the topics subscribed to after connecting.
    pub const fn with_subscriptions(mut self, subscriptions: &'a [Subscription<'a>]) -> Self {
        self.subscriptions = subscriptions;
        self
    }

    /// Sets the event handler.
    pub const fn with_event_handler(mut self, handler: EventFn) -> Self {
        self.on_event = Some(handler);
        self
    }

    fn connect_packet(&self) -> Result<ConnectPacket, SessionError> {
        let mut packet = ConnectPacket::new(self.client_id)?;
        packet.set_clean_session(self.clean_session);
        packet.keep_alive = self.keep_alive_seconds;
        if let Some(will) = &self.will {
            packet.set_will(will.topic, will.message.as_bytes(), will.qos, will.retain)?;
        }
        match (self.username, self.password) {
            (Some(username), password) => {
                packet.set_credentials(username, password.map(str::as_bytes))?
            }
            (None, Some(_)) => return Err(SessionError::InvalidConfig),
            (None, None) => {}
        }
        Ok(packet)
    }
}

/// An MQTT client session bound to one connection.
///
/// # Type Parameters
///
/// * `C` - The connection type implementing [`Connection`]
#[derive(Debug)]
pub struct ClientSession<'a, C: Connection> {
    connection: C,
    options: Options<'a>,
    registry: SubscriptionRegistry,
    next_packet_id: u16,
    connack_received: bool,
    rx: PacketBuffer,
}

impl<'a, C: Connection> ClientSession<'a, C> {
    /// Wraps an established connection. Nothing is sent until
    /// [`connect`](Self::connect) is called.
    pub fn new(connection: C, options: Options<'a>) -> Self {
        Self {
            connection,
            options,
            registry: SubscriptionRegistry::new(),
            next_packet_id: 1,
            connack_received: false,
            rx: Vec::new(),
        }
    }

    /// Sends the CONNECT packet built from the options.
    ///
    /// The CONNACK is handled by [`process`](Self::process) like any other
    /// inbound packet, which then subscribes to the configured topics.
    ///
    /// # Errors
    ///
    /// * [`SessionError::InvalidConfig`] - a password without a user name
    /// * [`SessionError::Codec`] - a field is empty or exceeds its capacity
    /// * [`SessionError::Network`] - the CONNECT could not be written
    pub fn connect(&mut self) -> Result<(), SessionError> {
        let packet = self.options.connect_packet()?;
        self.send(&pack_connect(&packet)?)?;
        self.connack_received = false;
        info!("CONNECT sent for client {}", self.options.client_id);
        Ok(())
    }

    /// Sends a single-topic SUBSCRIBE and records the subscription.
    ///
    /// Returns the packet identifier used, which the SUBACK will echo. The
    /// registry is checked before anything is sent, and the entry is only
    /// recorded once the SUBSCRIBE is on the wire.
    pub fn subscribe(&mut self, subscription: &Subscription<'_>) -> Result<u16, SessionError> {
        let entry =
            SubscriptionEntry::new(subscription.topic, subscription.qos, subscription.commands)?;
        if self.registry.match_topic(entry.topic()).is_some() {
            return Err(RegistryError::Duplicate.into());
        }
        if self.registry.is_full() {
            return Err(RegistryError::Full.into());
        }

        let packet_id = self.allocate_packet_id();
        let mut tuples = Vec::new();
        tuples
            .push(SubscribeTuple::new(subscription.topic, subscription.qos)?)
            .map_err(|_| Error::FailedAlloc)?;
        let packet = SubscribePacket { packet_id, tuples };
        self.send(&pack_subscribe(&packet)?)?;
        info!("SUBSCRIBE {} sent for {}", packet_id, subscription.topic);

        self.registry.insert(entry)?;
        Ok(packet_id)
    }

    /// Publishes a message.
    ///
    /// QoS 1 messages get a fresh packet identifier, which is returned and
    /// later reported through [`Event::Published`]. QoS 2 is rejected.
    pub fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<Option<u16>, SessionError> {
        if qos == QoS::ExactlyOnce {
            return Err(Error::QosNotSupported.into());
        }
        let mut packet = PublishPacket::new(topic, payload)?;
        packet.qos = qos;
        packet.retain = retain;
        let frame = match qos {
            QoS::AtMostOnce => pack_publish(&packet)?,
            _ => {
                packet.packet_id = Some(self.next_packet_id);
                let frame = pack_publish(&packet)?;
                self.allocate_packet_id();
                frame
            }
        };
        self.send(&frame)?;
        debug!("PUBLISH sent to {}", topic);
        Ok(packet.packet_id)
    }

    /// Sends a PINGREQ; the PINGRESP arrives as [`Event::PingResponse`].
    pub fn ping(&mut self) -> Result<(), SessionError> {
        self.send(&pack_pingreq()?)?;
        Ok(())
    }

    /// Sends DISCONNECT and closes the connection.
    pub fn disconnect(mut self) -> Result<(), SessionError> {
        self.send(&pack_disconnect()?)?;
        info!("DISCONNECT sent");
        self.connection
            .close()
            .map_err(|_| NetworkError::WriteError)?;
        Ok(())
    }

    /// Dispatches an inbound PUBLISH.
    ///
    /// Looks up the topic, calls every command whose name equals the payload,
    /// reports [`Event::Message`] and acknowledges QoS 1 with a PUBACK that
    /// carries the inbound packet identifier.
    ///
    /// # Errors
    ///
    /// * [`SessionError::UnknownTopic`] - no subscription matches; no PUBACK
    ///   is sent
    /// * [`SessionError::Codec`] - the publish uses QoS 2
    /// * [`SessionError::Network`] - the PUBACK could not be written
    pub fn handle_publish(&mut self, publish: &PublishPacket) -> Result<(), SessionError> {
        if publish.qos == QoS::ExactlyOnce {
            return Err(Error::QosNotSupported.into());
        }
        let Some(entry) = self.registry.match_topic(&publish.topic) else {
            warn!("PUBLISH to unknown topic {}", publish.topic.as_str());
            return Err(SessionError::UnknownTopic);
        };
        for command in entry.matching_commands(&publish.payload) {
            debug!("running command {}", command.name);
            (command.handler)(publish);
        }
        self.emit(&Event::Message(publish));

        if let Some(packet_id) = publish.packet_id {
            self.send(&pack_puback(&PubackPacket { packet_id })?)?;
            debug!("PUBACK {} sent", packet_id);
        }
        Ok(())
    }

    /// Decodes one complete frame and reacts to it.
    ///
    /// Returns the decoded packet so the caller can inspect it. Every error is
    /// fatal for the connection.
    pub fn process(&mut self, frame: &[u8]) -> Result<Packet, SessionError> {
        let packet = unpack(frame)?;

        match (&packet, self.connack_received) {
            (Packet::Connack(_), true) => {
                error!("duplicate CONNACK");
                return Err(SessionError::DuplicateConnack);
            }
            (Packet::Connack(_), false) => {}
            (_, false) => {
                error!("expected CONNACK, got {:?}", packet.packet_type());
                return Err(SessionError::MissingConnack);
            }
            (_, true) => {}
        }

        match &packet {
            Packet::Connack(ack) => self.handle_connack(ack)?,
            Packet::Publish(publish) => self.handle_publish(publish)?,
            Packet::Puback(ack) => {
                debug!("PUBACK {}", ack.packet_id);
                self.emit(&Event::Published {
                    packet_id: ack.packet_id,
                });
            }
            Packet::Suback(ack) => {
                for code in &ack.return_codes {
                    match code {
                        SubscribeReturnCode::Success(qos) => {
                            info!("SUBACK {} granted {:?}", ack.packet_id, qos)
                        }
                        SubscribeReturnCode::Failure => {
                            warn!("SUBACK {} refused a topic", ack.packet_id)
                        }
                    }
                }
                self.emit(&Event::Subscribed(ack));
            }
            Packet::Unsuback(ack) => debug!("UNSUBACK {}", ack.packet_id),
            Packet::Pingresp => self.emit(&Event::PingResponse),
            other => {
                error!("unexpected {:?} from broker", other.packet_type());
                return Err(SessionError::UnexpectedPacket(other.packet_type()));
            }
        }
        Ok(packet)
    }

    /// Blocks until one complete frame is available, then processes it.
    ///
    /// Bytes that follow the frame stay buffered for the next call, so
    /// coalesced or split TCP segments are handled. A zero-byte read is
    /// reported as [`NetworkError::ConnectionClosed`].
    pub fn poll(&mut self) -> Result<Packet, SessionError> {
        loop {
            if let Some(frame_len) = self.buffered_frame_len()? {
                let mut rx = core::mem::take(&mut self.rx);
                let result = self.process(&rx[..frame_len]);
                let rest = rx.len() - frame_len;
                rx.copy_within(frame_len.., 0);
                rx.truncate(rest);
                self.rx = rx;
                return result;
            }
            self.fill()?;
        }
    }

    /// Runs the read loop until a fatal error occurs.
    ///
    /// The connection is closed before the error is returned.
    pub fn run(mut self) -> SessionError {
        loop {
            if let Err(e) = self.poll() {
                error!("session terminated: {:?}", e);
                if self.connection.close().is_err() {
                    warn!("closing the connection failed");
                }
                return e;
            }
        }
    }

    /// The subscriptions recorded so far.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// The session options.
    pub fn options(&self) -> &Options<'a> {
        &self.options
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// The underlying connection, mutably.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Packet identifier the next SUBSCRIBE or QoS 1 PUBLISH will use.
    pub fn next_packet_id(&self) -> u16 {
        self.next_packet_id
    }

    fn handle_connack(&mut self, ack: &ConnackPacket) -> Result<(), SessionError> {
        self.connack_received = true;
        if ack.return_code != ConnectReturnCode::Accepted {
            error!("connection refused: {:?}", ack.return_code);
            return Err(SessionError::ConnectionRefused(ack.return_code));
        }
        info!("connected, session present: {}", ack.session_present);
        self.emit(&Event::Connected {
            session_present: ack.session_present,
        });

        let subscriptions = self.options.subscriptions;
        for subscription in subscriptions {
            self.subscribe(subscription)?;
        }
        Ok(())
    }

    fn emit(&self, event: &Event<'_>) {
        if let Some(handler) = self.options.on_event {
            handler(event);
        }
    }

    /// Identifiers start at 1 and wrap from 65535 back to 1, skipping 0.
    fn allocate_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = id.wrapping_add(1).max(1);
        id
    }

    fn buffered_frame_len(&self) -> Result<Option<usize>, SessionError> {
        match FixedHeader::parse(&self.rx) {
            Ok((header, header_len)) => {
                let frame_len = header_len + header.remaining_length as usize;
                if frame_len > MAX_PACKET_SIZE {
                    return Err(Error::FailedAlloc.into());
                }
                Ok((self.rx.len() >= frame_len).then_some(frame_len))
            }
            Err(Error::OutOfBounds) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn fill(&mut self) -> Result<(), SessionError> {
        let filled = self.rx.len();
        self.rx
            .resize(MAX_PACKET_SIZE, 0)
            .map_err(|_| Error::FailedAlloc)?;
        let result = self.connection.read(&mut self.rx[filled..]);
        let read = match result {
            Ok(0) => Err(NetworkError::ConnectionClosed),
            Ok(n) => Ok(n.min(MAX_PACKET_SIZE - filled)),
            Err(_) => Err(NetworkError::ReadError),
        };
        match read {
            Ok(n) => {
                self.rx.truncate(filled + n);
                Ok(())
            }
            Err(e) => {
                self.rx.truncate(filled);
                Err(e.into())
            }
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), NetworkError> {
        let mut written = 0;
        while written < frame.len() {
            match self.connection.write(&frame[written..]) {
                Ok(0) => return Err(NetworkError::ConnectionClosed),
                Ok(n) => written += n,
                Err(_) => return Err(NetworkError::WriteError),
            }
        }
        self.connection.flush().map_err(|_| NetworkError::WriteError)
    }
}
