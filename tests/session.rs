mod common;

use common::MockConnection;
use smartled_mqtt::network::application::mqtt::*;
use smartled_mqtt::network::error::Error as NetworkError;
use std::sync::atomic::{AtomicUsize, Ordering};

const LED_TOPIC: &str = "home/chris/smart_led";
const CONNACK_OK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
const SUBACK_1: [u8; 5] = [0x90, 0x03, 0x00, 0x01, 0x01];

static LED_ON_CALLS: AtomicUsize = AtomicUsize::new(0);
static LED_OFF_CALLS: AtomicUsize = AtomicUsize::new(0);

fn led_on(publish: &PublishPacket) {
    assert_eq!(&publish.payload[..], b"on");
    LED_ON_CALLS.fetch_add(1, Ordering::SeqCst);
}

fn led_off(_publish: &PublishPacket) {
    LED_OFF_CALLS.fetch_add(1, Ordering::SeqCst);
}

static LED_COMMANDS: &[Command] = &[
    Command {
        name: "on",
        handler: led_on,
    },
    Command {
        name: "off",
        handler: led_off,
    },
];

static LED_SUBSCRIPTIONS: &[Subscription<'static>] = &[Subscription {
    topic: LED_TOPIC,
    qos: QoS::AtLeastOnce,
    commands: LED_COMMANDS,
}];

fn noop(_publish: &PublishPacket) {}

static NOOP_COMMANDS: &[Command] = &[Command {
    name: "noop",
    handler: noop,
}];

fn publish_frame(topic: &str, payload: &[u8], qos: QoS, packet_id: Option<u16>) -> PacketBuffer {
    let mut packet = PublishPacket::new(topic, payload).unwrap();
    packet.qos = qos;
    packet.packet_id = packet_id;
    pack_publish(&packet).unwrap()
}

#[test]
fn test_smart_led_scenario() {
    let publish_on = publish_frame(LED_TOPIC, b"on", QoS::AtLeastOnce, Some(0x0101));
    let publish_unknown = publish_frame("home/other", b"on", QoS::AtLeastOnce, Some(0x0102));
    let (conn, state) =
        MockConnection::with_inbound(&[
        &CONNACK_OK,
        &SUBACK_1,
        &publish_on[..],
        &publish_unknown[..],
    ]);

    let options = Options::new("Subscriber").with_subscriptions(LED_SUBSCRIPTIONS);
    let mut session = ClientSession::new(conn, options);

    session.connect().unwrap();
    assert_eq!(
        &state.borrow().written[0][..],
        &pack_connect(&ConnectPacket::new("Subscriber").unwrap()).unwrap()[..]
    );

    // CONNACK triggers the configured subscription.
    assert!(matches!(session.poll(), Ok(Packet::Connack(_))));
    assert_eq!(session.registry().len(), 1);
    let expected_subscribe = [
        0x82, 25, 0x00, 0x01, 0x00, 20, b'h', b'o', b'm', b'e', b'/', b'c', b'h', b'r', b'i',
        b's', b'/', b's', b'm', b'a', b'r', b't', b'_', b'l', b'e', b'd', 0x01,
    ];
    assert_eq!(&state.borrow().written[1][..], &expected_subscribe[..]);

    assert!(matches!(session.poll(), Ok(Packet::Suback(_))));

    // PUBLISH "on": one handler call and exactly one PUBACK.
    assert!(matches!(session.poll(), Ok(Packet::Publish(_))));
    assert_eq!(LED_ON_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(LED_OFF_CALLS.load(Ordering::SeqCst), 0);
    assert_eq!(state.borrow().written.len(), 3);
    assert_eq!(&state.borrow().written[2][..], &[0x40, 0x02, 0x01, 0x01]);

    // Unknown topic: reported, nothing sent, no handler.
    assert_eq!(session.poll(), Err(SessionError::UnknownTopic));
    assert_eq!(state.borrow().written.len(), 3);
    assert_eq!(LED_ON_CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_first_packet_must_be_connack() {
    let (conn, _state) = MockConnection::with_inbound(&[&[0xD0, 0x00]]);
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    session.connect().unwrap();
    assert_eq!(session.poll(), Err(SessionError::MissingConnack));
}

#[test]
fn test_duplicate_connack_is_fatal() {
    let (conn, _state) = MockConnection::with_inbound(&[&CONNACK_OK, &CONNACK_OK]);
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    session.connect().unwrap();
    assert!(session.poll().is_ok());
    assert_eq!(session.poll(), Err(SessionError::DuplicateConnack));
}

#[test]
fn test_refused_connack_does_not_subscribe() {
    let (conn, state) = MockConnection::with_inbound(&[&[0x20, 0x02, 0x00, 0x05]]);
    let options = Options::new("Subscriber").with_subscriptions(LED_SUBSCRIPTIONS);
    let mut session = ClientSession::new(conn, options);
    session.connect().unwrap();

    assert_eq!(
        session.poll(),
        Err(SessionError::ConnectionRefused(
            ConnectReturnCode::NotAuthorized
        ))
    );
    assert_eq!(state.borrow().written.len(), 1);
    assert!(session.registry().is_empty());
}

#[test]
fn test_run_closes_connection_on_fatal_error() {
    let (conn, state) = MockConnection::with_inbound(&[&CONNACK_OK, &[0xD0, 0x00]]);
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    session.connect().unwrap();

    let reason = session.run();
    assert_eq!(
        reason,
        SessionError::Network(NetworkError::ConnectionClosed)
    );
    assert!(state.borrow().closed);
}

#[test]
fn test_poll_reassembles_split_and_coalesced_frames() {
    let (conn, _state) =
        MockConnection::with_inbound(&[&[0x20], &[0x02, 0x00], &[0x00, 0xD0, 0x00]]);
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    session.connect().unwrap();

    assert!(matches!(session.poll(), Ok(Packet::Connack(_))));
    assert_eq!(session.poll(), Ok(Packet::Pingresp));
    assert_eq!(
        session.poll(),
        Err(SessionError::Network(NetworkError::ConnectionClosed))
    );
}

#[test]
fn test_malformed_frame_is_a_codec_error() {
    let (conn, _state) = MockConnection::with_inbound(&[&[0x21, 0x02, 0x00, 0x00]]);
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    session.connect().unwrap();
    assert_eq!(
        session.poll(),
        Err(SessionError::Codec(Error::IncorrectFlags))
    );
}

#[test]
fn test_packet_ids_start_at_one_and_skip_zero() {
    let (conn, _state) = MockConnection::new();
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    assert_eq!(session.next_packet_id(), 1);

    let subscription = Subscription {
        topic: "home/led",
        qos: QoS::AtMostOnce,
        commands: NOOP_COMMANDS,
    };
    assert_eq!(session.subscribe(&subscription), Ok(1));
    assert_eq!(
        session.publish("home/led", b"on", QoS::AtLeastOnce, false),
        Ok(Some(2))
    );
    assert_eq!(
        session.publish("home/led", b"on", QoS::AtMostOnce, false),
        Ok(None)
    );
    assert_eq!(session.next_packet_id(), 3);

    for expected in 3..=u16::MAX {
        assert_eq!(
            session.publish("t", b"", QoS::AtLeastOnce, false),
            Ok(Some(expected))
        );
    }
    assert_eq!(session.next_packet_id(), 1);
    assert_eq!(
        session.publish("t", b"", QoS::AtLeastOnce, false),
        Ok(Some(1))
    );
}

#[test]
fn test_publish_rejects_qos2() {
    let (conn, state) = MockConnection::new();
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    assert_eq!(
        session.publish("t", b"x", QoS::ExactlyOnce, false),
        Err(SessionError::Codec(Error::QosNotSupported))
    );
    assert!(state.borrow().written.is_empty());
    assert_eq!(session.next_packet_id(), 1);
}

#[test]
fn test_duplicate_subscription_is_not_sent() {
    let (conn, state) = MockConnection::new();
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    let subscription = Subscription {
        topic: "home/led",
        qos: QoS::AtLeastOnce,
        commands: NOOP_COMMANDS,
    };

    assert_eq!(session.subscribe(&subscription), Ok(1));
    assert_eq!(
        session.subscribe(&subscription),
        Err(SessionError::Registry(RegistryError::Duplicate))
    );
    assert_eq!(state.borrow().written.len(), 1);
}

#[test]
fn test_registry_capacity_is_checked_before_sending() {
    const TOPICS: [&str; MAX_SUBSCRIPTIONS + 1] =
        ["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8"];
    let (conn, state) = MockConnection::new();
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));

    for &topic in &TOPICS[..MAX_SUBSCRIPTIONS] {
        let subscription = Subscription {
            topic,
            qos: QoS::AtMostOnce,
            commands: NOOP_COMMANDS,
        };
        assert!(session.subscribe(&subscription).is_ok());
    }
    let overflow = Subscription {
        topic: TOPICS[MAX_SUBSCRIPTIONS],
        qos: QoS::AtMostOnce,
        commands: NOOP_COMMANDS,
    };
    assert_eq!(
        session.subscribe(&overflow),
        Err(SessionError::Registry(RegistryError::Full))
    );
    assert_eq!(state.borrow().written.len(), MAX_SUBSCRIPTIONS);
    assert!(session.registry().is_full());
}

static QOS0_CALLS: AtomicUsize = AtomicUsize::new(0);

fn count_qos0(_publish: &PublishPacket) {
    QOS0_CALLS.fetch_add(1, Ordering::SeqCst);
}

static QOS0_COMMANDS: &[Command] = &[Command {
    name: "toggle",
    handler: count_qos0,
}];

static QOS0_SUBSCRIPTIONS: &[Subscription<'static>] = &[Subscription {
    topic: "home/lamp",
    qos: QoS::AtMostOnce,
    commands: QOS0_COMMANDS,
}];

#[test]
fn test_qos0_publish_runs_commands_without_puback() {
    let toggle = publish_frame("home/lamp", b"toggle", QoS::AtMostOnce, None);
    let other = publish_frame("home/lamp", b"toggled", QoS::AtMostOnce, None);
    let qos2 = publish_frame_qos2("home/lamp");
    let (conn, state) =
        MockConnection::with_inbound(&[&CONNACK_OK, &toggle[..], &other[..], &qos2[..]]);
    let options = Options::new("Subscriber").with_subscriptions(QOS0_SUBSCRIPTIONS);
    let mut session = ClientSession::new(conn, options);
    session.connect().unwrap();

    session.poll().unwrap();
    let sent_before = state.borrow().written.len();
    session.poll().unwrap();
    session.poll().unwrap();
    assert_eq!(QOS0_CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(state.borrow().written.len(), sent_before);

    assert_eq!(
        session.poll(),
        Err(SessionError::Codec(Error::QosNotSupported))
    );
}

fn publish_frame_qos2(topic: &str) -> Vec<u8> {
    let mut frame = vec![0x34, 0x00, 0x00, topic.len() as u8];
    frame.extend_from_slice(topic.as_bytes());
    frame.extend_from_slice(&[0x00, 0x09, b'x']);
    frame[1] = (frame.len() - 2) as u8;
    frame
}

#[test]
fn test_unexpected_packet_from_broker() {
    let subscribe = [0x82, 0x06, 0x00, 0x01, 0x00, 0x01, b'a', 0x01];
    let (conn, _state) = MockConnection::with_inbound(&[&CONNACK_OK, &subscribe]);
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    session.connect().unwrap();
    session.poll().unwrap();
    assert_eq!(
        session.poll(),
        Err(SessionError::UnexpectedPacket(PacketType::Subscribe))
    );
}

static CONNECTED_EVENTS: AtomicUsize = AtomicUsize::new(0);
static SUBSCRIBED_EVENTS: AtomicUsize = AtomicUsize::new(0);
static PUBLISHED_EVENTS: AtomicUsize = AtomicUsize::new(0);
static PING_EVENTS: AtomicUsize = AtomicUsize::new(0);

fn record_event(event: &Event<'_>) {
    match event {
        Event::Connected { session_present } => {
            assert!(*session_present);
            CONNECTED_EVENTS.fetch_add(1, Ordering::SeqCst);
        }
        Event::Subscribed(ack) => {
            assert_eq!(ack.packet_id, 1);
            SUBSCRIBED_EVENTS.fetch_add(1, Ordering::SeqCst);
        }
        Event::Published { packet_id } => {
            assert_eq!(*packet_id, 1);
            PUBLISHED_EVENTS.fetch_add(1, Ordering::SeqCst);
        }
        Event::PingResponse => {
            PING_EVENTS.fetch_add(1, Ordering::SeqCst);
        }
        Event::Message(_) => {}
    }
}

#[test]
fn test_events_reach_the_handler() {
    let (conn, state) = MockConnection::with_inbound(&[
        &[0x20, 0x02, 0x01, 0x00],
        &SUBACK_1,
        &[0x40, 0x02, 0x00, 0x01],
        &[0xD0, 0x00],
    ]);
    let options = Options::new("Subscriber").with_event_handler(record_event);
    let mut session = ClientSession::new(conn, options);
    session.connect().unwrap();

    session.poll().unwrap();
    session.poll().unwrap();
    assert_eq!(
        session.publish("home/led/status", b"on", QoS::AtLeastOnce, false),
        Ok(Some(1))
    );
    session.poll().unwrap();
    session.ping().unwrap();
    session.poll().unwrap();

    assert_eq!(CONNECTED_EVENTS.load(Ordering::SeqCst), 1);
    assert_eq!(SUBSCRIBED_EVENTS.load(Ordering::SeqCst), 1);
    assert_eq!(PUBLISHED_EVENTS.load(Ordering::SeqCst), 1);
    assert_eq!(PING_EVENTS.load(Ordering::SeqCst), 1);
    assert_eq!(state.borrow().written.last().unwrap(), &vec![0xC0, 0x00]);
}

#[test]
fn test_partial_writes_are_completed() {
    let (conn, state) = MockConnection::new();
    state.borrow_mut().write_limit = Some(3);
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    session.connect().unwrap();

    let expected = pack_connect(&ConnectPacket::new("Subscriber").unwrap()).unwrap();
    assert_eq!(state.borrow().written_bytes(), expected.to_vec());
    assert!(state.borrow().written.len() > 1);
    assert_eq!(state.borrow().flushes, 1);
}

#[test]
fn test_write_failures_surface_as_network_errors() {
    let (conn, state) = MockConnection::new();
    state.borrow_mut().fail_writes = true;
    let mut session = ClientSession::new(conn, Options::new("Subscriber"));
    assert_eq!(
        session.connect(),
        Err(SessionError::Network(NetworkError::WriteError))
    );

    state.borrow_mut().fail_writes = false;
    state.borrow_mut().write_limit = Some(0);
    assert_eq!(
        session.connect(),
        Err(SessionError::Network(NetworkError::ConnectionClosed))
    );
}

#[test]
fn test_disconnect_sends_packet_and_closes() {
    let (conn, state) = MockConnection::new();
    let session = ClientSession::new(conn, Options::new("Subscriber"));
    session.disconnect().unwrap();
    assert_eq!(state.borrow().written, vec![vec![0xE0, 0x00]]);
    assert!(state.borrow().closed);
}

#[test]
fn test_connect_uses_will_and_credentials() {
    let json = r#"{
        "client_id": "smart_led_01",
        "keep_alive_seconds": 60,
        "clean_session": false,
        "will": { "topic": "home/led/status", "message": "offline", "qos": 1, "retain": true },
        "username": "chris",
        "password": "hunter2"
    }"#;
    let options = Options::from_json(json).unwrap();
    assert_eq!(options.client_id, "smart_led_01");
    assert_eq!(options.keep_alive_seconds, 60);
    assert!(!options.clean_session);
    assert_eq!(options.username, Some("chris"));
    assert_eq!(options.password, Some("hunter2"));

    let (conn, state) = MockConnection::new();
    let mut session = ClientSession::new(conn, options);
    session.connect().unwrap();

    let written = state.borrow().written_bytes();
    match unpack(&written).unwrap() {
        Packet::Connect(connect) => {
            assert!(!connect.flags.clean_session());
            assert_eq!(connect.keep_alive, 60);
            let will = connect.will.unwrap();
            assert_eq!(will.topic.as_str(), "home/led/status");
            assert_eq!(&will.message[..], b"offline");
            assert_eq!(connect.flags.will_qos(), 1);
            assert!(connect.flags.will_retain());
            assert_eq!(connect.username.unwrap().as_str(), "chris");
            assert_eq!(&connect.password.unwrap()[..], b"hunter2");
        }
        other => panic!("expected CONNECT, got {:?}", other),
    }
}

#[test]
fn test_config_errors() {
    assert_eq!(
        Options::from_json(r#"{ "keep_alive_seconds": 5 }"#).err(),
        Some(SessionError::InvalidConfig)
    );
    assert_eq!(
        Options::from_json(r#"{ "client_id": "a", "will": { "topic": "t", "message": "m", "qos": 3 } }"#)
            .err(),
        Some(SessionError::InvalidConfig)
    );
    assert_eq!(
        Options::from_json("not json").err(),
        Some(SessionError::InvalidConfig)
    );

    let options = Options::from_json(r#"{ "client_id": "a", "password": "p" }"#).unwrap();
    let (conn, state) = MockConnection::new();
    let mut session = ClientSession::new(conn, options);
    assert_eq!(session.connect(), Err(SessionError::InvalidConfig));
    assert!(state.borrow().written.is_empty());
}

#[test]
fn test_registry_matching() {
    let entry = SubscriptionEntry::new(LED_TOPIC, QoS::AtLeastOnce, LED_COMMANDS).unwrap();
    assert_eq!(entry.topic(), LED_TOPIC);
    assert_eq!(entry.qos(), QoS::AtLeastOnce);
    assert_eq!(entry.commands().len(), 2);
    assert_eq!(entry.matching_commands(b"off").count(), 1);
    assert_eq!(entry.matching_commands(b"of").count(), 0);

    let mut registry = SubscriptionRegistry::new();
    registry.insert(entry.clone()).unwrap();
    assert_eq!(registry.insert(entry), Err(RegistryError::Duplicate));
    assert!(registry.match_topic(LED_TOPIC).is_some());
    assert!(registry.match_topic("home/chris/#").is_none());
    assert_eq!(registry.iter().count(), 1);

    assert_eq!(
        SubscriptionEntry::new("", QoS::AtMostOnce, &[]).err(),
        Some(RegistryError::EmptyTopic)
    );
    let long_topic = "x".repeat(MAX_TOPIC_LEN + 1);
    assert_eq!(
        SubscriptionEntry::new(&long_topic, QoS::AtMostOnce, &[]).err(),
        Some(RegistryError::TopicTooLong)
    );
    let too_many = [NOOP_COMMANDS[0]; MAX_COMMANDS + 1];
    assert_eq!(
        SubscriptionEntry::new("t", QoS::AtMostOnce, &too_many).err(),
        Some(RegistryError::TooManyCommands)
    );
}
