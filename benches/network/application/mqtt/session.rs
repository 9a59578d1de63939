use criterion::{Criterion, Throughput, black_box};
use smartled_mqtt::network::application::mqtt::{
    ClientSession, Command, Options, PacketBuffer, PublishPacket, QoS, Subscription, pack_publish,
};
use smartled_mqtt::network::error::Error;
use smartled_mqtt::network::{Close, Connection, Read, Write};

const TOPIC: &str = "home/chris/smart_led";

/// Accepts every write and never has anything to read.
struct SinkConnection;

impl Read for SinkConnection {
    type Error = Error;
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(0)
    }
}

impl Write for SinkConnection {
    type Error = Error;
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for SinkConnection {
    type Error = Error;
    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for SinkConnection {}

fn led_on(publish: &PublishPacket) {
    black_box(publish);
}

fn led_off(publish: &PublishPacket) {
    black_box(publish);
}

static COMMANDS: &[Command] = &[
    Command {
        name: "on",
        handler: led_on,
    },
    Command {
        name: "off",
        handler: led_off,
    },
];

static SUBSCRIPTIONS: &[Subscription<'static>] = &[Subscription {
    topic: TOPIC,
    qos: QoS::AtLeastOnce,
    commands: COMMANDS,
}];

fn connected_session() -> ClientSession<'static, SinkConnection> {
    let options = Options::new("smartled-bench").with_subscriptions(SUBSCRIPTIONS);
    let mut session = ClientSession::new(SinkConnection, options);
    session.connect().expect("Failed to connect");
    session
        .process(&[0x20, 0x02, 0x00, 0x00])
        .expect("Failed to process CONNACK");
    session
}

fn command_frame(qos: QoS, packet_id: Option<u16>) -> PacketBuffer {
    let mut packet = PublishPacket::new(TOPIC, b"on").expect("Failed to build publish");
    packet.qos = qos;
    packet.packet_id = packet_id;
    pack_publish(&packet).expect("Failed to pack")
}

pub fn bench_dispatch_qos0(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_qos0");
    let frame = command_frame(QoS::AtMostOnce, None);
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("dispatch_qos0", |b| {
        b.iter_batched_ref(
            connected_session,
            |session| {
                session
                    .process(black_box(&frame))
                    .expect("Failed to dispatch");
            },
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_dispatch_qos1(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_qos1");
    let frame = command_frame(QoS::AtLeastOnce, Some(7));
    group.throughput(Throughput::Bytes(frame.len() as u64 * 50));
    group.bench_function("dispatch_qos1", |b| {
        b.iter_batched_ref(
            connected_session,
            |session| {
                // Each message is answered with a PUBACK.
                for _ in 0..50 {
                    session
                        .process(black_box(&frame))
                        .expect("Failed to dispatch");
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
    group.finish();
}
