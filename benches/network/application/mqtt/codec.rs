use criterion::{BenchmarkId, Criterion, Throughput, black_box};
use smartled_mqtt::network::application::mqtt::{
    PublishPacket, QoS, decode_remaining_length, encode_remaining_length, pack_publish, unpack,
};
use smartled_mqtt::network::application::mqtt::cursor::Reader;

const TOPIC: &str = "home/chris/smart_led";

fn publish(payload_len: usize) -> PublishPacket {
    let payload = vec![b'x'; payload_len];
    let mut packet = PublishPacket::new(TOPIC, &payload).expect("Failed to build publish");
    packet.qos = QoS::AtLeastOnce;
    packet.packet_id = Some(42);
    packet
}

pub fn bench_pack_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_publish");
    for payload_len in [2usize, 128, 900] {
        let packet = publish(payload_len);
        group.throughput(Throughput::Bytes(payload_len as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(payload_len),
            &packet,
            |b, packet| b.iter(|| pack_publish(black_box(packet)).expect("Failed to pack")),
        );
    }
    group.finish();
}

pub fn bench_unpack_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack_publish");
    for payload_len in [2usize, 128, 900] {
        let frame = pack_publish(&publish(payload_len)).expect("Failed to pack");
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(payload_len),
            &frame,
            |b, frame| b.iter(|| unpack(black_box(frame)).expect("Failed to unpack")),
        );
    }
    group.finish();
}

pub fn bench_remaining_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("remaining_length");
    for value in [0u32, 16_383, 268_435_455] {
        group.bench_with_input(BenchmarkId::new("encode", value), &value, |b, &value| {
            b.iter(|| {
                let mut out = [0u8; 4];
                encode_remaining_length(black_box(value), &mut out).expect("Failed to encode")
            })
        });

        let mut encoded = [0u8; 4];
        let len = encode_remaining_length(value, &mut encoded).expect("Failed to encode");
        group.bench_with_input(
            BenchmarkId::new("decode", value),
            &encoded[..len],
            |b, bytes| {
                b.iter(|| {
                    let mut reader = Reader::new(black_box(bytes));
                    decode_remaining_length(&mut reader).expect("Failed to decode")
                })
            },
        );
    }
    group.finish();
}
