use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::mqtt::codec::bench_pack_publish,
    network::application::mqtt::codec::bench_unpack_publish,
    network::application::mqtt::codec::bench_remaining_length,
    network::application::mqtt::session::bench_dispatch_qos0,
    network::application::mqtt::session::bench_dispatch_qos1
);
criterion_main!(benches);
