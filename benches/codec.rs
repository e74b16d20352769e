//! Frame codec and broadcast benchmark suite.
//!
//! - Encoding server text frames at several payload sizes
//! - Decoding masked client frames at the same sizes
//! - Broadcast fan-out across growing member counts
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use websocket_chat::protocol::frame::{self, Frame};
use websocket_chat::{ConnectionHandle, ConnectionId, Registry};

// ============================================================================
// Benchmark Parameters
// ============================================================================

/// Covers the 7-bit form, the first 16-bit length, and the ceiling.
const PAYLOAD_SIZES: &[usize] = &[16, 125, 126, 4096, 65535];

const MEMBER_COUNTS: &[usize] = &[1, 10, 100, 1000];

const MASK_KEY: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

// ============================================================================
// Benchmark: Encode
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_text");

    for &size in PAYLOAD_SIZES {
        let text = "x".repeat(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| frame::encode_text(black_box(text)).expect("encode"));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Decode
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("read_frame_masked");

    for &size in PAYLOAD_SIZES {
        let bytes = Frame::text(&"x".repeat(size))
            .masked(MASK_KEY)
            .to_bytes()
            .expect("encode");

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.to_async(&rt).iter(|| async move {
                let mut reader: &[u8] = black_box(bytes);
                frame::read_frame(&mut reader).await.expect("decode")
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Broadcast
// ============================================================================

fn bench_broadcast(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("broadcast");

    for &count in MEMBER_COUNTS {
        let registry = populate(&rt, count);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("members", count), &registry, |b, registry| {
            b.iter(|| {
                registry
                    .broadcast(black_box("hello everyone"), None, true)
                    .expect("broadcast")
            });
        });

        registry.shutdown();
    }

    group.finish();
}

/// Joins `count` members whose writers discard everything.
fn populate(rt: &Runtime, count: usize) -> Registry {
    let _guard = rt.enter();
    let registry = Registry::new();

    for i in 0..count {
        let handle = ConnectionHandle::spawn(ConnectionId::next(), tokio::io::sink());
        registry.join(handle, &format!("member-{i}")).expect("join");
    }

    registry
}

criterion_group!(benches, bench_encode, bench_decode, bench_broadcast);
criterion_main!(benches);
