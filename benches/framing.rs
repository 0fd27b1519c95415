//! Benchmarks for message framing and decoding.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use syslog_relay::{ByteArray, FrameDecoder, FramingMethod};

const SIZES: [usize; 3] = [128, 1024, 8192];

fn payload(len: usize) -> Vec<u8> {
    b"<13>1 2024-01-01T00:00:00Z host app - - - "
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for size in SIZES {
        let message = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        for method in [FramingMethod::OctetCounting, FramingMethod::NonTransparent] {
            group.bench_with_input(BenchmarkId::new(method.to_string(), size), &message, |b, m| {
                b.iter(|| black_box(method.encode(black_box(m))));
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for size in SIZES {
        let wire: Vec<u8> = (0..32)
            .flat_map(|_| FramingMethod::OctetCounting.encode(&payload(size)))
            .collect();
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            b.iter(|| {
                let mut decoder = FrameDecoder::new(FramingMethod::OctetCounting, 0);
                decoder.extend(wire);
                let mut frames = 0;
                while let Ok(Some(frame)) = decoder.next_frame() {
                    black_box(frame);
                    frames += 1;
                }
                frames
            });
        });
    }
    group.finish();
}

fn bench_truncation(c: &mut Criterion) {
    let message = payload(16 * 1024);
    c.bench_function("byte_array_truncate_4k", |b| {
        let mut buf = ByteArray::new(4096);
        b.iter(|| {
            buf.reset();
            buf.append(black_box(&message));
            black_box(buf.len())
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_truncation);
criterion_main!(benches);
