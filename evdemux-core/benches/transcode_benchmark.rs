//! Benchmarks for transcoder throughput.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use evdemux_core::{transcode, MemorySink, OwnedRow};

fn header(code: u8, declared: u32) -> Vec<u8> {
    let mut bytes = vec![code, 0, 0, 0];
    bytes.extend_from_slice(&declared.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 20]);
    bytes
}

/// Synthetic DAVIS346 recording: mostly polarity packets with interleaved
/// IMU samples, an occasional frame and some empty rows.
fn synthetic_recording(rows: usize) -> Vec<OwnedRow> {
    (0..rows)
        .map(|i| match i % 20 {
            0 => OwnedRow::new(Some(header(2, 36 + 346 * 2 * 260)), Some(vec![0; 692 * 260])),
            1..=3 => OwnedRow::new(Some(header(3, 36)), Some(vec![1; 36 * 4])),
            4 => OwnedRow::null(),
            5 => OwnedRow::new(Some(header(0, 8)), Some(vec![2; 8])),
            _ => OwnedRow::new(Some(header(1, 8)), Some(vec![3; 8 * 512])),
        })
        .collect()
}

fn transcode_benchmark(c: &mut Criterion) {
    let rows = synthetic_recording(10_000);
    let payload_bytes: usize = rows
        .iter()
        .filter_map(|row| row.payload.as_ref())
        .map(Vec::len)
        .sum();

    let mut group = c.benchmark_group("transcode");
    group.throughput(Throughput::Bytes(payload_bytes as u64));

    group.bench_function("synthetic_10k_rows", |b| {
        b.iter(|| {
            let mut sink = MemorySink::new();
            let stats = transcode(black_box(&rows), &mut sink).unwrap();
            black_box(stats.total_events())
        })
    });

    group.finish();
}

criterion_group!(benches, transcode_benchmark);
criterion_main!(benches);
