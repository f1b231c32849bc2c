//! Throughput Benchmark for checkd
//!
//! This benchmark measures the per-request protocol work: dialect
//! detection, response encoding, framing and a full in-process check.

use checkd::protocol::{
    decode_request, encode_frame, format_error, CheckBatchResponse, CheckResult, FrameDecoder,
};
use checkd::scheduler::{register_builtin_checks, CallerClass, LocalScheduler, TaskScheduler};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::time::Duration;

const STRUCTURED: &[u8] =
    br#"{"request":"passive checks","data":[{"key":"system.localtime[utc]","timeout":"3"}]}"#;

/// Benchmark dialect detection
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("structured", |b| {
        b.iter(|| decode_request(black_box(STRUCTURED)));
    });

    group.bench_function("legacy", |b| {
        b.iter(|| decode_request(black_box(b"vfs.fs.size[/,free]")));
    });

    group.bench_function("empty_items", |b| {
        let raw = br#"{"request":"passive checks","data":[]}"#;
        b.iter(|| decode_request(black_box(raw)));
    });

    group.finish();
}

/// Benchmark response encoding in both dialects
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Elements(1));

    group.bench_function("structured_value", |b| {
        b.iter(|| {
            let response =
                CheckBatchResponse::single("0.1.0", CheckResult::value(black_box("1700000000")));
            response.encode()
        });
    });

    group.bench_function("legacy_error", |b| {
        b.iter(|| format_error(black_box("Unknown metric vfs.fs.size")));
    });

    group.bench_function("frame", |b| {
        let payload = "x".repeat(1024);
        b.iter(|| encode_frame(black_box(payload.as_bytes())));
    });

    group.finish();
}

/// Benchmark incremental frame decoding
fn bench_frame_decode(c: &mut Criterion) {
    let decoder = FrameDecoder::default();
    let framed = encode_frame(STRUCTURED);

    let mut group = c.benchmark_group("frame_decode");
    group.throughput(Throughput::Bytes(framed.len() as u64));

    group.bench_function("framed", |b| {
        b.iter(|| decoder.decode(black_box(&framed), false));
    });

    group.bench_function("unframed_line", |b| {
        b.iter(|| decoder.decode(black_box(b"agent.ping\n"), false));
    });

    group.finish();
}

/// Benchmark a full check through the local scheduler
fn bench_perform_task(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut scheduler = LocalScheduler::default();
    register_builtin_checks(&mut scheduler, "bench-host");

    let mut group = c.benchmark_group("perform_task");
    group.throughput(Throughput::Elements(1));

    group.bench_function("agent_ping", |b| {
        b.iter(|| {
            runtime.block_on(scheduler.perform_task(
                black_box("agent.ping"),
                Duration::from_secs(3),
                CallerClass::Passive,
            ))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_encode,
    bench_frame_decode,
    bench_perform_task
);
criterion_main!(benches);
