//! Benchmarks for the frame header codec and payload decoding
//!
//! The acquisition loop decodes one header per message at the producer's
//! frame rate, so the decode path has to stay far below the inter-frame
//! interval:
//! - FrameHeader decode/encode round trip cost
//! - Pixel payload decoding at a realistic sensor resolution
//! - The full message-to-frame assembly pipeline
//!
//! Platform: Cross-platform (pure byte manipulation, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use lightbox::test_utils::{frame_message, test_header};
use lightbox::types::SensorFrame;
use lightbox::wire::{FrameHeader, HEADER_SIZE, decode_pixels};
use std::hint::black_box;

fn bench_header_codec(c: &mut Criterion) {
    let header = test_header(42, 640, 480);
    let encoded = header.encode();

    let mut group = c.benchmark_group("header_codec");
    group.throughput(Throughput::Bytes(HEADER_SIZE as u64));

    group.bench_function("decode", |b| {
        b.iter(|| {
            let decoded = FrameHeader::decode(black_box(&encoded)).expect("valid header bytes");
            black_box(decoded)
        })
    });

    group.bench_function("encode", |b| {
        b.iter(|| {
            let bytes = black_box(&header).encode();
            black_box(bytes)
        })
    });

    group.finish();
}

fn bench_payload_decoding(c: &mut Criterion) {
    // 640x480 is the working resolution of the detectors this was built for
    let message = frame_message(1, 640, 480);
    let payload = &message[HEADER_SIZE..];
    let pixel_count = 640 * 480;

    let mut group = c.benchmark_group("payload_decoding");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("decode_pixels_640x480", |b| {
        b.iter(|| {
            let pixels =
                decode_pixels(black_box(payload), black_box(pixel_count)).expect("sized payload");
            black_box(pixels)
        })
    });

    group.finish();
}

fn bench_message_to_frame(c: &mut Criterion) {
    let message = frame_message(7, 640, 480);

    let mut group = c.benchmark_group("message_to_frame");
    group.throughput(Throughput::Bytes(message.len() as u64));

    // End-to-end assembly: header decode, payload decode, frame construction
    group.bench_function("full_assembly_640x480", |b| {
        b.iter(|| {
            let header = FrameHeader::decode(black_box(&message)).expect("valid header");
            let pixels = decode_pixels(&message[HEADER_SIZE..], header.payload_pixels())
                .expect("sized payload");
            let frame = SensorFrame::from_wire(&header, pixels).expect("well-formed frame");
            black_box(frame)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_header_codec, bench_payload_decoding, bench_message_to_frame);
criterion_main!(benches);
