//! Performance benchmarks for draftws.
//!
//! Run with: `cargo bench`

use std::hint::black_box;

use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use draftws::protocol::challenge::compute_response;
use draftws::protocol::handshake::HandshakeRequest;
use draftws::protocol::sentinel::{self, SentinelCodec};
use draftws::protocol::{Frame, HybiCodec, SeededRandom, apply_mask, apply_mask_fast};
use draftws::{Config, Role, compute_accept_key};

const MAX: usize = 16 * 1024 * 1024;

fn masked_wire(payload_size: usize) -> BytesMut {
    let mut rng = SeededRandom::new(7);
    let mut wire = BytesMut::new();
    HybiCodec::new(Role::Client, MAX).encode(
        &Frame::binary(vec![0xAB; payload_size]),
        &mut rng,
        &mut wire,
    );
    wire
}

fn bench_hybi_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("hybi_decode");

    for (name, size) in [("10b", 10), ("1kb", 1024), ("64kb", 64 * 1024)] {
        let wire = masked_wire(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(name, |b| {
            let mut codec = HybiCodec::new(Role::Server, MAX);
            b.iter(|| {
                let mut buf = wire.clone();
                codec.decode(black_box(&mut buf))
            })
        });
    }

    group.finish();
}

fn bench_hybi_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("hybi_encode");
    let frame = Frame::binary(vec![0xAB; 1024]);
    group.throughput(Throughput::Bytes(1024));

    group.bench_function("server_1kb", |b| {
        let codec = HybiCodec::new(Role::Server, MAX);
        let mut rng = SeededRandom::new(1);
        let mut dst = BytesMut::with_capacity(2048);
        b.iter(|| {
            dst.clear();
            codec.encode(black_box(&frame), &mut rng, &mut dst);
        })
    });

    group.bench_function("client_1kb", |b| {
        let codec = HybiCodec::new(Role::Client, MAX);
        let mut rng = SeededRandom::new(1);
        let mut dst = BytesMut::with_capacity(2048);
        b.iter(|| {
            dst.clear();
            codec.encode(black_box(&frame), &mut rng, &mut dst);
        })
    });

    group.finish();
}

fn bench_sentinel(c: &mut Criterion) {
    let mut group = c.benchmark_group("sentinel");

    let mut wire = BytesMut::new();
    for _ in 0..64 {
        sentinel::encode(&[b'x'; 100], &mut wire).ok();
    }
    group.throughput(Throughput::Bytes(wire.len() as u64));
    group.bench_function("decode_64x100b", |b| {
        let mut codec = SentinelCodec::draft76(MAX);
        b.iter(|| {
            let mut buf = wire.clone();
            while let Ok(Some(frame)) = codec.decode(&mut buf) {
                black_box(frame);
            }
        })
    });

    let payload = vec![b'x'; 1024];
    group.bench_function("encode_1kb", |b| {
        let mut dst = BytesMut::with_capacity(2048);
        b.iter(|| {
            dst.clear();
            sentinel::encode(black_box(&payload), &mut dst)
        })
    });

    group.finish();
}

fn bench_masking(c: &mut Criterion) {
    let mut group = c.benchmark_group("masking");
    let mask = [0x37, 0xfa, 0x21, 0x3d];

    for (name, size) in [("1kb", 1024), ("64kb", 64 * 1024)] {
        let mut data = vec![0xAB; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("bytewise_{name}"), |b| {
            b.iter(|| apply_mask(black_box(&mut data), mask))
        });
        group.bench_function(format!("wordwise_{name}"), |b| {
            b.iter(|| apply_mask_fast(black_box(&mut data), mask))
        });
    }

    group.finish();
}

fn bench_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("handshake");
    let config = Config::default();

    group.bench_function("accept_key", |b| {
        b.iter(|| compute_accept_key(black_box("dGhlIHNhbXBsZSBub25jZQ==")))
    });

    group.bench_function("draft76_response", |b| {
        b.iter(|| {
            compute_response(
                black_box("4 @1  46546xW%0l 1 5"),
                black_box("12998 5 Y3 1  .P00"),
                black_box(b"^n:ds[4U"),
            )
        })
    });

    let request = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        Origin: http://example.com\r\n\r\n";
    group.bench_function("parse_request_rfc6455", |b| {
        b.iter(|| HandshakeRequest::parse(black_box(request), &config))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_hybi_decode,
    bench_hybi_encode,
    bench_sentinel,
    bench_masking,
    bench_handshake
);
criterion_main!(benches);
