//! Decode Throughput Benchmark
//!
//! Measures the request decoder over the workloads that matter: small
//! pipelined commands, inline commands, and the big-argument streaming
//! path (which exercises the pre-reservation and zero-copy adopt).

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use emberkv::protocol::{Decode, QueryBuffer, RequestDecoder};

fn drain(decoder: &mut RequestDecoder, buf: &mut QueryBuffer) -> usize {
    let mut commands = 0;
    loop {
        match decoder.decode(buf).expect("well-formed input") {
            Decode::Command(args) => {
                black_box(args);
                commands += 1;
                decoder.reset();
            }
            Decode::Incomplete => return commands,
        }
    }
}

/// Benchmark small multibulk commands, one per iteration
fn bench_small_commands(c: &mut Criterion) {
    let input = b"*3\r\n$3\r\nSET\r\n$8\r\nuser:101\r\n$5\r\nember\r\n";

    let mut group = c.benchmark_group("decode_small");
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("multibulk_set", |b| {
        let mut decoder = RequestDecoder::new();
        let mut buf = QueryBuffer::new();
        b.iter(|| {
            buf.append(input);
            assert_eq!(drain(&mut decoder, &mut buf), 1);
        });
    });

    group.bench_function("inline_ping", |b| {
        let mut decoder = RequestDecoder::new();
        let mut buf = QueryBuffer::new();
        b.iter(|| {
            buf.append(b"PING\r\n");
            assert_eq!(drain(&mut decoder, &mut buf), 1);
        });
    });

    group.finish();
}

/// Benchmark a pipelined batch of commands in one buffer
fn bench_pipelined(c: &mut Criterion) {
    let mut batch = Vec::new();
    for i in 0..100 {
        batch.extend_from_slice(format!("*2\r\n$3\r\nGET\r\n$6\r\nkey:{:02}\r\n", i).as_bytes());
    }

    let mut group = c.benchmark_group("decode_pipelined");
    group.throughput(Throughput::Elements(100));

    group.bench_function("batch_100", |b| {
        let mut decoder = RequestDecoder::new();
        let mut buf = QueryBuffer::new();
        b.iter(|| {
            buf.append(&batch);
            assert_eq!(drain(&mut decoder, &mut buf), 100);
        });
    });

    group.finish();
}

/// Benchmark the big-argument path: 16 KB reads streaming a 1 MB value
fn bench_big_argument(c: &mut Criterion) {
    let payload = vec![b'x'; 1024 * 1024];
    let header = format!("*1\r\n${}\r\n", payload.len());

    let mut group = c.benchmark_group("decode_big_arg");
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.sample_size(20);

    group.bench_function("streamed_1mb", |b| {
        let mut decoder = RequestDecoder::new();
        let mut buf = QueryBuffer::new();
        b.iter(|| {
            buf.append(header.as_bytes());
            let _ = drain(&mut decoder, &mut buf);
            for chunk in payload.chunks(16 * 1024) {
                buf.append(chunk);
                let _ = drain(&mut decoder, &mut buf);
            }
            buf.append(b"\r\n");
            assert_eq!(drain(&mut decoder, &mut buf), 1);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_small_commands,
    bench_pipelined,
    bench_big_argument
);
criterion_main!(benches);
