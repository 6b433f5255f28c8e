extern crate criterion;

use adalzw::{Decoder, Encoder, LzwStatus, Mode};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Text-like input: words from a small vocabulary picked by a xorshift generator.
fn corpus(len: usize) -> Vec<u8> {
    const WORDS: &[&[u8]] = &[
        b"the ", b"codec ", b"stream ", b"of ", b"bits ", b"grows ", b"and ", b"resets ",
        b"when ", b"full. ", b"table ", b"width ",
    ];
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let mut data = Vec::with_capacity(len + 8);
    while data.len() < len {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        data.extend_from_slice(WORDS[(state % WORDS.len() as u64) as usize]);
    }
    data.truncate(len);
    data
}

pub fn bench_encode(c: &mut Criterion) {
    let data = corpus(1 << 20);
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for &mode in &[Mode::Freeze, Mode::Reset, Mode::Monitor] {
        let id = BenchmarkId::new(mode.to_string(), data.len());
        group.bench_with_input(id, &data, |b, data| {
            b.iter(|| {
                let mut encoder = Encoder::new(mode);
                encoder.finish();
                let mut outbuf = vec![0; 1 << 12];
                let mut data = data.as_slice();
                loop {
                    let result = encoder.encode_bytes(data, &mut outbuf[..]);
                    data = &data[result.consumed_in..];
                    black_box(&outbuf[..result.consumed_out]);
                    if let LzwStatus::Done = result.status.expect("Error") {
                        break;
                    }
                }
            })
        });
    }
    group.finish();
}

pub fn bench_decode(c: &mut Criterion) {
    let data = corpus(1 << 20);
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for &mode in &[Mode::Freeze, Mode::Reset, Mode::Monitor] {
        let compressed = adalzw::compress(&data, mode);
        let id = BenchmarkId::new(mode.to_string(), data.len());
        group.bench_with_input(id, &compressed, |b, compressed| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                let mut outbuf = vec![0; 1 << 12];
                let mut data = compressed.as_slice();
                loop {
                    let result = decoder.decode_bytes(data, &mut outbuf[..]);
                    let done = result.status.expect("Error");
                    data = &data[result.consumed_in..];
                    black_box(&outbuf[..result.consumed_out]);
                    if let LzwStatus::Done = done {
                        break;
                    }
                    if let LzwStatus::NoProgress = done {
                        panic!("Need to make progress");
                    }
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
