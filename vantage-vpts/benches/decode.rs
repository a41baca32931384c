//! Decoder benchmarks: page frames fed in socket-sized and tiny chunks
//!
//! Header scanning re-reads the accumulated prefix on every call, so the
//! tiny-chunk case is the one to watch.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use vantage_vpts::{encode_frame, FrameDecoder};

const PAGE_SIZES: &[usize] = &[0, 1024, 64 * 1024, 1024 * 1024];
const CHUNK_SIZES: &[usize] = &[1, 4096];

fn decode_page(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode/page");

    for &size in PAGE_SIZES {
        let frame = encode_frame(&vec![b'x'; size]);
        group.throughput(Throughput::Bytes(frame.len() as u64));

        for &chunk in CHUNK_SIZES {
            if chunk == 1 && size > 64 * 1024 {
                continue;
            }
            group.bench_with_input(
                BenchmarkId::new(format!("chunk_{chunk}"), size),
                &frame,
                |b, frame| {
                    b.iter(|| {
                        let mut decoder = FrameDecoder::new();
                        let mut acc = BytesMut::with_capacity(chunk);
                        for piece in frame.chunks(chunk) {
                            acc.extend_from_slice(piece);
                            if let Some(page) = decoder.decode(&mut acc).unwrap() {
                                return black_box(page.len());
                            }
                        }
                        unreachable!("frame never completed")
                    });
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, decode_page);
criterion_main!(benches);
