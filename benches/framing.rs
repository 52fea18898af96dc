//! 분할/인코딩 벤치마크

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rtcm_relay::mavlink::encode_gps_rtcm_data;
use rtcm_relay::{RtcmFramer, SourceId};

fn bench_framer(c: &mut Criterion) {
    let mut group = c.benchmark_group("framer");

    // 일반적인 RTCM 3 MSM 메시지 크기 ~ 여러 메시지 묶음
    for size in [60usize, 179, 450, 1024] {
        let blob = Bytes::from(vec![0xD3u8; size]);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &blob, |b, blob| {
            let mut framer = RtcmFramer::new();
            b.iter(|| black_box(framer.frame(blob)));
        });
    }

    group.finish();
}

fn bench_mavlink_encode(c: &mut Criterion) {
    let mut framer = RtcmFramer::new();
    let frame = framer.frame(&Bytes::from(vec![0x5Au8; 180]))[0].clone();
    let source = SourceId::default();

    c.bench_function("mavlink_encode_full_frame", |b| {
        let mut seq = 0u8;
        b.iter(|| {
            seq = seq.wrapping_add(1);
            black_box(encode_gps_rtcm_data(&frame, source, seq))
        });
    });
}

criterion_group!(benches, bench_framer, bench_mavlink_encode);
criterion_main!(benches);
