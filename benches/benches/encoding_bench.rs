//! Пропускная способность кодирования полезной нагрузки.
//!
//! Запуск:
//!   cargo bench -p lofasm-benchmark --bench encoding_bench

use std::io::{self, sink};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lofasm_core::{
    CaptureCrawler, ChannelPaths, ChannelSink, HexWriter, LocoHeader, LocoReader, LocoWriter,
    MetadataExtractor,
};
use lofasm_types::{BurstEpoch, PayloadEncoding, PolarizationChannel};
use num_complex::Complex64;
use tempfile::TempDir;

const RAW_BINS: usize = 2048;

fn spectrum(bins: usize) -> Vec<Complex64> {
    (0..bins)
        .map(|i| Complex64::new(i as f64 * 0.25, -(i as f64).sqrt()))
        .collect()
}

fn channel(code: &str) -> PolarizationChannel {
    code.parse().unwrap()
}

fn bench_hex_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("hex_writer");

    for size in [1024usize, 16 * 1024, 256 * 1024] {
        let bytes: Vec<u8> = (0..size).map(|i| (i * 31) as u8).collect();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| {
                let mut w = HexWriter::new(sink());
                w.write_bytes(black_box(bytes))?;
                w.end_line()?;
                Ok::<_, io::Error>(())
            });
        });
    }

    group.finish();
}

fn bench_channel_sink(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_sink");
    let data = spectrum(RAW_BINS);
    let bins = RAW_BINS / 2;

    for encoding in [PayloadEncoding::Binary, PayloadEncoding::Ascii] {
        for code in ["AA", "AB"] {
            let ch = channel(code);
            group.throughput(Throughput::Bytes((bins * ch.arity() * 8) as u64));

            group.bench_function(BenchmarkId::new(format!("{encoding}"), code), |b| {
                let dir = TempDir::new().unwrap();
                let paths = ChannelPaths::new(dir.path(), "20141209_000000", ch, encoding);
                let mut sink = ChannelSink::open(&paths, ch, encoding, bins, true).unwrap();

                b.iter(|| sink.write(black_box(&data)).unwrap());

                sink.close().unwrap();
            });
        }
    }

    group.finish();
}

fn bench_loco_reader(c: &mut Criterion) {
    let header = LocoHeader {
        station: "LoFASM1".into(),
        raw_bins: RAW_BINS,
        fstart: 0.0,
        fstep_digits: "09765625".into(),
        start: BurstEpoch::new(57_000, 0.0),
        int_time: 0.5,
    };
    let integrations = 64;
    let aa = spectrum(RAW_BINS);
    let ab = spectrum(RAW_BINS);

    let mut w = LocoWriter::new(Vec::new(), &header).unwrap();
    for _ in 0..integrations {
        w.write_integration(&[(channel("AA"), aa.as_slice()), (channel("AB"), ab.as_slice())])
            .unwrap();
    }
    let bytes = w.finish().unwrap();

    let mut group = c.benchmark_group("loco_reader");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("crawl_burst", |b| {
        b.iter(|| {
            let mut reader = LocoReader::new(bytes.as_slice()).unwrap();
            MetadataExtractor::read(&mut reader).unwrap();
            reader.select_channel(channel("AB"));

            let mut n = 0;
            loop {
                black_box(reader.read_current_sample().unwrap());
                n += 1;
                if reader.advance_integration(1).is_err() {
                    break;
                }
            }
            assert_eq!(n, integrations);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_hex_writer, bench_channel_sink, bench_loco_reader);
criterion_main!(benches);
