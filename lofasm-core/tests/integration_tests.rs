use std::{
    fs::{self, File},
    io::{BufReader, Read, Write},
    path::Path,
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use lofasm_core::{
    hex::decode_hex, ArchiveAssembler, ArchiveOutcome, BurstCursor, CaptureCrawler, ChannelPaths,
    ChannelSink, Filterbank, FilterbankHeader, IntegrationOutcome, LocoHeader, LocoReader,
    LocoWriter, MetadataExtractor, SimulatedCapture,
};
use lofasm_types::{BurstEpoch, PayloadEncoding, PolarizationChannel};
use num_complex::Complex64;
use tempfile::TempDir;

// ===========================================================================
// Helpers
// ===========================================================================

fn ch(code: &str) -> PolarizationChannel {
    code.parse().unwrap()
}

fn loco_header() -> LocoHeader {
    LocoHeader {
        station: "LoFASM4".into(),
        raw_bins: 16,
        fstart: 0.0,
        fstep_digits: "09765625".into(),
        start: BurstEpoch::new(57_000, 3_723_456.0),
        int_time: 0.5,
    }
}

/// Пилообразный спектр из 16 бинов.
fn saw(seed: f64) -> Vec<Complex64> {
    (0..16)
        .map(|i| Complex64::new(seed + (i % 4) as f64, seed - i as f64))
        .collect()
}

/// Два burst-а по 3 интеграции, каналы AA и AB.
fn build_capture() -> Vec<u8> {
    let mut w = LocoWriter::new(Vec::new(), &loco_header()).unwrap();

    for burst in 0..2 {
        if burst > 0 {
            w.start_burst(&BurstEpoch::new(57_000, 3_783_456.0)).unwrap();
        }
        for integ in 0..3 {
            let seed = (burst * 10 + integ) as f64;
            let aa = saw(seed);
            let ab = saw(seed + 0.5);
            w.write_integration(&[(ch("AA"), aa.as_slice()), (ch("AB"), ab.as_slice())])
                .unwrap();
        }
    }

    w.finish().unwrap()
}

fn gunzip(path: &Path) -> Vec<u8> {
    let mut out = Vec::new();
    GzDecoder::new(File::open(path).unwrap())
        .read_to_end(&mut out)
        .unwrap();
    out
}

/// Полный цикл одного burst-а для одного канала: сток → заголовок → архив.
fn convert_first_burst<C: CaptureCrawler>(
    capture: &mut C,
    dir: &Path,
    channel: PolarizationChannel,
    encoding: PayloadEncoding,
) -> ArchiveOutcome {
    let meta = MetadataExtractor::read(capture).unwrap();
    let mut cursor = BurstCursor::new(capture, &meta);
    let burst = cursor.advance().unwrap();

    let paths = ChannelPaths::new(dir, &burst.timestamp, channel, encoding);
    let mut sink = ChannelSink::open(&paths, channel, encoding, meta.bins, false).unwrap();

    loop {
        cursor.crawler().select_channel(channel);
        let spectrum = cursor.crawler().read_current_sample().unwrap();
        sink.write(&spectrum).unwrap();

        if cursor.next_integration() != IntegrationOutcome::Continue {
            break;
        }
    }

    let summary = sink.close().unwrap();
    let header = FilterbankHeader::for_channel(&meta, &burst, channel, summary.integrations, encoding);

    ArchiveAssembler::new(false)
        .assemble(&header.render(), &paths)
        .unwrap()
}

// ===========================================================================
// Тесты
// ===========================================================================

#[test]
fn test_gzip_capture_is_opened_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.lofasm.gz");

    let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    enc.write_all(&build_capture()).unwrap();
    enc.finish().unwrap();

    let mut reader = LocoReader::open(&path).unwrap();
    let meta = MetadataExtractor::read(&mut reader).unwrap();

    assert_eq!(meta.station, "LoFASM4");
    assert_eq!(meta.raw_bins, 16);
    assert_eq!(meta.bins, 8);

    reader.select_channel(ch("AB"));
    assert_eq!(reader.read_current_sample().unwrap(), saw(0.5));
}

#[test]
fn test_archive_matches_header_dimensions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.lofasm");
    fs::write(&path, build_capture()).unwrap();

    let mut reader = LocoReader::open(&path).unwrap();
    let outcome = convert_first_burst(&mut reader, dir.path(), ch("AB"), PayloadEncoding::Binary);

    let ArchiveOutcome::Written { path: archive, .. } = outcome else {
        panic!("архив должен быть записан");
    };
    assert!(archive.ends_with("20141209_010203_AB.bbx.gz"));

    let fb = Filterbank::read(gunzip(&archive).as_slice()).unwrap();
    assert_eq!(fb.header.integrations, 3);
    assert_eq!(fb.header.bins, 8);
    assert_eq!(fb.header.station, "LoFASM4");
    assert_eq!(fb.data.len(), 3 * 8 * 2);

    // Пары (re, im) по бинам, только первые 8 бинов
    let second = fb.integration(1).unwrap();
    let expected: Vec<f64> = saw(1.5)[..8].iter().flat_map(|c| [c.re, c.im]).collect();
    assert_eq!(second, expected.as_slice());

    // Временные файлы убраны
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.ends_with(".dat") || name.ends_with(".hdr")
        })
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_ascii_archive_decodes_to_binary_payload() {
    let bin_dir = TempDir::new().unwrap();
    let hex_dir = TempDir::new().unwrap();

    let mut sim = SimulatedCapture::new(64, &[4]);
    convert_first_burst(&mut sim, bin_dir.path(), ch("CD"), PayloadEncoding::Binary);
    let mut sim = SimulatedCapture::new(64, &[4]);
    convert_first_burst(&mut sim, hex_dir.path(), ch("CD"), PayloadEncoding::Ascii);

    let bin = gunzip(&bin_dir.path().join("20141209_000000_CD.bbx.gz"));
    let hex = gunzip(&hex_dir.path().join("20141209_000000_CD.abx.gz"));

    let mut bin_reader = BufReader::new(bin.as_slice());
    let bin_header = FilterbankHeader::parse(&mut bin_reader).unwrap();
    let mut bin_payload = Vec::new();
    bin_reader.read_to_end(&mut bin_payload).unwrap();

    let mut hex_reader = BufReader::new(hex.as_slice());
    let hex_header = FilterbankHeader::parse(&mut hex_reader).unwrap();
    let mut hex_payload = Vec::new();
    hex_reader.read_to_end(&mut hex_payload).unwrap();

    assert_eq!(bin_header.integrations, 4);
    assert_eq!(hex_header.integrations, 4);
    assert_eq!(bin_payload.len(), bin_header.payload_len());
    assert!(hex_payload
        .split(|&b| b == b'\n')
        .all(|line| line.len() <= 80));
    assert_eq!(decode_hex(&hex_payload).unwrap(), bin_payload);
}

#[test]
fn test_second_burst_after_corruption() {
    let mut w = LocoWriter::new(Vec::new(), &loco_header()).unwrap();
    let a = saw(1.0);
    w.write_integration(&[(ch("AA"), a.as_slice())]).unwrap();
    w.write_corrupt_integration(&[(ch("AA"), a.as_slice())]).unwrap();
    w.start_burst(&BurstEpoch::new(57_001, 0.0)).unwrap();
    let b = saw(2.0);
    w.write_integration(&[(ch("AA"), b.as_slice())]).unwrap();
    let bytes = w.finish().unwrap();

    let mut reader = LocoReader::new(bytes.as_slice()).unwrap();
    let meta = MetadataExtractor::read(&mut reader).unwrap();
    let mut cursor = BurstCursor::new(&mut reader, &meta);

    cursor.advance().unwrap();
    assert!(matches!(
        cursor.next_integration(),
        IntegrationOutcome::BurstCorrupt(_)
    ));

    let second = cursor.advance().unwrap();
    assert_eq!(second.timestamp, "20141210_000000");
    assert_eq!(cursor.next_integration(), IntegrationOutcome::CaptureExhausted);
}
