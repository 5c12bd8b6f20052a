//! Filterbank-формат LoFASM (`.bbx` / `.abx`) версии 1.0
//!
//! Файл = текстовый заголовок + полезная нагрузка. Строки заголовка
//! начинаются с `%`, за ними следует строка размерностей без префикса:
//!
//! ```text
//! %ABX                          (или %\x02BX для двоичного варианта)
//! %hdr_type: LoFASM-filterbank
//! %hdr_version: 0000803F
//! ...
//! %data_type: real64
//! <integrations> <bins> <1|2> 64 <raw16|raw256>
//! ```
//!
//! Полезная нагрузка — double-значения по интеграциям: для вещественного
//! канала `bins` значений, для комплексного `2 × bins` пар (re, im).

use std::{
    io::BufRead,
    path::{Path, PathBuf},
};

use byteorder::{ByteOrder, LittleEndian};
use lofasm_types::{BurstContext, CaptureMetadata, PayloadEncoding, PolarizationChannel};

use crate::{
    error::{FormatError, FormatResult},
    hex::{decode_hex, encode_hex},
};

/// Текущая версия формата (хранится как битовый образ f32).
pub const FILTERBANK_VERSION: f32 = 1.0;

pub const HDR_TYPE: &str = "LoFASM-filterbank";

/// Разрядность значений полезной нагрузки.
pub const SAMPLE_BITS: usize = 64;

pub const SAMPLE_SIZE: usize = SAMPLE_BITS / 8;

/// Заголовок filterbank-файла одного канала одного burst-а.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterbankHeader {
    pub encoding: PayloadEncoding,
    pub station: String,
    pub channel: PolarizationChannel,
    pub start_time: String,
    /// Начало оси времени, секунды от J2000
    pub dim1_start: f64,
    /// Охват оси времени, секунды
    pub dim1_span: f64,
    /// Начальная частота, Гц
    pub dim2_start: f64,
    /// Охват оси частот, Гц
    pub dim2_span: f64,
    /// Число записанных интеграций
    pub integrations: usize,
    /// Число частотных бинов
    pub bins: usize,
}

/// Пути к файлам одного канала в пределах burst-а.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPaths {
    /// Временный файл полезной нагрузки (`.dat`)
    pub payload: PathBuf,
    /// Временный файл заголовка (`.hdr`)
    pub header: PathBuf,
    /// Итоговый архив (`.bbx.gz` / `.abx.gz`)
    pub archive: PathBuf,
}

/// Прочитанный filterbank-файл (заголовок + значения).
#[derive(Debug, Clone)]
pub struct Filterbank {
    pub header: FilterbankHeader,
    pub data: Vec<f64>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl FilterbankHeader {
    /// Заголовок канала по метаданным записи и контексту burst-а.
    ///
    /// `integrations` — число интеграций, фактически записанных стоком канала.
    pub fn for_channel(
        meta: &CaptureMetadata,
        burst: &BurstContext,
        channel: PolarizationChannel,
        integrations: usize,
        encoding: PayloadEncoding,
    ) -> Self {
        Self {
            encoding,
            station: meta.station.clone(),
            channel,
            start_time: burst.timestamp.clone(),
            dim1_start: burst.time_offset_j2000,
            dim1_span: burst.int_time * integrations as f64,
            dim2_start: meta.fstart,
            dim2_span: meta.bandwidth_hz(),
            integrations,
            bins: meta.bins,
        }
    }

    /// Число double-значений на бин.
    pub fn arity(&self) -> usize {
        self.channel.arity()
    }

    /// Размер двоичной полезной нагрузки в байтах.
    pub fn payload_len(&self) -> usize {
        self.integrations * self.bins * self.arity() * SAMPLE_SIZE
    }

    pub fn data_label(&self) -> &'static str {
        if self.channel.is_real() {
            "power spectrum (arbitrary)"
        } else {
            "cross spectrum (arbitrary)"
        }
    }

    /// Сериализация заголовка в байты (ASCII, строки через `\n`).
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(512);

        out.push(b'%');
        out.extend_from_slice(&self.encoding.magic());
        out.push(b'\n');

        let version = encode_hex(&FILTERBANK_VERSION.to_le_bytes());

        let lines = [
            format!("%hdr_type: {HDR_TYPE}"),
            format!("%hdr_version: {version}"),
            format!("%station: {}", self.station),
            format!("%channel: {}", self.channel),
            format!("%start_time: {}", self.start_time),
            "%time_offset_J2000: 0 (s)".to_string(),
            "%frequency_offset_DC: 0 (Hz)".to_string(),
            "%dim1_label: time (s)".to_string(),
            format!("%dim1_start: {}", format_real(self.dim1_start)),
            format!("%dim1_span: {}", format_real(self.dim1_span)),
            "%dim2_label: frequency (Hz)".to_string(),
            format!("%dim2_start: {}", format_real(self.dim2_start)),
            format!("%dim2_span: {}", format_real(self.dim2_span)),
            format!("%data_label: {}", self.data_label()),
            "%data_offset: 0".to_string(),
            "%data_scale: 1".to_string(),
            "%data_type: real64".to_string(),
            format!(
                "{} {} {} {} {}",
                self.integrations,
                self.bins,
                self.arity(),
                SAMPLE_BITS,
                self.encoding.summary_tag()
            ),
        ];

        for line in lines {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }

        out
    }

    /// Разбор заголовка. Читатель остаётся в начале полезной нагрузки.
    pub fn parse<R: BufRead>(reader: &mut R) -> FormatResult<Self> {
        let mut line = Vec::new();

        read_line(reader, &mut line)?;
        let encoding = match line.as_slice() {
            [b'%', magic @ ..] if magic.len() == 3 && &magic[1..] == b"BX" => {
                PayloadEncoding::from_u8(magic[0])
                    .map_err(|_| FormatError::InvalidMagic(String::from_utf8_lossy(&line).into()))?
            }
            _ => {
                return Err(FormatError::InvalidMagic(
                    String::from_utf8_lossy(&line).into_owned(),
                ))
            }
        };

        let mut fields = Vec::new();
        let summary = loop {
            read_line(reader, &mut line)?;
            let text = String::from_utf8_lossy(&line).into_owned();

            match text.strip_prefix('%') {
                Some(field) => {
                    let (key, value) = field
                        .split_once(':')
                        .ok_or_else(|| FormatError::invalid_field("header", text.clone()))?;
                    fields.push((key.trim().to_string(), value.trim().to_string()));
                }
                None => break text,
            }
        };

        let field = |name: &str| -> FormatResult<&str> {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| FormatError::MissingField(name.to_string()))
        };
        let real = |name: &str| -> FormatResult<f64> {
            let v = field(name)?;
            v.parse().map_err(|_| FormatError::invalid_field(name, v))
        };

        if field("hdr_type")? != HDR_TYPE {
            return Err(FormatError::invalid_field("hdr_type", field("hdr_type")?));
        }

        let code = field("channel")?;
        let channel: PolarizationChannel = code
            .parse()
            .map_err(|_| FormatError::invalid_field("channel", code))?;

        let dims: Vec<&str> = summary.split_whitespace().collect();
        let [integrations, bins, arity, bits, tag] = dims.as_slice() else {
            return Err(FormatError::invalid_field("dimensions", summary.clone()));
        };
        let integrations: usize = integrations
            .parse()
            .map_err(|_| FormatError::invalid_field("dimensions", summary.clone()))?;
        let bins: usize = bins
            .parse()
            .map_err(|_| FormatError::invalid_field("dimensions", summary.clone()))?;

        if *arity != channel.arity().to_string()
            || *bits != SAMPLE_BITS.to_string()
            || *tag != encoding.summary_tag()
        {
            return Err(FormatError::invalid_field("dimensions", summary.clone()));
        }

        Ok(Self {
            encoding,
            station: field("station")?.to_string(),
            channel,
            start_time: field("start_time")?.to_string(),
            dim1_start: real("dim1_start")?,
            dim1_span: real("dim1_span")?,
            dim2_start: real("dim2_start")?,
            dim2_span: real("dim2_span")?,
            integrations,
            bins,
        })
    }
}

impl ChannelPaths {
    /// Пути по схеме `<timestamp>_<channel>.{dat,hdr,bbx.gz|abx.gz}` в `dir`.
    pub fn new(
        dir: &Path,
        timestamp: &str,
        channel: PolarizationChannel,
        encoding: PayloadEncoding,
    ) -> Self {
        let stem = format!("{timestamp}_{channel}");

        Self {
            payload: dir.join(format!("{stem}.dat")),
            header: dir.join(format!("{stem}.hdr")),
            archive: dir.join(format!("{stem}.{}.gz", encoding.extension())),
        }
    }

    /// Имя архива для сообщений.
    pub fn archive_name(&self) -> String {
        self.archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.archive.display().to_string())
    }
}

impl Filterbank {
    /// Читает несжатый filterbank-поток (заголовок + полезная нагрузка).
    pub fn read<R: BufRead>(mut reader: R) -> FormatResult<Self> {
        let header = FilterbankHeader::parse(&mut reader)?;

        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;

        let bytes = match header.encoding {
            PayloadEncoding::Binary => raw,
            PayloadEncoding::Ascii => decode_hex(&raw)?,
        };

        let expected = header.payload_len();
        if bytes.len() != expected {
            return Err(FormatError::PayloadMismatch {
                expected,
                found: bytes.len(),
            });
        }

        let mut data = vec![0f64; expected / SAMPLE_SIZE];
        LittleEndian::read_f64_into(&bytes, &mut data);

        Ok(Self { header, data })
    }

    /// Значения одной интеграции.
    pub fn integration(
        &self,
        index: usize,
    ) -> Option<&[f64]> {
        let width = self.header.bins * self.header.arity();
        self.data.get(index * width..(index + 1) * width)
    }
}

/// Форматирует число как кратчайшее точное представление; целые значения
/// получают `.0` (`3600.0`, `10000000.0`).
pub fn format_real(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

fn read_line<R: BufRead>(
    reader: &mut R,
    line: &mut Vec<u8>,
) -> FormatResult<()> {
    line.clear();

    if reader.read_until(b'\n', line)? == 0 {
        return Err(FormatError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated filterbank header",
        )));
    }

    if line.last() == Some(&b'\n') {
        line.pop();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use lofasm_types::BurstEpoch;

    use super::*;

    fn channel(code: &str) -> PolarizationChannel {
        code.parse().unwrap()
    }

    fn make_header(
        code: &str,
        encoding: PayloadEncoding,
    ) -> FilterbankHeader {
        FilterbankHeader {
            encoding,
            station: "LoFASM1".into(),
            channel: channel(code),
            start_time: "20141209_010203".into(),
            dim1_start: 470_790_123.5,
            dim1_span: 3.0,
            dim2_start: 0.0,
            dim2_span: 100_000_000.0,
            integrations: 3,
            bins: 512,
        }
    }

    #[test]
    fn test_render_exact_layout() {
        let text = String::from_utf8(make_header("AA", PayloadEncoding::Ascii).render()).unwrap();
        let expected = "\
%ABX
%hdr_type: LoFASM-filterbank
%hdr_version: 0000803F
%station: LoFASM1
%channel: AA
%start_time: 20141209_010203
%time_offset_J2000: 0 (s)
%frequency_offset_DC: 0 (Hz)
%dim1_label: time (s)
%dim1_start: 470790123.5
%dim1_span: 3.0
%dim2_label: frequency (Hz)
%dim2_start: 0.0
%dim2_span: 100000000.0
%data_label: power spectrum (arbitrary)
%data_offset: 0
%data_scale: 1
%data_type: real64
3 512 1 64 raw16
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_binary_cross_channel() {
        let bytes = make_header("AB", PayloadEncoding::Binary).render();

        assert_eq!(&bytes[0..5], b"%\x02BX\n", "binary magic");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("%data_label: cross spectrum (arbitrary)\n"));
        assert!(text.ends_with("\n3 512 2 64 raw256\n"));
    }

    #[test]
    fn test_for_channel_uses_written_count() {
        let meta = CaptureMetadata {
            station: "LoFASM4".into(),
            raw_bins: 2048,
            bins: 1024,
            fstart: 0.0,
            fstep: 97_656.25,
            start: BurstEpoch::new(57_000, 0.0),
            int_time: 0.5,
        };
        let burst = BurstContext::new(meta.start, meta.int_time).unwrap();

        let h = FilterbankHeader::for_channel(&meta, &burst, channel("CD"), 7, PayloadEncoding::Binary);

        assert_eq!(h.integrations, 7);
        assert_eq!(h.dim1_span, 3.5);
        assert_eq!(h.dim2_span, 100_000_000.0);
        assert_eq!(h.payload_len(), 7 * 1024 * 2 * 8);
        assert_eq!(h.start_time, "20141209_000000");
    }

    #[test]
    fn test_parse_round_trip() {
        for enc in [PayloadEncoding::Binary, PayloadEncoding::Ascii] {
            let header = make_header("BD", enc);
            let parsed = FilterbankHeader::parse(&mut Cursor::new(header.render())).unwrap();
            assert_eq!(parsed, header);
        }
    }

    #[test]
    fn test_parse_rejects_bad_magic() {
        let mut raw = make_header("AA", PayloadEncoding::Ascii).render();
        raw[1] = b'Z';
        assert!(matches!(
            FilterbankHeader::parse(&mut Cursor::new(raw)),
            Err(FormatError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_read_detects_payload_mismatch() {
        let mut raw = make_header("AA", PayloadEncoding::Binary).render();
        raw.extend_from_slice(&[0u8; 16]);

        let result = Filterbank::read(Cursor::new(raw));
        assert!(matches!(result, Err(FormatError::PayloadMismatch { .. })));
    }

    #[test]
    fn test_channel_paths_naming() {
        let paths = ChannelPaths::new(
            Path::new("/out"),
            "20141209_010203",
            channel("AB"),
            PayloadEncoding::Binary,
        );

        assert_eq!(paths.payload, PathBuf::from("/out/20141209_010203_AB.dat"));
        assert_eq!(paths.header, PathBuf::from("/out/20141209_010203_AB.hdr"));
        assert_eq!(paths.archive, PathBuf::from("/out/20141209_010203_AB.bbx.gz"));
        assert_eq!(paths.archive_name(), "20141209_010203_AB.bbx.gz");

        let ascii = ChannelPaths::new(Path::new("."), "t", channel("AA"), PayloadEncoding::Ascii);
        assert!(ascii.archive.ends_with("t_AA.abx.gz"));
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(3600.0), "3600.0");
        assert_eq!(format_real(0.0), "0.0");
        assert_eq!(format_real(0.25), "0.25");
        assert_eq!(format_real(-86_400.0), "-86400.0");
        assert_eq!(format_real(97_656.25), "97656.25");
    }
}
