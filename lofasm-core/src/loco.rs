//! Контейнер записей LoCo: файловый crawler и писатель.
//!
//! Это собственное кадрирование крейта (записи `BRST` / `INTG` с CRC), а не
//! формат файлов, которые пишет инструмент. Настоящие `.lofasm` записи
//! станции этот reader не разбирает: для них нужен отдельный crawler,
//! реализующий [`CaptureCrawler`](crate::capture::CaptureCrawler).
//!
//! ```text
//! заголовок : 12 полей × 8 байт ASCII, дополненных пробелами (96 байт)
//! запись    : tag[4] | len: u32 LE | content[len] | crc32(content): u32 LE
//!
//! BRST      : mjd_day: u32 | mjd_msec: f64 | int_time: f64
//! INTG      : n: u16, затем n × (code[2] | bins: u32 | bins × (re: f64, im: f64))
//! ```
//!
//! Все числа little-endian. Первый burst начинается сразу после заголовка,
//! его эпоха берётся из заголовка; ведущая запись `BRST` допускается и
//! пропускается.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::MultiGzDecoder;
use lofasm_types::{
    BurstEpoch, CaptureError, CaptureResult, ComplexSpectrum, EndOfCapture, HeaderFields,
    IntegrationError, MetadataResult, PolarizationChannel, SampleError, SampleResult,
};
use log::{debug, warn};
use num_complex::Complex64;

use crate::capture::CaptureCrawler;

/// Сигнатура в поле `hdr_sig`.
pub const LOCO_SIGNATURE: &[u8] = b"\x02LoCo";

/// Ширина одного поля заголовка.
pub const LOCO_FIELD_WIDTH: usize = 8;

/// Имена полей заголовка в порядке следования.
pub const LOCO_HEADER_FIELDS: [&str; 12] = [
    "hdr_sig", "hdr_ver", "hdr_len", "station", "Nbins", "fstart", "fstep", "mjd_day",
    "mjd_msec", "int_time", "int_len", "fmt",
];

pub const LOCO_HEADER_SIZE: usize = LOCO_HEADER_FIELDS.len() * LOCO_FIELD_WIDTH;

pub const TAG_BURST: [u8; 4] = *b"BRST";

pub const TAG_INTEGRATION: [u8; 4] = *b"INTG";

/// tag + длина
const RECORD_PREFIX: usize = 8;

/// tag + длина + CRC
const RECORD_OVERHEAD: usize = RECORD_PREFIX + 4;

const BURST_CONTENT_LEN: usize = 4 + 8 + 8;

/// Верхняя граница длины записи. Больше — считаем поле длины мусором.
const MAX_RECORD_LEN: usize = 64 * 1024 * 1024;

const READ_CHUNK: usize = 256 * 1024;

/// Спектр одного канала одной интеграции.
pub type ChannelSpectrum = (PolarizationChannel, ComplexSpectrum);

/// Типизированные поля заголовка LoCo (для писателя).
#[derive(Debug, Clone, PartialEq)]
pub struct LocoHeader {
    pub station: String,
    /// Заявленное число бинов (используется половина)
    pub raw_bins: usize,
    /// Начальная частота, Гц
    pub fstart: f64,
    /// Цифры дробной части шага в МГц (`"09765625"` = 97 656.25 Гц)
    pub fstep_digits: String,
    pub start: BurstEpoch,
    pub int_time: f64,
}

/// Статистика, накопленная [`LocoReader`] в процессе чтения.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadStats {
    /// Успешно разобранных записей
    pub records_ok: u64,
    /// Записей с ошибкой CRC, неизвестным тегом или битым содержимым
    pub records_corrupted: u64,
    /// Интеграций, пропущенных при поиске следующего burst-а
    pub integrations_skipped: u64,
    /// Байт, отброшенных при ресинхронизации
    pub bytes_skipped: u64,
}

#[derive(Debug)]
enum Record {
    Burst(BurstEpoch),
    Integration(Vec<ChannelSpectrum>),
}

enum NextRecord {
    Record(Record),
    Corrupt(String),
    End,
}

/// Позиция crawler-а внутри burst-а.
enum Position {
    Integration(Vec<ChannelSpectrum>),
    /// Интеграций больше нет; повторяет исход до следующего burst-а
    Stalled(IntegrationError),
}

/// Файловый crawler LoCo-записи.
pub struct LocoReader<R: Read> {
    reader: BufReader<R>,
    fields: HeaderFields,
    read_buf: Vec<u8>,
    leftover: Vec<u8>,
    eof: bool,
    pending_burst: Option<BurstEpoch>,
    position: Position,
    selected: Option<PolarizationChannel>,
    stats: ReadStats,
}

/// Потоковый писатель LoCo-записей.
pub struct LocoWriter<W: Write> {
    writer: BufWriter<W>,
    records: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LocoHeader {
    /// Сериализация в 96 байт. Значение, не влезающее в 8 байт, — ошибка.
    pub fn encode(&self) -> CaptureResult<[u8; LOCO_HEADER_SIZE]> {
        let values = [
            String::from_utf8_lossy(LOCO_SIGNATURE).into_owned(),
            "1".to_string(),
            LOCO_HEADER_SIZE.to_string(),
            self.station.clone(),
            self.raw_bins.to_string(),
            self.fstart.to_string(),
            self.fstep_digits.clone(),
            self.start.mjd_day.to_string(),
            self.start.mjd_msec.to_string(),
            self.int_time.to_string(),
            "1".to_string(),
            "1".to_string(),
        ];

        let mut buf = [b' '; LOCO_HEADER_SIZE];
        for (i, (name, value)) in LOCO_HEADER_FIELDS.iter().zip(&values).enumerate() {
            if value.len() > LOCO_FIELD_WIDTH {
                return Err(CaptureError::malformed(format!(
                    "field '{name}' does not fit in {LOCO_FIELD_WIDTH} bytes: '{value}'"
                )));
            }
            let at = i * LOCO_FIELD_WIDTH;
            buf[at..at + value.len()].copy_from_slice(value.as_bytes());
        }

        Ok(buf)
    }

    /// Разбор 96-байтного заголовка в сырые поля (без `hdr_sig`).
    pub fn decode(buf: &[u8; LOCO_HEADER_SIZE]) -> CaptureResult<HeaderFields> {
        if !buf.starts_with(LOCO_SIGNATURE) {
            return Err(CaptureError::InvalidSignature(
                String::from_utf8_lossy(&buf[..LOCO_FIELD_WIDTH]).into_owned(),
            ));
        }

        let mut fields = HeaderFields::new();
        for (name, raw) in LOCO_HEADER_FIELDS
            .iter()
            .zip(buf.chunks_exact(LOCO_FIELD_WIDTH))
            .skip(1)
        {
            let value = std::str::from_utf8(raw)
                .map_err(|_| CaptureError::malformed(format!("field '{name}' is not ASCII")))?;
            fields.insert(*name, value.trim_matches(|c: char| c == ' ' || c == '\0'));
        }

        Ok(fields)
    }
}

impl LocoReader<Box<dyn Read>> {
    /// Открывает запись. Файлы с расширением `.gz` распаковываются на лету.
    pub fn open<P: AsRef<Path>>(path: P) -> CaptureResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let inner: Box<dyn Read> = if is_gzip(path) {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };

        Self::new(inner)
    }
}

impl<R: Read> LocoReader<R> {
    /// Читает и проверяет заголовок, встаёт на первую интеграцию.
    pub fn new(inner: R) -> CaptureResult<Self> {
        let mut reader = BufReader::new(inner);
        let mut hdr_buf = [0u8; LOCO_HEADER_SIZE];

        reader.read_exact(&mut hdr_buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CaptureError::malformed("truncated header"),
            _ => CaptureError::Io(e),
        })?;

        let fields = LocoHeader::decode(&hdr_buf)?;

        let mut this = Self {
            reader,
            fields,
            read_buf: vec![0u8; READ_CHUNK],
            leftover: Vec::new(),
            eof: false,
            pending_burst: None,
            position: Position::Stalled(IntegrationError::EndOfCapture),
            selected: None,
            stats: ReadStats::default(),
        };

        // Ведущий BRST дублирует эпоху заголовка
        this.position = match this.next_record() {
            NextRecord::Record(Record::Burst(_)) => this.load_integration(),
            NextRecord::Record(Record::Integration(data)) => Position::Integration(data),
            NextRecord::Corrupt(reason) => Position::Stalled(IntegrationError::Corrupt(reason)),
            NextRecord::End => Position::Stalled(IntegrationError::EndOfCapture),
        };

        Ok(this)
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Каналы текущей интеграции.
    pub fn channels(&self) -> Vec<PolarizationChannel> {
        match &self.position {
            Position::Integration(data) => data.iter().map(|(ch, _)| *ch).collect(),
            Position::Stalled(_) => Vec::new(),
        }
    }

    fn stalled(&self) -> Option<IntegrationError> {
        match &self.position {
            Position::Integration(_) => None,
            Position::Stalled(IntegrationError::Corrupt(reason)) => {
                Some(IntegrationError::Corrupt(reason.clone()))
            }
            Position::Stalled(IntegrationError::EndOfCapture) => Some(IntegrationError::EndOfCapture),
        }
    }

    /// Следующая интеграция; граница burst-а откладывается для `advance_burst`.
    fn load_integration(&mut self) -> Position {
        match self.next_record() {
            NextRecord::Record(Record::Integration(data)) => Position::Integration(data),
            NextRecord::Record(Record::Burst(epoch)) => {
                self.pending_burst = Some(epoch);
                Position::Stalled(IntegrationError::corrupt("burst boundary"))
            }
            NextRecord::Corrupt(reason) => Position::Stalled(IntegrationError::Corrupt(reason)),
            NextRecord::End => Position::Stalled(IntegrationError::EndOfCapture),
        }
    }

    fn next_record(&mut self) -> NextRecord {
        loop {
            if self.leftover.len() >= RECORD_PREFIX {
                let tag: [u8; 4] = [
                    self.leftover[0],
                    self.leftover[1],
                    self.leftover[2],
                    self.leftover[3],
                ];

                if !is_known_tag(&tag) {
                    let skipped = self.resync();
                    self.stats.records_corrupted += 1;
                    return NextRecord::Corrupt(format!(
                        "unknown record tag, skipped {skipped} bytes"
                    ));
                }

                let len = LittleEndian::read_u32(&self.leftover[4..8]) as usize;
                if len > MAX_RECORD_LEN {
                    self.resync();
                    self.stats.records_corrupted += 1;
                    return NextRecord::Corrupt(format!("record length {len} exceeds limit"));
                }

                let total = RECORD_OVERHEAD + len;
                if self.leftover.len() >= total {
                    let content = &self.leftover[RECORD_PREFIX..RECORD_PREFIX + len];
                    let stored = LittleEndian::read_u32(&self.leftover[RECORD_PREFIX + len..total]);
                    let computed = crc32fast::hash(content);

                    let result = if stored != computed {
                        NextRecord::Corrupt(format!(
                            "CRC mismatch in {} record: expected {stored:#010x}, got {computed:#010x}",
                            String::from_utf8_lossy(&tag)
                        ))
                    } else {
                        match decode_record(&tag, content) {
                            Ok(record) => NextRecord::Record(record),
                            Err(reason) => NextRecord::Corrupt(reason),
                        }
                    };

                    self.leftover.drain(..total);
                    match result {
                        NextRecord::Record(_) => self.stats.records_ok += 1,
                        _ => self.stats.records_corrupted += 1,
                    }
                    return result;
                }
            }

            if self.eof {
                if !self.leftover.is_empty() {
                    debug!(
                        "Dropping {} trailing bytes of a truncated record",
                        self.leftover.len()
                    );
                    self.stats.bytes_skipped += self.leftover.len() as u64;
                    self.leftover.clear();
                }
                return NextRecord::End;
            }

            self.fill();
        }
    }

    /// Пропускает байты до следующего известного тега. Возвращает их число.
    fn resync(&mut self) -> usize {
        let found = self
            .leftover
            .windows(4)
            .skip(1)
            .position(|w| is_known_tag(w))
            .map(|p| p + 1);

        let skip = match found {
            Some(p) => p,
            None if self.eof => self.leftover.len(),
            // Хвост может оказаться началом тега
            None => self.leftover.len().saturating_sub(3).max(1),
        };

        self.leftover.drain(..skip);
        self.stats.bytes_skipped += skip as u64;
        skip
    }

    fn fill(&mut self) {
        loop {
            match self.reader.read(&mut self.read_buf) {
                Ok(0) => {
                    self.eof = true;
                    return;
                }
                Ok(n) => {
                    self.leftover.extend_from_slice(&self.read_buf[..n]);
                    return;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Read error, treating as end of capture: {e}");
                    self.eof = true;
                    return;
                }
            }
        }
    }
}

impl<W: Write> LocoWriter<W> {
    /// Создаёт писатель, немедленно записывая заголовок в поток.
    pub fn new(
        inner: W,
        header: &LocoHeader,
    ) -> CaptureResult<Self> {
        let mut writer = BufWriter::new(inner);
        writer.write_all(&header.encode()?)?;

        Ok(Self { writer, records: 0 })
    }

    /// Начинает новый burst.
    pub fn start_burst(
        &mut self,
        epoch: &BurstEpoch,
    ) -> CaptureResult<()> {
        let day = u32::try_from(epoch.mjd_day)
            .map_err(|_| CaptureError::malformed(format!("mjd_day {} out of range", epoch.mjd_day)))?;

        let mut content = Vec::with_capacity(BURST_CONTENT_LEN);
        content.write_u32::<LittleEndian>(day)?;
        content.write_f64::<LittleEndian>(epoch.mjd_msec)?;
        content.write_f64::<LittleEndian>(epoch.int_time.unwrap_or(0.0))?;

        self.write_record(&TAG_BURST, &content, false)
    }

    /// Записывает одну интеграцию всех записанных каналов.
    pub fn write_integration(
        &mut self,
        channels: &[(PolarizationChannel, &[Complex64])],
    ) -> CaptureResult<()> {
        let content = encode_integration(channels)?;
        self.write_record(&TAG_INTEGRATION, &content, false)
    }

    /// Интеграция с заведомо неверной CRC.
    pub fn write_corrupt_integration(
        &mut self,
        channels: &[(PolarizationChannel, &[Complex64])],
    ) -> CaptureResult<()> {
        let content = encode_integration(channels)?;
        self.write_record(&TAG_INTEGRATION, &content, true)
    }

    /// Произвольные байты вне кадрирования.
    pub fn write_raw(
        &mut self,
        bytes: &[u8],
    ) -> CaptureResult<()> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Число записанных записей.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Сбрасывает буфер и возвращает внутренний поток.
    pub fn finish(self) -> CaptureResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| CaptureError::Io(e.into_error()))
    }

    fn write_record(
        &mut self,
        tag: &[u8; 4],
        content: &[u8],
        corrupt_crc: bool,
    ) -> CaptureResult<()> {
        let len = u32::try_from(content.len())
            .map_err(|_| CaptureError::malformed("record too large"))?;
        let mut crc = crc32fast::hash(content);
        if corrupt_crc {
            crc ^= 0xDEAD_BEEF;
        }

        self.writer.write_all(tag)?;
        self.writer.write_u32::<LittleEndian>(len)?;
        self.writer.write_all(content)?;
        self.writer.write_u32::<LittleEndian>(crc)?;
        self.records += 1;

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<R: Read> CaptureCrawler for LocoReader<R> {
    fn header_fields(&mut self) -> MetadataResult<HeaderFields> {
        Ok(self.fields.clone())
    }

    fn advance_burst(&mut self) -> Result<BurstEpoch, EndOfCapture> {
        let epoch = match self.pending_burst.take() {
            Some(epoch) => epoch,
            None => loop {
                match self.next_record() {
                    NextRecord::Record(Record::Burst(epoch)) => break epoch,
                    NextRecord::Record(Record::Integration(_)) => {
                        self.stats.integrations_skipped += 1;
                    }
                    NextRecord::Corrupt(reason) => debug!("Skipping while seeking burst: {reason}"),
                    NextRecord::End => {
                        self.position = Position::Stalled(IntegrationError::EndOfCapture);
                        return Err(EndOfCapture);
                    }
                }
            },
        };

        self.position = self.load_integration();
        Ok(epoch)
    }

    fn select_channel(
        &mut self,
        channel: PolarizationChannel,
    ) {
        self.selected = Some(channel);
    }

    fn read_current_sample(&mut self) -> SampleResult<ComplexSpectrum> {
        let channel = self.selected.ok_or(SampleError::NoChannelSelected)?;

        match &self.position {
            Position::Integration(data) => data
                .iter()
                .find(|(ch, _)| *ch == channel)
                .map(|(_, spectrum)| spectrum.clone())
                .ok_or(SampleError::ChannelUnavailable(channel)),
            Position::Stalled(e) => Err(SampleError::corrupted(format!(
                "no integration available: {e}"
            ))),
        }
    }

    fn advance_integration(
        &mut self,
        n: usize,
    ) -> Result<(), IntegrationError> {
        for _ in 0..n {
            if let Some(e) = self.stalled() {
                return Err(e);
            }

            self.position = self.load_integration();
            if let Some(e) = self.stalled() {
                return Err(e);
            }
        }

        Ok(())
    }

    fn integration_status(&self) -> Result<(), IntegrationError> {
        self.stalled().map_or(Ok(()), Err)
    }
}

fn is_known_tag(tag: &[u8]) -> bool {
    tag == TAG_BURST || tag == TAG_INTEGRATION
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn decode_record(
    tag: &[u8; 4],
    content: &[u8],
) -> Result<Record, String> {
    match *tag {
        TAG_BURST => decode_burst(content).map(Record::Burst),
        TAG_INTEGRATION => decode_integration(content).map(Record::Integration),
        _ => Err(format!("unknown record tag {:?}", String::from_utf8_lossy(tag))),
    }
}

fn decode_burst(content: &[u8]) -> Result<BurstEpoch, String> {
    if content.len() != BURST_CONTENT_LEN {
        return Err(format!("BRST record has {} bytes", content.len()));
    }

    let mjd_day = LittleEndian::read_u32(&content[0..4]);
    let mjd_msec = LittleEndian::read_f64(&content[4..12]);
    let int_time = LittleEndian::read_f64(&content[12..20]);

    let mut epoch = BurstEpoch::new(i64::from(mjd_day), mjd_msec);
    // 0 = время интегрирования не переопределяется
    if int_time.is_finite() && int_time > 0.0 {
        epoch.int_time = Some(int_time);
    }

    Ok(epoch)
}

fn decode_integration(content: &[u8]) -> Result<Vec<ChannelSpectrum>, String> {
    let mut cur = Cursor::new(content);
    let short = |_| "truncated INTG record".to_string();

    let count = cur.read_u16::<LittleEndian>().map_err(short)?;
    let mut channels = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let mut code = [0u8; 2];
        cur.read_exact(&mut code).map_err(short)?;
        let channel = PolarizationChannel::new(code).map_err(|e| e.to_string())?;

        let bins = cur.read_u32::<LittleEndian>().map_err(short)? as usize;
        let remaining = content.len() - cur.position() as usize;
        if bins.saturating_mul(16) > remaining {
            return Err(format!("channel {channel} declares {bins} bins, record too short"));
        }

        let mut spectrum = Vec::with_capacity(bins);
        for _ in 0..bins {
            let re = cur.read_f64::<LittleEndian>().map_err(short)?;
            let im = cur.read_f64::<LittleEndian>().map_err(short)?;
            spectrum.push(Complex64::new(re, im));
        }

        channels.push((channel, spectrum));
    }

    if (cur.position() as usize) != content.len() {
        return Err("trailing bytes in INTG record".to_string());
    }

    Ok(channels)
}

fn encode_integration(channels: &[(PolarizationChannel, &[Complex64])]) -> CaptureResult<Vec<u8>> {
    let count = u16::try_from(channels.len())
        .map_err(|_| CaptureError::malformed("too many channels in integration"))?;

    let size = 2 + channels
        .iter()
        .map(|(_, s)| 6 + s.len() * 16)
        .sum::<usize>();
    let mut content = Vec::with_capacity(size);

    content.write_u16::<LittleEndian>(count)?;
    for (channel, spectrum) in channels {
        let bins = u32::try_from(spectrum.len())
            .map_err(|_| CaptureError::malformed("spectrum too long"))?;

        content.extend_from_slice(&channel.code());
        content.write_u32::<LittleEndian>(bins)?;
        for bin in spectrum.iter() {
            content.write_f64::<LittleEndian>(bin.re)?;
            content.write_f64::<LittleEndian>(bin.im)?;
        }
    }

    Ok(content)
}
