use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use byteorder::{LittleEndian, WriteBytesExt};
use lofasm_types::{PayloadEncoding, PolarizationChannel, SampleError, SampleResult, SkipReason};
use log::{debug, warn};
use num_complex::Complex64;

use crate::{format::ChannelPaths, hex::HexWriter};

/// Сток одного канала в пределах burst-а.
///
/// Владеет временным файлом полезной нагрузки и считает записанные
/// интеграции. Дескриптор освобождается при `close`, `abandon` или `Drop`.
pub struct ChannelSink {
    channel: PolarizationChannel,
    encoding: PayloadEncoding,
    bins: usize,
    path: PathBuf,
    writer: PayloadWriter,
    integrations: usize,
    /// Байт в файле на границе последней целой интеграции
    committed: u64,
    scratch: Vec<u8>,
}

/// Итог работы стока, передаётся сборщику архива.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSummary {
    pub channel: PolarizationChannel,
    pub integrations: usize,
    pub payload_path: PathBuf,
    pub payload_bytes: u64,
}

enum PayloadWriter {
    Binary(BufWriter<File>),
    Ascii(HexWriter<BufWriter<File>>),
}

impl PayloadWriter {
    fn flush(&mut self) -> io::Result<()> {
        match self {
            PayloadWriter::Binary(w) => w.flush(),
            PayloadWriter::Ascii(w) => w.flush(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ChannelSink {
    /// Открывает сток канала.
    ///
    /// Если архив `paths.archive` уже есть и `overwrite == false`, ни один файл
    /// не создаётся и возвращается [`SkipReason::AlreadyExists`].
    pub fn open(
        paths: &ChannelPaths,
        channel: PolarizationChannel,
        encoding: PayloadEncoding,
        bins: usize,
        overwrite: bool,
    ) -> Result<Self, SkipReason> {
        if paths.archive.exists() && !overwrite {
            return Err(SkipReason::AlreadyExists(paths.archive.clone()));
        }

        let file = File::create(&paths.payload).map_err(|source| SkipReason::CannotOpen {
            path: paths.payload.clone(),
            source,
        })?;

        let buffered = BufWriter::new(file);
        let writer = match encoding {
            PayloadEncoding::Binary => PayloadWriter::Binary(buffered),
            PayloadEncoding::Ascii => PayloadWriter::Ascii(HexWriter::new(buffered)),
        };

        debug!("Opened payload {:?} for channel {channel}", paths.payload);

        Ok(Self {
            channel,
            encoding,
            bins,
            path: paths.payload.clone(),
            writer,
            integrations: 0,
            committed: 0,
            scratch: Vec::with_capacity(bins * channel.arity() * 8),
        })
    }

    /// Записывает одну интеграцию.
    ///
    /// Вещественный канал: `bins` значений `re`. Комплексный: `2 × bins`
    /// значений, пары `(re, im)` по порядку бинов. Бины сверх `bins`
    /// отбрасываются.
    pub fn write(
        &mut self,
        spectrum: &[Complex64],
    ) -> SampleResult<()> {
        if spectrum.len() < self.bins {
            return Err(SampleError::Truncated {
                expected: self.bins,
                found: spectrum.len(),
            });
        }

        self.scratch.clear();
        let real = self.channel.is_real();

        for bin in &spectrum[..self.bins] {
            self.scratch.write_f64::<LittleEndian>(bin.re)?;
            if !real {
                self.scratch.write_f64::<LittleEndian>(bin.im)?;
            }
        }

        let written = match &mut self.writer {
            PayloadWriter::Binary(w) => {
                w.write_all(&self.scratch)?;
                self.scratch.len()
            }
            PayloadWriter::Ascii(w) => w.write_bytes(&self.scratch)? + w.end_line()?,
        };

        self.committed += written as u64;
        self.integrations += 1;

        Ok(())
    }

    /// Штатное закрытие: сбрасывает буфер и освобождает дескриптор.
    pub fn close(mut self) -> io::Result<SinkSummary> {
        self.writer.flush()?;

        Ok(self.summary())
    }

    /// Закрытие после сбоя записи/чтения выборки.
    ///
    /// Файл обрезается до последней целой интеграции. Если ни одной
    /// интеграции не записано, файл удаляется и возвращается `None`.
    pub fn abandon(mut self) -> Option<SinkSummary> {
        if let Err(e) = self.writer.flush() {
            debug!("Flush of abandoned payload {:?} failed: {e}", self.path);
        }

        let summary = self.summary();
        let path = std::mem::take(&mut self.path);
        drop(self);

        if summary.integrations == 0 {
            remove_payload(&path);
            return None;
        }

        if let Err(e) = truncate(&path, summary.payload_bytes) {
            warn!("Could not truncate {path:?} to last whole integration: {e}");
            remove_payload(&path);
            return None;
        }

        Some(summary)
    }

    pub fn channel(&self) -> PolarizationChannel {
        self.channel
    }

    pub fn encoding(&self) -> PayloadEncoding {
        self.encoding
    }

    /// Число успешно записанных интеграций.
    pub fn integrations(&self) -> usize {
        self.integrations
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn summary(&self) -> SinkSummary {
        SinkSummary {
            channel: self.channel,
            integrations: self.integrations,
            payload_path: self.path.clone(),
            payload_bytes: self.committed,
        }
    }
}

fn truncate(
    path: &Path,
    len: u64,
) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    if file.metadata()?.len() > len {
        file.set_len(len)?;
    }
    Ok(())
}

fn remove_payload(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not remove {path:?}: {e}");
        }
    }
}
