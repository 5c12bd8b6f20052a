use std::{fs, path::Path, time::Instant};

use lofasm_core::{
    ArchiveError, ArchiveOutcome, BurstCursor, CaptureCrawler, ChannelPaths, ChannelSink,
    FilterbankHeader, IntegrationOutcome, LocoReader, MetadataExtractor, SinkSummary,
};
use lofasm_types::{BurstContext, CaptureMetadata, MetadataResult};
use log::{debug, info, warn};

use crate::{
    config::ConvertConfig,
    error::{ConvertError, ConvertResult, InputSkipReason},
    stats::{ConversionStats, ConversionSummary},
};

/// Допустимые расширения входных файлов.
pub const CAPTURE_EXTENSIONS: [&str; 2] = ["lofasm", "gz"];

/// Оркестрирует конвертацию: файл → burst-ы → интеграции → каналы.
pub struct ConversionPipeline {
    config: ConvertConfig,
    stats: ConversionStats,
}

/// Стоки каналов одного burst-а.
///
/// Каждый открытый сток закрывается ровно один раз: штатно в [`close`],
/// через `abandon` при сбое выборки или через `Drop` при раскрутке стека.
///
/// [`close`]: BurstSinks::close
struct BurstSinks {
    slots: Vec<SinkSlot>,
}

enum SinkSlot {
    Live(ChannelSink),
    /// Выбыл после сбоя, payload обрезан до последней целой интеграции
    Retired(SinkSummary),
    /// Выбыл без единой интеграции, payload удалён
    Dropped,
}

impl ConversionPipeline {
    pub fn new(config: ConvertConfig) -> Self {
        Self {
            config,
            stats: ConversionStats::default(),
        }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    /// Обрабатывает входные файлы строго по очереди. Возвращает сводку.
    pub fn run<P: AsRef<Path>>(
        mut self,
        inputs: &[P],
    ) -> ConversionSummary {
        let started = Instant::now();

        if let Err(e) = fs::create_dir_all(&self.config.output_dir) {
            warn!(
                "Could not create output directory {:?}: {e}",
                self.config.output_dir
            );
        }

        for input in inputs {
            if let Err(e) = self.convert_file(input.as_ref()) {
                info!("{e}");
                if let ConvertError::InputSkipped { reason, .. } = &e {
                    if let Some(cause) = std::error::Error::source(reason) {
                        debug!("Cause: {cause}");
                    }
                }
                self.stats.record(&e);
            }
        }

        self.stats.summary(&started)
    }

    /// Конвертирует один файл. Ошибка означает пропуск файла целиком.
    pub fn convert_file(
        &mut self,
        path: &Path,
    ) -> ConvertResult<()> {
        if !is_capture_file(path) {
            return Err(ConvertError::input_skipped(path, InputSkipReason::NotCapture));
        }

        let mut reader = LocoReader::open(path)
            .map_err(|e| ConvertError::input_skipped(path, InputSkipReason::Capture(e)))?;

        self.convert_capture(&mut reader)
            .map_err(|e| ConvertError::input_skipped(path, InputSkipReason::Metadata(e)))?;

        debug!("{path:?}: {:?}", reader.stats());

        Ok(())
    }

    /// Конвертирует все burst-ы записи. Ошибка возможна только до первого
    /// burst-а (метаданные).
    pub fn convert_capture<C: CaptureCrawler + ?Sized>(
        &mut self,
        crawler: &mut C,
    ) -> MetadataResult<()> {
        let meta = MetadataExtractor::read(crawler)?;
        self.stats.inputs_processed += 1;

        debug!(
            "Station {}, {} bins ({} raw), fstep {} Hz, int_time {} s",
            meta.station, meta.bins, meta.raw_bins, meta.fstep, meta.int_time
        );

        let mut cursor = BurstCursor::new(crawler, &meta);

        while let Ok(burst) = cursor.advance() {
            if self.convert_burst(&mut cursor, &meta, &burst) == IntegrationOutcome::CaptureExhausted {
                break;
            }
        }

        Ok(())
    }

    fn convert_burst<C: CaptureCrawler + ?Sized>(
        &mut self,
        cursor: &mut BurstCursor<'_, C>,
        meta: &CaptureMetadata,
        burst: &BurstContext,
    ) -> IntegrationOutcome {
        info!("Starting subfile: {}", burst.timestamp);
        self.stats.bursts += 1;

        let mut integrations = 0u64;
        let mut summaries = Vec::new();

        // Burst без интеграций: каналы не открываются
        let mut outcome = cursor.first_integration();
        if outcome == IntegrationOutcome::Continue {
            let mut sinks = BurstSinks::open(&self.config, meta, burst, &mut self.stats);

            outcome = loop {
                sinks.write_integration(cursor.crawler(), &mut self.stats);
                integrations += 1;

                match cursor.next_integration() {
                    IntegrationOutcome::Continue => continue,
                    other => break other,
                }
            };

            summaries = sinks.close(&self.config, burst, &mut self.stats);
        } else {
            self.stats.empty_bursts += 1;
        }

        let event = match &outcome {
            IntegrationOutcome::BurstCorrupt(reason) => Some(ConvertError::IntegrationBurstCorrupt {
                timestamp: burst.timestamp.clone(),
                reason: reason.clone(),
            }),
            IntegrationOutcome::CaptureExhausted => Some(ConvertError::CaptureExhausted {
                timestamp: burst.timestamp.clone(),
            }),
            IntegrationOutcome::Continue => None,
        };
        if let Some(event) = event {
            debug!("{event}");
            self.stats.record(&event);
        }

        self.stats.integrations += integrations;
        info!(
            "Closing subfile {} with {} integrations.",
            burst.timestamp, integrations
        );

        for summary in summaries {
            self.finalize_channel(meta, burst, summary);
        }

        outcome
    }

    /// Заголовок + сборка архива одного канала.
    fn finalize_channel(
        &mut self,
        meta: &CaptureMetadata,
        burst: &BurstContext,
        summary: SinkSummary,
    ) {
        let encoding = self.config.encoding;
        let paths = ChannelPaths::new(&self.config.output_dir, &burst.timestamp, summary.channel, encoding);
        let header = FilterbankHeader::for_channel(meta, burst, summary.channel, summary.integrations, encoding);

        match self.config.assembler().assemble(&header.render(), &paths) {
            Ok(ArchiveOutcome::Written {
                path,
                temporaries_kept,
            }) => {
                debug!("Wrote {path:?} ({} integrations)", summary.integrations);
                self.stats.archives_written += 1;
                if temporaries_kept {
                    self.stats.temporaries_kept += 1;
                }
            }
            Ok(ArchiveOutcome::Skipped(_)) => {
                let event = ConvertError::ChannelSkippedPreexisting {
                    name: paths.archive_name(),
                };
                info!("{event}");
                self.stats.record(&event);
            }
            Err(source) => {
                let event = ConvertError::ArchiveWriteFailure {
                    name: paths.archive_name(),
                    source,
                };
                warn!("{event}");
                self.stats.record(&event);
            }
        }
    }
}

impl BurstSinks {
    /// Открывает сток для каждого запрошенного канала.
    fn open(
        config: &ConvertConfig,
        meta: &CaptureMetadata,
        burst: &BurstContext,
        stats: &mut ConversionStats,
    ) -> Self {
        let mut slots = Vec::with_capacity(config.channels.len());

        for &channel in &config.channels {
            let paths = ChannelPaths::new(&config.output_dir, &burst.timestamp, channel, config.encoding);

            match ChannelSink::open(&paths, channel, config.encoding, meta.bins, config.force) {
                Ok(sink) => slots.push(SinkSlot::Live(sink)),
                Err(reason) => {
                    let event = ConvertError::channel_skipped(paths.archive_name(), reason);
                    info!("{event}");
                    stats.record(&event);
                }
            }
        }

        Self { slots }
    }

    /// Раздаёт текущую интеграцию всем живым стокам.
    ///
    /// Сбой одного канала выводит из burst-а только его.
    fn write_integration<C: CaptureCrawler + ?Sized>(
        &mut self,
        crawler: &mut C,
        stats: &mut ConversionStats,
    ) {
        for slot in &mut self.slots {
            let SinkSlot::Live(sink) = slot else {
                continue;
            };

            let channel = sink.channel();
            crawler.select_channel(channel);

            let result = crawler
                .read_current_sample()
                .and_then(|spectrum| sink.write(&spectrum));

            if let Err(source) = result {
                let event = ConvertError::SampleReadFailure { channel, source };
                warn!("{event}");
                stats.record(&event);

                if let SinkSlot::Live(sink) = std::mem::replace(slot, SinkSlot::Dropped) {
                    if let Some(summary) = sink.abandon() {
                        *slot = SinkSlot::Retired(summary);
                    }
                }
            }
        }
    }

    /// Закрывает живые стоки. Возвращает каналы, которые нужно архивировать.
    fn close(
        self,
        config: &ConvertConfig,
        burst: &BurstContext,
        stats: &mut ConversionStats,
    ) -> Vec<SinkSummary> {
        let mut summaries = Vec::with_capacity(self.slots.len());

        for slot in self.slots {
            match slot {
                SinkSlot::Live(sink) => {
                    let channel = sink.channel();
                    match sink.close() {
                        Ok(summary) => summaries.push(summary),
                        Err(e) => {
                            let paths = ChannelPaths::new(&config.output_dir, &burst.timestamp, channel, config.encoding);
                            let event = ConvertError::ArchiveWriteFailure {
                                name: paths.archive_name(),
                                source: ArchiveError::Write(e),
                            };
                            warn!("{event}");
                            stats.record(&event);
                        }
                    }
                }
                SinkSlot::Retired(summary) => summaries.push(summary),
                SinkSlot::Dropped => {}
            }
        }

        summaries
    }
}

/// `true` для `.lofasm` и `.gz`.
pub fn is_capture_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CAPTURE_EXTENSIONS.contains(&ext))
}
