use std::time::Instant;

use crate::ConvertError;

/// Счётчики прогона конвертера.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionStats {
    /// Входных файлов, у которых прочитаны метаданные
    pub inputs_processed: u64,
    pub inputs_skipped: u64,
    /// Обработанных burst-ов (subfile-ов)
    pub bursts: u64,
    /// Burst-ов, в которых не нашлось ни одной интеграции
    pub empty_bursts: u64,
    pub integrations: u64,
    /// Записанных архивов
    pub archives_written: u64,
    pub channels_preexisting: u64,
    pub channel_open_failures: u64,
    /// Каналов, выбывших из burst-а из-за сбоя выборки
    pub sample_failures: u64,
    pub archive_failures: u64,
    /// Архивов, после которых остались `.hdr` / `.dat`
    pub temporaries_kept: u64,
}

/// Snapshot статистики для вывода в конце прогона.
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub duration_secs: f64,
    pub stats: ConversionStats,
}

impl ConversionStats {
    /// Учитывает исход в соответствующем счётчике.
    pub fn record(
        &mut self,
        event: &ConvertError,
    ) {
        match event {
            ConvertError::InputSkipped { .. } => self.inputs_skipped += 1,
            ConvertError::ChannelSkippedPreexisting { .. } => self.channels_preexisting += 1,
            ConvertError::ChannelSkippedOpenFailure { .. } => self.channel_open_failures += 1,
            ConvertError::SampleReadFailure { .. } => self.sample_failures += 1,
            ConvertError::ArchiveWriteFailure { .. } => self.archive_failures += 1,
            // Конец прогона интеграций учитывается в `bursts`
            ConvertError::IntegrationBurstCorrupt { .. } | ConvertError::CaptureExhausted { .. } => {}
        }
    }

    /// Итоговая сводка для вывода в конце прогона.
    pub fn summary(
        &self,
        started: &Instant,
    ) -> ConversionSummary {
        ConversionSummary {
            duration_secs: started.elapsed().as_secs_f64(),
            stats: self.clone(),
        }
    }
}

impl ConversionSummary {
    /// Финальная строка прогона.
    pub fn headline(&self) -> String {
        format!(
            "Processed {} input files, {} output files, in {} seconds",
            self.stats.inputs_processed, self.stats.archives_written, self.duration_secs
        )
    }
}

impl std::fmt::Display for ConversionSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let s = &self.stats;

        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration         : {:.1}s", self.duration_secs)?;
        writeln!(
            f,
            "  Inputs           : {} processed, {} skipped",
            s.inputs_processed, s.inputs_skipped
        )?;
        writeln!(
            f,
            "  Subfiles         : {} ({} empty)",
            s.bursts, s.empty_bursts
        )?;
        writeln!(f, "  Integrations     : {}", s.integrations)?;
        writeln!(f, "  Archives written : {}", s.archives_written)?;
        writeln!(
            f,
            "  Channels skipped : {} existing, {} open failures",
            s.channels_preexisting, s.channel_open_failures
        )?;
        writeln!(f, "  Sample failures  : {}", s.sample_failures)?;
        writeln!(f, "  Archive failures : {}", s.archive_failures)?;
        writeln!(f, "  Temporaries kept : {}", s.temporaries_kept)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
