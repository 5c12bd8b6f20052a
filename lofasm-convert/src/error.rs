use std::path::PathBuf;

use lofasm_core::ArchiveError;
use lofasm_types::{
    CaptureError, MetadataError, PolarizationChannel, SampleError, SkipReason,
};
use thiserror::Error;

/// Результат обработки одного входного файла.
pub type ConvertResult<T> = std::result::Result<T, ConvertError>;

/// Исходы конвертации, понижаемые до сообщения о пропуске.
///
/// Ни один из них не прерывает прогон: ошибка ловится в наименьшей
/// области (канал, burst, файл), логируется и учитывается в статистике.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Входной файл пропущен целиком
    #[error("Skipping {} ({reason})", path.display())]
    InputSkipped {
        path: PathBuf,
        #[source]
        reason: InputSkipReason,
    },

    /// Архив канала уже есть, перезапись не запрошена
    #[error("Skipping {name} (output file exists)")]
    ChannelSkippedPreexisting { name: String },

    /// Не удалось создать временный файл канала
    #[error("Skipping {name} (could not open data file)")]
    ChannelSkippedOpenFailure {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Сбой чтения/записи выборки: канал выбывает до конца burst-а
    #[error("Dropping channel {channel} ({source})")]
    SampleReadFailure {
        channel: PolarizationChannel,
        #[source]
        source: SampleError,
    },

    /// Повреждение: заканчивается прогон интеграций текущего burst-а
    #[error("Integration run of subfile {timestamp} ended: {reason}")]
    IntegrationBurstCorrupt { timestamp: String, reason: String },

    /// Данные записи исчерпаны
    #[error("End of capture in subfile {timestamp}")]
    CaptureExhausted { timestamp: String },

    /// Архив канала не собран
    #[error("Skipping {name} ({source})")]
    ArchiveWriteFailure {
        name: String,
        #[source]
        source: ArchiveError,
    },
}

/// Причина пропуска входного файла.
#[derive(Debug, Error)]
pub enum InputSkipReason {
    #[error("not a .lofasm file")]
    NotCapture,

    #[error("unable to read metadata")]
    Capture(#[source] CaptureError),

    #[error("unable to read metadata")]
    Metadata(#[source] MetadataError),
}

impl ConvertError {
    /// Пропуск канала при открытии стока.
    pub fn channel_skipped(
        name: String,
        reason: SkipReason,
    ) -> Self {
        match reason {
            SkipReason::AlreadyExists(_) => Self::ChannelSkippedPreexisting { name },
            SkipReason::CannotOpen { source, .. } => Self::ChannelSkippedOpenFailure { name, source },
        }
    }

    pub fn input_skipped<P: Into<PathBuf>>(
        path: P,
        reason: InputSkipReason,
    ) -> Self {
        Self::InputSkipped {
            path: path.into(),
            reason,
        }
    }
}
