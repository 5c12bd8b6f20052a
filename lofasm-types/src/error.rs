use std::path::PathBuf;

use thiserror::Error;

use crate::PolarizationChannel;

/// Результат для операций над базовыми типами
pub type TypesResult<T> = std::result::Result<T, TypesError>;

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

pub type SampleResult<T> = std::result::Result<T, SampleError>;

/// Ошибки разбора базовых типов.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Код канала не состоит из двух букв
    #[error("Invalid polarization channel: '{0}'")]
    InvalidChannel(String),

    /// Неизвестное представление полезной нагрузки
    #[error("Unknown payload encoding: {0}")]
    UnknownEncoding(String),

    /// Эпоха не представима в UTC
    #[error("Epoch out of range: day={mjd_day}, msec={mjd_msec}")]
    EpochOutOfRange { mjd_day: i64, mjd_msec: f64 },
}

/// Ошибки открытия записи.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Неправильная сигнатура файла
    #[error("Invalid capture signature: {0}")]
    InvalidSignature(String),

    /// Повреждённый или неполный заголовок
    #[error("Malformed capture header: {0}")]
    MalformedHeader(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки извлечения метаданных записи.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// В заголовке нет обязательного поля
    #[error("Missing header field '{0}'")]
    MissingField(&'static str),

    /// Поле есть, но значение не разбирается
    #[error("Invalid value '{value}' for header field '{field}'")]
    InvalidField { field: &'static str, value: String },

    /// Неверная эпоха начала записи
    #[error("Invalid start epoch: {0}")]
    Epoch(#[from] TypesError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибка чтения выборки одного канала.
#[derive(Debug, Error)]
pub enum SampleError {
    /// Канал не записан в текущей интеграции
    #[error("Channel {0} is not available in the current integration")]
    ChannelUnavailable(PolarizationChannel),

    /// Канал не выбран перед чтением
    #[error("No channel selected")]
    NoChannelSelected,

    /// Спектр короче используемого числа бинов
    #[error("Spectrum too short: expected at least {expected} bins, found {found}")]
    Truncated { expected: usize, found: usize },

    /// Выборка повреждена
    #[error("Corrupted sample: {0}")]
    Corrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Исход неудачного перехода к следующей интеграции.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// Повреждённые данные: заканчивается только текущий burst
    #[error("Corrupt integration: {0}")]
    Corrupt(String),

    /// Данные записи исчерпаны
    #[error("End of capture")]
    EndOfCapture,
}

/// Больше burst-ов в записи нет.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("End of capture")]
pub struct EndOfCapture;

/// Причина, по которой канал не открывается в текущем burst-е.
#[derive(Debug, Error)]
pub enum SkipReason {
    /// Архив уже существует, перезапись не запрошена
    #[error("output file exists")]
    AlreadyExists(PathBuf),

    /// Не удалось создать временный файл
    #[error("could not open data file")]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    pub fn malformed<S: Into<String>>(s: S) -> Self {
        Self::MalformedHeader(s.into())
    }
}

impl SampleError {
    pub fn corrupted<S: Into<String>>(s: S) -> Self {
        Self::Corrupted(s.into())
    }
}

impl IntegrationError {
    pub fn corrupt<S: Into<String>>(s: S) -> Self {
        Self::Corrupt(s.into())
    }

    /// `true`, если исчерпана вся запись, а не только burst.
    pub fn is_end_of_capture(&self) -> bool {
        matches!(self, IntegrationError::EndOfCapture)
    }
}
