use thiserror::Error;

/// Результат для операций формата filterbank
pub type FormatResult<T> = std::result::Result<T, FormatError>;

pub type ArchiveResult<T> = std::result::Result<T, ArchiveError>;

/// Ошибки разбора filterbank-файлов (.bbx / .abx).
#[derive(Debug, Error)]
pub enum FormatError {
    /// Неправильная magic-строка
    #[error("Invalid magic: {0}")]
    InvalidMagic(String),

    /// В заголовке нет обязательного поля
    #[error("Missing header field: {0}")]
    MissingField(String),

    /// Значение поля не разбирается
    #[error("Invalid value '{value}' for header field '{field}'")]
    InvalidField { field: String, value: String },

    /// Нечётное число hex-цифр или недопустимый символ
    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    /// Объём полезной нагрузки не совпадает с размерностями заголовка
    #[error("Payload size mismatch: header declares {expected} bytes, found {found}")]
    PayloadMismatch { expected: usize, found: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки сборки архива канала.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Не удалось записать временный файл заголовка
    #[error("could not open header file: {0}")]
    HeaderFile(#[source] std::io::Error),

    /// Не удалось открыть временные файлы или создать архив
    #[error("could not open file: {0}")]
    Open(#[source] std::io::Error),

    /// Ошибка копирования / сжатия
    #[error("could not write file: {0}")]
    Write(#[source] std::io::Error),
}

impl FormatError {
    pub fn invalid_field<F: Into<String>, V: Into<String>>(
        field: F,
        value: V,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            value: value.into(),
        }
    }
}
