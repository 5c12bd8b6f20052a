use crate::{TypesError, TypesResult};

/// Представление полезной нагрузки filterbank-файла.
///
/// Значение дискриминанта совпадает с первым байтом magic-строки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PayloadEncoding {
    /// Сырые IEEE-754 double (little-endian), `.bbx`
    #[default]
    Binary = 0x02,
    /// Два hex-символа на байт, перенос строки каждые 80 символов, `.abx`
    Ascii = b'A',
}

impl PayloadEncoding {
    pub fn from_u8(v: u8) -> TypesResult<Self> {
        match v {
            0x02 => Ok(PayloadEncoding::Binary),
            b'A' => Ok(PayloadEncoding::Ascii),
            _ => Err(TypesError::UnknownEncoding(format!("0x{v:02X}"))),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Трёхбайтовая magic-строка заголовка (без префикса `%`).
    pub fn magic(&self) -> [u8; 3] {
        [self.as_u8(), b'B', b'X']
    }

    /// Расширение архива без `.gz`.
    pub fn extension(&self) -> &'static str {
        match self {
            PayloadEncoding::Binary => "bbx",
            PayloadEncoding::Ascii => "abx",
        }
    }

    /// Последнее поле строки размерностей заголовка.
    pub fn summary_tag(&self) -> &'static str {
        match self {
            PayloadEncoding::Binary => "raw256",
            PayloadEncoding::Ascii => "raw16",
        }
    }
}

impl std::fmt::Display for PayloadEncoding {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            PayloadEncoding::Binary => write!(f, "binary"),
            PayloadEncoding::Ascii => write!(f, "ascii"),
        }
    }
}

impl std::str::FromStr for PayloadEncoding {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "binary" | "bin" | "bbx" => Ok(PayloadEncoding::Binary),
            "ascii" | "hex" | "abx" => Ok(PayloadEncoding::Ascii),
            _ => Err(TypesError::UnknownEncoding(s.to_string())),
        }
    }
}
