use crate::{TypesError, TypesResult};

/// Канонический набор поляризационных пар LoFASM (4 авто + 6 кросс).
pub const CANONICAL_CHANNELS: [PolarizationChannel; 10] = [
    PolarizationChannel::new_unchecked(*b"AA"),
    PolarizationChannel::new_unchecked(*b"BB"),
    PolarizationChannel::new_unchecked(*b"CC"),
    PolarizationChannel::new_unchecked(*b"DD"),
    PolarizationChannel::new_unchecked(*b"AB"),
    PolarizationChannel::new_unchecked(*b"AC"),
    PolarizationChannel::new_unchecked(*b"AD"),
    PolarizationChannel::new_unchecked(*b"BC"),
    PolarizationChannel::new_unchecked(*b"BD"),
    PolarizationChannel::new_unchecked(*b"CD"),
];

/// Поляризационный канал: двухбуквенный код.
///
/// Одинаковые буквы (`AA`) — автокорреляция, вещественный спектр мощности.
/// Разные буквы (`AB`) — кросс-корреляция, комплексный кросс-спектр.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolarizationChannel([u8; 2]);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl PolarizationChannel {
    /// Создаёт канал из двух ASCII-букв (регистр нормализуется к верхнему).
    pub fn new(code: [u8; 2]) -> TypesResult<Self> {
        if !code.iter().all(u8::is_ascii_alphabetic) {
            return Err(TypesError::InvalidChannel(
                String::from_utf8_lossy(&code).into_owned(),
            ));
        }

        Ok(Self(code.map(|b| b.to_ascii_uppercase())))
    }

    const fn new_unchecked(code: [u8; 2]) -> Self {
        Self(code)
    }

    /// Автокорреляция: значения вещественные.
    pub fn is_real(&self) -> bool {
        self.0[0] == self.0[1]
    }

    /// Число double-значений на один частотный бин (1 — real, 2 — complex).
    pub fn arity(&self) -> usize {
        if self.is_real() {
            1
        } else {
            2
        }
    }

    pub fn code(&self) -> [u8; 2] {
        self.0
    }

    pub fn as_str(&self) -> &str {
        // Конструкторы пропускают только ASCII-буквы
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Display for PolarizationChannel {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PolarizationChannel {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        match s.as_bytes() {
            [a, b] => Self::new([*a, *b]),
            _ => Err(TypesError::InvalidChannel(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_and_cross_channels() {
        let aa: PolarizationChannel = "AA".parse().unwrap();
        let ab: PolarizationChannel = "AB".parse().unwrap();

        assert!(aa.is_real());
        assert_eq!(aa.arity(), 1);
        assert!(!ab.is_real());
        assert_eq!(ab.arity(), 2);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let ch: PolarizationChannel = " bd ".parse().unwrap();
        assert_eq!(ch.as_str(), "BD");
        assert_eq!(ch.to_string(), "BD");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("A".parse::<PolarizationChannel>().is_err());
        assert!("ABC".parse::<PolarizationChannel>().is_err());
        assert!("A1".parse::<PolarizationChannel>().is_err());
        assert!("".parse::<PolarizationChannel>().is_err());
    }

    #[test]
    fn test_canonical_set() {
        let real = CANONICAL_CHANNELS.iter().filter(|c| c.is_real()).count();
        assert_eq!(real, 4);
        assert_eq!(CANONICAL_CHANNELS.len() - real, 6);
        assert_eq!(CANONICAL_CHANNELS[4].as_str(), "AB");
    }
}
