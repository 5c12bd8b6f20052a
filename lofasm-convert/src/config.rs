use std::path::PathBuf;

use lofasm_core::ArchiveAssembler;
use lofasm_types::{PayloadEncoding, PolarizationChannel, CANONICAL_CHANNELS};

/// Список каналов по умолчанию для `--pols`.
pub const DEFAULT_CHANNEL_LIST: &str = "AA,BB,CC,DD,AB,AC,AD,BC,BD,CD";

/// Полная конфигурация конвертации.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    /// Представление полезной нагрузки (`.bbx` / `.abx`)
    pub encoding: PayloadEncoding,
    /// Перезаписывать существующие архивы
    pub force: bool,
    /// Запрошенные каналы, в порядке обработки
    pub channels: Vec<PolarizationChannel>,
    /// Каталог для архивов и временных файлов
    pub output_dir: PathBuf,
    /// Оставлять `.hdr` / `.dat` после сборки архива
    pub keep_temporaries: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ConvertConfig {
    pub fn assembler(&self) -> ArchiveAssembler {
        ArchiveAssembler {
            overwrite: self.force,
            keep_temporaries: self.keep_temporaries,
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            encoding: PayloadEncoding::Binary,
            force: false,
            channels: CANONICAL_CHANNELS.to_vec(),
            output_dir: PathBuf::from("."),
            keep_temporaries: false,
        }
    }
}

/// Разбирает список каналов через запятую (`"AA,bb, AB"`).
///
/// Регистр нормализуется, повторы отбрасываются с сохранением порядка.
///
/// # Примеры
/// ```
/// use lofasm_convert::config::parse_channel_list;
/// let channels = parse_channel_list("AA,ab,AA").unwrap();
/// assert_eq!(channels.len(), 2);
/// assert_eq!(channels[1].as_str(), "AB");
/// ```
pub fn parse_channel_list(s: &str) -> Result<Vec<PolarizationChannel>, String> {
    let mut channels: Vec<PolarizationChannel> = Vec::new();

    for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let channel: PolarizationChannel = item
            .parse()
            .map_err(|e| format!("Invalid channel '{item}': {e}. Use two letters, e.g. AA or AB"))?;

        if !channels.contains(&channel) {
            channels.push(channel);
        }
    }

    if channels.is_empty() {
        return Err(format!("No channels in '{s}'"));
    }

    Ok(channels)
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
