//! Ядро конвертера LoFASM
//!
//! Чтение LoCo-записей и запись filterbank-файлов `.bbx` / `.abx`:
//! контракт crawler-а, стоки каналов, построение заголовка и сборка
//! gzip-архивов.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use lofasm_core::{CaptureCrawler, LocoReader, MetadataExtractor};
//!
//! let mut capture = LocoReader::open("20141209_010203.lofasm")?;
//! let meta = MetadataExtractor::read(&mut capture)?;
//! println!("{} bins from {}", meta.bins, meta.station);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod capture;
pub mod error;
pub mod format;
pub mod hex;
pub mod loco;
pub mod simulated;
pub mod sink;

pub use archive::*;
pub use capture::*;
pub use error::*;
pub use format::*;
pub use hex::*;
pub use loco::*;
pub use simulated::*;
pub use sink::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        assert_eq!(LOCO_HEADER_SIZE, 96);
        assert_eq!(LINE_WIDTH, 80);
        assert_eq!(HDR_TYPE, "LoFASM-filterbank");
    }
}
