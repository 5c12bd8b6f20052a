//! Конвертер LoCo → `.bbx` / `.abx`
//!
//! Каждый burst входной записи превращается в набор gzip-архивов, по
//! одному на поляризационный канал.
//!
//! Файловый вход читается через [`lofasm_core::LocoReader`], то есть в
//! кадрировании LoCo-контейнера этого крейта (`BRST` / `INTG`).

pub mod config;
pub mod error;
pub mod pipeline;
pub mod stats;

pub use config::*;
pub use error::*;
pub use pipeline::*;
pub use stats::*;
