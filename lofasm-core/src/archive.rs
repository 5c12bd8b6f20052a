use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use flate2::{write::GzEncoder, Compression};
use log::{debug, warn};

use crate::{
    error::{ArchiveError, ArchiveResult},
    format::ChannelPaths,
};

/// Склеивает заголовок и полезную нагрузку канала в gzip-архив.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveAssembler {
    /// Перезаписывать существующие архивы
    pub overwrite: bool,
    /// Не удалять временные `.hdr` / `.dat` после сборки
    pub keep_temporaries: bool,
}

/// Исход сборки архива.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Архив записан
    Written {
        path: PathBuf,
        /// Временные файлы остались на диске
        temporaries_kept: bool,
    },
    /// Архив уже существует, перезапись не запрошена
    Skipped(PathBuf),
}

impl ArchiveAssembler {
    pub fn new(overwrite: bool) -> Self {
        Self {
            overwrite,
            keep_temporaries: false,
        }
    }

    /// Пишет `header` во временный `.hdr`, затем сжимает `.hdr` + `.dat` в
    /// `paths.archive`.
    ///
    /// При ошибке записи недописанный архив удаляется, а временные файлы
    /// остаются для ручного восстановления.
    pub fn assemble(
        &self,
        header: &[u8],
        paths: &ChannelPaths,
    ) -> ArchiveResult<ArchiveOutcome> {
        if paths.archive.exists() {
            if !self.overwrite {
                self.remove_temporaries(paths);
                return Ok(ArchiveOutcome::Skipped(paths.archive.clone()));
            }
            fs::remove_file(&paths.archive).map_err(ArchiveError::Open)?;
        }

        fs::write(&paths.header, header).map_err(ArchiveError::HeaderFile)?;

        if let Err(e) = merge(paths) {
            if let Err(rm) = fs::remove_file(&paths.archive) {
                debug!("Could not remove partial archive {:?}: {rm}", paths.archive);
            }
            return Err(e);
        }

        let temporaries_kept = !self.remove_temporaries(paths);

        Ok(ArchiveOutcome::Written {
            path: paths.archive.clone(),
            temporaries_kept,
        })
    }

    /// Удаляет временные файлы канала. `false`, если что-то осталось на диске.
    fn remove_temporaries(
        &self,
        paths: &ChannelPaths,
    ) -> bool {
        if self.keep_temporaries {
            return false;
        }

        let mut removed = true;
        for path in [&paths.header, &paths.payload] {
            if let Err(e) = remove_if_exists(path) {
                debug!("Could not delete {path:?}: {e}");
                removed = false;
            }
        }

        if !removed {
            warn!(
                "Keeping {} hdr/dat files (could not delete)",
                paths.archive_name()
            );
        }

        removed
    }
}

fn merge(paths: &ChannelPaths) -> ArchiveResult<()> {
    let mut header = BufReader::new(File::open(&paths.header).map_err(ArchiveError::Open)?);
    let mut payload = BufReader::new(File::open(&paths.payload).map_err(ArchiveError::Open)?);
    let out = File::create(&paths.archive).map_err(ArchiveError::Open)?;

    let mut encoder = GzEncoder::new(BufWriter::new(out), Compression::default());

    io::copy(&mut header, &mut encoder).map_err(ArchiveError::Write)?;
    io::copy(&mut payload, &mut encoder).map_err(ArchiveError::Write)?;

    encoder
        .finish()
        .and_then(|mut w| w.flush())
        .map_err(ArchiveError::Write)?;

    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
