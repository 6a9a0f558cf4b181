//! Batch output directory and `.tar.gz` archiving.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::ARCHIVE_SUFFIX;
use crate::error::Result;

/// Where batch results are written.
///
/// For an archive path `out.tar.gz` results go to `out/`, which is packed
/// into the archive by [`OutputDir::finish`] and removed afterwards unless
/// it existed before the run.
#[derive(Debug)]
pub struct OutputDir {
    dir: PathBuf,
    archive: Option<PathBuf>,
    created: bool,
}

impl OutputDir {
    /// Create the output directory if needed.
    pub fn prepare(out: &Path) -> Result<Self> {
        let name = out
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let (dir, archive) = match name.strip_suffix(ARCHIVE_SUFFIX) {
            Some(stem) => (out.with_file_name(stem), Some(out.to_path_buf())),
            None => (out.to_path_buf(), None),
        };
        let created = !dir.exists();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            archive,
            created,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }

    /// Pack the directory when an archive was requested. Returns the final
    /// output location.
    pub fn finish(self) -> Result<PathBuf> {
        let Some(archive) = self.archive else {
            return Ok(self.dir);
        };

        let root = self
            .dir
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("out"));
        let encoder = GzEncoder::new(File::create(&archive)?, Compression::default());
        let mut tar = tar::Builder::new(encoder);
        tar.append_dir_all(&root, &self.dir)?;
        tar.into_inner()?.finish()?;
        log::info!("Archived {} into {}", self.dir.display(), archive.display());

        if self.created {
            std::fs::remove_dir_all(&self.dir)?;
        }
        Ok(archive)
    }
}
