//! Temporary local copies of media payloads.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::model::{MediaSource, UploadBody};

/// A payload written to a temporary file. The file is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    len: u64,
}

impl StagedFile {
    /// Write `source` into a new temporary file inside `dir`.
    ///
    /// The write runs on the blocking pool.
    pub async fn create(dir: &Path, source: &MediaSource) -> io::Result<Self> {
        let dir = dir.to_path_buf();
        let suffix = source.extension().unwrap_or("").to_string();
        let data = source.data.clone();

        let task = tokio::task::spawn_blocking(move || -> io::Result<Self> {
            let mut file = tempfile::Builder::new()
                .prefix("vidlens-")
                .suffix(&suffix)
                .tempfile_in(dir)?;
            file.write_all(&data)?;
            file.flush()?;
            tracing::debug!("Staged {} bytes at {}", data.len(), file.path().display());
            Ok(Self {
                file,
                len: data.len() as u64,
            })
        });
        task.await.map_err(io::Error::other)?
    }

    /// Upload body reading from the staged copy.
    pub fn body(&self) -> UploadBody {
        UploadBody::File {
            path: PathBuf::from(self.file.path()),
            len: self.len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = MediaSource::new(&b"frames"[..], "video/mp4").with_display_name("clip.mp4");

        let staged = StagedFile::create(dir.path(), &source).await.unwrap();
        let UploadBody::File { path, len } = staged.body() else {
            panic!("Expected a file body");
        };
        assert_eq!(len, 6);
        assert_eq!(std::fs::read(&path).unwrap(), b"frames");
        assert!(path.to_string_lossy().ends_with(".mp4"));

        drop(staged);
        assert!(!path.exists());
    }
}
