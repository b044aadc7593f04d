use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use crate::Error;
use crate::traits::ExportSink;

/// Writes exports to the filesystem
///
/// Either into a directory, using the suggested filename, or to an exact
/// path chosen by the user.
#[derive(Debug, Clone)]
pub struct FileExportSink {
    target: PathBuf,
    use_suggested_name: bool,
}

impl FileExportSink {
    /// Write `<dir>/<suggested filename>`
    pub fn into_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: dir.into(),
            use_suggested_name: true,
        }
    }

    /// Write exactly `path`, ignoring the suggested filename
    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self {
            target: path.into(),
            use_suggested_name: false,
        }
    }

    /// Where a payload with `filename` ends up
    pub fn destination(&self, filename: &str) -> PathBuf {
        if self.use_suggested_name {
            self.target.join(filename)
        } else {
            self.target.clone()
        }
    }
}

#[async_trait]
impl ExportSink for FileExportSink {
    async fn deliver(&self, payload: &str, filename: &str) -> Result<(), Error> {
        let destination = self.destination(filename);

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::export(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        fs::write(&destination, payload)
            .await
            .map_err(|e| Error::export(format!("Failed to write {}: {}", destination.display(), e)))?;

        tracing::debug!("Export written to {}", destination.display());
        Ok(())
    }
}
