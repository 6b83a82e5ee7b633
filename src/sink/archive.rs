use crate::error::ArchiveError;
use crate::reading_log::Reading;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

/// Result of flushing one device's log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// The device produced no readings; nothing was written
    NoData,
    /// Number of readings written
    Archived(usize),
}

/// Flush-only destination for a device's full reading log
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Make the destination ready before any reader starts
    async fn prepare(&self) -> Result<(), ArchiveError> {
        Ok(())
    }

    async fn archive(
        &self,
        device_id: &str,
        readings: &[Reading],
    ) -> Result<ArchiveOutcome, ArchiveError>;
}

/// Writes `<directory>/<device_id>.csv` with one `t_ms,dx,dy` line per reading
pub struct CsvArchiver {
    directory: PathBuf,
}

impl CsvArchiver {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_for(&self, device_id: &str) -> PathBuf {
        self.directory.join(format!("{}.csv", device_id))
    }
}

#[async_trait]
impl Archiver for CsvArchiver {
    async fn prepare(&self) -> Result<(), ArchiveError> {
        let directory = self.directory();
        if !directory.exists() {
            fs::create_dir_all(directory)
                .await
                .map_err(|source| ArchiveError::CreateDir {
                    path: directory.display().to_string(),
                    source,
                })?;
            info!("Created archive directory: {}", directory.display());
        }
        Ok(())
    }

    async fn archive(
        &self,
        device_id: &str,
        readings: &[Reading],
    ) -> Result<ArchiveOutcome, ArchiveError> {
        if readings.is_empty() {
            return Ok(ArchiveOutcome::NoData);
        }

        let path = self.file_for(device_id);
        let write_error = |source: std::io::Error| ArchiveError::Write {
            device: device_id.to_string(),
            source,
        };

        let file = fs::File::create(&path).await.map_err(write_error)?;
        let mut writer = BufWriter::new(file);
        for reading in readings {
            writer
                .write_all(reading.to_csv_line().as_bytes())
                .await
                .map_err(write_error)?;
            writer.write_all(b"\n").await.map_err(write_error)?;
        }
        writer.flush().await.map_err(write_error)?;

        debug!("Wrote {} readings to {}", readings.len(), path.display());
        Ok(ArchiveOutcome::Archived(readings.len()))
    }
}
