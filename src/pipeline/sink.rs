use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, BufWriter};
use tracing::info;

use crate::error::{Result, SubtransError};

/// Write-only byte stream receiving the rendered records of one track
pub struct OutputSink {
    pub path: Option<PathBuf>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
}

impl OutputSink {
    pub fn new<W>(path: Option<PathBuf>, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            path,
            writer: Box::new(writer),
        }
    }

    pub(crate) fn writer(&mut self) -> &mut Box<dyn AsyncWrite + Send + Unpin> {
        &mut self.writer
    }

    /// Human readable target for log and error messages
    pub fn describe(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => "<memory>".to_string(),
        }
    }
}

/// Opens the sink for the selected track
#[async_trait]
pub trait SinkOpener: Send + Sync {
    async fn open(&self, language: Option<&str>) -> Result<OutputSink>;
}

/// Opens `<dir>/<stem>[.<language>].srt` files
pub struct FileSinkOpener {
    dir: PathBuf,
    stem: String,
}

impl FileSinkOpener {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(dir: P, stem: S) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }
}

#[async_trait]
impl SinkOpener for FileSinkOpener {
    async fn open(&self, language: Option<&str>) -> Result<OutputSink> {
        let path = srt_path(&self.dir, &self.stem, language);
        let file = fs::File::create(&path).await.map_err(|e| {
            SubtransError::Output(format!("Failed to create {}: {}", path.display(), e))
        })?;

        info!("Writing translated subtitles to {}", path.display());
        Ok(OutputSink::new(Some(path), BufWriter::new(file)))
    }
}

/// Output path for a media file stem and an optional language suffix
pub fn srt_path(dir: &Path, stem: &str, language: Option<&str>) -> PathBuf {
    match language {
        Some(language) => dir.join(format!("{}.{}.srt", stem, language)),
        None => dir.join(format!("{}.srt", stem)),
    }
}
