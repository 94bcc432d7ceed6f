use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::{Config, PipelineConfig};
use crate::error::{Result, SubtransError};
use crate::media::{self, FfmpegCueSource};
use crate::pipeline::track::first_eligible;
use crate::pipeline::{CueSource, FileSinkOpener, Pipeline, PipelineReport, SinkOpener, TrackInfo};
use crate::translate::{BackendFactory, TranslationBackend};

/// Outcome of a directory run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirectorySummary {
    pub translated: usize,
    pub without_track: usize,
    pub failed: usize,
}

pub struct Workflow {
    config: Config,
    backend: Arc<dyn TranslationBackend>,
}

impl Workflow {
    /// Build the configured backend and check the external tools
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let backend = BackendFactory::create_backend(&config)?;

        media::check_availability(&config.media).await?;
        backend.check_availability().await?;

        Ok(Self { config, backend })
    }

    /// Use an already constructed backend, skipping availability checks
    pub fn with_backend(config: Config, backend: Arc<dyn TranslationBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    /// Translate the subtitles of a single media file
    pub async fn process_single_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Option<&Path>,
    ) -> Result<PipelineReport> {
        let input_path = input_path.as_ref();
        info!("Processing single file: {}", input_path.display());

        if !input_path.is_file() {
            return Err(SubtransError::FileNotFound(input_path.display().to_string()));
        }

        let output_dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input_path.parent()
                .ok_or_else(|| SubtransError::Config("Cannot determine output directory".to_string()))?
                .to_path_buf(),
        };
        fs::create_dir_all(&output_dir).await?;

        let stem = media_stem(input_path)?;
        let source = FfmpegCueSource::new(input_path, &self.config.media, &self.config.pipeline.source_languages);
        let opener = FileSinkOpener::new(output_dir, stem);

        let report = run_pipeline(&self.config.pipeline, Arc::clone(&self.backend), &source, Box::new(opener)).await?;
        log_report(input_path, &report);
        Ok(report)
    }

    /// Translate every matching media file below a directory.
    ///
    /// Files are independent: a failure is logged and the scan continues.
    /// With an output directory, each file's subdirectory is mirrored below it.
    pub async fn process_directory<P: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Option<&Path>,
    ) -> Result<DirectorySummary> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(SubtransError::Config("Input path is not a directory".to_string()));
        }

        let media_files = scan_media_files(input_dir, &self.config.media.extensions);
        info!("Found {} media files to process", media_files.len());

        let progress = ProgressBar::new(media_files.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut summary = DirectorySummary::default();
        for media_path in media_files {
            progress.set_message(file_label(&media_path));

            let file_output_dir = output_dir.map(|dir| mirrored_output_dir(input_dir, &media_path, dir));

            match self.process_single_file(&media_path, file_output_dir.as_deref()).await {
                Ok(report) if report.track.is_some() => summary.translated += 1,
                Ok(_) => summary.without_track += 1,
                Err(e) => {
                    warn!("Failed to process {}: {}", media_path.display(), e);
                    summary.failed += 1;
                }
            }
            progress.inc(1);
        }

        progress.finish_with_message("done");
        info!(
            "Directory done: {} translated, {} without eligible track, {} failed",
            summary.translated, summary.without_track, summary.failed
        );
        Ok(summary)
    }
}

/// Text subtitle tracks of a file and the number of the one that would be translated
pub async fn inspect_tracks<P: AsRef<Path>>(config: &Config, input_path: P) -> Result<(Vec<TrackInfo>, Option<u64>)> {
    let input_path = input_path.as_ref();
    if !input_path.is_file() {
        return Err(SubtransError::FileNotFound(input_path.display().to_string()));
    }

    let tracks = FfmpegCueSource::new(input_path, &config.media, &config.pipeline.source_languages)
        .probe_tracks()
        .await?;
    let selected = first_eligible(&config.pipeline.source_languages, &tracks)
        .map(|track| track.number);
    Ok((tracks, selected))
}

/// Run one file's cue source and pipeline side by side.
///
/// A cue source error aborts the file; output written so far is left as is.
pub async fn run_pipeline(
    config: &PipelineConfig,
    backend: Arc<dyn TranslationBackend>,
    source: &dyn CueSource,
    opener: Box<dyn SinkOpener>,
) -> Result<PipelineReport> {
    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(config, backend, opener);

    let ((), report) = tokio::try_join!(source.run(tx), pipeline.run(rx))?;
    Ok(report)
}

/// Files below `dir` whose extension is in `extensions` (case-insensitive), sorted
pub fn scan_media_files(dir: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        })
        .collect();
    files.sort();
    files
}

/// `output_dir` plus the media file's directory relative to `input_dir`
fn mirrored_output_dir(input_dir: &Path, media_path: &Path, output_dir: &Path) -> PathBuf {
    match media_path.strip_prefix(input_dir).ok().and_then(Path::parent) {
        Some(relative) => output_dir.join(relative),
        None => output_dir.to_path_buf(),
    }
}

fn media_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .ok_or_else(|| SubtransError::Config(format!("Invalid media filename: {}", path.display())))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn log_report(input_path: &Path, report: &PipelineReport) {
    match &report.track {
        Some(track) => info!(
            "Finished {}: {} records in {} ({} batches, {} failed, {} cues dropped)",
            input_path.display(),
            track.records_written,
            track.path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
            report.batches_dispatched,
            report.batches_failed,
            report.cues_dropped
        ),
        None => warn!(
            "No subtitle track selected for {}, {} cues ignored",
            input_path.display(),
            report.cues_discarded
        ),
    }
}
