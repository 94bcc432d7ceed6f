use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, SubtransError};

/// Abstract media tool invocation (ffmpeg / ffprobe)
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media tool command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Only report errors on stderr
    pub fn quiet(self) -> Self {
        self.arg("-v").arg("error")
    }

    /// Run the command and return its stdout
    pub async fn output(&self) -> Result<String> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SubtransError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubtransError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Builder for the ffprobe / ffmpeg calls the cue source needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// List subtitle streams as JSON
    pub fn probe_subtitles<P: AsRef<Path>>(&self, media_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Subtitle probe")
            .quiet()
            .args(["-select_streams", "s", "-show_streams", "-of", "json"])
            .arg(media_path.as_ref().to_string_lossy().to_string())
    }

    /// Convert one subtitle stream to SRT on stdout
    pub fn extract_srt<P: AsRef<Path>>(&self, media_path: P, stream_index: u64) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, format!("Subtitle extraction (stream {})", stream_index))
            .quiet()
            .input(media_path)
            .arg("-map")
            .arg(format!("0:{}", stream_index))
            .args(["-f", "srt", "-"])
    }

    /// Version checks for both tools
    pub fn version_checks(&self) -> [MediaCommand; 2] {
        [
            MediaCommand::new(&self.ffmpeg_path, "ffmpeg version check").arg("-version"),
            MediaCommand::new(&self.ffprobe_path, "ffprobe version check").arg("-version"),
        ]
    }
}
