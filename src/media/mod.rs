// Media tooling behind the cue source
//
// - Commands: ffprobe / ffmpeg command builders
// - Probe: subtitle stream discovery
// - Extractor: cue source emitting tracks, cues and the finish signal

pub mod commands;
pub mod extractor;
pub mod probe;

pub use commands::*;
pub use extractor::FfmpegCueSource;
pub use probe::{parse_probe_output, TEXT_SUBTITLE_CODECS};

use tracing::info;

use crate::config::MediaConfig;
use crate::error::Result;

/// Check that ffmpeg and ffprobe can be executed
pub async fn check_availability(config: &MediaConfig) -> Result<()> {
    let builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);
    for command in builder.version_checks() {
        command.output().await?;
    }
    info!("ffmpeg and ffprobe are available");
    Ok(())
}
