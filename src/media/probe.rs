use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Result, SubtransError};
use crate::pipeline::TrackInfo;

/// Subtitle codecs ffmpeg can convert to SRT text
pub const TEXT_SUBTITLE_CODECS: &[&str] = &["subrip", "srt", "ass", "ssa", "webvtt", "mov_text", "text"];

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: u64,
    #[serde(default)]
    codec_name: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl ProbeStream {
    fn language(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("language"))
            .map(|(_, value)| value.as_str())
    }

    fn is_text(&self) -> bool {
        self.codec_name
            .as_deref()
            .is_some_and(|codec| TEXT_SUBTITLE_CODECS.contains(&codec))
    }
}

/// Parse `ffprobe -show_streams -of json` output into text subtitle tracks.
///
/// Image based subtitles (PGS, VobSub) are left out since they carry no text.
pub fn parse_probe_output(json: &str) -> Result<Vec<TrackInfo>> {
    let output: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| SubtransError::Media(format!("Failed to parse ffprobe output: {}", e)))?;

    Ok(output
        .streams
        .iter()
        .filter(|stream| stream.is_text())
        .map(|stream| TrackInfo {
            number: stream.index,
            language: stream.language().map(str::to_string),
            codec: stream.codec_name.clone(),
        })
        .collect())
}
