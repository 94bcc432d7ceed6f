use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::commands::MediaCommandBuilder;
use super::probe::parse_probe_output;
use crate::config::MediaConfig;
use crate::error::{Result, SubtransError};
use crate::pipeline::track::first_eligible;
use crate::pipeline::{CueEvent, CueSender, CueSource, TrackInfo};
use crate::subtitle::parse_srt;

/// Cue source reading embedded text subtitles with ffprobe and ffmpeg.
///
/// Every text track is announced, but only the track the selector will pick
/// is extracted, so the container is read once and broken streams of other
/// tracks cannot fail the file.
pub struct FfmpegCueSource {
    media_path: PathBuf,
    commands: MediaCommandBuilder,
    source_languages: Vec<String>,
}

impl FfmpegCueSource {
    pub fn new<P: Into<PathBuf>>(media_path: P, config: &MediaConfig, source_languages: &[String]) -> Self {
        Self {
            media_path: media_path.into(),
            commands: MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path),
            source_languages: source_languages.to_vec(),
        }
    }

    /// Text subtitle tracks of the media file
    pub async fn probe_tracks(&self) -> Result<Vec<TrackInfo>> {
        let json = self.commands.probe_subtitles(&self.media_path).output().await?;
        parse_probe_output(&json)
    }

    async fn extract_track(&self, track: &TrackInfo, events: &CueSender) -> Result<usize> {
        let srt = self.commands.extract_srt(&self.media_path, track.number).output().await?;
        let cues = parse_srt(&srt);
        let count = cues.len();

        for cue in cues {
            send(events, CueEvent::Cue { track: track.number, cue })?;
        }
        Ok(count)
    }
}

#[async_trait]
impl CueSource for FfmpegCueSource {
    async fn run(&self, events: CueSender) -> Result<()> {
        info!("Starting subtitle extraction for {}", self.media_path.display());

        let tracks = self.probe_tracks().await?;
        send(&events, CueEvent::Tracks(tracks.clone()))?;

        match first_eligible(&self.source_languages, &tracks) {
            Some(track) => {
                let count = self.extract_track(track, &events).await?;
                debug!("Extracted {} cues from track {}", count, track.number);
            }
            None => warn!("No eligible text subtitle track in {}", self.media_path.display()),
        }

        send(&events, CueEvent::Finished)?;
        info!("Subtitle extraction finished for {}", self.media_path.display());
        Ok(())
    }
}

fn send(events: &CueSender, event: CueEvent) -> Result<()> {
    events
        .send(event)
        .map_err(|_| SubtransError::CueSource("pipeline stopped receiving cues".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::Cue;
    use std::path::Path;
    use tokio::sync::mpsc;

    const PROBE_JSON: &str = r#"{"streams":[
        {"index":2,"codec_name":"subrip","tags":{"language":"eng"}},
        {"index":3,"codec_name":"ass","tags":{"language":"fre"}}
    ]}"#;

    fn english() -> Vec<String> {
        vec!["en".to_string(), "eng".to_string()]
    }

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// ffprobe reporting an English and a French track, ffmpeg that logs each
    /// requested map and fails on the French stream
    #[cfg(unix)]
    fn stub_tools(dir: &Path) -> MediaConfig {
        let ffprobe = dir.join("ffprobe");
        let ffmpeg = dir.join("ffmpeg");
        let calls = dir.join("calls.log");

        write_script(&ffprobe, &format!("cat <<'EOF'\n{}\nEOF\n", PROBE_JSON));
        write_script(
            &ffmpeg,
            &format!(
                "for arg in \"$@\"; do case \"$arg\" in 0:*) echo \"$arg\" >> '{}';; esac; done\n\
                 case \"$*\" in\n\
                 *0:3*) echo 'broken ass stream' >&2; exit 1;;\n\
                 esac\n\
                 printf '1\\n00:00:01,000 --> 00:00:02,500\\nHello\\n\\n'\n",
                calls.display()
            ),
        );

        MediaConfig {
            ffmpeg_path: ffmpeg.display().to_string(),
            ffprobe_path: ffprobe.display().to_string(),
            ..MediaConfig::default()
        }
    }

    fn collect(mut rx: mpsc::UnboundedReceiver<CueEvent>) -> Vec<CueEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_only_the_eligible_track_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let config = stub_tools(dir.path());
        let source = FfmpegCueSource::new("movie.mkv", &config, &english());
        let (tx, rx) = mpsc::unbounded_channel();

        source.run(tx).await.unwrap();

        let events = collect(rx);
        assert_eq!(events.len(), 3);
        match &events[0] {
            CueEvent::Tracks(tracks) => {
                let numbers: Vec<u64> = tracks.iter().map(|track| track.number).collect();
                assert_eq!(numbers, vec![2, 3]);
            }
            other => panic!("expected track announcement, got {:?}", other),
        }
        assert_eq!(events[1], CueEvent::Cue { track: 2, cue: Cue::new("Hello", 1_000, 1_500) });
        assert_eq!(events[2], CueEvent::Finished);

        let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
        assert_eq!(calls.lines().collect::<Vec<_>>(), vec!["0:2"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_selected_track_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = stub_tools(dir.path());
        let source = FfmpegCueSource::new("movie.mkv", &config, &["fre".to_string()]);
        let (tx, rx) = mpsc::unbounded_channel();

        let result = source.run(tx).await;
        assert!(matches!(result, Err(SubtransError::Media(message)) if message.contains("broken ass stream")));
        assert!(!collect(rx).contains(&CueEvent::Finished));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_eligible_track_extracts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = stub_tools(dir.path());
        let source = FfmpegCueSource::new("movie.mkv", &config, &["ja".to_string()]);
        let (tx, rx) = mpsc::unbounded_channel();

        source.run(tx).await.unwrap();

        let events = collect(rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], CueEvent::Finished);
        assert!(!dir.path().join("calls.log").exists());
    }

    #[tokio::test]
    async fn test_missing_ffprobe_fails_before_any_event() {
        let config = MediaConfig {
            ffprobe_path: "/nonexistent/ffprobe".to_string(),
            ..MediaConfig::default()
        };
        let source = FfmpegCueSource::new("movie.mkv", &config, &english());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = source.run(tx).await;
        assert!(matches!(result, Err(SubtransError::Media(_))));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_send_to_closed_pipeline() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        assert!(matches!(send(&tx, CueEvent::Finished), Err(SubtransError::CueSource(_))));
    }
}
