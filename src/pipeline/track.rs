use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::queue::Task;
use super::sink::SinkOpener;
use super::writer::OrderedWriter;
use crate::error::Result;
use crate::subtitle::Cue;

/// Tag containers use when a track's language was never set
pub const UNDEFINED_LANGUAGE: &str = "und";

/// Track metadata announced by the cue source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub number: u64,
    pub language: Option<String>,
    pub codec: Option<String>,
}

impl TrackInfo {
    pub fn new(number: u64, language: Option<&str>) -> Self {
        Self {
            number,
            language: language.map(str::to_string),
            codec: None,
        }
    }

    /// Language tag with the "undefined" sentinel mapped to `None`
    pub fn language_tag(&self) -> Option<&str> {
        self.language
            .as_deref()
            .filter(|tag| !tag.is_empty() && *tag != UNDEFINED_LANGUAGE)
    }
}

/// The subtitle track selected for translation, owning its output
pub struct Track {
    pub number: u64,
    pub language: Option<String>,
    next_sequence: u64,
    output: OrderedWriter,
}

impl Track {
    fn new(info: &TrackInfo, output: OrderedWriter) -> Self {
        Self {
            number: info.number,
            language: info.language_tag().map(str::to_string),
            next_sequence: 1,
            output,
        }
    }

    /// Hand out the next sequence number. Numbers are never reused.
    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Number of cues accepted for this track so far
    pub fn cues_accepted(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn output(&mut self) -> &mut OrderedWriter {
        &mut self.output
    }

    pub(crate) fn into_output(self) -> OrderedWriter {
        self.output
    }
}

/// Picks the one track to translate and routes its cues into tasks
pub struct TrackSelector {
    source_languages: Vec<String>,
    opener: Box<dyn SinkOpener>,
    selected: Option<Track>,
}

impl TrackSelector {
    pub fn new(source_languages: Vec<String>, opener: Box<dyn SinkOpener>) -> Self {
        Self {
            source_languages,
            opener,
            selected: None,
        }
    }

    /// Select the first eligible track and open its sink.
    ///
    /// Once a track is selected every later announcement is ignored, so at most
    /// one sink is ever opened.
    pub async fn select(&mut self, tracks: &[TrackInfo]) -> Result<Option<&Track>> {
        if self.selected.is_some() {
            debug!("Track already selected, ignoring {} announced tracks", tracks.len());
            return Ok(self.selected.as_ref());
        }

        let Some(info) = first_eligible(&self.source_languages, tracks) else {
            return Ok(None);
        };

        let sink = self.opener.open(info.language_tag()).await?;
        info!(
            "Selected subtitle track {} ({})",
            info.number,
            info.language_tag().unwrap_or("untagged")
        );
        self.selected = Some(Track::new(info, OrderedWriter::new(sink)));
        Ok(self.selected.as_ref())
    }

    /// Turn a cue into a task if it belongs to the selected track.
    ///
    /// Cues of any other track are dropped without consuming a sequence number.
    pub fn accept(&mut self, track_number: u64, cue: Cue) -> Option<Task> {
        let track = self.selected.as_mut().filter(|track| track.number == track_number)?;
        Some(Task {
            sequence: track.take_sequence(),
            track: track_number,
            cue,
        })
    }

    pub fn selected(&self) -> Option<&Track> {
        self.selected.as_ref()
    }

    pub fn selected_mut(&mut self) -> Option<&mut Track> {
        self.selected.as_mut()
    }

    pub(crate) fn into_selected(self) -> Option<Track> {
        self.selected
    }
}

/// Whether a track may be translated: tagged with a source language, or untagged
fn is_eligible(source_languages: &[String], track: &TrackInfo) -> bool {
    match track.language_tag() {
        None => true,
        Some(tag) => source_languages.iter().any(|wanted| wanted == tag),
    }
}

/// First track in announcement order that may be translated
pub fn first_eligible<'a>(source_languages: &[String], tracks: &'a [TrackInfo]) -> Option<&'a TrackInfo> {
    tracks.iter().find(|track| is_eligible(source_languages, track))
}
