// Batch-dispatch pipeline
//
// Cue source -> track selector -> task queue -> batch scheduler -> output sink.
// The controller owns every stage and drives the scheduler on a timer until
// extraction has finished and the queue is empty.

pub mod controller;
pub mod queue;
pub mod scheduler;
pub mod sink;
pub mod track;
pub mod writer;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use controller::{FinishedTrack, Pipeline, PipelineReport, PipelineState};
pub use queue::{Task, TaskQueue};
pub use scheduler::{Batch, BatchOutcome, BatchScheduler};
pub use sink::{FileSinkOpener, OutputSink, SinkOpener, srt_path};
pub use track::{Track, TrackInfo, TrackSelector, UNDEFINED_LANGUAGE};
pub use writer::OrderedWriter;

use crate::error::Result;
use crate::subtitle::Cue;

/// What a cue source reports, in protocol order:
/// `Tracks` once, any number of `Cue`, then `Finished` once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueEvent {
    Tracks(Vec<TrackInfo>),
    Cue { track: u64, cue: Cue },
    Finished,
}

pub type CueSender = mpsc::UnboundedSender<CueEvent>;
pub type CueReceiver = mpsc::UnboundedReceiver<CueEvent>;

/// Producer of subtitle cues for one media file
#[async_trait]
pub trait CueSource: Send + Sync {
    /// Emit the file's events. Returning drops the sender.
    async fn run(&self, events: CueSender) -> Result<()>;
}
