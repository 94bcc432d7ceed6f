use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::queue::TaskQueue;
use super::scheduler::{BatchOutcome, BatchScheduler};
use super::sink::SinkOpener;
use super::track::TrackSelector;
use super::{CueEvent, CueReceiver};
use crate::config::PipelineConfig;
use crate::error::{Result, SubtransError};
use crate::subtitle::{normalize_text, render_record};
use crate::translate::TranslationBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Cues are still arriving
    Running,
    /// Extraction finished, queued cues are being dispatched
    Draining,
    /// Queue drained after extraction finished
    Terminated,
}

/// Output of the selected track once its sink is closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedTrack {
    pub number: u64,
    pub language: Option<String>,
    pub path: Option<PathBuf>,
    pub records_written: usize,
}

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// `None` when no announced track was eligible
    pub track: Option<FinishedTrack>,
    pub cues_received: usize,
    pub cues_discarded: usize,
    /// Cues lost with failed batches
    pub cues_dropped: usize,
    pub batches_dispatched: usize,
    pub batches_failed: usize,
    pub cycles: usize,
    pub state: PipelineState,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            track: None,
            cues_received: 0,
            cues_discarded: 0,
            cues_dropped: 0,
            batches_dispatched: 0,
            batches_failed: 0,
            cycles: 0,
            state: PipelineState::Running,
        }
    }

    pub fn records_written(&self) -> usize {
        self.track.as_ref().map_or(0, |track| track.records_written)
    }
}

/// Drives one media file from cue events to a closed output sink
pub struct Pipeline {
    interval: Duration,
    max_in_flight: usize,
    queue: TaskQueue,
    selector: TrackSelector,
    scheduler: BatchScheduler,
    in_flight: JoinSet<BatchOutcome>,
    state: PipelineState,
    extraction_finished: bool,
    tracks_announced: bool,
    report: PipelineReport,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        backend: Arc<dyn TranslationBackend>,
        opener: Box<dyn SinkOpener>,
    ) -> Self {
        Self {
            interval: Duration::from_millis(config.batch_interval_ms.max(1)),
            max_in_flight: config.max_in_flight.max(1),
            queue: TaskQueue::new(),
            selector: TrackSelector::new(config.source_languages.clone(), opener),
            scheduler: BatchScheduler::new(backend, config.batch_size, config.target_language.clone()),
            in_flight: JoinSet::new(),
            state: PipelineState::Running,
            extraction_finished: false,
            tracks_announced: false,
            report: PipelineReport::new(),
        }
    }

    /// Consume cue events and dispatch batches until the queue is drained.
    ///
    /// Returns after every dispatched batch has been written or dropped and the
    /// sink has been closed.
    pub async fn run(mut self, mut events: CueReceiver) -> Result<PipelineReport> {
        info!("Translating with {} backend", self.scheduler.backend_name());

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state != PipelineState::Terminated {
            tokio::select! {
                biased;
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.complete(joined).await?;
                }
                event = events.recv(), if !self.extraction_finished => {
                    match event {
                        Some(event) => self.handle_event(event).await?,
                        None => {
                            return Err(SubtransError::CueSource(
                                "cue stream ended before the finish signal".to_string(),
                            ));
                        }
                    }
                }
                _ = ticker.tick() => self.cycle(),
            }
        }

        if !self.in_flight.is_empty() {
            debug!("Waiting for {} batches still in flight", self.in_flight.len());
        }
        while let Some(joined) = self.in_flight.join_next().await {
            self.complete(joined).await?;
        }

        self.finish().await
    }

    async fn handle_event(&mut self, event: CueEvent) -> Result<()> {
        match event {
            CueEvent::Tracks(tracks) => {
                if self.tracks_announced {
                    warn!("Ignoring repeated track announcement");
                    return Ok(());
                }
                self.tracks_announced = true;
                debug!("Got tracks: {:?}", tracks);

                if self.selector.select(&tracks).await?.is_none() {
                    let languages: Vec<&str> = tracks
                        .iter()
                        .map(|track| track.language_tag().unwrap_or("untagged"))
                        .collect();
                    warn!("No eligible subtitle track among {:?}", languages);
                }
            }
            CueEvent::Cue { track, cue } => {
                self.report.cues_received += 1;
                match self.selector.accept(track, cue) {
                    Some(task) => self.queue.enqueue(task),
                    None => self.report.cues_discarded += 1,
                }
            }
            CueEvent::Finished => {
                info!("Extraction finished, {} cues queued", self.queue.len());
                self.extraction_finished = true;
                self.state = PipelineState::Draining;
            }
        }
        Ok(())
    }

    /// One scheduler cycle followed by the termination check
    fn cycle(&mut self) {
        self.report.cycles += 1;

        if self.in_flight.len() < self.max_in_flight {
            if let Some(batch) = self.scheduler.prepare(&mut self.queue) {
                self.report.batches_dispatched += 1;
                self.in_flight.spawn(self.scheduler.submit(batch));
            }
        } else {
            debug!("{} batches in flight, skipping dispatch", self.in_flight.len());
        }

        if self.extraction_finished && self.queue.is_empty() {
            info!("All cues dispatched after {} cycles", self.report.cycles);
            self.state = PipelineState::Terminated;
        }
    }

    async fn complete(&mut self, joined: std::result::Result<BatchOutcome, JoinError>) -> Result<()> {
        let outcome = joined
            .map_err(|e| SubtransError::Translation(format!("Batch task failed: {}", e)))?;
        let id = outcome.id;

        let Some(track) = self.selector.selected_mut() else {
            warn!("Batch {} completed without a selected track", id);
            return Ok(());
        };
        let output = track.output();

        match outcome.into_pairs() {
            Ok(pairs) => {
                for (task, translation) in pairs {
                    debug!("{} --> {}", task.cue.text, normalize_text(&translation));
                    output.push(task.sequence, render_record(task.sequence, &task.cue, &translation));
                }
                output.flush_ready().await?;
                info!("Batch {} written, translation progress {}", id, self.queue.len());
            }
            Err((tasks, error)) => {
                warn!("Dropping batch {} ({} cues): {}", id, tasks.len(), error);
                for task in &tasks {
                    output.skip(task.sequence);
                }
                output.flush_ready().await?;
                self.report.batches_failed += 1;
                self.report.cues_dropped += tasks.len();
            }
        }
        Ok(())
    }

    async fn finish(mut self) -> Result<PipelineReport> {
        if let Some(track) = self.selector.into_selected() {
            let number = track.number;
            let language = track.language.clone();
            let output = track.into_output();
            let path = output.path().map(|path| path.to_path_buf());
            let records_written = output.close().await?;

            info!("Track {} done, {} records written", number, records_written);
            self.report.track = Some(FinishedTrack {
                number,
                language,
                path,
                records_written,
            });
        }

        self.report.state = PipelineState::Terminated;
        Ok(self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sink::FileSinkOpener;
    use crate::pipeline::track::TrackInfo;
    use crate::subtitle::Cue;
    use crate::translate::MockTranslationBackend;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Upper-cases every text after a per-call delay and records each batch
    #[derive(Default)]
    struct ScriptedBackend {
        delays: Vec<Duration>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedBackend {
        fn with_delays(delays: Vec<Duration>) -> Self {
            Self { delays, ..Default::default() }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslationBackend for ScriptedBackend {
        async fn translate_batch(&self, texts: &[String], _target_language: &str) -> Result<Vec<String>> {
            let delay = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(texts.to_vec());
                self.delays.get(calls.len() - 1).copied().unwrap_or_default()
            };
            time::sleep(delay).await;
            Ok(texts.iter().map(|text| text.to_uppercase()).collect())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn config(batch_size: usize, batch_interval_ms: u64, max_in_flight: usize) -> PipelineConfig {
        PipelineConfig {
            batch_size,
            batch_interval_ms,
            max_in_flight,
            ..PipelineConfig::default()
        }
    }

    fn events(tracks: Vec<TrackInfo>, cues: &[(u64, &str)], finish: bool) -> CueReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(CueEvent::Tracks(tracks)).unwrap();
        for (i, (track, text)) in cues.iter().enumerate() {
            let cue = Cue::new(*text, i as u64 * 1000, 800);
            tx.send(CueEvent::Cue { track: *track, cue }).unwrap();
        }
        if finish {
            tx.send(CueEvent::Finished).unwrap();
        }
        rx
    }

    fn pipeline(config: &PipelineConfig, backend: Arc<dyn TranslationBackend>, dir: &Path) -> Pipeline {
        Pipeline::new(config, backend, Box::new(FileSinkOpener::new(dir, "movie")))
    }

    fn sequence_numbers(contents: &str) -> Vec<u64> {
        contents
            .split("\r\n\r\n")
            .filter_map(|record| record.lines().next())
            .filter_map(|line| line.parse().ok())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_cues_dispatch_as_two_two_one() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::default());
        let rx = events(
            vec![TrackInfo::new(1, Some("en"))],
            &[(1, "a"), (1, "b"), (1, "c"), (1, "d"), (1, "e")],
            true,
        );

        let report = pipeline(&config(2, 8000, 1), backend.clone(), dir.path())
            .run(rx)
            .await
            .unwrap();

        assert_eq!(
            backend.calls(),
            vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]
                .into_iter()
                .map(|batch| batch.into_iter().map(String::from).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        );
        assert_eq!(report.batches_dispatched, 3);
        assert_eq!(report.cycles, 3);
        assert_eq!(report.records_written(), 5);
        assert_eq!(report.state, PipelineState::Terminated);

        let contents = std::fs::read_to_string(dir.path().join("movie.en.srt")).unwrap();
        assert_eq!(sequence_numbers(&contents), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_terminate_while_tasks_are_queued() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::default());
        let rx = events(
            vec![TrackInfo::new(1, Some("en"))],
            &[(1, "a"), (1, "b"), (1, "c"), (1, "d"), (1, "e")],
            true,
        );

        let started = time::Instant::now();
        let report = pipeline(&config(2, 8000, 1), backend, dir.path()).run(rx).await.unwrap();

        // Third cycle is the first to observe an empty queue
        assert!(started.elapsed() >= Duration::from_millis(16_000));
        assert_eq!(report.records_written(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_slow_batches_before_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let slow = Duration::from_secs(20);
        let backend = Arc::new(ScriptedBackend::with_delays(vec![slow, slow]));
        let rx = events(vec![TrackInfo::new(1, None)], &[(1, "a"), (1, "b"), (1, "c")], true);

        let report = pipeline(&config(2, 8000, 1), backend, dir.path()).run(rx).await.unwrap();

        let track = report.track.unwrap();
        assert_eq!(track.records_written, 3);
        assert_eq!(track.path, Some(dir.path().join("movie.srt")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_completion_is_written_in_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::with_delays(vec![
            Duration::from_millis(300),
            Duration::from_millis(10),
            Duration::from_millis(10),
        ]));
        let rx = events(vec![TrackInfo::new(1, Some("en"))], &[(1, "a"), (1, "b"), (1, "c")], true);

        let report = pipeline(&config(1, 10, 3), backend, dir.path()).run(rx).await.unwrap();
        assert_eq!(report.batches_dispatched, 3);

        let contents = std::fs::read_to_string(dir.path().join("movie.en.srt")).unwrap();
        assert_eq!(sequence_numbers(&contents), vec![1, 2, 3]);
        assert!(contents.contains("A\r\na\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let calls = AtomicUsize::new(0);
        let mut backend = MockTranslationBackend::new();
        backend.expect_name().return_const("mock");
        backend.expect_translate_batch().returning(move |texts, _| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SubtransError::Translation("backend unavailable".to_string()))
            } else {
                Ok(texts.iter().map(|text| format!("[{}]", text)).collect())
            }
        });
        let rx = events(
            vec![TrackInfo::new(1, Some("en"))],
            &[(1, "a"), (1, "b"), (1, "c"), (1, "d")],
            true,
        );

        let report = pipeline(&config(2, 8000, 1), Arc::new(backend), dir.path())
            .run(rx)
            .await
            .unwrap();

        assert_eq!(report.batches_failed, 1);
        assert_eq!(report.cues_dropped, 2);
        assert_eq!(report.records_written(), 2);

        let contents = std::fs::read_to_string(dir.path().join("movie.en.srt")).unwrap();
        assert_eq!(sequence_numbers(&contents), vec![3, 4]);
        assert!(contents.contains("[c]\r\nc\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_eligible_track_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::default());
        let rx = events(
            vec![TrackInfo::new(1, Some("fr")), TrackInfo::new(2, Some("de"))],
            &[(1, "bonjour"), (2, "hallo")],
            true,
        );

        let report = pipeline(&config(2, 8000, 1), backend.clone(), dir.path())
            .run(rx)
            .await
            .unwrap();

        assert!(report.track.is_none());
        assert_eq!(report.cues_received, 2);
        assert_eq!(report.cues_discarded, 2);
        assert!(backend.calls().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_tracks_do_not_consume_sequence_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::default());
        let rx = events(
            vec![TrackInfo::new(1, Some("en")), TrackInfo::new(2, Some("en"))],
            &[(2, "skip"), (1, "one"), (2, "skip"), (1, "two")],
            true,
        );

        let report = pipeline(&config(2, 8000, 1), backend, dir.path()).run(rx).await.unwrap();
        assert_eq!(report.cues_discarded, 2);

        let contents = std::fs::read_to_string(dir.path().join("movie.en.srt")).unwrap();
        assert_eq!(sequence_numbers(&contents), vec![1, 2]);
        assert!(contents.starts_with("1\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_running_on_empty_queue_until_extraction_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::default());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(CueEvent::Tracks(vec![TrackInfo::new(1, Some("en"))])).unwrap();
        tx.send(CueEvent::Cue { track: 1, cue: Cue::new("first", 0, 800) }).unwrap();

        let run = tokio::spawn(pipeline(&config(2, 8000, 1), backend.clone(), dir.path()).run(rx));

        // Many intervals with an empty queue while the source is still open
        time::sleep(Duration::from_secs(60)).await;
        assert!(!run.is_finished());
        assert_eq!(backend.calls().len(), 1);

        tx.send(CueEvent::Cue { track: 1, cue: Cue::new("second", 1000, 800) }).unwrap();
        tx.send(CueEvent::Cue { track: 1, cue: Cue::new("third", 2000, 800) }).unwrap();
        tx.send(CueEvent::Finished).unwrap();

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.state, PipelineState::Terminated);
        assert!(report.cycles > 7);
        assert_eq!(report.records_written(), 3);

        let contents = std::fs::read_to_string(dir.path().join("movie.en.srt")).unwrap();
        assert_eq!(sequence_numbers(&contents), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_closed_without_finish_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::default());
        let rx = events(vec![TrackInfo::new(1, Some("en"))], &[(1, "a")], false);

        let result = pipeline(&config(2, 8000, 1), backend, dir.path()).run(rx).await;
        assert!(matches!(result, Err(SubtransError::CueSource(_))));
    }
}
