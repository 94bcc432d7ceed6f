use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::queue::{Task, TaskQueue};
use crate::error::{Result, SubtransError};
use crate::translate::TranslationBackend;

/// Tasks drained together for one backend call
#[derive(Debug)]
pub struct Batch {
    pub id: u64,
    pub tasks: Vec<Task>,
}

impl Batch {
    /// Normalized cue texts in task order
    pub fn texts(&self) -> Vec<String> {
        self.tasks.iter().map(|task| task.cue.text.clone()).collect()
    }
}

/// A batch together with the backend's answer
#[derive(Debug)]
pub struct BatchOutcome {
    pub id: u64,
    pub tasks: Vec<Task>,
    pub result: Result<Vec<String>>,
}

impl BatchOutcome {
    /// Pair translation `i` with task `i`.
    ///
    /// A failed call or a response of the wrong length drops the whole batch.
    pub fn into_pairs(self) -> std::result::Result<Vec<(Task, String)>, (Vec<Task>, SubtransError)> {
        match self.result {
            Ok(translations) if translations.len() == self.tasks.len() => {
                Ok(self.tasks.into_iter().zip(translations).collect())
            }
            Ok(translations) => {
                let error = SubtransError::Translation(format!(
                    "Batch {} got {} translations for {} cues",
                    self.id,
                    translations.len(),
                    self.tasks.len()
                ));
                Err((self.tasks, error))
            }
            Err(error) => Err((self.tasks, error)),
        }
    }
}

/// Drains bounded batches from the queue and submits them to the backend
pub struct BatchScheduler {
    backend: Arc<dyn TranslationBackend>,
    batch_size: usize,
    target_language: String,
    next_batch_id: u64,
}

impl BatchScheduler {
    pub fn new(backend: Arc<dyn TranslationBackend>, batch_size: usize, target_language: String) -> Self {
        Self {
            backend,
            batch_size: batch_size.max(1),
            target_language,
            next_batch_id: 1,
        }
    }

    /// Take up to `batch_size` tasks and normalize their text.
    ///
    /// Returns `None` when the queue is empty, in which case no call is made.
    pub fn prepare(&mut self, queue: &mut TaskQueue) -> Option<Batch> {
        let mut tasks = queue.drain_up_to(self.batch_size);
        if tasks.is_empty() {
            return None;
        }

        for task in &mut tasks {
            task.cue.normalize();
        }

        let id = self.next_batch_id;
        self.next_batch_id += 1;
        debug!("Prepared batch {} with {} cues, {} still queued", id, tasks.len(), queue.len());
        Some(Batch { id, tasks })
    }

    /// Backend call for a prepared batch, ready to be spawned
    pub fn submit(&self, batch: Batch) -> impl Future<Output = BatchOutcome> + Send + use<> {
        let backend = Arc::clone(&self.backend);
        let target_language = self.target_language.clone();

        async move {
            let texts = batch.texts();
            let result = backend.translate_batch(&texts, &target_language).await;
            BatchOutcome {
                id: batch.id,
                tasks: batch.tasks,
                result,
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::Cue;
    use crate::translate::MockTranslationBackend;

    fn queue_with(texts: &[&str]) -> TaskQueue {
        let mut queue = TaskQueue::new();
        for (i, text) in texts.iter().enumerate() {
            queue.enqueue(Task {
                sequence: i as u64 + 1,
                track: 1,
                cue: Cue::new(*text, i as u64 * 1000, 1000),
            });
        }
        queue
    }

    fn scheduler(backend: MockTranslationBackend, batch_size: usize) -> BatchScheduler {
        BatchScheduler::new(Arc::new(backend), batch_size, "zh-cn".to_string())
    }

    #[test]
    fn test_prepare_batches_of_two_two_one() {
        let mut scheduler = scheduler(MockTranslationBackend::new(), 2);
        let mut queue = queue_with(&["a", "b", "c", "d", "e"]);

        let sizes: Vec<usize> = std::iter::from_fn(|| scheduler.prepare(&mut queue))
            .map(|batch| batch.tasks.len())
            .collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_prepare_empty_queue_makes_no_batch() {
        let mut scheduler = scheduler(MockTranslationBackend::new(), 2);
        assert!(scheduler.prepare(&mut TaskQueue::new()).is_none());
    }

    #[test]
    fn test_prepare_normalizes_text() {
        let mut scheduler = scheduler(MockTranslationBackend::new(), 2);
        let mut queue = queue_with(&["Hi\n", "two\r\nlines"]);

        let batch = scheduler.prepare(&mut queue).unwrap();
        assert_eq!(batch.texts(), vec!["Hi", "two lines"]);
        assert_eq!(batch.id, 1);
    }

    #[tokio::test]
    async fn test_submit_sends_texts_in_order() {
        let mut backend = MockTranslationBackend::new();
        backend
            .expect_translate_batch()
            .withf(|texts: &[String], target: &str| texts == ["Hi", "Bye"] && target == "zh-cn")
            .times(1)
            .returning(|_, _| Ok(vec!["嗨".to_string(), "再见".to_string()]));

        let mut scheduler = scheduler(backend, 2);
        let mut queue = queue_with(&["Hi\n", "Bye"]);
        let batch = scheduler.prepare(&mut queue).unwrap();

        let pairs = scheduler.submit(batch).await.into_pairs().unwrap();
        let paired: Vec<(u64, &str)> = pairs.iter().map(|(t, s)| (t.sequence, s.as_str())).collect();
        assert_eq!(paired, vec![(1, "嗨"), (2, "再见")]);
    }

    #[tokio::test]
    async fn test_failed_batch_returns_its_tasks() {
        let mut backend = MockTranslationBackend::new();
        backend
            .expect_translate_batch()
            .returning(|_, _| Err(SubtransError::Translation("quota exceeded".to_string())));

        let mut scheduler = scheduler(backend, 3);
        let mut queue = queue_with(&["a", "b"]);
        let batch = scheduler.prepare(&mut queue).unwrap();

        let (tasks, error) = scheduler.submit(batch).await.into_pairs().unwrap_err();
        assert_eq!(tasks.len(), 2);
        assert!(matches!(error, SubtransError::Translation(_)));
    }

    #[test]
    fn test_short_response_is_rejected() {
        let outcome = BatchOutcome {
            id: 4,
            tasks: queue_with(&["a", "b"]).drain_up_to(2),
            result: Ok(vec!["only one".to_string()]),
        };
        assert!(outcome.into_pairs().is_err());
    }
}
