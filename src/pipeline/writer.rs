use std::collections::BTreeMap;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::sink::OutputSink;
use crate::error::{Result, SubtransError};

/// Writes rendered records to a sink in ascending sequence order.
///
/// Batches may complete in any order. Records are held back until every
/// lower sequence number has been written or skipped.
pub struct OrderedWriter {
    sink: OutputSink,
    next_sequence: u64,
    /// `None` marks a sequence number whose batch was dropped
    pending: BTreeMap<u64, Option<String>>,
    records_written: usize,
}

impl OrderedWriter {
    pub fn new(sink: OutputSink) -> Self {
        Self {
            sink,
            next_sequence: 1,
            pending: BTreeMap::new(),
            records_written: 0,
        }
    }

    pub fn push(&mut self, sequence: u64, record: String) {
        self.pending.insert(sequence, Some(record));
    }

    /// Mark a sequence number that will never produce a record
    pub fn skip(&mut self, sequence: u64) {
        self.pending.insert(sequence, None);
    }

    /// Write every record that continues the contiguous sequence
    pub async fn flush_ready(&mut self) -> Result<usize> {
        let mut written = 0;
        while let Some(entry) = self.pending.remove(&self.next_sequence) {
            if let Some(record) = entry {
                self.write(&record).await?;
                written += 1;
            }
            self.next_sequence += 1;
        }

        if written > 0 {
            self.sink.writer().flush().await.map_err(|e| self.write_error(e))?;
            debug!("Wrote {} records to {}", written, self.sink.describe());
        }
        Ok(written)
    }

    /// Number of records held back waiting for a lower sequence number
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.sink.path.as_deref()
    }

    /// Write whatever is still buffered, then flush and release the sink
    pub async fn close(mut self) -> Result<usize> {
        self.flush_ready().await?;

        if !self.pending.is_empty() {
            warn!(
                "{} records still waiting for sequence {} in {}, writing them out of band",
                self.pending.len(),
                self.next_sequence,
                self.sink.describe()
            );
            let pending = std::mem::take(&mut self.pending);
            for record in pending.into_values().flatten() {
                self.write(&record).await?;
            }
        }

        self.sink.writer().shutdown().await.map_err(|e| self.write_error(e))?;
        Ok(self.records_written)
    }

    async fn write(&mut self, record: &str) -> Result<()> {
        if let Err(e) = self.sink.writer().write_all(record.as_bytes()).await {
            return Err(self.write_error(e));
        }
        self.records_written += 1;
        Ok(())
    }

    fn write_error(&self, e: std::io::Error) -> SubtransError {
        SubtransError::Output(format!("Failed to write {}: {}", self.sink.describe(), e))
    }
}
