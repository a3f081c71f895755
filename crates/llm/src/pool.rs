//! Bounded-concurrency worker pool for segment transforms
//!
//! Segments are dispatched to tokio tasks, at most `max_concurrent` at a time.
//! Every task reports to a single collector, which stores content by segment
//! position, so the output order never depends on completion order.

use async_trait::async_trait;
use condense_common::{CondenseError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunking::{word_count, Segment};

/// Per-segment work supplied by the caller
#[async_trait]
pub trait SegmentTransform: Send + Sync {
    /// Produce the condensed content for one segment
    async fn transform(&self, segment: &Segment, cancel: &CancellationToken) -> Result<String>;
}

/// Report from one worker
#[derive(Debug, Clone)]
pub struct SegmentResult {
    pub position: usize,
    pub content: String,
    /// Content must be ignored when set
    pub failed: bool,
}

impl SegmentResult {
    fn from_outcome(position: usize, outcome: Result<String>) -> Self {
        match outcome {
            Ok(content) => Self {
                position,
                content,
                failed: false,
            },
            Err(_) => Self {
                position,
                content: String::new(),
                failed: true,
            },
        }
    }
}

/// What a pool run produced
#[derive(Debug, Clone, Default)]
pub struct PoolOutcome {
    /// Trimmed, non-empty contents in segment order
    pub results: Vec<String>,

    /// Segments handed to the pool
    pub total: usize,

    /// Segments that were started
    pub dispatched: usize,

    /// Started segments that errored, were cancelled, or never reported
    pub failed: usize,

    /// The cancellation signal fired during the run
    pub cancelled: bool,
}

/// Runs segment transforms with a concurrency cap
#[derive(Debug, Clone)]
pub struct ChunkWorkerPool {
    max_concurrent: usize,
}

impl ChunkWorkerPool {
    pub fn new(max_concurrent: usize) -> Result<Self> {
        if max_concurrent == 0 {
            return Err(CondenseError::invalid_input(
                "concurrency limit must be greater than 0",
            ));
        }
        Ok(Self { max_concurrent })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Transform every segment and return the non-empty results in segment order.
    ///
    /// Failed segments are dropped. Once `cancel` fires no further segment is
    /// started; segments already running are still collected before returning.
    pub async fn process(
        &self,
        segments: Vec<Segment>,
        cancel: &CancellationToken,
        transform: Arc<dyn SegmentTransform>,
    ) -> PoolOutcome {
        let started = Instant::now();
        let total = segments.len();
        if total == 0 {
            return PoolOutcome::default();
        }

        let input_words: usize = segments.iter().map(|s| word_count(&s.text)).sum();
        info!(
            "Processing {} segments ({} words) with up to {} workers",
            total, input_words, self.max_concurrent
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let (tx, mut rx) = mpsc::unbounded_channel::<SegmentResult>();
        let mut dispatched = 0;

        for segment in segments {
            if cancel.is_cancelled() {
                warn!("Cancelled before dispatching segment {}", segment.position);
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Cancelled while waiting for a slot for segment {}", segment.position);
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            dispatched += 1;
            let tx = tx.clone();
            let transform = Arc::clone(&transform);
            let cancel = cancel.clone();

            tokio::spawn(async move {
                // Slot is released when the task ends, whatever the outcome
                let _permit = permit;
                let position = segment.position;
                let worker_started = Instant::now();

                let outcome = if cancel.is_cancelled() {
                    Err(CondenseError::cancelled("cancelled before processing"))
                } else {
                    match transform.transform(&segment, &cancel).await {
                        Ok(_) if cancel.is_cancelled() => Err(CondenseError::cancelled(
                            "cancelled after processing, result discarded",
                        )),
                        outcome => outcome,
                    }
                };

                match &outcome {
                    Ok(content) => debug!(
                        "Segment {} done in {:?}: {} -> {} words",
                        position,
                        worker_started.elapsed(),
                        word_count(&segment.text),
                        word_count(content)
                    ),
                    Err(e) => warn!(
                        "Segment {} failed after {:?}: {}",
                        position,
                        worker_started.elapsed(),
                        e
                    ),
                }

                // Receiver outlives every sender; a send error only means the pool was dropped
                let _ = tx.send(SegmentResult::from_outcome(position, outcome));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<String>> = vec![None; total];
        let mut reported = 0;
        let mut failed = 0;

        // Ends once every spawned task has reported or died
        while let Some(result) = rx.recv().await {
            reported += 1;
            if result.failed {
                failed += 1;
                continue;
            }
            match slots.get_mut(result.position) {
                Some(slot) => *slot = Some(result.content),
                None => {
                    warn!("Dropping result with out-of-range position {}", result.position);
                    failed += 1;
                }
            }
        }

        let lost = dispatched - reported;
        if lost > 0 {
            warn!("{} segment workers ended without reporting", lost);
            failed += lost;
        }

        let results: Vec<String> = slots
            .into_iter()
            .flatten()
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .collect();

        let output_words: usize = results.iter().map(|r| word_count(r)).sum();
        info!(
            "Segment processing finished in {:?}: {}/{} valid, {} failed, {} not started, {} -> {} words",
            started.elapsed(),
            results.len(),
            total,
            failed,
            total - dispatched,
            input_words,
            output_words
        );

        PoolOutcome {
            results,
            total,
            dispatched,
            failed,
            cancelled: cancel.is_cancelled(),
        }
    }
}
