use async_trait::async_trait;
use condense_common::{AppConfig, CondenseError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunking::{chunk_by_sentences, chunk_by_words, into_segments, word_count, Segment};
use crate::combine::{combine_document, combine_transcript, OrphanLinePolicy};
use crate::llm_trait::LlmClient;
use crate::pool::{ChunkWorkerPool, PoolOutcome, SegmentTransform};
use crate::prompts::{document_prompt, transcript_prompt};
use crate::speakers::{build_speaker_map, SpeakerMap};
use crate::types::{GenerateRequest, ProcessingMode};

/// Sampling temperature for segment condensation
const CONDENSE_TEMPERATURE: f32 = 0.4;

/// Words each condensed segment should aim for: `floor(chunk_size * ratio)`, at least 1
pub fn target_word_count(chunk_size: usize, ratio: f64) -> usize {
    ((chunk_size as f64 * ratio).floor() as usize).max(1)
}

/// Ratio must lie in (0, 1]
pub fn validate_ratio(ratio: f64) -> Result<()> {
    if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(CondenseError::invalid_input(format!(
            "Invalid ratio value: {} (expected 0 < ratio <= 1)",
            ratio
        )))
    }
}

/// Condenses one segment through the LLM
pub struct CondenseTransform {
    client: Arc<dyn LlmClient>,
    mode: ProcessingMode,
    target_words: usize,
    speakers: Arc<SpeakerMap>,
}

impl CondenseTransform {
    pub fn new(
        client: Arc<dyn LlmClient>,
        mode: ProcessingMode,
        target_words: usize,
        speakers: Arc<SpeakerMap>,
    ) -> Self {
        Self {
            client,
            mode,
            target_words,
            speakers,
        }
    }

    fn prompt(&self, text: &str) -> String {
        match self.mode {
            ProcessingMode::Document => document_prompt(text, self.target_words),
            ProcessingMode::Transcript => transcript_prompt(text, self.target_words, &self.speakers),
        }
    }
}

#[async_trait]
impl SegmentTransform for CondenseTransform {
    async fn transform(&self, segment: &Segment, cancel: &CancellationToken) -> Result<String> {
        let request =
            GenerateRequest::new(self.prompt(&segment.text)).with_temperature(CONDENSE_TEMPERATURE);
        self.client.generate(request, cancel).await
    }
}

/// Sizing and policy knobs for [`Condenser`]
#[derive(Debug, Clone)]
pub struct CondenserOptions {
    /// Target words per segment
    pub chunk_size: usize,

    /// Words shared by neighbouring transcript windows
    pub chunk_overlap: usize,

    /// Segments processed at once
    pub max_concurrent: usize,

    /// Transcript lines without a speaker label
    pub orphan_lines: OrphanLinePolicy,

    /// Model override for the speaker analysis pass
    pub analysis_model: Option<String>,

    /// Timeout override for the speaker analysis pass
    pub analysis_timeout: Option<Duration>,
}

impl Default for CondenserOptions {
    fn default() -> Self {
        Self {
            chunk_size: 900,
            chunk_overlap: 100,
            max_concurrent: 10,
            orphan_lines: OrphanLinePolicy::Drop,
            analysis_model: None,
            analysis_timeout: None,
        }
    }
}

impl CondenserOptions {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            max_concurrent: config.max_concurrent,
            orphan_lines: config.orphan_lines.parse()?,
            analysis_model: Some(config.analysis_model.clone()),
            analysis_timeout: Some(config.analysis_timeout),
        })
    }
}

/// Result of one condensation request
#[derive(Debug, Clone, Serialize)]
pub struct CondenseReport {
    /// Combined output
    pub text: String,

    pub mode: ProcessingMode,

    pub input_words: usize,

    pub output_words: usize,

    /// Segments the input was split into
    pub segments: usize,

    /// Segments that produced no usable content
    pub segments_failed: usize,

    /// Speaker map used for a transcript (empty for documents)
    pub speakers: SpeakerMap,

    pub elapsed_ms: u64,
}

impl CondenseReport {
    /// Percentage of words removed
    pub fn reduction_percent(&self) -> f64 {
        if self.input_words == 0 {
            return 0.0;
        }
        100.0 - (self.output_words as f64 / self.input_words as f64) * 100.0
    }
}

/// Segment -> condense -> reassemble pipeline
pub struct Condenser {
    client: Arc<dyn LlmClient>,
    pool: ChunkWorkerPool,
    options: CondenserOptions,
}

impl Condenser {
    /// Create new condenser; rejects invalid sizing up front
    pub fn new(client: Arc<dyn LlmClient>, options: CondenserOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(CondenseError::invalid_input("chunk size must be greater than 0"));
        }
        if options.chunk_overlap >= options.chunk_size {
            return Err(CondenseError::invalid_input(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                options.chunk_overlap, options.chunk_size
            )));
        }
        let pool = ChunkWorkerPool::new(options.max_concurrent)?;
        Ok(Self {
            client,
            pool,
            options,
        })
    }

    /// Condense `text` under a deadline.
    ///
    /// The deadline is a child of `parent`, so cancelling the parent (for
    /// example when the client disconnects) stops the work as well.
    pub async fn condense_with_deadline(
        &self,
        text: &str,
        ratio: f64,
        mode: ProcessingMode,
        parent: &CancellationToken,
        timeout: Duration,
    ) -> Result<CondenseReport> {
        let deadline = parent.child_token();
        // Cancelling on return also stops the timer task
        let _stop_timer = deadline.clone().drop_guard();

        let timer = deadline.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    warn!("Processing deadline of {:?} exceeded", timeout);
                    timer.cancel();
                }
            }
        });

        self.condense(text, ratio, mode, &deadline).await
    }

    /// Condense `text` to roughly `ratio` of its length.
    ///
    /// Fails with `Cancelled` when `cancel` fires before every segment has
    /// been processed, and with `Llm` when no segment produced content.
    pub async fn condense(
        &self,
        text: &str,
        ratio: f64,
        mode: ProcessingMode,
        cancel: &CancellationToken,
    ) -> Result<CondenseReport> {
        validate_ratio(ratio)?;
        if text.trim().is_empty() {
            return Err(CondenseError::invalid_input("Text field is missing"));
        }

        let started = Instant::now();
        let input_words = word_count(text);
        let target_words = target_word_count(self.options.chunk_size, ratio);
        info!(
            "Condensing {} words (mode: {}, ratio: {:.2}, target per segment: {} words, workers: {})",
            input_words,
            mode,
            ratio,
            target_words,
            self.pool.max_concurrent()
        );

        let (output, outcome, speakers) = match mode {
            ProcessingMode::Document => {
                let chunks = chunk_by_sentences(text, self.options.chunk_size)?;
                info!("Document chunked into {} parts", chunks.len());
                let outcome = self
                    .run_pool(chunks, mode, target_words, Arc::new(SpeakerMap::new()), cancel)
                    .await?;
                (combine_document(&outcome.results), outcome, SpeakerMap::new())
            }
            ProcessingMode::Transcript => {
                let speakers = build_speaker_map(
                    self.client.as_ref(),
                    text,
                    self.options.analysis_model.as_deref(),
                    self.options.analysis_timeout,
                    cancel,
                )
                .await?;
                if cancel.is_cancelled() {
                    return Err(CondenseError::cancelled("cancelled during speaker analysis"));
                }

                let chunks =
                    chunk_by_words(text, self.options.chunk_size, self.options.chunk_overlap)?;
                info!(
                    "Transcript chunked into {} parts (overlap {} words)",
                    chunks.len(),
                    self.options.chunk_overlap
                );

                // Built once, read-only for every worker
                let speakers = Arc::new(speakers);
                let outcome = self
                    .run_pool(chunks, mode, target_words, Arc::clone(&speakers), cancel)
                    .await?;
                let output = combine_transcript(&outcome.results, self.options.orphan_lines);
                (output, outcome, (*speakers).clone())
            }
        };

        if output.trim().is_empty() {
            return Err(CondenseError::llm("Processing produced no output"));
        }

        let report = CondenseReport {
            output_words: word_count(&output),
            text: output,
            mode,
            input_words,
            segments: outcome.total,
            segments_failed: outcome.failed,
            speakers,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "{} condensed in {:?}: {} -> {} words ({:.1}% reduction), {}/{} segments failed",
            mode,
            started.elapsed(),
            report.input_words,
            report.output_words,
            report.reduction_percent(),
            report.segments_failed,
            report.segments
        );

        Ok(report)
    }

    async fn run_pool(
        &self,
        chunks: Vec<String>,
        mode: ProcessingMode,
        target_words: usize,
        speakers: Arc<SpeakerMap>,
        cancel: &CancellationToken,
    ) -> Result<PoolOutcome> {
        let transform = Arc::new(CondenseTransform::new(
            Arc::clone(&self.client),
            mode,
            target_words,
            speakers,
        ));

        let outcome = self.pool.process(into_segments(chunks), cancel, transform).await;

        let incomplete = outcome.dispatched < outcome.total || outcome.failed > 0;
        if outcome.cancelled && incomplete {
            return Err(CondenseError::cancelled(format!(
                "processing cancelled with {} of {} segments unfinished",
                outcome.total - outcome.results.len().min(outcome.total),
                outcome.total
            )));
        }

        if outcome.results.is_empty() {
            return Err(CondenseError::llm(format!(
                "No segment produced usable content ({} of {} failed)",
                outcome.failed, outcome.total
            )));
        }

        Ok(outcome)
    }
}
