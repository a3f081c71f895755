//! Condense LLM integration
//!
//! Gemini client, segmentation, speaker analysis, the chunk worker pool and
//! the condensation pipeline built on top of them.

mod chunking;
mod client;
mod combine;
mod condense;
mod llm_trait;
mod pool;
mod prompts;
mod speakers;
mod types;

pub use chunking::{chunk_by_sentences, chunk_by_words, into_segments, split_sentences, word_count, Segment};
pub use client::GeminiClient;
pub use combine::{combine_document, combine_transcript, OrphanLinePolicy};
pub use condense::{
    target_word_count, validate_ratio, CondenseReport, CondenseTransform, Condenser, CondenserOptions,
};
pub use llm_trait::LlmClient;
pub use pool::{ChunkWorkerPool, PoolOutcome, SegmentResult, SegmentTransform};
pub use prompts::{document_prompt, speaker_analysis_prompt, transcript_prompt};
pub use speakers::{analyze_speakers, build_speaker_map, parse_speaker_analysis, SpeakerMap};
pub use types::{GenerateRequest, ProcessingMode};
