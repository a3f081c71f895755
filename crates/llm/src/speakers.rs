//! Speaker analysis for transcripts
//!
//! One LLM pass over the full transcript yields a free-form list of speakers.
//! It is parsed into a role -> display name map that every segment prompt
//! then shares, so names stay consistent across segment boundaries.

use condense_common::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chunking::word_count;
use crate::llm_trait::LlmClient;
use crate::prompts::speaker_analysis_prompt;
use crate::types::GenerateRequest;

/// Role label the analysis uses for its summary line
const TOTAL_SPEAKERS_LABEL: &str = "Total Speakers";

/// `- <role>: <name>[, description]` with a `-`, `•` or `* ` bullet, tolerating
/// bold markers around both parts
static SPEAKER_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-•]|\*\s)\s*\**([^:]+?)\**\s*:\s*\**([^,*]+?)\**\s*(?:,.*)?$")
        .expect("speaker line pattern is valid")
});

/// Characters stripped from both ends of a parsed role or name
const TRIM_CHARS: &[char] = &['*', '"', '\'', ' ', '\t'];

/// Insertion-ordered role -> display name mapping with unique roles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerMap {
    entries: Vec<(String, String)>,
}

impl SpeakerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the role is already mapped. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, role: impl Into<String>, name: impl Into<String>) -> bool {
        let role = role.into();
        if self.get(&role).is_some() {
            return false;
        }
        self.entries.push((role, name.into()));
        true
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, name)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(r, n)| (r.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse the raw speaker analysis into a role -> name map.
///
/// Lines before the first list item are ignored. Lines that do not match
/// `- <role>: <name>` are skipped, the first occurrence of a role wins, and
/// the "Total Speakers" summary line is never a role. Malformed input gives
/// an empty map.
pub fn parse_speaker_analysis(analysis: &str) -> SpeakerMap {
    let mut speakers = SpeakerMap::new();

    let list = analysis
        .lines()
        .map(str::trim)
        .skip_while(|line| !is_list_item(line));

    for line in list {
        let Some(caps) = SPEAKER_LINE_RE.captures(line) else {
            if is_list_item(line) {
                debug!("Could not parse speaker line: '{}'", line);
            }
            continue;
        };

        let role = caps[1].trim_matches(TRIM_CHARS);
        let name = caps[2].trim_matches(TRIM_CHARS);

        if role.is_empty() || name.is_empty() || role == TOTAL_SPEAKERS_LABEL {
            continue;
        }

        if !speakers.insert_if_absent(role, name) {
            debug!("Duplicate role '{}' in speaker analysis, keeping first", role);
        }
    }

    speakers
}

fn is_list_item(line: &str) -> bool {
    line.starts_with('-') || line.starts_with('•') || line.starts_with("* ")
}

/// Ask the LLM to describe the speakers of the full transcript.
///
/// Returns the raw reply; see [`parse_speaker_analysis`].
pub async fn analyze_speakers(
    client: &dyn LlmClient,
    full_text: &str,
    model: Option<&str>,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<String> {
    let started = Instant::now();
    info!("Starting speaker analysis for text of {} words", word_count(full_text));

    let mut request = GenerateRequest::new(speaker_analysis_prompt(full_text));
    if let Some(model) = model {
        request = request.with_model(model);
    }
    if let Some(timeout) = timeout {
        request = request.with_timeout(timeout);
    }

    let analysis = client.generate(request, cancel).await?;
    info!("Speaker analysis completed in {:?}", started.elapsed());
    Ok(analysis)
}

/// Analysis plus parsing, degrading to an empty map on failure.
///
/// Only cancellation is propagated.
pub async fn build_speaker_map(
    client: &dyn LlmClient,
    full_text: &str,
    model: Option<&str>,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> Result<SpeakerMap> {
    match analyze_speakers(client, full_text, model, timeout, cancel).await {
        Ok(raw) => {
            let speakers = parse_speaker_analysis(&raw);
            if speakers.is_empty() {
                warn!("Speaker analysis produced no usable role -> name entries");
            } else {
                info!("Speaker map: {:?}", speakers.entries);
            }
            Ok(speakers)
        }
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            warn!("Speaker analysis failed, continuing without speaker map: {}", e);
            Ok(SpeakerMap::new())
        }
    }
}
