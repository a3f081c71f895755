//! Reassembly of per-segment results into one output

use condense_common::CondenseError;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::chunking::word_count;

static SPEAKER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]+):\s*(.*)$").expect("speaker line pattern is valid"));

static BLANK_LINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("blank line pattern is valid"));

/// Handling of transcript lines without a `Speaker:` prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanLinePolicy {
    /// Log and discard the line
    #[default]
    Drop,
    /// Append the line to the open speaker turn (dropped before the first speaker)
    AppendToPrevious,
}

impl FromStr for OrphanLinePolicy {
    type Err = CondenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "append" => Ok(Self::AppendToPrevious),
            other => Err(CondenseError::invalid_input(format!(
                "unknown orphan line policy: {}",
                other
            ))),
        }
    }
}

/// Join document results with a blank line between them
pub fn combine_document(chunks: &[String]) -> String {
    chunks.join("\n\n")
}

/// The speaker whose lines are being merged
struct Turn {
    speaker: String,
    speech: String,
}

impl Turn {
    fn push(&mut self, text: &str) {
        if !self.speech.is_empty() {
            self.speech.push(' ');
        }
        self.speech.push_str(text);
    }

    fn render(&self) -> String {
        format!("**{}**: {}", self.speaker, self.speech.trim())
    }
}

/// Merge transcript results into bolded speaker blocks.
///
/// Consecutive lines from the same speaker become one block, including
/// across segment boundaries. Blocks are separated by a blank line.
pub fn combine_transcript(chunks: &[String], orphans: OrphanLinePolicy) -> String {
    debug!("Combining {} transcript chunks", chunks.len());

    let joined = chunks
        .iter()
        .map(|chunk| chunk.trim())
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let joined = BLANK_LINES_RE.replace_all(&joined, "\n");

    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<Turn> = None;

    for line in joined.trim().lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        let labelled = SPEAKER_LINE_RE.captures(line).and_then(|caps| {
            let speaker = caps[1].trim().trim_matches('*').trim();
            // `**Host:** text` leaves the closing bold on the speech side
            let speech = caps.get(2).map_or("", |m| m.as_str()).trim_start_matches('*').trim();
            (!speaker.is_empty()).then(|| (speaker.to_string(), speech.to_string()))
        });

        let Some((speaker, speech)) = labelled else {
            match (orphans, current.as_mut()) {
                (OrphanLinePolicy::AppendToPrevious, Some(turn)) => {
                    debug!("Appending unlabelled line to '{}': '{}'", turn.speaker, line);
                    turn.push(line);
                }
                _ => debug!("Skipping line without speaker label: '{}'", line),
            }
            continue;
        };

        if speech.is_empty() {
            continue;
        }

        match current.as_mut() {
            Some(turn) if turn.speaker == speaker => turn.push(&speech),
            _ => {
                if let Some(turn) = current.take() {
                    blocks.push(turn.render());
                }
                current = Some(Turn { speaker, speech });
            }
        }
    }

    if let Some(turn) = current {
        blocks.push(turn.render());
    }

    let output = blocks.join("\n\n");
    info!(
        "Combined transcript: {} speaker blocks, {} words",
        blocks.len(),
        word_count(&output)
    );
    output
}
