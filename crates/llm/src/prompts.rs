//! Prompt templates for condensation and speaker analysis

use crate::speakers::SpeakerMap;

/// Marker lines wrapping the transcript in the analysis prompt
pub const TRANSCRIPT_START: &str = "--- TRANSCRIPT START ---";
pub const TRANSCRIPT_END: &str = "--- TRANSCRIPT END ---";

/// Instruction used for the single speaker analysis pass
const SPEAKER_ANALYSIS_PROMPT: &str = r#"Analyze the following podcast transcript to identify the speakers. Provide the following information in a clear, concise list format:
1. Total number of distinct speakers detected.
2. Identify the HOST (usually the one asking questions, leading the conversation, or doing intros/outros). Provide their name if clearly mentioned.
3. Identify the GUEST(s). Provide their names if clearly mentioned. If multiple guests, list them as Guest 1, Guest 2, etc.
4. For each speaker (Host and Guests), provide a brief 1-sentence description of their apparent role or topic focus if discernible from the text.

Focus ONLY on information present in the transcript. Do not guess information not present."#;

const SPEAKER_ANALYSIS_FORMAT: &str = r#"Return ONLY the analysis result using this exact format:
- Total Speakers: [Number]
- Host: [Name or "Host"], [Brief Description]
- Guest 1: [Name or "Guest 1"], [Brief Description]
- Guest 2: [Name or "Guest 2"], [Brief Description]
... (continue for all detected guests)"#;

/// Prompt for the speaker analysis pass over the full transcript
pub fn speaker_analysis_prompt(full_text: &str) -> String {
    format!(
        "{}\n\nTranscript:\n{}\n{}\n{}\n\n{}",
        SPEAKER_ANALYSIS_PROMPT, TRANSCRIPT_START, full_text, TRANSCRIPT_END, SPEAKER_ANALYSIS_FORMAT
    )
}

/// Prompt for condensing one document segment to about `target_words` words
pub fn document_prompt(text: &str, target_words: usize) -> String {
    format!(
        r##"Condense this text to approximately {} words while:
- Preserving all key plot points and essential information and data.
- Using extremely simple English with basic vocabulary (like for a 10-year-old).
- Maintaining the original narration style as much as possible.
- If you identify any headings in the text, format them as "# Heading" on their own line in markdown style.

Important: Return ONLY the condensed text without any introductions, explanations, or summaries.

--- TEXT TO CONDENSE START ---
{}
--- TEXT TO CONDENSE END ---

Condensed Text:"##,
        target_words, text
    )
}

/// Speaker identification rules for a transcript segment
fn speaker_instructions(speakers: &SpeakerMap) -> String {
    if speakers.is_empty() {
        return "Speaker identification information is unavailable. Use speaker names if clearly \
                mentioned in the text, otherwise label speakers generically (e.g., 'Speaker 1', 'Speaker 2')."
            .to_string();
    }

    let mut lines = vec!["Use this mapping to identify speakers:".to_string()];
    for (role, name) in speakers.iter() {
        lines.push(format!("- If you identify '{}', use the name '{}'.", role, name));
    }
    lines.push(
        "- If a speaker doesn't match a role above, try to use their name if explicitly mentioned in the text."
            .to_string(),
    );
    lines.push("- If no name is clear for a turn, label it 'Unknown Speaker'.".to_string());
    lines.join("\n")
}

/// Prompt for reformatting one transcript segment into `Name: speech` lines
pub fn transcript_prompt(text: &str, target_words: usize, speakers: &SpeakerMap) -> String {
    format!(
        r#"You are processing a chunk of subtitles from a podcast. Your task is to format this chunk as a clean, readable transcript segment using extremely simple English (like for a 10-year-old).

**SPEAKER IDENTIFICATION RULES:**
{}

**FORMATTING RULES:**
1. Use very simple English, basic vocabulary only.
2. Slightly improve grammar, spelling, and sentence structure for readability, but keep the meaning identical to the original subtitles.
3. Aim for roughly {} words in total.
4. Format the output strictly line-by-line, starting each line ONLY with the speaker's correct NAME followed by a colon.
   Example:
   Alex: [Simplified speech]
   Sam: [Simplified speech]

**IMPORTANT CONSTRAINTS:**
- Return ONLY the formatted transcript lines for THIS CHUNK. Each line MUST start with a speaker's NAME followed by a colon.
- Do NOT include roles (like "Host", "Guest 1"). Use ONLY the names provided in the mapping or identified directly.
- Do NOT add introductions, summaries, explanations, or comments.
- Do NOT repeat the speaker identification rules in your response.

--- CURRENT CHUNK START ---
{}
--- CURRENT CHUNK END ---

Formatted Output:"#,
        speaker_instructions(speakers),
        target_words,
        text
    )
}
