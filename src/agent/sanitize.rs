//! Completion output cleanup.
//!
//! Models exposed through the multi-channel output format emit reasoning
//! segments alongside the answer (`<|channel|>analysis<|message|>...`), and
//! some emit `<think>` blocks. Replies are cleaned through a fixed pipeline
//! before they are published or reused as conversation history.

use once_cell::sync::Lazy;
use regex::Regex;

static FINAL_CHANNEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<\|channel\|>final<\|message\|>(.*?)(?:<\|end\|>|$)").unwrap()
});

static THINK_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

static FRAMING_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<\|[^>]+\|>").unwrap());

static EXTRA_BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Keep only the `final` channel segment when the text carries channel
/// markers; text without a final segment passes through unchanged.
pub fn extract_final_channel(text: &str) -> String {
    match FINAL_CHANNEL_RE.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    }
}

pub fn strip_think_blocks(text: &str) -> String {
    THINK_BLOCK_RE.replace_all(text, "").into_owned()
}

pub fn strip_framing_tokens(text: &str) -> String {
    FRAMING_TOKEN_RE.replace_all(text, "").into_owned()
}

pub fn collapse_blank_lines(text: &str) -> String {
    EXTRA_BLANK_LINES_RE.replace_all(text, "\n\n").into_owned()
}

/// Full cleanup pipeline: final-channel extraction, think-block and framing
/// token removal, blank-line collapse, trim.
pub fn sanitize(text: &str) -> String {
    let text = extract_final_channel(text);
    let text = strip_think_blocks(&text);
    let text = strip_framing_tokens(&text);
    let text = collapse_blank_lines(&text);
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_final_channel_and_discards_analysis() {
        let raw = "<|channel|>analysis<|message|>ignored<|end|><|start|>assistant<|channel|>final<|message|>Hello<|end|>";
        assert_eq!(sanitize(raw), "Hello");
    }

    #[test]
    fn test_final_channel_without_end_marker_runs_to_eof() {
        let raw = "<|channel|>final<|message|>All done";
        assert_eq!(sanitize(raw), "All done");
    }

    #[test]
    fn test_strips_think_blocks() {
        assert_eq!(sanitize("<think>reasoning</think>Answer"), "Answer");
        assert_eq!(
            sanitize("<think>multi\nline\nreasoning</think>\nAnswer"),
            "Answer"
        );
    }

    #[test]
    fn test_strips_stray_framing_tokens() {
        assert_eq!(sanitize("<|start|>assistant<|message|>hi<|end|>"), "assistanthi");
        assert_eq!(sanitize("plain text"), "plain text");
    }

    #[test]
    fn test_collapses_blank_line_runs() {
        assert_eq!(sanitize("a\n\n\n\nb"), "a\n\nb");
        // Two newlines are already the allowed maximum.
        assert_eq!(sanitize("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_trims_and_handles_empty_input() {
        assert_eq!(sanitize("  hi  \n"), "hi");
        assert_eq!(sanitize(""), "");
    }
}
