//! Cleanup and parsing of raw text-generation output.
//!
//! Models wrap JSON in code fences, prepend chatter ("Sure! Here's..."), or leak
//! special tokens. Everything here returns a typed error instead of guessing,
//! so the caller can decide to fall back.

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::OracleError;

static CODE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("valid regex"));

// <|...|> tokens, [INST] markers and <<SYS>> markers.
static SPECIAL_TOKENS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|[^|>]+\|>|\[/?INST\]|<</?SYS>>").expect("valid regex")
});

/// The decision shape the hero prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawDecision {
    #[serde(rename = "chosenAction", alias = "chosen_action", alias = "action")]
    pub chosen_action: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Remove special tokens and unwrap the first fenced block, if any.
pub fn strip_wrappers(raw: &str) -> String {
    let cleaned = SPECIAL_TOKENS_RE.replace_all(raw, "");
    match CODE_FENCE_RE.captures(&cleaned) {
        Some(caps) => caps[1].trim().to_string(),
        None => cleaned.replace("```", "").trim().to_string(),
    }
}

/// Slice out the outermost `{...}` span.
fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a JSON object out of model output.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T, OracleError> {
    if raw.trim().is_empty() {
        return Err(OracleError::Empty);
    }
    let text = strip_wrappers(raw);
    let json = json_object_span(&text).ok_or(OracleError::NoJson)?;
    serde_json::from_str(json).map_err(|e| OracleError::Malformed(e.to_string()))
}

/// Parse a hero decision; the action must be non-blank.
pub fn parse_decision(raw: &str) -> Result<RawDecision, OracleError> {
    let mut decision: RawDecision = parse_json_response(raw)?;
    decision.chosen_action = decision.chosen_action.trim().to_string();
    if decision.chosen_action.is_empty() {
        return Err(OracleError::MissingField("chosenAction"));
    }
    decision.reasoning = decision.reasoning.trim().to_string();
    Ok(decision)
}

/// Clean free text (lore, backstory).
pub fn parse_text(raw: &str) -> Result<String, OracleError> {
    let text = strip_wrappers(raw);
    let text = text.trim_matches(|c: char| c == '"' || c.is_whitespace());
    if text.is_empty() {
        return Err(OracleError::Empty);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"chosenAction\": \"train\", \"reasoning\": \"I need to get stronger.\"}\n```";
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.chosen_action, "train");
        assert_eq!(decision.reasoning, "I need to get stronger.");
    }

    #[test]
    fn parses_json_after_leading_prose() {
        let raw = "Sure! Here is my choice:\n{\"chosenAction\": \" rest \", \"reasoning\": \"tired\"} Hope that helps.";
        assert_eq!(parse_decision(raw).unwrap().chosen_action, "rest");
    }

    #[test]
    fn accepts_snake_case_field() {
        let raw = r#"{"chosen_action": "quest"}"#;
        let decision = parse_decision(raw).unwrap();
        assert_eq!(decision.chosen_action, "quest");
        assert_eq!(decision.reasoning, "");
    }

    #[test]
    fn strips_special_tokens() {
        let raw = "<|start|>{\"chosenAction\": \"craft\"}<|end|>";
        assert_eq!(parse_decision(raw).unwrap().chosen_action, "craft");
    }

    #[test]
    fn malformed_inputs_are_typed_errors() {
        assert!(matches!(parse_decision(""), Err(OracleError::Empty)));
        assert!(matches!(parse_decision("I think I'll train today."), Err(OracleError::NoJson)));
        assert!(matches!(parse_decision("{chosenAction: train}"), Err(OracleError::Malformed(_))));
        assert!(matches!(
            parse_decision(r#"{"reasoning": "no action given"}"#),
            Err(OracleError::Malformed(_))
        ));
        assert!(matches!(
            parse_decision(r#"{"chosenAction": "   "}"#),
            Err(OracleError::MissingField("chosenAction"))
        ));
        assert!(matches!(parse_decision("} backwards {"), Err(OracleError::NoJson)));
    }

    #[test]
    fn text_is_unwrapped_and_unquoted() {
        assert_eq!(
            parse_text("```\n\"The realm of Eldoria sleeps.\"\n```").unwrap(),
            "The realm of Eldoria sleeps."
        );
        assert!(matches!(parse_text("``` ```"), Err(OracleError::Empty)));
    }
}
