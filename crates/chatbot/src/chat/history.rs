//! Builds what the model sees and what gets stored.
//!
//! The model is called statelessly: every request replays the whole
//! conversation behind a framing pair that carries the personality. The
//! framing pair exists only in the model-call sequence, never in a transcript.

use super::error::ChatError;
use super::turn::Turn;

/// Model half of the framing pair.
pub const FRAMING_ACK: &str = "Understood, proceed.";

pub fn framing_pair(personality: &str) -> [Turn; 2] {
    [Turn::user(personality), Turn::model(FRAMING_ACK)]
}

/// Rejects empty and whitespace-only messages. The text itself is passed on
/// exactly as sent.
pub fn validate_message(message: Option<&str>) -> Result<&str, ChatError> {
    match message {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ChatError::invalid("Mensagem vazia.")),
    }
}

/// Framing pair followed by the prior turns in their original order.
pub fn assemble_history(prior: &[Turn], personality: &str) -> Vec<Turn> {
    let mut history = Vec::with_capacity(prior.len() + 2);
    history.extend(framing_pair(personality));
    history.extend_from_slice(prior);
    history
}

/// The transcript after a successful exchange: prior turns, the user message
/// and the model reply.
pub fn extend_transcript(mut prior: Vec<Turn>, message: &str, reply: &str) -> Vec<Turn> {
    prior.reserve(2);
    prior.push(Turn::user(message));
    prior.push(Turn::model(reply));
    prior
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_assemble_empty_history_is_framing_pair() {
        let history = assemble_history(&[], "You are Zippy.");
        assert_eq!(history, vec![Turn::user("You are Zippy."), Turn::model(FRAMING_ACK)]);
    }

    #[test]
    fn test_assemble_keeps_prior_order() {
        let prior = vec![
            Turn::user("a"),
            Turn::model("b"),
            Turn::user("c"),
            Turn::model("d"),
        ];
        let history = assemble_history(&prior, "p");
        assert_eq!(history.len(), 6);
        assert_eq!(&history[2..], prior.as_slice());
    }

    #[test]
    fn test_extend_transcript_appends_one_pair_without_framing() {
        let prior = vec![Turn::user("oi"), Turn::model("olá")];
        let transcript = extend_transcript(prior.clone(), "tudo bem?", "tudo!");
        assert_eq!(transcript.len(), prior.len() + 2);
        assert_eq!(transcript[2], Turn::user("tudo bem?"));
        assert_eq!(transcript[3], Turn::model("tudo!"));
        assert!(transcript.iter().all(|t| t.text != FRAMING_ACK));
    }

    #[test]
    fn test_validate_message() {
        assert_matches!(validate_message(None), Err(ChatError::InvalidRequest(_)));
        assert_matches!(validate_message(Some("")), Err(ChatError::InvalidRequest(_)));
        assert_matches!(validate_message(Some(" \n\t ")), Err(ChatError::InvalidRequest(_)));
        assert_eq!(validate_message(Some("  hi ")).unwrap(), "  hi ");
    }
}
