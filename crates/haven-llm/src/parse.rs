//! Parsing model output into validated, typed structures.
//!
//! The model returns raw text that should be JSON. Recovery strategies
//! handle the usual failure modes (markdown fences, trailing commas).
//! Anything that still fails schema validation degrades to the fallback
//! cognitive frame -- a timeout looks like a cautious NPC, not a crash.

use haven_types::{CognitiveFrame, Intent, ResponseType};
use serde::Deserialize;

use crate::error::LlmError;

/// Trust-mod bounds accepted from the model.
const TRUST_MOD_BOUND: f64 = 0.1;

/// Tension-delta bounds accepted from the orchestrator.
const TENSION_DELTA_BOUND: f64 = 0.1;

// ---------------------------------------------------------------------------
// Cognitive frame
// ---------------------------------------------------------------------------

/// Intermediate struct for deserializing the model's raw JSON response.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    internal_reflection: String,
    intent: String,
    #[serde(default)]
    dialogue: String,
    #[serde(default = "default_urgency")]
    urgency: f64,
    #[serde(default)]
    trust_mod: Option<f64>,
    #[serde(default = "default_emotional_state")]
    emotional_state: String,
}

fn default_urgency() -> f64 {
    0.5
}

fn default_emotional_state() -> String {
    "Neutral".to_owned()
}

/// Parse a model response into a validated [`CognitiveFrame`].
///
/// Attempts multiple recovery strategies if the raw text is not clean
/// JSON:
/// 1. direct `serde_json` deserialization
/// 2. extract JSON from a markdown code block
/// 3. strip trailing commas and retry
///
/// Unknown intents and schema mismatches are errors -- the caller
/// converts them to [`fallback_frame`].
///
/// # Errors
///
/// Returns [`LlmError::Parse`] when every strategy fails.
pub fn parse_cognitive_frame(raw: &str) -> Result<CognitiveFrame, LlmError> {
    let parsed = parse_with_recovery::<RawFrame>(raw)?;

    let intent = Intent::parse(&parsed.intent)
        .ok_or_else(|| LlmError::Parse(format!("unknown intent: {}", parsed.intent)))?;

    Ok(CognitiveFrame {
        internal_reflection: parsed.internal_reflection,
        intent,
        dialogue: parsed.dialogue,
        urgency: parsed.urgency.clamp(0.0, 1.0),
        trust_mod: parsed
            .trust_mod
            .map(|t| t.clamp(-TRUST_MOD_BOUND, TRUST_MOD_BOUND)),
        emotional_state: parsed.emotional_state,
    })
}

/// The fallback cognitive frame used when the model call times out,
/// errors, or returns unparseable output.
///
/// Deliberately reads as a cautious NPC; the error is only visible in
/// the private reflection. Callers must not persist state for a
/// fallback cycle.
pub fn fallback_frame(reason: &str) -> CognitiveFrame {
    CognitiveFrame {
        internal_reflection: format!("[error: {reason}] Defaulting to cautious behavior."),
        intent: Intent::Guard,
        dialogue: "...".to_owned(),
        urgency: 0.5,
        trust_mod: None,
        emotional_state: "Confused".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Orchestrator decision
// ---------------------------------------------------------------------------

/// One speaker chosen by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakerChoice {
    /// Which agent should speak.
    pub npc_id: String,
    /// How they should respond.
    pub response_type: ResponseType,
    /// Who they are responding to, if anyone.
    pub target_id: Option<String>,
    /// Urgency of the contribution in `[0,1]`.
    pub urgency: f64,
}

/// The orchestrator's decision for one conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorDecision {
    /// Ordered list of speakers for this turn.
    pub next_speakers: Vec<SpeakerChoice>,
    /// Tension delta in `[-0.1, 0.1]`.
    pub tension_change: f64,
}

#[derive(Debug, Deserialize)]
struct RawSpeaker {
    npc_id: String,
    response_type: String,
    #[serde(default)]
    target_id: Option<String>,
    #[serde(default = "default_urgency")]
    urgency: f64,
}

#[derive(Debug, Deserialize)]
struct RawOrchestration {
    #[serde(default)]
    next_speakers: Vec<RawSpeaker>,
    #[serde(default)]
    tension_change: f64,
}

/// Parse the orchestrator's response. Speakers with unknown response
/// types are dropped rather than failing the whole turn.
///
/// # Errors
///
/// Returns [`LlmError::Parse`] when the JSON cannot be recovered at all.
pub fn parse_orchestration(raw: &str) -> Result<OrchestratorDecision, LlmError> {
    let parsed = parse_with_recovery::<RawOrchestration>(raw)?;

    let next_speakers = parsed
        .next_speakers
        .into_iter()
        .filter_map(|speaker| {
            let response_type = ResponseType::parse(&speaker.response_type)?;
            Some(SpeakerChoice {
                npc_id: speaker.npc_id,
                response_type,
                target_id: speaker.target_id,
                urgency: speaker.urgency.clamp(0.0, 1.0),
            })
        })
        .collect();

    Ok(OrchestratorDecision {
        next_speakers,
        tension_change: parsed
            .tension_change
            .clamp(-TENSION_DELTA_BOUND, TENSION_DELTA_BOUND),
    })
}

// ---------------------------------------------------------------------------
// Recovery strategies
// ---------------------------------------------------------------------------

/// Run the strategy cascade for any deserializable target.
fn parse_with_recovery<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let trimmed = raw.trim();

    // Strategy 1: direct parse
    if let Ok(parsed) = serde_json::from_str::<T>(trimmed) {
        return Ok(parsed);
    }

    // Strategy 2: extract from markdown code block
    if let Some(json_str) = extract_json_from_codeblock(trimmed)
        && let Ok(parsed) = serde_json::from_str::<T>(json_str)
    {
        return Ok(parsed);
    }

    // Strategy 3: strip trailing commas and retry
    let cleaned = strip_trailing_commas(trimmed);
    if let Ok(parsed) = serde_json::from_str::<T>(&cleaned) {
        return Ok(parsed);
    }

    // Strategy 4: code block, then strip commas
    if let Some(json_str) = extract_json_from_codeblock(trimmed) {
        let cleaned_inner = strip_trailing_commas(json_str);
        if let Ok(parsed) = serde_json::from_str::<T>(&cleaned_inner) {
            return Ok(parsed);
        }
    }

    Err(LlmError::Parse(format!(
        "all parse strategies failed for: {trimmed}"
    )))
}

/// Pull the body out of a ```json ... ``` fenced block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Remove commas that directly precede a closing brace or bracket.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let next_meaningful = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if matches!(next_meaningful, Some('}') | Some(']')) {
                continue;
            }
        }
        result.push(c);
    }
    result
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const VALID_FRAME: &str = r#"{
        "internal_reflection": "They seem sincere.",
        "intent": "Socialize",
        "dialogue": "Welcome to the gates.",
        "urgency": 0.3,
        "trust_mod": 0.05,
        "emotional_state": "Warm"
    }"#;

    #[test]
    fn direct_parse_succeeds() {
        let frame = parse_cognitive_frame(VALID_FRAME).unwrap();
        assert_eq!(frame.intent, Intent::Socialize);
        assert!((frame.urgency - 0.3).abs() < f64::EPSILON);
        assert_eq!(frame.trust_mod, Some(0.05));
    }

    #[test]
    fn codeblock_parse_succeeds() {
        let wrapped = format!("Here is my response:\n```json\n{VALID_FRAME}\n```");
        let frame = parse_cognitive_frame(&wrapped).unwrap();
        assert_eq!(frame.intent, Intent::Socialize);
    }

    #[test]
    fn trailing_commas_are_recovered() {
        let raw = r#"{"intent": "Guard", "urgency": 0.9, "emotional_state": "Tense",}"#;
        let frame = parse_cognitive_frame(raw).unwrap();
        assert_eq!(frame.intent, Intent::Guard);
    }

    #[test]
    fn unknown_intent_is_a_parse_error() {
        let raw = r#"{"intent": "Meditate", "urgency": 0.1}"#;
        assert!(matches!(
            parse_cognitive_frame(raw),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(parse_cognitive_frame("the guard shrugs").is_err());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let raw = r#"{"intent": "Flee", "urgency": 4.2, "trust_mod": -0.9}"#;
        let frame = parse_cognitive_frame(raw).unwrap();
        assert!((frame.urgency - 1.0).abs() < f64::EPSILON);
        assert_eq!(frame.trust_mod, Some(-0.1));
    }

    #[test]
    fn fallback_frame_is_cautious() {
        let frame = fallback_frame("deadline exceeded");
        assert_eq!(frame.intent, Intent::Guard);
        assert_eq!(frame.dialogue, "...");
        assert!((frame.urgency - 0.5).abs() < f64::EPSILON);
        assert!(frame.internal_reflection.contains("deadline exceeded"));
    }

    #[test]
    fn orchestration_parses_and_clamps_tension() {
        let raw = r#"{
            "next_speakers": [
                {"npc_id": "vera", "response_type": "direct_reply", "target_id": "player", "urgency": 0.8},
                {"npc_id": "garrick", "response_type": "sing", "urgency": 0.2}
            ],
            "tension_change": 0.4,
            "reasoning": "vera was addressed"
        }"#;
        let decision = parse_orchestration(raw).unwrap();
        // The unknown response type is dropped, not fatal.
        assert_eq!(decision.next_speakers.len(), 1);
        assert_eq!(decision.next_speakers[0].npc_id, "vera");
        assert_eq!(
            decision.next_speakers[0].response_type,
            ResponseType::DirectReply
        );
        assert!((decision.tension_change - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_orchestration_is_valid() {
        let decision = parse_orchestration("{}").unwrap();
        assert!(decision.next_speakers.is_empty());
        assert!(decision.tension_change.abs() < f64::EPSILON);
    }
}
