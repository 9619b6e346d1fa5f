//! The cognitive frame: structured output of a reactive cycle.

use serde::{Deserialize, Serialize};

use crate::enums::Intent;
use crate::structs::LimbicSnapshot;

/// Structured result of one reactive cognitive cycle.
///
/// Produced by the language model, validated and range-clamped by the
/// cognition layer, then adjusted by meta resolution (vitals override,
/// trust-mod scaling) before being returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveFrame {
    /// The agent's private reasoning, never spoken aloud.
    pub internal_reflection: String,
    /// The chosen action goal.
    pub intent: Intent,
    /// Spoken words; empty when the agent stays silent.
    pub dialogue: String,
    /// Action priority in `[0,1]`.
    pub urgency: f64,
    /// Trust change toward the counterpart in `[-0.1, 0.1]`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_mod: Option<f64>,
    /// Mood label the agent reports for itself.
    pub emotional_state: String,
}

impl CognitiveFrame {
    /// The resolved trust change, defaulting to zero when absent.
    pub fn trust_delta(&self) -> f64 {
        self.trust_mod.unwrap_or(0.0)
    }
}

/// Full result of a player interaction, as returned by the action surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionReport {
    /// The resolved cognitive frame.
    pub cognitive_frame: CognitiveFrame,
    /// Limbic state at the end of the cycle.
    pub limbic_state: LimbicSnapshot,
    /// The player's reputation with this agent after the update.
    pub reputation_now: f64,
    /// Topics newly extracted from the player's message.
    pub topics_extracted: usize,
    /// Topics recalled as relevant to the message.
    pub topics_remembered: usize,
    /// Shared memories and rumors about this player the agent had heard.
    pub heard_from_others: usize,
    /// Topics shared onward to related agents during this interaction.
    pub memories_shared: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_delta_defaults_to_zero() {
        let frame = CognitiveFrame {
            internal_reflection: String::new(),
            intent: Intent::Guard,
            dialogue: String::new(),
            urgency: 0.5,
            trust_mod: None,
            emotional_state: "Calm".to_owned(),
        };
        assert!(frame.trust_delta().abs() < f64::EPSILON);
    }

    #[test]
    fn frame_serializes_without_null_trust_mod() {
        let frame = CognitiveFrame {
            internal_reflection: "thinking".to_owned(),
            intent: Intent::Investigate,
            dialogue: "Who goes there?".to_owned(),
            urgency: 0.7,
            trust_mod: None,
            emotional_state: "Wary".to_owned(),
        };
        let json = serde_json::to_string(&frame).expect("serialize");
        assert!(!json.contains("trust_mod"));
    }
}
