//! Persona, personality, vitals and emotional state.
//!
//! These are the structures owned exclusively by an agent's worker task.
//! The small pure methods here (decay, event response, clamping) mirror
//! the biology of the agent; everything that touches storage or the
//! language model lives in the higher crates.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// Static identity of an agent: who they are and how they speak.
///
/// Created at registration (from the persona registry or the generator)
/// and mutated only by the agent's own runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Display name ("Vera").
    pub name: String,
    /// Role in the settlement ("gate guard", "trader").
    pub role: String,
    /// Where the agent is stationed ("Greyreach Gates").
    pub location: String,
    /// Speech flavor injected into the system prompt.
    pub dialogue_style: String,
    /// Faction membership name.
    pub faction: String,
    /// Gender presentation, free-form.
    pub gender: String,
}

// ---------------------------------------------------------------------------
// Personality
// ---------------------------------------------------------------------------

/// The eight addressable personality traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitName {
    /// Drive to explore and ask questions.
    Curiosity,
    /// Concern for others' wellbeing.
    Empathy,
    /// Willingness to take chances.
    RiskTolerance,
    /// Readiness to use force.
    Aggression,
    /// Self-control and routine.
    Discipline,
    /// Sentimentality and idealism.
    Romanticism,
    /// Readiness to exploit openings.
    Opportunism,
    /// Suspicion and threat-sensitivity.
    Paranoia,
}

impl TraitName {
    /// All traits, in prompt order.
    pub const ALL: [Self; 8] = [
        Self::Curiosity,
        Self::Empathy,
        Self::RiskTolerance,
        Self::Aggression,
        Self::Discipline,
        Self::Romanticism,
        Self::Opportunism,
        Self::Paranoia,
    ];

    /// Database / prompt representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Curiosity => "curiosity",
            Self::Empathy => "empathy",
            Self::RiskTolerance => "risk_tolerance",
            Self::Aggression => "aggression",
            Self::Discipline => "discipline",
            Self::Romanticism => "romanticism",
            Self::Opportunism => "opportunism",
            Self::Paranoia => "paranoia",
        }
    }

    /// Parse the database representation.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "curiosity" => Some(Self::Curiosity),
            "empathy" => Some(Self::Empathy),
            "risk_tolerance" => Some(Self::RiskTolerance),
            "aggression" => Some(Self::Aggression),
            "discipline" => Some(Self::Discipline),
            "romanticism" => Some(Self::Romanticism),
            "opportunism" => Some(Self::Opportunism),
            "paranoia" => Some(Self::Paranoia),
            _ => None,
        }
    }
}

impl TryFrom<String> for TraitName {
    type Error = crate::enums::UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or(crate::enums::UnknownVariant {
            kind: "trait name",
            raw,
        })
    }
}

/// The personality vector: eight real-valued traits in `[0,1]`.
///
/// Values drift over time through the trait ledger, which soft-clamps
/// them to `[0.05, 0.95]` on write; the in-memory copy mirrors the last
/// written ledger value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    /// Drive to explore and ask questions.
    pub curiosity: f64,
    /// Concern for others' wellbeing.
    pub empathy: f64,
    /// Willingness to take chances.
    pub risk_tolerance: f64,
    /// Readiness to use force.
    pub aggression: f64,
    /// Self-control and routine.
    pub discipline: f64,
    /// Sentimentality and idealism.
    pub romanticism: f64,
    /// Readiness to exploit openings.
    pub opportunism: f64,
    /// Suspicion and threat-sensitivity.
    pub paranoia: f64,
}

impl Personality {
    /// A flat mid-scale personality.
    pub const fn balanced() -> Self {
        Self {
            curiosity: 0.5,
            empathy: 0.5,
            risk_tolerance: 0.5,
            aggression: 0.5,
            discipline: 0.5,
            romanticism: 0.5,
            opportunism: 0.5,
            paranoia: 0.5,
        }
    }

    /// Read a trait by name.
    pub const fn get(&self, name: TraitName) -> f64 {
        match name {
            TraitName::Curiosity => self.curiosity,
            TraitName::Empathy => self.empathy,
            TraitName::RiskTolerance => self.risk_tolerance,
            TraitName::Aggression => self.aggression,
            TraitName::Discipline => self.discipline,
            TraitName::Romanticism => self.romanticism,
            TraitName::Opportunism => self.opportunism,
            TraitName::Paranoia => self.paranoia,
        }
    }

    /// Write a trait by name, clamping to `[0,1]`.
    pub fn set(&mut self, name: TraitName, value: f64) {
        let value = value.clamp(0.0, 1.0);
        match name {
            TraitName::Curiosity => self.curiosity = value,
            TraitName::Empathy => self.empathy = value,
            TraitName::RiskTolerance => self.risk_tolerance = value,
            TraitName::Aggression => self.aggression = value,
            TraitName::Discipline => self.discipline = value,
            TraitName::Romanticism => self.romanticism = value,
            TraitName::Opportunism => self.opportunism = value,
            TraitName::Paranoia => self.paranoia = value,
        }
    }
}

impl Default for Personality {
    fn default() -> Self {
        Self::balanced()
    }
}

// ---------------------------------------------------------------------------
// Vitals
// ---------------------------------------------------------------------------

/// Seconds of wall time for hunger to go from 0 to full saturation.
const HUNGER_SATURATION_SECS: f64 = 14_400.0; // 4 hours

/// Seconds of wall time for fatigue to go from 0 to full saturation.
const FATIGUE_SATURATION_SECS: f64 = 21_600.0; // 6 hours

/// Biological constraints of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// 0.0 = full, 1.0 = starving.
    pub hunger: f64,
    /// 0.0 = rested, 1.0 = exhausted.
    pub fatigue: f64,
}

impl Vitals {
    /// Advance vitals by `delta_seconds` of wall time.
    ///
    /// Hunger saturates in ~4 hours, fatigue in ~6; both cap at 1.0.
    pub fn decay(&mut self, delta_seconds: f64) {
        self.hunger = (self.hunger + delta_seconds / HUNGER_SATURATION_SECS).min(1.0);
        self.fatigue = (self.fatigue + delta_seconds / FATIGUE_SATURATION_SECS).min(1.0);
    }
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            hunger: 0.2,
            fatigue: 0.3,
        }
    }
}

// ---------------------------------------------------------------------------
// Emotional state
// ---------------------------------------------------------------------------

/// Emotional state of an agent: a mood label plus arousal/valence axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Mood label ("Calm", "Paranoid", "Happy", ...).
    pub mood: String,
    /// 0.0 = lethargic, 1.0 = panicked.
    pub arousal: f64,
    /// 0.0 = negative, 1.0 = positive.
    pub valence: f64,
}

impl EmotionalState {
    /// Respond to a threatening event of the given intensity.
    ///
    /// Arousal rises and valence drops by the intensity; a mood flip to
    /// `Paranoid` happens above 0.7 arousal. Both axes then relax toward
    /// their baselines.
    pub fn apply_threat(&mut self, intensity: f64) {
        self.arousal = (self.arousal + intensity).min(1.0);
        self.valence = (self.valence - intensity).max(0.0);
        if self.arousal > 0.7 {
            self.mood = "Paranoid".to_owned();
        }
        self.settle();
    }

    /// Respond to a positive event of the given intensity.
    pub fn apply_positive(&mut self, intensity: f64) {
        self.valence = (self.valence + intensity).min(1.0);
        self.arousal = (self.arousal - intensity * 0.5).max(0.0);
        if self.valence > 0.7 {
            self.mood = "Happy".to_owned();
        }
        self.settle();
    }

    /// Natural decay toward baseline after any event.
    fn settle(&mut self) {
        self.arousal *= 0.95;
        self.valence = 0.5 + (self.valence - 0.5) * 0.9;
    }
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self {
            mood: "Calm".to_owned(),
            arousal: 0.5,
            valence: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Limbic snapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of an agent's limbic state, returned with every
/// reactive cycle and by the status surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimbicSnapshot {
    /// Current vitals.
    pub vitals: Vitals,
    /// Current emotional state.
    pub emotional_state: EmotionalState,
    /// Sensory latency derived from arousal, in seconds.
    pub think_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vitals_decay_caps_at_one() {
        let mut vitals = Vitals {
            hunger: 0.0,
            fatigue: 0.0,
        };
        vitals.decay(1_000_000.0);
        assert!((vitals.hunger - 1.0).abs() < f64::EPSILON);
        assert!((vitals.fatigue - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vitals_decay_rates_differ() {
        let mut vitals = Vitals {
            hunger: 0.0,
            fatigue: 0.0,
        };
        // One hour: hunger gains 0.25, fatigue 0.1667.
        vitals.decay(3600.0);
        assert!((vitals.hunger - 0.25).abs() < 1e-9);
        assert!((vitals.fatigue - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn threat_raises_arousal_and_can_flip_mood() {
        let mut state = EmotionalState {
            mood: "Calm".to_owned(),
            arousal: 0.6,
            valence: 0.5,
        };
        state.apply_threat(0.3);
        assert_eq!(state.mood, "Paranoid");
        assert!(state.arousal > 0.6);
        assert!(state.valence < 0.5);
    }

    #[test]
    fn positive_event_raises_valence() {
        let mut state = EmotionalState::default();
        state.apply_positive(0.4);
        assert!(state.valence > 0.5);
        assert!(state.arousal < 0.5);
    }

    #[test]
    fn repeated_events_keep_axes_in_range() {
        let mut state = EmotionalState::default();
        for _ in 0..100 {
            state.apply_threat(0.9);
        }
        assert!((0.0..=1.0).contains(&state.arousal));
        assert!((0.0..=1.0).contains(&state.valence));
    }

    #[test]
    fn personality_get_set_round_trips() {
        let mut personality = Personality::balanced();
        personality.set(TraitName::Paranoia, 0.8);
        assert!((personality.get(TraitName::Paranoia) - 0.8).abs() < f64::EPSILON);
        // Out-of-range writes are clamped.
        personality.set(TraitName::Empathy, 1.7);
        assert!((personality.get(TraitName::Empathy) - 1.0).abs() < f64::EPSILON);
    }
}
