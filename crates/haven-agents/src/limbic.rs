//! The limbic system: vitals, emotions, and sensory latency.
//!
//! Owned exclusively by the agent's worker task. The autonomous loop
//! advances vitals every second; the reactive cycle reads think time
//! and applies event-driven emotional updates.

use std::time::Instant;

use haven_types::{EmotionalState, LimbicSnapshot, Vitals};

/// Keywords that read as a threat in a player action.
const THREAT_KEYWORDS: &[&str] = &[
    "threat", "weapon", "attack", "draw", "blade", "knife", "gun", "steal", "kill",
];

/// Keywords that read as a friendly action.
const POSITIVE_KEYWORDS: &[&str] = &["help", "assist", "thank", "gift", "trade", "friend"];

/// Emotional intensity of a recognized threat.
const THREAT_INTENSITY: f64 = 0.3;

/// Emotional intensity of a recognized positive action.
const POSITIVE_INTENSITY: f64 = 0.2;

/// How a perceived event lands emotionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTone {
    /// The event reads as threatening.
    Threat,
    /// The event reads as friendly.
    Positive,
}

/// Classify a perception by its keywords.
pub fn classify_event(perception: &str) -> Option<EventTone> {
    let lower = perception.to_lowercase();
    if THREAT_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Some(EventTone::Threat)
    } else if POSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Some(EventTone::Positive)
    } else {
        None
    }
}

/// Vitals and emotional state of one agent.
#[derive(Debug, Clone)]
pub struct LimbicSystem {
    /// Biological constraints.
    pub vitals: Vitals,
    /// Current emotional state.
    pub emotional_state: EmotionalState,
    last_decay: Instant,
    last_reflection: Instant,
}

impl LimbicSystem {
    /// Create a limbic system with default vitals and mood.
    pub fn new() -> Self {
        Self::with_vitals(Vitals::default())
    }

    /// Create a limbic system with explicit starting vitals.
    pub fn with_vitals(vitals: Vitals) -> Self {
        let now = Instant::now();
        Self {
            vitals,
            emotional_state: EmotionalState::default(),
            last_decay: now,
            last_reflection: now,
        }
    }

    /// Sensory latency in seconds, derived from arousal: near-instant
    /// when panicked, slow when calm.
    pub fn think_time(&self) -> f64 {
        let arousal = self.emotional_state.arousal;
        if arousal > 0.8 {
            0.1
        } else if arousal < 0.3 {
            2.0
        } else {
            1.0
        }
    }

    /// Advance vitals by the wall time elapsed since the previous call.
    pub fn decay_tick(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_decay).as_secs_f64();
        self.vitals.decay(delta);
        self.last_decay = now;
    }

    /// Whether an autonomous reflection is due.
    pub fn needs_reflection(&self, interval: std::time::Duration) -> bool {
        self.last_reflection.elapsed() >= interval
    }

    /// Mark a reflection as having just happened.
    pub fn mark_reflection(&mut self) {
        self.last_reflection = Instant::now();
    }

    /// Apply the emotional consequence of a perceived event.
    pub fn apply_event(&mut self, tone: EventTone) {
        match tone {
            EventTone::Threat => self.emotional_state.apply_threat(THREAT_INTENSITY),
            EventTone::Positive => self.emotional_state.apply_positive(POSITIVE_INTENSITY),
        }
    }

    /// Point-in-time snapshot for callers.
    pub fn snapshot(&self) -> LimbicSnapshot {
        LimbicSnapshot {
            vitals: self.vitals,
            emotional_state: self.emotional_state.clone(),
            think_time: self.think_time(),
        }
    }
}

impl Default for LimbicSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threat_keywords_classify_as_threat() {
        assert_eq!(
            classify_event("I draw my weapon at you"),
            Some(EventTone::Threat)
        );
        assert_eq!(classify_event("hand over the goods or else, this is a threat"), Some(EventTone::Threat));
    }

    #[test]
    fn positive_keywords_classify_as_positive() {
        assert_eq!(
            classify_event("I want to help the settlement"),
            Some(EventTone::Positive)
        );
    }

    #[test]
    fn neutral_text_classifies_as_none() {
        assert_eq!(classify_event("Nice weather today"), None);
    }

    #[test]
    fn threat_beats_positive_when_both_match() {
        // "help me or I attack" contains both; threat wins the scan.
        assert_eq!(
            classify_event("help me or I attack"),
            Some(EventTone::Threat)
        );
    }

    #[test]
    fn think_time_tracks_arousal() {
        let mut limbic = LimbicSystem::new();
        limbic.emotional_state.arousal = 0.9;
        assert!((limbic.think_time() - 0.1).abs() < f64::EPSILON);
        limbic.emotional_state.arousal = 0.1;
        assert!((limbic.think_time() - 2.0).abs() < f64::EPSILON);
        limbic.emotional_state.arousal = 0.5;
        assert!((limbic.think_time() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn threat_event_raises_arousal() {
        let mut limbic = LimbicSystem::new();
        let before = limbic.emotional_state.arousal;
        limbic.apply_event(EventTone::Threat);
        assert!(limbic.emotional_state.arousal > before);
        assert!(limbic.emotional_state.valence < 0.5);
    }

    #[test]
    fn snapshot_reflects_current_state() {
        let mut limbic = LimbicSystem::with_vitals(Vitals {
            hunger: 0.85,
            fatigue: 0.2,
        });
        limbic.emotional_state.arousal = 0.9;
        let snap = limbic.snapshot();
        assert!((snap.vitals.hunger - 0.85).abs() < f64::EPSILON);
        assert!((snap.think_time - 0.1).abs() < f64::EPSILON);
    }
}
