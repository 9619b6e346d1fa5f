//! Meta resolution: the executive layer between cognition and action.
//!
//! Vitals override cognition -- a starving agent hunts for food no
//! matter what the model said, an exhausted one refuses everything but
//! flight. Trust changes are scaled by personality (paranoia amplifies
//! distrust, empathy amplifies goodwill) and personality itself drifts
//! in tiny, bounded steps recorded in the trait ledger.

use haven_db::{DbError, MemoryVault};
use haven_types::{AgentId, CognitiveFrame, Intent, Personality, TraitName, Vitals};

use crate::limbic::EventTone;

/// Hunger level above which cognition is overridden.
const HUNGER_OVERRIDE: f64 = 0.8;

/// Fatigue level above which cognition is overridden.
const FATIGUE_OVERRIDE: f64 = 0.9;

/// Trait inertia: resistance to change.
const TRAIT_INERTIA: f64 = 0.95;

/// Hard bound on a single drift step.
const MAX_DRIFT: f64 = 0.1;

/// Urgency above which an event may drift a trait.
const DRIFT_URGENCY_THRESHOLD: f64 = 0.7;

/// Resolve conflicts between the cognitive frame and vital needs.
///
/// Hunger above 0.8 forces `Investigate` (search for food) unless the
/// agent is fleeing or helping; fatigue above 0.9 forces `Ignore` with
/// a stock line unless the agent is fleeing. Fatigue is checked second
/// and may override the hunger resolution.
pub fn resolve_intent_conflicts(mut frame: CognitiveFrame, vitals: &Vitals) -> CognitiveFrame {
    if vitals.hunger > HUNGER_OVERRIDE
        && frame.intent != Intent::Flee
        && frame.intent != Intent::Assist
    {
        frame.intent = Intent::Investigate;
        frame
            .internal_reflection
            .push_str(" [meta: hunger override, must find food]");
        frame.urgency = frame.urgency.max(0.9);
    }

    if vitals.fatigue > FATIGUE_OVERRIDE && frame.intent != Intent::Flee {
        frame.intent = Intent::Ignore;
        frame.dialogue = "I... need to rest...".to_owned();
        frame.urgency = 1.0;
    }

    frame
}

/// Scale a trust change by personality and clamp it to `[-0.1, 0.1]`.
///
/// Paranoid agents distrust more sharply (1.5x on all changes);
/// empathic agents reward goodwill (1.3x on positive changes).
pub fn evaluate_trust_change(trust_mod: f64, personality: &Personality) -> f64 {
    let mut scaled = trust_mod;
    if personality.paranoia > 0.7 {
        scaled *= 1.5;
    }
    if personality.empathy > 0.7 && scaled > 0.0 {
        scaled *= 1.3;
    }
    scaled.clamp(-MAX_DRIFT, MAX_DRIFT)
}

/// Decide whether this cycle's event drifts a trait.
///
/// At most one trait changes per reactive cycle, and only when the
/// resolved urgency crossed the threshold: threats harden paranoia,
/// help softens into empathy.
pub fn drift_for_event(urgency: f64, tone: Option<EventTone>) -> Option<(TraitName, f64)> {
    if urgency <= DRIFT_URGENCY_THRESHOLD {
        return None;
    }
    match tone {
        Some(EventTone::Threat) => Some((TraitName::Paranoia, 0.1)),
        Some(EventTone::Positive) => Some((TraitName::Empathy, 0.05)),
        None => None,
    }
}

/// Apply a bounded trait drift and record it in the ledger.
///
/// `drift = impact * (1 - inertia)`, clamped to `[-0.1, 0.1]`; the
/// ledger soft-clamps the resulting value into the humanity bounds and
/// the in-memory personality mirrors that clamped value.
///
/// # Errors
///
/// Returns [`DbError`] if the ledger append fails.
pub async fn apply_trait_drift(
    vault: &MemoryVault<'_>,
    agent_id: &AgentId,
    personality: &mut Personality,
    trait_name: TraitName,
    impact: f64,
    reason: &str,
) -> Result<f64, DbError> {
    let drift = (impact * (1.0 - TRAIT_INERTIA)).clamp(-MAX_DRIFT, MAX_DRIFT);
    let raw = personality.get(trait_name) + drift;
    let clamped = vault
        .append_trait_delta(agent_id, trait_name, drift, reason, raw)
        .await?;
    personality.set(trait_name, clamped);
    Ok(clamped)
}
