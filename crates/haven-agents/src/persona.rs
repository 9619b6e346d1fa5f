//! Persona registry and procedural persona generation.
//!
//! Personas are registered explicitly; the registry never substitutes a
//! default silently. In lenient mode an unregistered agent gets a
//! generated persona (deterministic per agent id); in strict mode the
//! lookup is an error the caller must surface.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;

use haven_types::{AgentId, Persona, Personality};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::AgentError;

// ---------------------------------------------------------------------------
// Archetypes
// ---------------------------------------------------------------------------

/// Trait range used by an archetype: (low, high) per trait.
type TraitRange = (f64, f64);

/// A role archetype the generator mints personas from.
struct Archetype {
    role: &'static str,
    location: &'static str,
    faction: &'static str,
    dialogue_style: &'static str,
    aggression: TraitRange,
    empathy: TraitRange,
    paranoia: TraitRange,
    discipline: TraitRange,
}

/// The archetype table. Curiosity, risk tolerance, romanticism and
/// opportunism are drawn from the full mid band for every role.
const ARCHETYPES: &[Archetype] = &[
    Archetype {
        role: "gate guard",
        location: "the settlement gates",
        faction: "guards",
        dialogue_style: "curt, watchful, few words",
        aggression: (0.4, 0.7),
        empathy: (0.2, 0.5),
        paranoia: (0.5, 0.9),
        discipline: (0.6, 0.9),
    },
    Archetype {
        role: "traveling merchant",
        location: "the market row",
        faction: "traders",
        dialogue_style: "smooth, persuasive, always bargaining",
        aggression: (0.1, 0.4),
        empathy: (0.3, 0.6),
        paranoia: (0.3, 0.6),
        discipline: (0.4, 0.7),
    },
    Archetype {
        role: "field medic",
        location: "the infirmary tent",
        faction: "citizens",
        dialogue_style: "soft-spoken, direct about wounds",
        aggression: (0.0, 0.2),
        empathy: (0.7, 0.95),
        paranoia: (0.2, 0.5),
        discipline: (0.5, 0.8),
    },
    Archetype {
        role: "scavenger",
        location: "the outer ruins",
        faction: "outcasts",
        dialogue_style: "jumpy, bargain-hardened slang",
        aggression: (0.3, 0.6),
        empathy: (0.1, 0.4),
        paranoia: (0.6, 0.95),
        discipline: (0.2, 0.5),
    },
    Archetype {
        role: "farmhand",
        location: "the terraced fields",
        faction: "citizens",
        dialogue_style: "plain, unhurried, weather talk",
        aggression: (0.1, 0.3),
        empathy: (0.4, 0.7),
        paranoia: (0.2, 0.4),
        discipline: (0.5, 0.8),
    },
];

/// Deterministic seed derived from an agent id.
fn seed_for(agent_id: &AgentId) -> u64 {
    let mut hasher = DefaultHasher::new();
    agent_id.as_str().hash(&mut hasher);
    hasher.finish()
}

/// Generate a persona and personality for an agent id.
///
/// Deterministic: the same id always yields the same persona, so
/// restarts do not reroll characters.
pub fn generate_persona(agent_id: &AgentId) -> (Persona, Personality) {
    let mut rng = StdRng::seed_from_u64(seed_for(agent_id));
    let archetype = &ARCHETYPES[rng.random_range(0..ARCHETYPES.len())];

    let mut in_range = |range: TraitRange| rng.random_range(range.0..=range.1);
    let personality = Personality {
        aggression: in_range(archetype.aggression),
        empathy: in_range(archetype.empathy),
        paranoia: in_range(archetype.paranoia),
        discipline: in_range(archetype.discipline),
        curiosity: in_range((0.3, 0.8)),
        risk_tolerance: in_range((0.2, 0.8)),
        romanticism: in_range((0.2, 0.7)),
        opportunism: in_range((0.2, 0.8)),
    };

    let gender = if rng.random_bool(0.5) { "female" } else { "male" };
    let mut name: Vec<char> = agent_id.as_str().chars().collect();
    if let Some(first) = name.first_mut() {
        *first = first.to_ascii_uppercase();
    }

    let persona = Persona {
        name: name.into_iter().collect(),
        role: archetype.role.to_owned(),
        location: archetype.location.to_owned(),
        dialogue_style: archetype.dialogue_style.to_owned(),
        faction: archetype.faction.to_owned(),
        gender: gender.to_owned(),
    };

    (persona, personality)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Explicit persona storage with optional generation fallback.
pub struct PersonaRegistry {
    personas: Mutex<HashMap<AgentId, (Persona, Personality)>>,
    strict: bool,
}

impl PersonaRegistry {
    /// A lenient registry: unknown agents get generated personas.
    pub fn new() -> Self {
        Self {
            personas: Mutex::new(HashMap::new()),
            strict: false,
        }
    }

    /// A strict registry: unknown agents are an error.
    pub fn strict() -> Self {
        Self {
            personas: Mutex::new(HashMap::new()),
            strict: true,
        }
    }

    /// Register (or replace) a persona.
    pub fn register(&self, agent_id: AgentId, persona: Persona, personality: Personality) {
        if let Ok(mut personas) = self.personas.lock() {
            personas.insert(agent_id, (persona, personality));
        }
    }

    /// Resolve the persona for an agent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::MissingPersona`] in strict mode when no
    /// persona was registered.
    pub fn resolve(&self, agent_id: &AgentId) -> Result<(Persona, Personality), AgentError> {
        if let Ok(personas) = self.personas.lock()
            && let Some(found) = personas.get(agent_id)
        {
            return Ok(found.clone());
        }
        if self.strict {
            return Err(AgentError::MissingPersona(agent_id.to_string()));
        }
        Ok(generate_persona(agent_id))
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn generation_is_deterministic_per_id() {
        let vera = AgentId::from("vera");
        let (p1, t1) = generate_persona(&vera);
        let (p2, t2) = generate_persona(&vera);
        assert_eq!(p1, p2);
        assert_eq!(t1, t2);
    }

    #[test]
    fn different_ids_usually_differ() {
        let (a, _) = generate_persona(&AgentId::from("vera"));
        let (b, _) = generate_persona(&AgentId::from("garrick"));
        // Names always differ; roles may or may not.
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn generated_traits_are_in_range() {
        for id in ["vera", "garrick", "mara", "tolan", "edda"] {
            let (_, traits) = generate_persona(&AgentId::from(id));
            for value in [
                traits.curiosity,
                traits.empathy,
                traits.risk_tolerance,
                traits.aggression,
                traits.discipline,
                traits.romanticism,
                traits.opportunism,
                traits.paranoia,
            ] {
                assert!((0.0..=1.0).contains(&value));
            }
        }
    }

    #[test]
    fn generated_name_is_capitalized() {
        let (persona, _) = generate_persona(&AgentId::from("vera"));
        assert_eq!(persona.name, "Vera");
    }

    #[test]
    fn registered_persona_wins_over_generation() {
        let registry = PersonaRegistry::new();
        let vera = AgentId::from("vera");
        let persona = Persona {
            name: "Vera".to_owned(),
            role: "warden".to_owned(),
            location: "the keep".to_owned(),
            dialogue_style: "formal".to_owned(),
            faction: "guards".to_owned(),
            gender: "female".to_owned(),
        };
        registry.register(vera.clone(), persona.clone(), Personality::balanced());

        let (resolved, _) = registry.resolve(&vera).unwrap();
        assert_eq!(resolved.role, "warden");
    }

    #[test]
    fn strict_registry_rejects_unknown_agents() {
        let registry = PersonaRegistry::strict();
        let result = registry.resolve(&AgentId::from("nobody"));
        assert!(matches!(result, Err(AgentError::MissingPersona(_))));
    }

    #[test]
    fn lenient_registry_generates_for_unknown_agents() {
        let registry = PersonaRegistry::new();
        let (persona, _) = registry.resolve(&AgentId::from("drifter")).unwrap();
        assert_eq!(persona.name, "Drifter");
    }
}
