//! Prompt rendering via minijinja.
//!
//! Templates are embedded at compile time so the cognition layer has no
//! runtime file dependencies. The engine renders two-part prompts
//! (system + user) for the agent's reactive cycle, the autonomous
//! reflection, and the conversation orchestrator.

use haven_types::{Persona, Personality};
use minijinja::Environment;
use serde::Serialize;

use crate::error::LlmError;

/// A fully rendered two-part prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message: identity, personality, output schema.
    pub system: String,
    /// User message: the current situation and context.
    pub user: String,
}

/// Template names registered in the engine.
const AGENT_SYSTEM: &str = "agent_system";
const AGENT_USER: &str = "agent_user";
const REFLECTION: &str = "reflection";
const ORCHESTRATOR_SYSTEM: &str = "orchestrator_system";
const ORCHESTRATOR_USER: &str = "orchestrator_user";

/// Renders prompts from the embedded template set.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Build the engine with all templates registered.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if a template fails to parse --
    /// which would be a build defect, since the sources are embedded.
    pub fn new() -> Result<Self, LlmError> {
        let mut env = Environment::new();
        env.add_template(AGENT_SYSTEM, include_str!("../templates/agent_system.j2"))?;
        env.add_template(AGENT_USER, include_str!("../templates/agent_user.j2"))?;
        env.add_template(REFLECTION, include_str!("../templates/reflection.j2"))?;
        env.add_template(
            ORCHESTRATOR_SYSTEM,
            include_str!("../templates/orchestrator_system.j2"),
        )?;
        env.add_template(
            ORCHESTRATOR_USER,
            include_str!("../templates/orchestrator_user.j2"),
        )?;
        Ok(Self { env })
    }

    fn render<S: Serialize>(&self, template: &str, ctx: &S) -> Result<String, LlmError> {
        Ok(self.env.get_template(template)?.render(ctx)?)
    }

    /// Render the agent's system prompt from its persona and personality.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on render failure.
    pub fn agent_system(
        &self,
        persona: &Persona,
        personality: &Personality,
    ) -> Result<String, LlmError> {
        self.render(
            AGENT_SYSTEM,
            &serde_json::json!({
                "name": persona.name,
                "role": persona.role,
                "location": persona.location,
                "faction": persona.faction,
                "dialogue_style": persona.dialogue_style,
                "personality": personality,
            }),
        )
    }

    /// Render the reactive cycle's user prompt from a context value.
    ///
    /// The caller supplies a serializable context with `perception`,
    /// `vitals`, `mood`, `arousal`, `memories`, `beliefs`, `topics` and
    /// `heard` fields (see `agent_user.j2`).
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on render failure.
    pub fn agent_user<S: Serialize>(&self, ctx: &S) -> Result<String, LlmError> {
        self.render(AGENT_USER, ctx)
    }

    /// Render the autonomous reflection prompt.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on render failure.
    pub fn reflection<S: Serialize>(&self, ctx: &S) -> Result<String, LlmError> {
        self.render(REFLECTION, ctx)
    }

    /// Render the orchestrator's system prompt.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on render failure.
    pub fn orchestrator_system(&self) -> Result<String, LlmError> {
        self.render(ORCHESTRATOR_SYSTEM, &serde_json::json!({}))
    }

    /// Render the orchestrator's user prompt from the group context.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on render failure.
    pub fn orchestrator_user<S: Serialize>(&self, ctx: &S) -> Result<String, LlmError> {
        self.render(ORCHESTRATOR_USER, ctx)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn test_persona() -> Persona {
        Persona {
            name: "Vera".to_owned(),
            role: "gate guard".to_owned(),
            location: "Greyreach Gates".to_owned(),
            dialogue_style: "curt, watchful".to_owned(),
            faction: "guards".to_owned(),
            gender: "female".to_owned(),
        }
    }

    #[test]
    fn system_prompt_contains_identity_and_schema() {
        let engine = PromptEngine::new().unwrap();
        let prompt = engine
            .agent_system(&test_persona(), &Personality::balanced())
            .unwrap();
        assert!(prompt.contains("Vera"));
        assert!(prompt.contains("gate guard"));
        assert!(prompt.contains("internal_reflection"));
        assert!(prompt.contains("Investigate, Flee, Assist, Ignore, Socialize, Guard, Trade"));
    }

    #[test]
    fn user_prompt_renders_context_lists() {
        let engine = PromptEngine::new().unwrap();
        let prompt = engine
            .agent_user(&serde_json::json!({
                "perception": "A stranger approaches the gate.",
                "vitals": {"hunger": 0.25, "fatigue": 0.3},
                "mood": "Calm",
                "arousal": 0.5,
                "memories": [{"kind": "episodic", "content": "A raid last week"}],
                "beliefs": ["The roads are not safe"],
                "topics": [{"clarity": "vivid", "category": "goal", "content": "wants to help"}],
                "heard": ["p1 drew steel on a guard, watch yourself"],
            }))
            .unwrap();
        assert!(prompt.contains("A stranger approaches the gate."));
        assert!(prompt.contains("A raid last week"));
        assert!(prompt.contains("The roads are not safe"));
        assert!(prompt.contains("wants to help"));
        assert!(prompt.contains("watch yourself"));
    }

    #[test]
    fn user_prompt_handles_empty_context() {
        let engine = PromptEngine::new().unwrap();
        let prompt = engine
            .agent_user(&serde_json::json!({
                "perception": "Silence.",
                "vitals": {"hunger": 0.2, "fatigue": 0.3},
                "mood": "Calm",
                "arousal": 0.5,
                "memories": [],
                "beliefs": [],
                "topics": [],
                "heard": [],
            }))
            .unwrap();
        assert!(prompt.contains("No recent memories"));
        assert!(prompt.contains("No established beliefs yet"));
    }

    #[test]
    fn orchestrator_prompts_render() {
        let engine = PromptEngine::new().unwrap();
        let system = engine.orchestrator_system().unwrap();
        assert!(system.contains("next_speakers"));

        let user = engine
            .orchestrator_user(&serde_json::json!({
                "location": "market",
                "tension": 0.4,
                "topic": "general",
                "participants": [
                    {"npc_id": "vera", "role": "listener", "mood": "Calm",
                     "statements": 0, "last_spoke_secs_ago": 999}
                ],
                "history": [],
                "message": "What happened here?",
            }))
            .unwrap();
        assert!(user.contains("What happened here?"));
        assert!(user.contains("vera"));
    }
}
