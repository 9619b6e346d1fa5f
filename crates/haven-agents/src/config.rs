//! Tunable parameters of the agent runtime.

use std::time::Duration;

/// Configuration of one agent's runtime loops.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Wall time between autonomous reflections.
    pub reflection_interval: Duration,
    /// Fraction of the computed think time actually slept.
    pub think_time_scale: f64,
    /// Deadline for any single model call.
    pub llm_timeout: Duration,
    /// Probability a rumor is authored after an interaction.
    pub rumor_probability: f64,
    /// How many recent memories feed a reactive cycle.
    pub memory_context: u32,
    /// How many beliefs feed a reactive cycle.
    pub belief_context: u32,
    /// How many relevant topics feed a reactive cycle.
    pub topic_context: usize,
    /// Strength of the episodic memory stored per player action.
    pub action_memory_strength: f64,
    /// Strength of beliefs produced by reflection.
    pub reflection_belief_strength: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            reflection_interval: Duration::from_secs(300),
            think_time_scale: 0.1,
            llm_timeout: Duration::from_secs(30),
            rumor_probability: 0.3,
            memory_context: 3,
            belief_context: 3,
            topic_context: 5,
            action_memory_strength: 0.6,
            reflection_belief_strength: 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AgentConfig::default();
        assert_eq!(config.reflection_interval, Duration::from_secs(300));
        assert_eq!(config.llm_timeout, Duration::from_secs(30));
        assert!((config.think_time_scale - 0.1).abs() < f64::EPSILON);
        assert!((config.rumor_probability - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.memory_context, 3);
        assert_eq!(config.belief_context, 3);
        assert_eq!(config.topic_context, 5);
        assert!((0.0..=1.0).contains(&config.action_memory_strength));
        assert!((0.0..=1.0).contains(&config.reflection_belief_strength));
    }
}
