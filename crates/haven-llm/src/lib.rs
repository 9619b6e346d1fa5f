//! Language-model boundary for the Haven NPC runtime.
//!
//! Everything that touches a model goes through this crate: backend
//! dispatch over HTTP ([`backend`]), prompt rendering from embedded
//! templates ([`prompt`]), and schema-validated decoding of responses
//! with graceful degradation ([`parse`]).
//!
//! The rest of the workspace never sees raw model text -- it sees a
//! validated [`haven_types::CognitiveFrame`] or the fallback frame.

pub mod backend;
pub mod error;
pub mod parse;
pub mod prompt;

pub use backend::{BackendConfig, BackendKind, LlmBackend};
pub use error::LlmError;
pub use parse::{
    fallback_frame, parse_cognitive_frame, parse_orchestration, OrchestratorDecision,
    SpeakerChoice,
};
pub use prompt::{PromptEngine, RenderedPrompt};
