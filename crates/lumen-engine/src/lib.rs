//! Two-stage prompt orchestration: field selection, structured prompt
//! synthesis, then image rendering, driven per conversation turn.

pub mod config;
pub mod conversation;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod gemini;
pub mod instructions;
pub mod renderer;
pub mod selector;
pub mod services;
pub mod session;
pub mod synthesizer;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use conversation::{Conversation, TurnOutcome, TurnPipeline, TurnTicket};
pub use credentials::{CredentialProvider, CredentialState, EnvCredentialProvider};
pub use errors::{EngineError, SessionError};
pub use events::{new_session_id, EventBus, EventPayload};
pub use session::SessionController;
