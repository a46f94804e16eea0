//! EventAssist - natural-language event management
//!
//! An organizer types a request such as "create a monthly book club on the
//! 3rd Tuesday at 7pm for 6 months"; EventAssist turns it into structured
//! operations, checks them, runs them against an event system and reports
//! back what happened to each one.
//!
//! # Pipeline
//!
//! - [`parser`] - one completion-service call per prompt, reply checked against a fixed schema
//! - [`validation`] - per-intent shape rules, no side effects
//! - [`executor`] - runs accepted intents in order against an [`events::EventSystem`]
//! - [`report`] - deterministic summary of every intent's outcome
//! - [`assistant`] - the `process_prompt` entry point tying them together
//!
//! # Supporting modules
//!
//! - [`llm`] - completion client trait and OpenAI implementation
//! - [`credentials`] - API key lookup
//! - [`config`] - configuration types and loading
//! - [`cli`] and [`chat`] - the `ea` command line

pub mod assistant;
pub mod chat;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod events;
pub mod executor;
pub mod intent;
pub mod llm;
pub mod parser;
pub mod prompts;
pub mod report;
pub mod validation;

// Re-export commonly used types
pub use assistant::{Assistant, PipelineError};
pub use config::{Config, Limits, LlmConfig};
pub use credentials::{ConfigCredentials, CredentialStore, StaticCredentials};
pub use events::{EventSystem, EventSystemError, SqliteEventSystem};
pub use executor::{Effect, ExecutionResult};
pub use intent::{Intent, Prompt, Turn};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, OpenAIClient};
pub use parser::ParseError;
pub use report::{AssistantResponse, IntentOutcome};
pub use validation::{Rejection, ValidationResult};
