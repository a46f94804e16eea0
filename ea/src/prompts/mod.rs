//! Instruction prompts for the completion service
//!
//! The intent schema is a Handlebars template compiled into the binary and
//! rendered per request with the current date and limits.

mod embedded;
mod loader;

pub use loader::{PromptLoader, SchemaContext};
