//! Prompt Loader
//!
//! Compiles the embedded templates once and renders them per request.

use chrono::{DateTime, FixedOffset};
use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::config::Limits;
use crate::intent::IntentKind;

/// Values substituted into the intent schema
#[derive(Debug, Clone, Serialize)]
pub struct SchemaContext {
    pub today: String,
    pub weekday: String,
    pub now: String,
    pub offset: String,
    pub max_occurrences: u32,
    pub max_intents: usize,
    pub kinds: Vec<&'static str>,
}

impl SchemaContext {
    /// Build the context for a request made at `now`
    pub fn new(now: DateTime<FixedOffset>, limits: &Limits) -> Self {
        Self {
            today: now.format("%Y-%m-%d").to_string(),
            weekday: now.format("%A").to_string(),
            now: now.format("%H:%M").to_string(),
            offset: now.format("%:z").to_string(),
            max_occurrences: limits.max_occurrences,
            max_intents: limits.max_intents,
            kinds: IntentKind::ALL.iter().map(|k| k.as_str()).collect(),
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
}

impl PromptLoader {
    /// Compile the embedded templates
    pub fn new() -> Result<Self> {
        debug!("PromptLoader::new: called");
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        // Output goes to a model, not a browser
        hbs.register_escape_fn(handlebars::no_escape);
        hbs.register_template_string(embedded::INTENT_SCHEMA_NAME, embedded::INTENT_SCHEMA)
            .map_err(|e| eyre!("Failed to compile intent schema template: {}", e))?;
        Ok(Self { hbs })
    }

    /// Render the intent schema system prompt
    pub fn intent_schema(&self, ctx: &SchemaContext) -> Result<String> {
        debug!(today = %ctx.today, offset = %ctx.offset, "PromptLoader::intent_schema: called");
        self.hbs
            .render(embedded::INTENT_SCHEMA_NAME, ctx)
            .map_err(|e| eyre!("Failed to render intent schema: {}", e))
    }
}
