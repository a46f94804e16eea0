//! Intent parsing
//!
//! Turns one free-text prompt into an ordered list of intents with a single
//! call to the completion service. The reply must match the JSON schema the
//! service is instructed with; anything else fails the whole prompt.

mod dates;
mod wire;

pub use dates::{parse_time_of_day, parse_weekday, resolve as resolve_date};
pub use wire::render_reply;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Limits;
use crate::intent::{Intent, Prompt, VenueRef};
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, StopReason};
use crate::prompts::{PromptLoader, SchemaContext};

/// Token ceiling for one reply; the client caps this further by its own config
const REPLY_MAX_TOKENS: u32 = 4096;

/// Why a prompt could not be turned into intents
#[derive(Debug, Error)]
pub enum ParseError {
    /// The completion service failed or could not be reached
    #[error("Completion service failed: {0}")]
    ParseFailure(#[source] LlmError),

    #[error("Reply did not match the intent schema: {0}")]
    SchemaViolation(String),

    #[error("Completion service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Failed to build instructions: {0}")]
    Template(String),
}

impl ParseError {
    /// True when the failure means no API key is configured
    pub fn is_missing_credentials(&self) -> bool {
        matches!(self, ParseError::ParseFailure(LlmError::MissingApiKey))
    }
}

/// Prompt to intent translation
pub struct Parser {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    limits: Limits,
}

impl Parser {
    pub fn new(llm: Arc<dyn LlmClient>, limits: Limits) -> eyre::Result<Self> {
        debug!(max_intents = %limits.max_intents, "Parser::new: called");
        Ok(Self {
            llm,
            prompts: PromptLoader::new()?,
            limits,
        })
    }

    /// Parse a prompt made at `now`
    ///
    /// Returns intents in the order the prompt asked for them; an empty list
    /// is a valid answer for prompts that ask for nothing actionable.
    pub async fn parse(&self, prompt: &Prompt, now: DateTime<FixedOffset>) -> Result<Vec<Intent>, ParseError> {
        debug!(%now, prior_turns = %prompt.prior.len(), "Parser::parse: called");
        let request = self.build_request(prompt, now)?;
        let reply = self.complete(request).await?;
        let intents = self.interpret(&reply, now)?;
        info!(count = %intents.len(), "Parser::parse: parsed intents");
        Ok(intents)
    }

    fn build_request(&self, prompt: &Prompt, now: DateTime<FixedOffset>) -> Result<CompletionRequest, ParseError> {
        debug!("Parser::build_request: called");
        let system_prompt = self
            .prompts
            .intent_schema(&SchemaContext::new(now, &self.limits))
            .map_err(|e| ParseError::Template(e.to_string()))?;

        let mut messages = Vec::with_capacity(prompt.prior.len() * 2 + 1);
        for turn in &prompt.prior {
            messages.push(Message::user(turn.prompt.clone()));
            messages.push(Message::assistant(turn.reply.clone()));
        }
        messages.push(Message::user(prompt.text.clone()));

        Ok(CompletionRequest {
            system_prompt,
            messages,
            max_tokens: REPLY_MAX_TOKENS,
            json_mode: true,
        })
    }

    /// Call the service under the completion timeout, retrying one transient failure
    async fn complete(&self, request: CompletionRequest) -> Result<String, ParseError> {
        let limit = self.limits.completion_timeout;
        debug!(?limit, "Parser::complete: called");
        match tokio::time::timeout(limit, self.complete_with_retry(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(?limit, "Parser::complete: timed out");
                Err(ParseError::Timeout(limit))
            }
        }
    }

    async fn complete_with_retry(&self, request: CompletionRequest) -> Result<String, ParseError> {
        let mut retried = false;
        loop {
            match self.llm.complete(request.clone()).await {
                Ok(response) => {
                    if response.stop_reason == StopReason::MaxTokens {
                        return Err(ParseError::SchemaViolation("reply was cut off at the token limit".to_string()));
                    }
                    return response
                        .content
                        .filter(|c| !c.trim().is_empty())
                        .ok_or_else(|| ParseError::SchemaViolation("reply was empty".to_string()));
                }
                Err(e) if e.is_transient() && self.limits.retry_transient && !retried => {
                    warn!(error = %e, "Parser::complete_with_retry: transient failure, retrying once");
                    retried = true;
                }
                Err(LlmError::Timeout(elapsed)) => return Err(ParseError::Timeout(elapsed)),
                Err(e) => return Err(ParseError::ParseFailure(e)),
            }
        }
    }

    /// Check a raw reply against the schema and convert it
    pub fn interpret(&self, reply: &str, now: DateTime<FixedOffset>) -> Result<Vec<Intent>, ParseError> {
        debug!(len = %reply.len(), "Parser::interpret: called");
        let body = strip_code_fence(reply);
        let parsed: wire::WireReply =
            serde_json::from_str(body).map_err(|e| ParseError::SchemaViolation(e.to_string()))?;

        if parsed.intents.len() > self.limits.max_intents {
            return Err(ParseError::SchemaViolation(format!(
                "{} operations exceeds the limit of {}",
                parsed.intents.len(),
                self.limits.max_intents
            )));
        }

        let mut intents = Vec::with_capacity(parsed.intents.len());
        for (index, item) in parsed.intents.into_iter().enumerate() {
            let intent = item
                .into_intent(now)
                .map_err(|e| ParseError::SchemaViolation(format!("operation {}: {}", index + 1, e)))?;
            intents.push(align_recurrence(intent));
        }
        link_venue_names(&mut intents);
        Ok(intents)
    }
}

/// Point a venue named by an earlier `create_venue` in the same prompt at that
/// operation, so the event waits on it instead of looking the name up
fn link_venue_names(intents: &mut [Intent]) {
    for index in 1..intents.len() {
        let (earlier, rest) = intents.split_at_mut(index);
        let Some(reference) = rest[0].venue_ref_mut() else {
            continue;
        };
        let VenueRef::Named(name) = &*reference else {
            continue;
        };
        let wanted = name.trim().to_lowercase();
        let source = earlier
            .iter()
            .rposition(|i| matches!(i, Intent::CreateVenue(v) if v.name.trim().to_lowercase() == wanted));
        if let Some(source) = source {
            debug!(%index, %source, "link_venue_names: named venue created earlier in prompt");
            *reference = VenueRef::Intent(source);
        }
    }
}

/// Move a series' first occurrence onto its first matching day, shifting the end with it
fn align_recurrence(intent: Intent) -> Intent {
    let Intent::CreateEvent(mut event) = intent else {
        return intent;
    };
    if let Some(rule) = &event.recurrence
        && rule.shape_error().is_none()
        && let Some(start) = event.start.as_ref().and_then(|s| s.resolved())
    {
        let aligned = rule.align(start);
        if aligned != start {
            debug!(%start, %aligned, "align_recurrence: moved first occurrence");
            let shift = aligned - start;
            event.start = Some(crate::intent::DateSpec::At(aligned));
            if let Some(end) = event.end.as_ref().and_then(|e| e.resolved())
                && let Some(moved) = end.checked_add_signed(shift)
            {
                event.end = Some(crate::intent::DateSpec::At(moved));
            }
        }
    }
    Intent::CreateEvent(event)
}

/// Models sometimes wrap JSON in a markdown fence despite json mode
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
