//! Prompt pipeline entry point
//!
//! `Assistant::process_prompt` is the one call a front end makes: parse,
//! validate, execute, report. Parser failures end the request with a single
//! error; everything after parsing is reported per intent.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Limits;
use crate::credentials::CredentialStore;
use crate::events::EventSystem;
use crate::executor::Executor;
use crate::intent::Prompt;
use crate::llm::LlmClient;
use crate::parser::{ParseError, Parser};
use crate::report::{AssistantResponse, IntentOutcome, Reporter};
use crate::validation::{SequenceContext, ValidationResult, Validator};

/// Request-level failures; nothing was executed when one of these is returned
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Prompt is required")]
    EmptyPrompt,

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Parse(ParseError::Timeout(_)))
    }
}

/// Natural-language front end to an event system
pub struct Assistant {
    limits: Limits,
    parser: Parser,
    validator: Validator,
    reporter: Reporter,
    events: Arc<dyn EventSystem>,
    credentials: Arc<dyn CredentialStore>,
}

impl Assistant {
    pub fn new(
        limits: Limits,
        llm: Arc<dyn LlmClient>,
        events: Arc<dyn EventSystem>,
        credentials: Arc<dyn CredentialStore>,
    ) -> eyre::Result<Self> {
        debug!(?limits, "Assistant::new: called");
        Ok(Self {
            parser: Parser::new(llm, limits.clone())?,
            validator: Validator::new(limits.clone()),
            reporter: Reporter::new(limits.timezone),
            limits,
            events,
            credentials,
        })
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Handle one prompt at the current time
    pub async fn process_prompt(&self, prompt: &Prompt) -> Result<AssistantResponse, PipelineError> {
        let now = Utc::now().with_timezone(&self.limits.timezone);
        self.process_prompt_at(prompt, now).await
    }

    /// Handle one prompt as if it were made at `now`
    pub async fn process_prompt_at(
        &self,
        prompt: &Prompt,
        now: DateTime<FixedOffset>,
    ) -> Result<AssistantResponse, PipelineError> {
        let request_id = Uuid::now_v7().to_string();
        debug!(%request_id, user = %prompt.user, %now, "Assistant::process_prompt_at: called");

        if !self.credentials.has_api_key() {
            warn!(%request_id, "Assistant::process_prompt_at: no API key configured");
            return Err(PipelineError::Configuration(
                "no API key configured for the completion service".to_string(),
            ));
        }
        if prompt.is_blank() {
            return Err(PipelineError::EmptyPrompt);
        }

        let intents = self.parser.parse(prompt, now).await.map_err(|e| {
            warn!(%request_id, error = %e, "Assistant::process_prompt_at: parse failed");
            if e.is_missing_credentials() {
                PipelineError::Configuration(e.to_string())
            } else {
                PipelineError::Parse(e)
            }
        })?;

        let mut executor = Executor::new(Arc::clone(&self.events), self.limits.clone());
        let mut entries = Vec::with_capacity(intents.len());
        for (index, intent) in intents.iter().enumerate() {
            let validation = self.validator.validate(intent, &SequenceContext::new(index, &intents));
            let execution = match validation {
                ValidationResult::Accepted => Some(executor.execute(index, intent).await),
                ValidationResult::Rejected(_) => None,
            };
            entries.push(IntentOutcome {
                index,
                intent: intent.clone(),
                validation,
                execution,
            });
        }

        let response = self.reporter.report(request_id.clone(), entries);
        info!(
            %request_id,
            intents = %response.entries.len(),
            all_succeeded = %response.all_succeeded(),
            "Assistant::process_prompt_at: done"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::events::mock::ScriptedEventSystem;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use crate::validation::Rejection;
    use chrono::TimeZone;
    use std::time::Duration;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 18, 9, 0, 0)
            .unwrap()
    }

    fn assistant(llm: Arc<MockLlmClient>, limits: Limits) -> Assistant {
        Assistant::new(
            limits,
            llm,
            Arc::new(ScriptedEventSystem::new()),
            Arc::new(StaticCredentials::new("sk-test")),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let llm = Arc::new(MockLlmClient::replying(r#"{"intents":[]}"#));
        let assistant = Assistant::new(
            Limits::default(),
            llm.clone(),
            Arc::new(ScriptedEventSystem::new()),
            Arc::new(StaticCredentials::none()),
        )
        .unwrap();
        let err = assistant.process_prompt_at(&Prompt::new("list venues"), now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_prompt_rejected() {
        let llm = Arc::new(MockLlmClient::new(vec![]));
        let err = assistant(llm.clone(), Limits::default())
            .process_prompt_at(&Prompt::new("   "), now())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyPrompt));
        assert_eq!(err.to_string(), "Prompt is required");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_single_error() {
        let llm = Arc::new(MockLlmClient::new(vec![MockReply::Slow(
            Duration::from_secs(5),
            r#"{"intents":[{"kind":"list_venues"}]}"#.to_string(),
        )]));
        let limits = Limits {
            completion_timeout: Duration::from_millis(30),
            ..Limits::default()
        };
        let err = assistant(llm, limits).process_prompt_at(&Prompt::new("x"), now()).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_rejected_intent_not_executed() {
        let llm = Arc::new(MockLlmClient::replying(
            r#"{"intents":[
                {"kind":"create_event","title":"Standup","start":"2026-10-19T09:00",
                 "recurrence":{"frequency":"daily","count":400}},
                {"kind":"list_venues"}]}"#,
        ));
        let response = assistant(llm, Limits::default())
            .process_prompt_at(&Prompt::new("x"), now())
            .await
            .unwrap();
        assert_eq!(response.entries.len(), 2);
        assert_eq!(
            response.entries[0].validation,
            ValidationResult::Rejected(Rejection::ExceedsRecurrenceLimit { requested: 400, max: 52 })
        );
        assert!(response.entries[0].execution.is_none());
        assert!(response.entries[1].succeeded());
        assert!(response.summary.contains("400 occurrences requested, the limit is 52"));
    }

    #[tokio::test]
    async fn test_request_ids_are_unique() {
        let llm = Arc::new(MockLlmClient::new(vec![
            MockReply::Text(r#"{"intents":[]}"#.to_string()),
            MockReply::Text(r#"{"intents":[]}"#.to_string()),
        ]));
        let assistant = assistant(llm, Limits::default());
        let a = assistant.process_prompt_at(&Prompt::new("x"), now()).await.unwrap();
        let b = assistant.process_prompt_at(&Prompt::new("y"), now()).await.unwrap();
        assert_ne!(a.request_id, b.request_id);
    }
}
