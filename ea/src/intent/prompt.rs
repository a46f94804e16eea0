//! Prompt input

use serde::{Deserialize, Serialize};

/// One natural-language request plus the turns that came before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    /// Who submitted it; used for log correlation only
    pub user: String,
    /// Earlier turns of the same session, oldest first
    #[serde(default)]
    pub prior: Vec<Turn>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user: "anonymous".to_string(),
            prior: Vec::new(),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_prior(mut self, prior: Vec<Turn>) -> Self {
        self.prior = prior;
        self
    }

    /// True when there is nothing to act on
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A completed exchange in a multi-turn session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub prompt: String,
    /// What the assistant answered, as intents in the reply schema
    pub reply: String,
}

impl Turn {
    pub fn new(prompt: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reply: reply.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_builder() {
        let prompt = Prompt::new("List all my venues")
            .with_user("organizer")
            .with_prior(vec![Turn::new("hi", "nothing to do")]);
        assert_eq!(prompt.user, "organizer");
        assert_eq!(prompt.prior.len(), 1);
        assert!(!prompt.is_blank());
    }

    #[test]
    fn test_blank_prompt() {
        assert!(Prompt::new("  \n\t").is_blank());
    }
}
