//! Interactive chat session
//!
//! Each line the user types is one prompt. Earlier prompts and the intents they
//! produced travel with the next request so follow-ups like "move it to 8pm" resolve.

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

use crate::assistant::{Assistant, PipelineError};
use crate::intent::{Prompt, Turn};
use crate::parser::render_reply;
use crate::report::AssistantResponse;

/// Turns kept as context; older ones are dropped first
const MAX_CONTEXT_TURNS: usize = 10;

/// Interactive session over one assistant
pub struct ChatSession {
    assistant: Assistant,
    user: String,
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new(assistant: Assistant, user: impl Into<String>) -> Self {
        Self {
            assistant,
            user: user.into(),
            turns: Vec::new(),
        }
    }

    /// Earlier turns that will accompany the next prompt
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Run the read-eval-print loop until /quit or Ctrl+D
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            match rl.readline(&format!("{} ", ">".bright_green())) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(input);

                    if input.starts_with('/') {
                        match self.handle_slash_command(input) {
                            SlashResult::Continue => continue,
                            SlashResult::Quit => break,
                        }
                    } else {
                        self.submit(input).await;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    /// Send one prompt with the session context and print the outcome
    pub async fn submit(&mut self, input: &str) -> Option<AssistantResponse> {
        debug!(turns = %self.turns.len(), "ChatSession::submit: called");
        let prompt = Prompt::new(input)
            .with_user(self.user.clone())
            .with_prior(self.turns.clone());

        match self.assistant.process_prompt(&prompt).await {
            Ok(response) => {
                print_response(&response);
                let reply = render_reply(response.entries.iter().map(|e| &e.intent));
                self.remember(Turn::new(input, reply));
                Some(response)
            }
            Err(e) => {
                warn!(error = %e, "ChatSession::submit: request failed");
                print_error(&e);
                None
            }
        }
    }

    fn remember(&mut self, turn: Turn) {
        self.turns.push(turn);
        if self.turns.len() > MAX_CONTEXT_TURNS {
            let excess = self.turns.len() - MAX_CONTEXT_TURNS;
            self.turns.drain(..excess);
        }
    }

    fn print_welcome(&self) {
        let limits = self.assistant.limits();
        println!();
        println!("{}", "EventAssist".bright_cyan().bold());
        println!(
            "Times are in UTC{}; a series may have at most {} occurrences.",
            limits.timezone, limits.max_occurrences
        );
        println!("Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
        println!();
    }

    fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let cmd = input.split_whitespace().next().unwrap_or("");
        match cmd {
            "/help" | "/h" => {
                print_help();
                SlashResult::Continue
            }
            "/quit" | "/q" | "/exit" => SlashResult::Quit,
            "/clear" | "/c" => {
                self.turns.clear();
                println!("{}", "Conversation cleared.".dimmed());
                SlashResult::Continue
            }
            "/history" => {
                self.print_history();
                SlashResult::Continue
            }
            _ => {
                println!("{} Unknown command: {}", "?".yellow(), cmd);
                println!("Type {} for available commands", "/help".yellow());
                SlashResult::Continue
            }
        }
    }

    fn print_history(&self) {
        if self.turns.is_empty() {
            println!("{}", "No conversation history.".dimmed());
            return;
        }
        println!();
        for (i, turn) in self.turns.iter().enumerate() {
            let preview: String = turn.prompt.chars().take(60).collect();
            println!("  {}. {}", i + 1, preview);
        }
        println!();
    }
}

fn print_help() {
    println!();
    println!("{}", "Available Commands:".bright_cyan());
    println!("  {:14} Show this help", "/help".yellow());
    println!("  {:14} Exit the session", "/quit".yellow());
    println!("  {:14} Forget earlier requests", "/clear".yellow());
    println!("  {:14} Show earlier requests", "/history".yellow());
    println!();
    println!("{}", "Try:".bright_cyan());
    println!("  create a venue called Main Hall at 12 Elm St, capacity 200");
    println!("  create a monthly book club on the 3rd Tuesday at 7pm for 6 months at Main Hall");
    println!("  move all Book Club events from 7pm to 8pm");
    println!("  list events next week");
    println!();
}

/// Print a response summary, colouring each entry by outcome
pub fn print_response(response: &AssistantResponse) {
    let lines: Vec<&str> = response.summary.lines().collect();
    let Some((tally, body)) = lines.split_last() else {
        return;
    };
    if response.entries.is_empty() {
        println!("{}", tally.dimmed());
        return;
    }
    for line in body {
        if line.contains(": rejected") || line.contains(": failed") {
            println!("{}", line.red());
        } else if line.contains(": skipped") {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
    if response.all_succeeded() {
        println!("{}", tally.green());
    } else {
        println!("{}", tally.yellow());
    }
}

/// Print a request-level failure
pub fn print_error(err: &PipelineError) {
    eprintln!("{} {}", "Error:".red().bold(), err);
    if let PipelineError::Configuration(_) = err {
        eprintln!("Run {} to see where the API key is read from.", "ea config check".yellow());
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Quit,
}
