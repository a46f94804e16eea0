//! EventAssist - natural-language event management
//!
//! CLI entry point: one-shot requests, the chat session, and direct views of
//! the local store.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::FixedOffset;
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use eventassist::chat::{self, ChatSession};
use eventassist::cli::{Cli, Command, ConfigCommand, OutputFormat};
use eventassist::config::Config;
use eventassist::credentials::{ConfigCredentials, CredentialStore};
use eventassist::events::SqliteEventSystem;
use eventassist::intent::Prompt;
use eventassist::llm;
use eventassist::{Assistant, Limits};
use eventstore::{Event, EventQuery, Store, Venue};

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eventassist")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Log to a file so stdout stays clean for summaries and JSON
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("eventassist.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "EventAssist loaded config: provider={}, model={}, store={}",
        config.llm.provider,
        config.llm.model,
        config.store.path.display()
    );

    match cli.command {
        Some(Command::Ask { prompt, format }) => cmd_ask(&config, &prompt.join(" "), format).await,
        Some(Command::Chat) => cmd_chat(&config).await,
        Some(Command::Events { title, format }) => cmd_events(&config, title, format),
        Some(Command::Venues { format }) => cmd_venues(&config, format),
        Some(Command::Config { command }) => match command {
            ConfigCommand::Show => cmd_config_show(&config),
            ConfigCommand::Check => cmd_config_check(&config),
        },
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Wire the pipeline from config
fn build_assistant(config: &Config) -> Result<Assistant> {
    let limits = config.validate().context("Invalid configuration")?;
    let credentials: Arc<dyn CredentialStore> = Arc::new(ConfigCredentials::from_config(&config.llm));
    let client = llm::create_client(&config.llm, Arc::clone(&credentials))
        .map_err(|e| eyre::eyre!("Failed to create completion client: {}", e))?;
    let events = SqliteEventSystem::open(&config.store)
        .map_err(|e| eyre::eyre!("Failed to open event store {}: {}", config.store.path.display(), e))?;
    Assistant::new(limits, client, Arc::new(events), credentials)
}

/// Handle a single request
async fn cmd_ask(config: &Config, prompt: &str, format: OutputFormat) -> Result<()> {
    let assistant = build_assistant(config)?;
    let user = std::env::var("USER").unwrap_or_else(|_| "cli".to_string());
    let response = match assistant.process_prompt(&Prompt::new(prompt).with_user(user)).await {
        Ok(response) => response,
        Err(e) => {
            chat::print_error(&e);
            return Err(eyre::eyre!("Request failed"));
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
        OutputFormat::Text => chat::print_response(&response),
    }
    Ok(())
}

/// Start the interactive session
async fn cmd_chat(config: &Config) -> Result<()> {
    let assistant = build_assistant(config)?;
    let user = std::env::var("USER").unwrap_or_else(|_| "chat".to_string());
    ChatSession::new(assistant, user).run().await
}

/// Open the store without going through the assistant
fn open_store(config: &Config) -> Result<(Store, FixedOffset)> {
    let limits: Limits = config.validate().context("Invalid configuration")?;
    let store = Store::open(&config.store.path)
        .with_context(|| format!("Failed to open event store {}", config.store.path.display()))?;
    Ok((store, limits.timezone))
}

/// List stored events
fn cmd_events(config: &Config, title: Option<String>, format: OutputFormat) -> Result<()> {
    let (store, tz) = open_store(config)?;
    let query = EventQuery {
        title_contains: title,
        ..Default::default()
    };
    let events = store.list_events(&query)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
        OutputFormat::Text => print_events(&events, &tz),
    }
    Ok(())
}

fn print_events(events: &[Event], tz: &FixedOffset) {
    if events.is_empty() {
        println!("{}", "No events.".dimmed());
        return;
    }
    println!("{:<6} {:<18} {:<18} {}", "ID".bold(), "STARTS".bold(), "ENDS".bold(), "TITLE".bold());
    for event in events {
        let venue = event.venue_id.map(|v| format!(" (venue {})", v)).unwrap_or_default();
        println!(
            "{:<6} {:<18} {:<18} {}{}",
            event.id,
            event.starts_at.with_timezone(tz).format("%a %Y-%m-%d %H:%M"),
            event.ends_at.with_timezone(tz).format("%a %m-%d %H:%M"),
            event.title,
            venue.dimmed()
        );
    }
}

/// List stored venues
fn cmd_venues(config: &Config, format: OutputFormat) -> Result<()> {
    let (store, _) = open_store(config)?;
    let venues = store.list_venues()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&venues)?),
        OutputFormat::Text => print_venues(&venues),
    }
    Ok(())
}

fn print_venues(venues: &[Venue]) {
    if venues.is_empty() {
        println!("{}", "No venues.".dimmed());
        return;
    }
    println!("{:<6} {:<24} {:<10} {}", "ID".bold(), "NAME".bold(), "CAPACITY".bold(), "ADDRESS".bold());
    for venue in venues {
        println!(
            "{:<6} {:<24} {:<10} {}",
            venue.id,
            venue.name,
            venue.capacity.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            venue.address.as_deref().unwrap_or("-")
        );
    }
}

/// Print the effective configuration
fn cmd_config_show(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(&config.redacted())?);
    Ok(())
}

/// Verify credentials and limits without calling any service
fn cmd_config_check(config: &Config) -> Result<()> {
    let mut ok = true;

    match config.validate() {
        Ok(limits) => println!(
            "{} limits: timezone UTC{}, up to {} occurrences, up to {} operations per request",
            "ok".green(),
            limits.timezone,
            limits.max_occurrences,
            limits.max_intents
        ),
        Err(e) => {
            ok = false;
            println!("{} {:#}", "error".red(), e);
        }
    }

    let credentials = ConfigCredentials::from_config(&config.llm);
    if credentials.has_api_key() {
        println!("{} API key found", "ok".green());
    } else {
        ok = false;
        println!(
            "{} no API key: set {} or llm.api-key in the config file",
            "error".red(),
            credentials.env_var()
        );
    }

    println!("{} event store: {}", "info".cyan(), config.store.path.display());

    if ok { Ok(()) } else { Err(eyre::eyre!("Configuration check failed")) }
}
