//! # arbor
//!
//! Operator CLI for the Arbor branching engine. Every command prints JSON on
//! stdout; logs go to stderr.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use arbor_core::{ConversationId, MessageId, NewMessage, Role};
use arbor_settings::{ArborSettings, load_settings, load_settings_from_path};
use arbor_store::{BranchStore, ListOptions};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::debug;

/// Arbor conversation branching engine.
#[derive(Parser, Debug)]
#[command(name = "arbor", version, about = "Inspect and steer branching conversations")]
struct Cli {
    /// Settings file (defaults to `~/.arbor/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Database path (overrides settings and `ARBOR_DB_PATH`).
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and apply migrations.
    Init,
    /// Start a new conversation.
    New {
        /// Optional title.
        #[arg(long)]
        title: Option<String>,
    },
    /// Append a turn to the active branch.
    Append {
        /// Conversation ID.
        conversation: String,
        /// Turn text.
        content: String,
        /// Author role.
        #[arg(long, default_value = "user")]
        role: Role,
    },
    /// List conversations, most recently updated first.
    Conversations {
        /// Maximum number to list.
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show a conversation's branches.
    Branches {
        /// Conversation ID.
        conversation: String,
    },
    /// Switch the active branch (omit the name for the main line).
    Switch {
        /// Conversation ID.
        conversation: String,
        /// Branch name.
        branch: Option<String>,
    },
    /// Fork a new branch from a message.
    Fork {
        /// Conversation ID.
        conversation: String,
        /// Message to fork from.
        from: String,
        /// New branch name.
        name: String,
        /// First turn on the branch.
        content: String,
    },
    /// Print the root-to-message path.
    Path {
        /// Message ID.
        message: String,
    },
    /// List branch points (messages with children).
    Points {
        /// Conversation ID.
        conversation: String,
    },
    /// Print the active branch's linear history.
    Transcript {
        /// Conversation ID.
        conversation: String,
    },
}

fn load(cli: &Cli) -> Result<ArborSettings> {
    let mut settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => load_settings().context("failed to load settings")?,
    };
    if let Some(db_path) = &cli.db_path {
        settings.database.path.clone_from(db_path);
        settings.validate().context("invalid --db-path")?;
    }
    Ok(settings)
}

fn run(cli: &Cli, store: &BranchStore) -> Result<Value> {
    let output = match &cli.command {
        Command::Init => json!({ "database": "ready" }),
        Command::New { title } => json!(store.create_conversation(title.as_deref())?),
        Command::Append {
            conversation,
            content,
            role,
        } => {
            let message = NewMessage {
                role: *role,
                content: content.clone(),
                ..Default::default()
            };
            json!(store.append_to_active(&ConversationId::from_raw(conversation.as_str()), &message)?)
        }
        Command::Conversations { limit } => json!(store.list_conversations(ListOptions {
            limit: *limit,
            offset: None,
        })?),
        Command::Branches { conversation } => {
            let id = ConversationId::from_raw(conversation.as_str());
            let conv = store.get_conversation(&id)?;
            json!({
                "activeBranch": conv.active().to_string(),
                "branches": store.list_branches(&id)?,
            })
        }
        Command::Switch {
            conversation,
            branch,
        } => json!(store.switch_active(
            &ConversationId::from_raw(conversation.as_str()),
            branch.as_deref()
        )?),
        Command::Fork {
            conversation,
            from,
            name,
            content,
        } => json!(store.create_branch(&arbor_store::CreateBranchOptions {
            conversation_id: &ConversationId::from_raw(conversation.as_str()),
            from_message_id: &MessageId::from_raw(from.as_str()),
            branch_name: name,
            message: &NewMessage::user(content.as_str()),
        })?),
        Command::Path { message } => {
            json!(store.resolve_path(&MessageId::from_raw(message.as_str()))?)
        }
        Command::Points { conversation } => {
            json!(store.list_branch_points(&ConversationId::from_raw(conversation.as_str()))?)
        }
        Command::Transcript { conversation } => {
            json!(store.active_transcript(&ConversationId::from_raw(conversation.as_str()))?)
        }
    };
    Ok(output)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = arbor_logging::with_startup_logging(|| load(&cli))?;
    let _ = arbor_logging::init_logging(&settings.logging);
    debug!(db_path = %settings.database.path, "opening store");

    let store = BranchStore::open(&settings.database)
        .with_context(|| format!("failed to open database at {}", settings.database.path))?;
    let output = run(&cli, &store)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
