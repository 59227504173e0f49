//! Command-line access to a bridge store directory.
//!
//! The live connection needs a protocol client and runs inside the host
//! process; this binary only reads and maintains what the bridge persisted.

mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;
use wa_bridge_core::models::{ChatSort, MessageFilter};
use wa_bridge_core::{diagnostics, BridgeConfig};

#[derive(Parser, Debug)]
#[command(name = "wa-bridge")]
#[command(about = "Inspect and maintain a messaging bridge store")]
struct Args {
    /// Directory holding messages.db and whatsapp.db. Defaults to ./store.
    #[arg(long, env = "WA_BRIDGE_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List chats, most recently active first.
    Chats {
        #[arg(long)]
        filter: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        by_name: bool,
    },
    /// Show one chat with its latest message.
    Chat { jid: String },
    /// Newest messages of a chat.
    Messages {
        jid: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Messages surrounding one message.
    Context {
        chat: String,
        id: String,
        #[arg(long, default_value_t = 5)]
        before: i64,
        #[arg(long, default_value_t = 5)]
        after: i64,
    },
    /// Messages across chats, narrowed by time window, sender, chat and text.
    Find {
        /// RFC 3339 timestamp; only newer messages.
        #[arg(long)]
        after: Option<String>,
        /// RFC 3339 timestamp; only older messages.
        #[arg(long)]
        before: Option<String>,
        /// Sender JID or phone number.
        #[arg(long)]
        sender: Option<String>,
        #[arg(long)]
        chat: Option<String>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        page: i64,
    },
    /// Chats, latest message and nickname for one contact.
    Contact {
        jid: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        page: i64,
    },
    /// Manage local contact nicknames.
    Nickname {
        #[command(subcommand)]
        action: NicknameAction,
    },
    Search {
        query: String,
        #[arg(long)]
        chat: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Download metadata for a media message.
    Media { chat: String, id: String },
    /// Check a downloaded file against the stored length and hash.
    VerifyMedia {
        chat: String,
        id: String,
        file: PathBuf,
    },
    Stats,
    /// Show whether a device is paired.
    Device,
    /// Fill the store with demo chats.
    SeedDemo {
        #[arg(long, default_value_t = 5)]
        chats: i64,
        #[arg(long, default_value_t = 40)]
        messages: i64,
    },
}

#[derive(Subcommand, Debug)]
enum NicknameAction {
    Set { jid: String, nickname: String },
    Get { jid: String },
    Remove { jid: String },
    List,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args, config: &BridgeConfig) -> anyhow::Result<serde_json::Value> {
    let output = match args.command {
        Command::Chats {
            filter,
            limit,
            offset,
            by_name,
        } => {
            let sort = if by_name { ChatSort::Name } else { ChatSort::LastActive };
            commands::chats(config, filter.as_deref(), limit, offset, sort)?
        }
        Command::Chat { jid } => commands::chat(config, &jid)?,
        Command::Messages { jid, limit } => commands::messages(config, &jid, limit)?,
        Command::Context {
            chat,
            id,
            before,
            after,
        } => commands::context(config, &chat, &id, before, after)?,
        Command::Find {
            after,
            before,
            sender,
            chat,
            query,
            limit,
            page,
        } => {
            let filter = MessageFilter {
                after: after.as_deref().map(commands::parse_timestamp).transpose()?,
                before: before.as_deref().map(commands::parse_timestamp).transpose()?,
                sender,
                chat_jid: chat,
                query,
                limit,
                page,
            };
            commands::find(config, &filter)?
        }
        Command::Contact { jid, limit, page } => commands::contact(config, &jid, limit, page)?,
        Command::Nickname { action } => match action {
            NicknameAction::Set { jid, nickname } => commands::set_nickname(config, &jid, &nickname)?,
            NicknameAction::Get { jid } => commands::get_nickname(config, &jid)?,
            NicknameAction::Remove { jid } => commands::remove_nickname(config, &jid)?,
            NicknameAction::List => commands::list_nicknames(config)?,
        },
        Command::Search {
            query,
            chat,
            limit,
            offset,
        } => commands::search(config, &query, chat.as_deref(), limit, offset)?,
        Command::Media { chat, id } => commands::media(config, &chat, &id)?,
        Command::VerifyMedia { chat, id, file } => commands::verify_media(config, &chat, &id, &file)?,
        Command::Stats => commands::stats(config)?,
        Command::Device => commands::device(config)?,
        Command::SeedDemo { chats, messages } => commands::seed_demo(config, chats, messages)?,
    };
    Ok(output)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let mut config = BridgeConfig::from_env().context("reading environment")?;
    if let Some(dir) = args.store_dir.clone() {
        config.store_dir = dir;
    }

    match run(args, &config) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "command failed");
            let _ = diagnostics::log_event(&config.log_dir(), "command_error", &format!("{:#}", err));
            Err(err)
        }
    }
}
