pub mod chat;
pub mod commands;

use std::{io, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use eyre::{Context, Result};

use crate::{
    backend::new_backend,
    config::{self, Configuration, load_configuration, lookup_config_path},
    session::{SessionController, SessionOptions},
    storage::new_storage,
    voice::{new_recognizer, new_speaker},
};

#[derive(Debug, Parser)]
#[command(
    version,
    about,
    long_about = r#"Chat with OpenAI-compatible models from the terminal, keep every
conversation on disk and export it as text, JSON, CSV, HTML or PDF.

Default configuration file location looks up in the following order:
    * $XDG_CONFIG_HOME/chatpress/config.toml
    * $HOME/.config/chatpress/config.toml
    * $HOME/.chatpress.toml
"#,
    disable_version_flag = true
)]
pub struct Command {
    /// Configuration file path
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<String>,

    /// Show the version
    #[arg(short, long)]
    version: bool,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Action {
    /// Start an interactive chat (default)
    Chat {
        /// Resume or create the conversation with this id
        #[arg(long)]
        id: Option<String>,

        /// Model to use instead of backend.default_model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List stored conversations, most recent first
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Print a stored conversation
    Show { id: String },

    /// Export a stored conversation to a file
    Export {
        id: String,

        /// txt, json, csv, html or pdf
        #[arg(short, long)]
        format: String,

        /// Output directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Delete a stored conversation
    Delete { id: String },

    /// Search message contents
    Search {
        query: String,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show statistics over all stored conversations
    Stats,

    /// Delete conversations created more than N days ago
    Cleanup {
        #[arg(long)]
        days: u32,
    },
}

impl Command {
    pub fn new() -> Command {
        Self::parse()
    }

    pub fn get_config(&self) -> Result<Configuration> {
        let config_path = self
            .config
            .clone()
            .unwrap_or_else(|| lookup_config_path().unwrap_or_default());

        if config_path.is_empty() {
            // No config path is specified just use the default config
            return Ok(Configuration::default());
        }
        load_configuration(config_path.as_str()).wrap_err("loading configuration")
    }

    pub fn version(&self) -> bool {
        self.version
    }

    pub fn print_version(&self) {
        println!("{}", config::version())
    }

    pub fn action(&self) -> Action {
        self.action.clone().unwrap_or(Action::Chat {
            id: None,
            model: None,
        })
    }
}

pub async fn run(action: Action, config: Configuration) -> Result<()> {
    let storage = new_storage(&config.storage).wrap_err("initializing storage")?;
    let mut out = io::stdout();

    match action {
        Action::Chat { id, model } => {
            let backend = new_backend(&config.backend).wrap_err("initializing backend")?;

            let mut options = SessionOptions::from(&config);
            if let Some(model) = model {
                options.model = model;
            }

            let mut session = SessionController::new(backend, storage, options);
            if let Some(speaker) = new_speaker(&config.voice) {
                session = session.with_speaker(speaker);
            }
            if let Some(recognizer) = new_recognizer(&config.voice) {
                session = session.with_recognizer(recognizer);
            }

            let session = Arc::new(session);
            if let Some(id) = id {
                chat::resume(&session, &id).await?;
            }
            chat::run(&session, config.general.hello_message.as_deref()).await
        }
        Action::List { limit } => commands::list(&*storage, limit, &mut out).await,
        Action::Show { id } => commands::show(&*storage, &id, &mut out).await,
        Action::Export { id, format, output } => {
            commands::export(&*storage, &id, &format, &output, &mut out).await
        }
        Action::Delete { id } => commands::delete(&*storage, &id, &mut out).await,
        Action::Search { query, limit } => {
            commands::search(&*storage, &query, limit, &mut out).await
        }
        Action::Stats => commands::stats(&*storage, &mut out).await,
        Action::Cleanup { days } => commands::cleanup(&*storage, days, &mut out).await,
    }
}
