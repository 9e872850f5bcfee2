//! Line based interactive chat.

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

use std::{future::Future, io::Write, path::PathBuf, sync::Arc};

use chrono::Utc;
use eyre::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    session::{SessionController, SessionError, Turn},
    storage::StorageError,
};

use super::commands::{user_error, write_artifact};

const HELP: &str = r#"Commands:
    /save                  Save the conversation now
    /export FORMAT [DIR]   Export as txt, json, csv, html or pdf (default DIR: .)
    /model NAME            Switch the model for this conversation
    /models                List available models
    /new                   Start a new conversation
    /open ID               Open a stored conversation
    /voice FILE            Send the speech in an audio file
    /help                  Show this help
    /quit                  Leave the chat
Anything else is sent to the model."#;

#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    Save,
    Export { format: String, dir: PathBuf },
    Model(String),
    Models,
    New,
    Open(String),
    Voice(PathBuf),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Message(String),
    Command(SlashCommand),
    /// A slash command that could not be parsed, with the reason.
    Invalid(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let args = parts.collect::<Vec<_>>();

    let command = match (name.as_str(), args.as_slice()) {
        ("save", []) => SlashCommand::Save,
        ("export", [format]) => SlashCommand::Export {
            format: format.to_string(),
            dir: PathBuf::from("."),
        },
        ("export", [format, dir]) => SlashCommand::Export {
            format: format.to_string(),
            dir: PathBuf::from(*dir),
        },
        ("model", [model]) => SlashCommand::Model(model.to_string()),
        ("models", []) => SlashCommand::Models,
        ("new", []) => SlashCommand::New,
        ("open", [id]) => SlashCommand::Open(id.to_string()),
        ("voice", [_, ..]) => SlashCommand::Voice(PathBuf::from(args.join(" "))),
        ("help" | "h" | "?", _) => SlashCommand::Help,
        ("quit" | "exit" | "q", []) => SlashCommand::Quit,
        ("save" | "models" | "new" | "quit" | "exit" | "q", _) => {
            return Input::Invalid(format!("/{name} takes no arguments"));
        }
        ("export", _) => return Input::Invalid("usage: /export FORMAT [DIR]".to_string()),
        ("model", _) => return Input::Invalid("usage: /model NAME".to_string()),
        ("open", _) => return Input::Invalid("usage: /open ID".to_string()),
        ("voice", _) => return Input::Invalid("usage: /voice FILE".to_string()),
        _ => return Input::Invalid(format!("unknown command /{name}, try /help")),
    };
    Input::Command(command)
}

/// Filters streamed deltas for display. A leading reasoning block is held
/// back until it closes, so only the answer is echoed live.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    buffered: String,
    passthrough: bool,
    printed: bool,
}

const THINK_TAGS: [(&str, &str); 2] = [("<think>", "</think>"), ("<thinking>", "</thinking>")];

impl StreamPrinter {
    /// Returns the part of `chunk` that can be shown now.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        if self.passthrough {
            return self.emit(chunk.to_string());
        }

        self.buffered.push_str(chunk);
        let pending = self.buffered.trim_start();
        if pending.is_empty() {
            return None;
        }

        for (open, close) in THINK_TAGS {
            if open.starts_with(pending) && pending.len() < open.len() {
                return None;
            }
            if let Some(rest) = pending.strip_prefix(open) {
                let end = rest.find(close)?;
                let answer = rest[end + close.len()..].trim_start().to_string();
                self.buffered.clear();
                self.passthrough = true;
                return self.emit(answer);
            }
        }

        self.passthrough = true;
        let text = std::mem::take(&mut self.buffered);
        self.emit(text)
    }

    fn emit(&mut self, text: String) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        self.printed = true;
        Some(text)
    }

    pub fn printed(&self) -> bool {
        self.printed
    }
}

pub async fn resume(session: &SessionController, id: &str) -> Result<()> {
    match session.open(id).await {
        Ok(()) => Ok(()),
        Err(SessionError::Storage(StorageError::NotFound(_))) => {
            session
                .start_new(Some(id))
                .await
                .map_err(user_error)?;
            Ok(())
        }
        Err(err) => Err(user_error(err)),
    }
}

pub async fn run(session: &Arc<SessionController>, hello: Option<&str>) -> Result<()> {
    let conversation = session.conversation().await;
    println!(
        "chatpress - conversation {} ({}), /help for commands",
        conversation.id(),
        session.model().await
    );
    for msg in conversation.messages() {
        println!("{}: {}", msg.role().label(), msg.content());
    }
    if conversation.is_empty() {
        if let Some(hello) = hello {
            println!("Assistant: {hello}");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await.wrap_err("reading input")? else {
            println!();
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Invalid(reason) => println!("{reason}"),
            Input::Message(text) => {
                let result =
                    stream_turn(|tx| async move { session.submit(&text, Some(tx)).await }).await;
                report(result);
            }
            Input::Command(SlashCommand::Quit) => break,
            Input::Command(command) => {
                if let Err(err) = run_command(session, command).await {
                    println!("Error: {}", err.user_message());
                }
            }
        }
    }

    // Turns are saved as they happen; this only covers a /model change.
    if let Err(err) = session.save().await {
        log::warn!("final save: {}", err);
    }
    Ok(())
}

async fn run_command(
    session: &Arc<SessionController>,
    command: SlashCommand,
) -> Result<(), SessionError> {
    match command {
        SlashCommand::Save => {
            session.save().await?;
            println!("Saved {}", session.id().await);
        }
        SlashCommand::Export { format, dir } => {
            let artifact = session.export_as(&format, Utc::now()).await?;
            match write_artifact(&artifact, &dir).await {
                Ok(path) => println!("Exported to {}", path.display()),
                Err(err) => println!("Error: {err:#}"),
            }
        }
        SlashCommand::Model(model) => {
            session.set_model(&model).await?;
            println!("Using model {model}");
        }
        SlashCommand::Models => {
            let current = session.model().await;
            for model in session.list_models().await? {
                let marker = if model.id() == current { "*" } else { " " };
                println!("{marker} {}", model.id());
            }
        }
        SlashCommand::New => {
            let id = session.start_new(None).await?;
            println!("Started conversation {id}");
        }
        SlashCommand::Open(id) => {
            session.open(&id).await?;
            let conversation = session.conversation().await;
            println!(
                "Opened {} ({} messages)",
                conversation.id(),
                conversation.len()
            );
            for msg in conversation.messages() {
                println!("{}: {}", msg.role().label(), msg.content());
            }
        }
        SlashCommand::Voice(path) => {
            let result =
                stream_turn(|tx| async move { session.submit_audio(&path, Some(tx)).await })
                    .await;
            if let Ok(turn) = result.as_ref() {
                println!("(heard: {})", turn.user.content());
            }
            report(result);
        }
        SlashCommand::Help => println!("{HELP}"),
        SlashCommand::Quit => {}
    }
    Ok(())
}

/// Runs a turn while echoing streamed chunks to stdout.
async fn stream_turn<F, Fut>(turn: F) -> Result<Turn, SessionError>
where
    F: FnOnce(mpsc::UnboundedSender<String>) -> Fut,
    Fut: Future<Output = Result<Turn, SessionError>>,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        let mut printer = StreamPrinter::default();
        let mut stdout = std::io::stdout();
        while let Some(chunk) = rx.recv().await {
            let first = !printer.printed();
            if let Some(text) = printer.push(&chunk) {
                if first {
                    let _ = write!(stdout, "Assistant: ");
                }
                let _ = write!(stdout, "{text}");
                let _ = stdout.flush();
            }
        }
        printer.printed()
    });

    let result = turn(tx).await;
    let printed = printer.await.unwrap_or(false);
    match result.as_ref() {
        Ok(_) | Err(_) if printed => println!(),
        Ok(turn) => println!("Assistant: {}", turn.reply.content()),
        Err(_) => {}
    }
    result
}

fn report(result: Result<Turn, SessionError>) {
    if let Err(err) = result {
        println!("Error: {}", err.user_message());
    }
}
