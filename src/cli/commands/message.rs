//! Message command implementation.
//!
//! A minimal stand-in for the chat application's message store: it writes
//! chats and messages, then hands the saved message to the embedding
//! integration point so the configured mode is honored.

use crate::cli::MessageCommands;
use crate::content::extract;
use crate::embeddings::resolve_settings;
use crate::error::{Error, Result};
use crate::model::{Message, Segment};
use crate::service::{IngestAction, RecallService};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use super::{open_storage, runtime};

#[derive(Serialize)]
struct AddOutput<'a> {
    id: &'a str,
    chat_id: &'a str,
    updated: bool,
    embedding: IngestAction,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    #[serde(flatten)]
    message: &'a Message,
    content: String,
    has_embedding: bool,
}

/// Execute message commands.
///
/// # Errors
///
/// Returns an error if the database is missing or the parts are not a JSON array.
pub fn execute(command: &MessageCommands, db_path: Option<&Path>, json: bool) -> Result<()> {
    match command {
        MessageCommands::Add {
            user,
            chat,
            role,
            parts,
            id,
        } => execute_add(db_path, user, chat, role, parts, id.as_deref(), json),
        MessageCommands::Show { id } => execute_show(db_path, id, json),
    }
}

fn parse_parts_arg(raw: &str) -> Result<Vec<Segment>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidArgument(format!("--parts is not valid JSON: {e}")))?;
    if !value.is_array() {
        return Err(Error::InvalidArgument(
            "--parts must be a JSON array of segments".to_string(),
        ));
    }
    Ok(Segment::parse_parts(&value))
}

fn execute_add(
    db_path: Option<&Path>,
    user: &str,
    chat: &str,
    role: &str,
    parts: &str,
    id: Option<&str>,
    json: bool,
) -> Result<()> {
    let parts = parse_parts_arg(parts)?;
    let storage = open_storage(db_path)?;

    let (message_id, chat_id, updated) = match id {
        Some(id) => {
            let chat_id = storage.with(|s| {
                let existing = s.get_message(id)?.ok_or_else(|| Error::MessageNotFound {
                    id: id.to_string(),
                })?;
                if existing.chat_id != chat {
                    return Err(Error::InvalidArgument(format!(
                        "message {id} belongs to chat {}, not {chat}",
                        existing.chat_id
                    )));
                }
                s.ensure_chat(&existing.chat_id, user)?;
                s.update_message_parts(id, &parts)?;
                Ok(existing.chat_id)
            })?;
            (id.to_string(), chat_id, true)
        }
        None => {
            let message = Message::new(chat, role, parts);
            storage.with(|s| {
                s.ensure_chat(chat, user)?;
                s.insert_message(&message)
            })?;
            (message.id, message.chat_id, false)
        }
    };

    let rt = runtime()?;
    let action = rt.block_on(async {
        let service = RecallService::from_settings(storage, resolve_settings());
        let action = service.on_message_saved(&message_id).await;
        // Queued jobs die with the process; finish them first.
        if action == IngestAction::Enqueued {
            service.drain().await;
        }
        action
    });

    if json {
        let output = AddOutput {
            id: &message_id,
            chat_id: &chat_id,
            updated,
            embedding: action,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        let verb = if updated { "Updated" } else { "Saved" };
        println!("{} message {}", verb.green(), message_id.bold());
        println!("  Embedding: {}", describe(action));
    }

    Ok(())
}

fn describe(action: IngestAction) -> &'static str {
    use crate::pipeline::ProcessOutcome;

    match action {
        IngestAction::Disabled => "auto-generation disabled",
        IngestAction::Embedded(ProcessOutcome::Embedded) => "generated",
        IngestAction::Embedded(ProcessOutcome::Unchanged) => "unchanged",
        IngestAction::Embedded(ProcessOutcome::Blank) => "skipped (no text)",
        IngestAction::Failed => "failed (see log; will be retried by the sweep)",
        IngestAction::Enqueued => "processed by queue",
        IngestAction::Deferred => "deferred to sweep",
    }
}

fn execute_show(db_path: Option<&Path>, id: &str, json: bool) -> Result<()> {
    let storage = open_storage(db_path)?;
    let (message, embedding) = storage.with(|s| {
        let message = s.get_message(id)?.ok_or_else(|| Error::MessageNotFound {
            id: id.to_string(),
        })?;
        let embedding = s.get_embedding(id)?;
        Ok((message, embedding))
    })?;

    let content = extract(&message.parts);

    if json {
        let output = ShowOutput {
            message: &message,
            content,
            has_embedding: embedding.is_some(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", message.id.bold());
        println!("  Chat:      {}", message.chat_id);
        println!("  Role:      {}", message.role);
        println!("  Content:   {content}");
        match embedding {
            Some(e) => println!(
                "  Embedding: {} dims, hash {}",
                e.vector.len(),
                &e.content_hash[..12.min(e.content_hash.len())]
            ),
            None => println!("  Embedding: {}", "none".yellow()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parts_arg() {
        let parts = parse_parts_arg(r#"[{"type":"text","text":"hi"}]"#).unwrap();
        assert_eq!(parts.len(), 1);

        assert!(parse_parts_arg("not json").is_err());
        let err = parse_parts_arg(r#"{"type":"text"}"#).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_describe_covers_failures() {
        assert!(describe(IngestAction::Failed).contains("failed"));
        assert_eq!(describe(IngestAction::Deferred), "deferred to sweep");
    }
}
