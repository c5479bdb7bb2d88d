//! Interactive chat against an OpenAI-compatible endpoint.
//!
//! This binary provides a streaming REPL on top of the chatterbox session engine.
//!
//! # Usage
//!
//! ```bash
//! # Local Ollama with the first model it lists
//! chatterbox-chat
//!
//! # A hosted endpoint
//! CHATTERBOX_API_KEY=sk-... chatterbox-chat --base-url https://api.openai.com/v1 --model gpt-4o-mini
//!
//! # Keep only the last three turns in context
//! chatterbox-chat --memory-turns 3 --system "You are a terse assistant"
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear conversation history
//! - `/model <name>` - Change the model
//! - `/attach <file>` - Attach an image to the next message
//! - `/quit` - Exit the application
//!
//! Ctrl-C while a response streams stops it; the partial reply stays in the history.

use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chatterbox::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use chatterbox::{Attachment, OpenAiClient, Role};

/// Main entry point for the chatterbox-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chatterbox-chat [OPTIONS]");
    let config = ChatConfig::from(args);
    let use_color = config.use_color;

    let client = OpenAiClient::new()?;
    let mut session = ChatSession::new(client, config);
    let mut renderer = PlainTextRenderer::with_color(use_color);
    let mut rl = DefaultEditor::new()?;

    if session.config().model.is_empty() {
        match session.discover_model().await {
            Ok(Some(_)) => {}
            Ok(None) => renderer.print_error("The endpoint lists no models; use /model <name>."),
            Err(err) => renderer.print_error(&format!("Failed to list models: {err}")),
        }
    }

    // The token of the turn in flight; Ctrl-C cancels it.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let current_clone = Arc::clone(&current);
    ctrlc::set_handler(move || {
        if let Ok(token) = current_clone.lock() {
            token.cancel();
        }
    })?;

    println!(
        "Chatterbox ({} at {})",
        describe(&session.config().model),
        session.config().base_url
    );
    println!("Type /help for commands, /quit to exit\n");

    let mut staged: Vec<(String, Attachment)> = Vec::new();
    loop {
        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.reset();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Model(model) => {
                            renderer.print_info(&format!("Model changed to: {model}"));
                            session.set_model(model);
                        }
                        ChatCommand::Models => match session.list_models().await {
                            Ok(models) if models.is_empty() => {
                                renderer.print_info("The endpoint lists no models.")
                            }
                            Ok(models) => {
                                for model in models {
                                    let marker = if model == session.config().model {
                                        "*"
                                    } else {
                                        " "
                                    };
                                    println!("    {marker} {model}");
                                }
                            }
                            Err(err) => {
                                renderer.print_error(&format!("Failed to list models: {err}"))
                            }
                        },
                        ChatCommand::System(prompt) => {
                            match &prompt {
                                Some(p) => {
                                    renderer.print_info(&format!("System prompt set to: {p}"))
                                }
                                None => renderer.print_info("System prompt cleared."),
                            }
                            session.set_system_prompt(prompt);
                            if has_system_message(&session) {
                                renderer.print_info("Takes effect after /clear.");
                            }
                        }
                        ChatCommand::Memory(turns) => {
                            session.set_memory_turns(turns);
                            renderer.print_info(&format!("Keeping {turns} turns in context."));
                        }
                        ChatCommand::Attach(path) => match Attachment::from_path(&path).await {
                            Ok(attachment) => {
                                renderer.print_info(&format!(
                                    "Attached {path} ({}, {} bytes)",
                                    attachment.media_type.as_str(),
                                    attachment.data.len()
                                ));
                                staged.push((path, attachment));
                            }
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::ListAttachments => {
                            if staged.is_empty() {
                                renderer.print_info("No attachments staged.");
                            }
                            for (path, attachment) in &staged {
                                println!("    {path} ({})", attachment.media_type.as_str());
                            }
                        }
                        ChatCommand::ClearAttachments => {
                            staged.clear();
                            renderer.print_info("Attachments cleared.");
                        }
                        ChatCommand::Usage => match session.usage() {
                            Some(usage) => renderer.print_usage(&usage),
                            None => renderer.print_info("No usage reported for the last turn."),
                        },
                        ChatCommand::History => print_history(&session),
                        ChatCommand::ShowConfig => print_config(&session),
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                let token = CancellationToken::new();
                if let Ok(mut slot) = current.lock() {
                    *slot = token.clone();
                }
                let attachments = staged.drain(..).map(|(_, a)| a).collect();
                println!("Assistant:");
                session
                    .send_message_with_renderer(line, attachments, token, &mut renderer)
                    .await;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn has_system_message(session: &ChatSession) -> bool {
    session
        .history()
        .first()
        .is_some_and(|message| message.role == Role::System)
}

fn print_history(session: &ChatSession) {
    let history = session.history();
    if history.is_empty() {
        println!("    (empty)");
    }
    for message in history.iter() {
        let time = message
            .timestamp
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        println!("    [{time}] {}:", message.role);
        for line in message.content.lines() {
            println!("      {line}");
        }
        if !message.attachments.is_empty() {
            println!("      ({} image attachment(s))", message.attachments.len());
        }
    }
}

fn print_config(session: &ChatSession) {
    let config = session.config();
    println!("    Current Configuration:");
    println!("      Base URL: {}", config.base_url);
    println!("      Model: {}", describe(&config.model));
    println!(
        "      API key: {}",
        if config.api_key.is_empty() {
            "(none)"
        } else {
            "(set)"
        }
    );
    println!("      Memory: {} turns", config.memory_turns);
    if let Some(prompt) = config.effective_system_prompt() {
        println!("      System prompt: {prompt}");
    } else {
        println!("      System prompt: (none)");
    }
    println!("      Messages: {}", session.history().len());
}

fn describe(model: &str) -> &str {
    if model.is_empty() { "(no model)" } else { model }
}
