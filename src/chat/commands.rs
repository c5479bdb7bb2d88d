//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the API.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation history, keeping the system message.
    Clear,

    /// Change the model.
    Model(String),

    /// List the models the endpoint offers.
    Models,

    /// Set or clear the system prompt.
    /// `None` clears the current system prompt.
    System(Option<String>),

    /// Set the memory window.
    Memory(usize),

    /// Stage an image file for the next message.
    Attach(String),

    /// List staged attachments.
    ListAttachments,

    /// Drop all staged attachments.
    ClearAttachments,

    /// Show the token accounting of the last turn.
    Usage,

    /// Print the conversation history.
    History,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use chatterbox::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model llama3").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" | "reset" => ChatCommand::Clear,
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "models" => ChatCommand::Models,
        "system" => ChatCommand::System(argument.map(|s| s.to_string())),
        "memory" => match argument {
            Some(arg) => match arg.parse::<usize>() {
                Ok(value) => ChatCommand::Memory(value),
                Err(_) => {
                    ChatCommand::Invalid("/memory expects a non-negative integer".to_string())
                }
            },
            None => ChatCommand::Invalid("/memory requires a number of turns".to_string()),
        },
        "attach" => match argument {
            Some(path) => ChatCommand::Attach(path.to_string()),
            None => ChatCommand::Invalid("/attach requires a file path".to_string()),
        },
        "attachments" => match argument {
            None => ChatCommand::ListAttachments,
            Some(arg) if arg.eq_ignore_ascii_case("clear") => ChatCommand::ClearAttachments,
            Some(_) => ChatCommand::Invalid("/attachments accepts only 'clear'".to_string()),
        },
        "usage" => ChatCommand::Usage,
        "history" => ChatCommand::History,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                 Clear conversation history (keeps the system message)
  /model <name>          Change the model (e.g., /model llama3)
  /models                List the models the endpoint offers
  /system [prompt]       Set system prompt (no argument clears it)
  /memory <turns>        Set how many prior turns are kept in context
  /attach <file>         Attach an image (jpeg, png, gif, webp) to the next message
  /attachments [clear]   List or drop staged attachments
  /usage                 Show token usage of the last response
  /history               Print the conversation so far
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl-C while a response streams to stop it."#
}
