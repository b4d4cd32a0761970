//! Command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`, plus the bare word
//! `exit`, allowing users to control the chat session without sending messages to the API.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Drop the conversation, keeping the system prompt.
    Clear,

    /// Switch between streamed and whole replies.
    Stream(bool),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be treated as
/// a regular message.  Input that starts with `/` but does not name a known command, such as a
/// file path, is a regular message.
///
/// # Examples
///
/// ```
/// # use dialchat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("exit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("EXIT"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/stream off"), Some(ChatCommand::Stream(false)));
/// assert!(parse_command("exit the building").is_none());
/// assert!(parse_command("/etc/hosts format?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if input.eq_ignore_ascii_case("exit") {
        return Some(ChatCommand::Quit);
    }

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "stream" => match argument.map(parse_on_off) {
            Some(Some(enabled)) => ChatCommand::Stream(enabled),
            Some(None) => ChatCommand::Invalid("/stream expects on or off".to_string()),
            None => ChatCommand::Invalid("/stream requires on or off".to_string()),
        },
        _ => return None,
    };
    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Returns the help text listing every command.
pub fn help_text() -> &'static str {
    "/help            Show this help\n\
     /clear           Forget the conversation, keeping the system prompt\n\
     /stream on|off   Stream replies as they are generated, or print them whole\n\
     /stats           Show session statistics\n\
     /quit, exit      Leave the chat\n\
     Any other line, including one starting with an unknown /word, is sent as a message."
}
