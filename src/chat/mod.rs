//! Interactive console chat against a completion deployment.
//!
//! This module provides the REPL pieces built on top of the client library:
//!
//! - [`config`]: CLI argument parsing and session configuration
//! - [`session`]: the conversation and one request per user turn
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_SYSTEM_PROMPT};
pub use session::{ChatSession, SessionStats};
