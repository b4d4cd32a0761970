//! Interactive console chat against a DIAL chat completion deployment.
//!
//! # Usage
//!
//! ```bash
//! # Key from the environment, default deployment and endpoint
//! DIAL_API_KEY=... dialchat
//!
//! # Pick a deployment and skip the system prompt question
//! dialchat --deployment gpt-35-turbo --system "You are a terse assistant"
//!
//! # Settings from a file, replies printed whole
//! dialchat --config dialchat.yaml --no-stream
//! ```
//!
//! Type `exit` or `/quit` to leave, and `/help` for the other commands.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use dialchat::DialClient;
use dialchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("dialchat [OPTIONS]");
    let mut config = ChatConfig::from(&args);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let dial_config = match args.dial_config() {
        Ok(dial_config) => dial_config,
        Err(err) => {
            renderer.print_error(&err.to_string());
            std::process::exit(1);
        }
    };
    let client = DialClient::new(dial_config)?;
    let mut rl = DefaultEditor::new()?;

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    if config.system_prompt.is_none() {
        println!("Provide System prompt or press 'enter' to continue.");
        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if !line.is_empty() {
                    config.system_prompt = Some(line.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {}
            Err(ReadlineError::Eof) => return Ok(()),
            Err(err) => return Err(err.into()),
        }
    }

    let mut session = ChatSession::new(client, config);
    println!("\nType your question or 'exit' to quit.");

    loop {
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Exiting the chat. Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Stream(enabled) => {
                            session.set_streaming(enabled);
                            if enabled {
                                renderer.print_info("Streaming enabled.");
                            } else {
                                renderer.print_info("Streaming disabled.");
                            }
                        }
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::Invalid(message) => renderer.print_error(&message),
                    }
                    continue;
                }

                match session
                    .send(line, &mut renderer, interrupted.clone())
                    .await
                {
                    Ok(()) => {}
                    Err(e) if e.is_abort() => {}
                    Err(e) => renderer.print_error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nExiting the chat. Goodbye!");
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

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    let config = session.backend().config();
    println!("    Session Statistics:");
    println!("      Deployment: {}", config.deployment);
    println!("      Endpoint: {}", config.endpoint);
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Turns: {} answered, {} failed",
        stats.turns, stats.failed_turns
    );
    println!(
        "      Streaming: {}",
        if stats.streaming { "on" } else { "off" }
    );
    println!("      System prompt: {}", stats.system_prompt);
}
