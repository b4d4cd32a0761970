//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which manages conversation
//! state and drives one request per user turn.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::chat::config::ChatConfig;
use crate::client::{ChatBackend, DialClient};
use crate::conversation::Conversation;
use crate::error::{Error, Result};
use crate::observability::{SESSION_ROLLBACKS, SESSION_TURNS};
use crate::render::Renderer;
use crate::types::Message;

/// How often an in-flight request checks whether the user interrupted it.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A chat session that manages conversation state and API interactions.
///
/// The conversation opens with the system prompt.  Each call to [`ChatSession::send`] appends
/// the user message, asks the backend for a reply, and appends the reply.  When the request
/// fails, the user message is removed again so the history only holds turns the server
/// answered.
pub struct ChatSession<B: ChatBackend = DialClient> {
    backend: B,
    config: ChatConfig,
    conversation: Conversation,
    turns: u64,
    failed_turns: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of messages in the conversation, system prompt included.
    pub message_count: usize,
    /// Turns that produced a reply.
    pub turns: u64,
    /// Turns that failed and were rolled back.
    pub failed_turns: u64,
    /// Whether replies are streamed.
    pub streaming: bool,
    /// The system prompt in effect.
    pub system_prompt: String,
}

impl<B: ChatBackend> ChatSession<B> {
    /// Creates a new chat session whose conversation opens with the configured system prompt.
    pub fn new(backend: B, config: ChatConfig) -> Self {
        let conversation = Conversation::with_system_prompt(config.effective_system_prompt());
        Self {
            backend,
            config,
            conversation,
            turns: 0,
            failed_turns: 0,
        }
    }

    /// Sends a user message and renders the reply.
    ///
    /// This method:
    /// 1. Adds the user message to history
    /// 2. Sends the conversation to the backend, streaming or not per configuration
    /// 3. Renders the reply (fragment by fragment when streaming)
    /// 4. Adds the complete reply to history
    ///
    /// Setting `interrupted` at any point before the reply is complete stops the request with
    /// [`Error::Abort`], whether or not any text has arrived.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or an abort, after removing the user message from history.
    pub async fn send(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
        interrupted: Arc<AtomicBool>,
    ) -> Result<()> {
        self.conversation.add_message(Message::user(user_input));

        let outcome = if self.config.stream {
            self.stream_reply(renderer, &interrupted).await
        } else {
            self.whole_reply(renderer, &interrupted).await
        };

        match outcome {
            Ok(reply) => {
                self.conversation.add_message(reply);
                self.turns += 1;
                SESSION_TURNS.click();
                Ok(())
            }
            Err(err) => {
                self.conversation.pop_message();
                self.failed_turns += 1;
                SESSION_ROLLBACKS.click();
                Err(err)
            }
        }
    }

    async fn whole_reply(
        &self,
        renderer: &mut dyn Renderer,
        interrupted: &AtomicBool,
    ) -> Result<Message> {
        let reply = tokio::select! {
            biased;
            () = wait_for_interrupt(interrupted) => Err(interrupted_error()),
            reply = self.backend.complete(self.conversation.get_messages()) => reply,
        };
        let reply = match reply {
            Err(err) if err.is_abort() => {
                renderer.print_interrupted();
                return Err(err);
            }
            reply => reply?,
        };
        renderer.start_response();
        renderer.print_text(reply.content());
        renderer.finish_response();
        Ok(reply)
    }

    async fn stream_reply(
        &self,
        renderer: &mut dyn Renderer,
        interrupted: &AtomicBool,
    ) -> Result<Message> {
        let mut started = false;
        let result = {
            let mut on_fragment = |fragment: &str| -> Result<()> {
                if interrupted.load(Ordering::Relaxed) {
                    return Err(interrupted_error());
                }
                if !started {
                    renderer.start_response();
                    started = true;
                }
                renderer.print_text(fragment);
                Ok(())
            };
            // Dropping the losing branch releases the connection.
            tokio::select! {
                biased;
                () = wait_for_interrupt(interrupted) => Err(interrupted_error()),
                result = self
                    .backend
                    .stream_completion(self.conversation.get_messages(), &mut on_fragment) => result,
            }
        };
        // An interrupt that lands after the last fragment still discards the reply.
        let result = result.and_then(|reply| {
            if interrupted.load(Ordering::Relaxed) {
                Err(interrupted_error())
            } else {
                Ok(reply)
            }
        });
        match &result {
            Ok(_) => {
                if !started {
                    renderer.start_response();
                }
                renderer.finish_response();
            }
            Err(err) if err.is_abort() => renderer.print_interrupted(),
            Err(_) => {}
        }
        result
    }

    /// Returns the backend replies come from.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the conversation so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the full message history, system prompt first.
    pub fn messages(&self) -> &[Message] {
        self.conversation.get_messages()
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }

    /// Forgets every turn, keeping the system prompt.
    pub fn clear(&mut self) {
        self.conversation.reset();
    }

    /// Sets whether replies are streamed.
    pub fn set_streaming(&mut self, stream: bool) {
        self.config.stream = stream;
    }

    /// Returns true when replies are streamed.
    pub fn is_streaming(&self) -> bool {
        self.config.stream
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.message_count(),
            turns: self.turns,
            failed_turns: self.failed_turns,
            streaming: self.config.stream,
            system_prompt: self.config.effective_system_prompt().to_string(),
        }
    }
}

fn interrupted_error() -> Error {
    Error::abort("reply interrupted by user")
}

/// Resolves once `interrupted` is set.
async fn wait_for_interrupt(interrupted: &AtomicBool) {
    while !interrupted.load(Ordering::Relaxed) {
        tokio::time::sleep(INTERRUPT_POLL_INTERVAL).await;
    }
}
