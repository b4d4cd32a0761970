//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use arrrg_derive::CommandLine;

use crate::config::{ConfigFile, DialConfig};
use crate::error::Result;

/// System prompt used when the user does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer concisely and accurately, and say so when you do not know.";

/// Command-line arguments for the dialchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// YAML file with connection settings.
    #[arrrg(optional, "YAML file with deployment, endpoint, api_key, timeout_secs", "PATH")]
    pub config: Option<String>,

    /// Deployment that receives requests.
    #[arrrg(optional, "Deployment to use (default: gpt-4o)", "DEPLOYMENT")]
    pub deployment: Option<String>,

    /// Base URL of the service.
    #[arrrg(optional, "Base endpoint URL", "URL")]
    pub endpoint: Option<String>,

    /// System prompt to set context for the conversation.
    #[arrrg(optional, "System prompt for the conversation (skips the prompt question)", "PROMPT")]
    pub system: Option<String>,

    /// Longest wait for a reply, or between two pieces of a streamed reply.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Print replies whole instead of streaming them.
    #[arrrg(flag, "Print replies whole instead of streaming them")]
    pub no_stream: bool,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

impl ChatArgs {
    /// The connection settings given on the command line.
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            deployment: self.deployment.clone(),
            endpoint: self.endpoint.clone(),
            api_key: None,
            timeout_secs: self.timeout_secs,
        }
    }

    /// Resolves connection settings from the config file, the environment, and these arguments,
    /// in increasing order of precedence.
    pub fn dial_config(&self) -> Result<DialConfig> {
        self.dial_config_with_env(ConfigFile::from_env()?)
    }

    /// Like [`ChatArgs::dial_config`], with the environment layer supplied by the caller.
    pub fn dial_config_with_env(&self, env: ConfigFile) -> Result<DialConfig> {
        let file = match &self.config {
            Some(path) => ConfigFile::from_file(path)?,
            None => ConfigFile::default(),
        };
        file.merge(env).merge(self.overrides()).into_dial_config()
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// System prompt that opens the conversation; `None` uses [`DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Whether replies are streamed.
    pub stream: bool,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - System prompt: [`DEFAULT_SYSTEM_PROMPT`]
    /// - Streaming: enabled
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            system_prompt: None,
            stream: true,
            use_color: true,
        }
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets whether replies are streamed.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The system prompt in effect.
    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&ChatArgs> for ChatConfig {
    fn from(args: &ChatArgs) -> Self {
        ChatConfig {
            system_prompt: args.system.clone(),
            stream: !args.no_stream,
            use_color: !args.no_color,
        }
    }
}
