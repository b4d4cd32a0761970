// Public modules
pub mod accumulating_stream;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod config;
pub mod conversation;
pub mod error;
mod observability;
pub mod render;
pub mod sse;
pub mod types;

// Re-exports
pub use accumulating_stream::AccumulatingStream;
pub use client::{ChatBackend, DialClient, FragmentStream};
pub use client_logger::ClientLogger;
pub use config::{ConfigFile, DialConfig};
pub use conversation::Conversation;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use sse::{StreamFrame, decode_line, decode_stream};
pub use types::*;
