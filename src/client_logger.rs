//! Logging trait for completion client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! and log all API interactions passing through the [`DialClient`](crate::DialClient).

use crate::{Message, StreamFrame};

/// A trait for logging completion client operations.
///
/// Implement this trait to capture and record all API interactions,
/// including both non-streaming replies and individual stream frames.
///
/// # Example
///
/// ```rust,ignore
/// use dialchat::{ClientLogger, Message, StreamFrame};
/// use std::io::Write;
/// use std::sync::Mutex;
///
/// struct FileLogger {
///     file: Mutex<std::fs::File>,
/// }
///
/// impl ClientLogger for FileLogger {
///     fn log_response(&self, message: &Message) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Response: {}", message.to_value()).unwrap();
///     }
///
///     fn log_stream_frame(&self, frame: &StreamFrame) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Stream frame: {frame:?}").unwrap();
///     }
///
///     fn log_stream_message(&self, message: &Message) {
///         let mut file = self.file.lock().unwrap();
///         writeln!(file, "Stream complete: {}", message.to_value()).unwrap();
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log a complete reply from a non-streaming `send` call.
    fn log_response(&self, message: &Message);

    /// Log an individual stream frame.
    ///
    /// Called for every decoded line, including ignored lines and the end-of-stream sentinel.
    fn log_stream_frame(&self, frame: &StreamFrame);

    /// Log the message assembled from a completed stream.
    ///
    /// Not called when the stream fails; partial replies are never assembled.
    fn log_stream_message(&self, message: &Message);
}
