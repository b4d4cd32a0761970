use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::stream;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use url::Url;

use crate::accumulating_stream::AccumulatingStream;
use crate::client_logger::ClientLogger;
use crate::config::DialConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_MALFORMED_RESPONSES, CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS,
    STREAM_DURATION, STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_TTFB,
};
use crate::sse::{decode_stream, fragments};
use crate::types::{ChatCompletion, ChatCompletionRequest, Message};

/// A lazily-read stream of reply fragments, in arrival order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The completion operations a chat session needs.
///
/// [`DialClient`] is the production implementation; the trait is the seam that lets a session be
/// driven by something other than a live endpoint.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends the conversation and returns the whole reply.
    async fn complete(&self, messages: &[Message]) -> Result<Message>;

    /// Sends the conversation and streams the reply.
    ///
    /// Every fragment is handed to `on_fragment` as it arrives; an error returned from
    /// `on_fragment` stops the stream and is returned.  On success the returned message is the
    /// concatenation of every fragment.
    async fn stream_completion(
        &self,
        messages: &[Message],
        on_fragment: &mut (dyn for<'a> FnMut(&'a str) -> Result<()> + Send),
    ) -> Result<Message>;
}

/// Client for a DIAL chat completion deployment.
#[derive(Clone)]
pub struct DialClient {
    config: DialConfig,
    url: Url,
    client: ReqwestClient,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl DialClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint does not form a valid URL, the API key cannot be sent as a header,
    /// or the HTTP client cannot be built.
    pub fn new(config: DialConfig) -> Result<Self> {
        let url = config.completions_url()?;
        HeaderValue::from_str(&config.api_key)
            .map_err(|_| Error::configuration("API key contains characters not allowed in a header"))?;
        let client = ReqwestClient::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| {
                Error::transport(
                    None,
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            config,
            url,
            client,
            logger: None,
        })
    }

    /// Attach a logger that observes every reply and stream frame.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The configuration this client was built from.
    pub fn config(&self) -> &DialConfig {
        &self.config
    }

    /// The URL requests are posted to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let api_key = HeaderValue::from_str(&self.config.api_key)
            .map_err(|_| Error::configuration("API key contains characters not allowed in a header"))?;
        headers.insert("api-key", api_key);
        Ok(headers)
    }

    /// Convert a non-success response into a transport error carrying the raw body.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => Error::status(status_code, body),
            Err(e) => Error::transport(
                Some(status_code),
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }

    fn map_request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::transport(
                None,
                format!(
                    "Request timed out after {} seconds: {e}",
                    self.config.timeout.as_secs_f64()
                ),
                Some(Box::new(e)),
            )
        } else if e.is_connect() {
            Error::transport(None, format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::transport(None, format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Posts `request` and waits for the response headers.
    ///
    /// Waiting for the headers is bounded by the configured timeout.  A whole-body request is
    /// bounded end to end; a streamed body is bounded per read by [`idle_timeout`] instead.
    async fn post(
        &self,
        headers: HeaderMap,
        request: &ChatCompletionRequest<'_>,
        whole_body: bool,
    ) -> Result<Response> {
        CLIENT_REQUESTS.click();
        let mut builder = self
            .client
            .post(self.url.clone())
            .headers(headers)
            .json(request);
        if whole_body {
            builder = builder.timeout(self.config.timeout);
        }
        let response = match tokio::time::timeout(self.config.timeout, builder.send()).await {
            Ok(response) => response.map_err(|e| self.map_request_error(e)),
            Err(_) => Err(Error::transport(
                None,
                format!(
                    "Request timed out after {} seconds waiting for a response",
                    self.config.timeout.as_secs_f64()
                ),
                None,
            )),
        };
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(err);
            }
        };
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Send the conversation and get a non-streaming reply.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the request fails or the server answers with a non-success
    /// status, and a malformed response error when the body carries no
    /// `choices[0].message.content`.
    pub async fn send(&self, messages: &[Message]) -> Result<Message> {
        let start = Instant::now();
        let request = ChatCompletionRequest::new(messages);
        let response = self.post(self.default_headers()?, &request, true).await?;

        let body = response.text().await.map_err(|e| {
            CLIENT_REQUEST_ERRORS.click();
            Error::transport(
                None,
                format!("Failed to read response body: {e}"),
                Some(Box::new(e)),
            )
        })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let completion = serde_json::from_str::<ChatCompletion>(&body).map_err(|e| {
            CLIENT_MALFORMED_RESPONSES.click();
            Error::malformed_response(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        let content = completion.into_content().ok_or_else(|| {
            CLIENT_MALFORMED_RESPONSES.click();
            Error::malformed_response(
                format!("response has no choices[0].message.content: {body}"),
                None,
            )
        })?;

        let message = Message::ai(content);
        if let Some(logger) = &self.logger {
            logger.log_response(&message);
        }
        Ok(message)
    }

    /// Send the conversation and get a streaming reply.
    ///
    /// Returns the fragments of the reply as they arrive.  The HTTP response is owned by the
    /// returned stream and is released when the stream is dropped.
    pub async fn stream(&self, messages: &[Message]) -> Result<FragmentStream> {
        let request = ChatCompletionRequest::new_streaming(messages);

        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        let response = self.post(headers, &request, false).await?;
        let logger = self.logger.clone();
        let body = idle_timeout(response.bytes_stream(), self.config.timeout);
        let frames = decode_stream(body).inspect(move |frame| {
            match frame {
                Ok(frame) => {
                    if let Some(logger) = &logger {
                        logger.log_stream_frame(frame);
                    }
                }
                Err(_) => STREAM_ERRORS.click(),
            }
        });

        Ok(Box::pin(fragments(frames)))
    }

    /// Send the conversation, hand each fragment to `on_fragment`, and return the whole reply.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the request fails, the server answers with a non-success
    /// status, or the connection drops mid-stream; text received before the failure is
    /// discarded.  An error returned by `on_fragment` ends the stream and is passed through.
    pub async fn stream_to<F>(&self, messages: &[Message], mut on_fragment: F) -> Result<Message>
    where
        F: FnMut(&str) -> Result<()> + Send,
    {
        let start = Instant::now();
        let (mut stream, rx) = AccumulatingStream::new(self.stream(messages).await?);

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if stream.fragment_count() == 1 {
                STREAM_TTFB.add(start.elapsed().as_secs_f64());
            }
            STREAM_FRAGMENTS.click();
            on_fragment(&fragment)?;
        }

        let message = rx.await.map_err(|_| {
            Error::transport(None, "stream ended before the reply was assembled", None)
        })??;
        STREAM_DURATION.add(start.elapsed().as_secs_f64());
        if let Some(logger) = &self.logger {
            logger.log_stream_message(&message);
        }
        Ok(message)
    }
}

/// Ends `byte_stream` with a `TimedOut` error when no chunk arrives within `idle`.
///
/// Only the gap between reads is bounded, so a reply may stream for as long as the server keeps
/// sending.
fn idle_timeout<S, E>(
    byte_stream: S,
    idle: Duration,
) -> Pin<Box<dyn Stream<Item = std::result::Result<Bytes, io::Error>> + Send>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    Box::pin(stream::unfold(Some(byte_stream), move |state| async move {
        let mut byte_stream = state?;
        match tokio::time::timeout(idle, byte_stream.next()).await {
            Ok(Some(Ok(bytes))) => Some((Ok(bytes), Some(byte_stream))),
            Ok(Some(Err(e))) => Some((Err(io::Error::other(e)), Some(byte_stream))),
            Ok(None) => None,
            Err(_) => Some((
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no data received for {} seconds", idle.as_secs_f64()),
                )),
                None,
            )),
        }
    }))
}

#[async_trait::async_trait]
impl ChatBackend for DialClient {
    async fn complete(&self, messages: &[Message]) -> Result<Message> {
        self.send(messages).await
    }

    async fn stream_completion(
        &self,
        messages: &[Message],
        on_fragment: &mut (dyn for<'a> FnMut(&'a str) -> Result<()> + Send),
    ) -> Result<Message> {
        self.stream_to(messages, on_fragment).await
    }
}
