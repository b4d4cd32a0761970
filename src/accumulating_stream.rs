//! Accumulates streamed reply fragments into a complete message while passing fragments through.

use std::pin::Pin;

use futures::Stream;

use crate::{Error, Message};

/// A stream wrapper that accumulates reply fragments into a complete AI `Message`.
///
/// This allows streaming tokens to the user while simultaneously building the final message.
/// When the stream is fully drained, the concatenated message is sent via the oneshot channel
/// returned by `new()`.  If the inner stream yields an error, the accumulated text is discarded
/// and the error is sent instead; no partial message is ever produced.
pub struct AccumulatingStream {
    inner: Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>,
    message_tx: Option<tokio::sync::oneshot::Sender<Result<Message, Error>>>,
    fragments: Vec<String>,
}

impl AccumulatingStream {
    /// Wraps a fragment stream to accumulate fragments into a `Message`.
    ///
    /// Returns the stream and a receiver that will contain the accumulated `Message` once the
    /// stream is fully drained.
    pub fn new<S>(stream: S) -> (Self, tokio::sync::oneshot::Receiver<Result<Message, Error>>)
    where
        S: Stream<Item = Result<String, Error>> + Send + 'static,
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let this = Self {
            inner: Box::pin(stream),
            message_tx: Some(tx),
            fragments: Vec::new(),
        };
        (this, rx)
    }

    /// Number of fragments received so far.
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    fn finalize(&mut self) -> Message {
        Message::ai(std::mem::take(&mut self.fragments).concat())
    }
}

impl Stream for AccumulatingStream {
    type Item = Result<String, Error>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        if self.message_tx.is_none() {
            return std::task::Poll::Ready(None);
        }
        match self.inner.as_mut().poll_next(cx) {
            std::task::Poll::Ready(Some(Ok(fragment))) => {
                self.fragments.push(fragment.clone());
                std::task::Poll::Ready(Some(Ok(fragment)))
            }
            std::task::Poll::Ready(Some(Err(e))) => {
                self.fragments.clear();
                if let Some(tx) = self.message_tx.take() {
                    let _ = tx.send(Err(e.clone()));
                }
                std::task::Poll::Ready(Some(Err(e)))
            }
            std::task::Poll::Ready(None) => {
                if let Some(tx) = self.message_tx.take() {
                    let message = self.finalize();
                    let _ = tx.send(Ok(message));
                }
                std::task::Poll::Ready(None)
            }
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use futures::{StreamExt, stream};

    #[tokio::test]
    async fn fragments_pass_through_and_concatenate() {
        let inner = stream::iter(vec![Ok("Hel".to_string()), Ok("lo".to_string())]);
        let (mut stream, rx) = AccumulatingStream::new(inner);

        let mut seen = Vec::new();
        while let Some(fragment) = stream.next().await {
            seen.push(fragment.unwrap());
        }
        assert_eq!(seen, vec!["Hel", "lo"]);

        let message = rx.await.unwrap().unwrap();
        assert_eq!(message.role(), Role::Ai);
        assert_eq!(message.content(), "Hello");
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_reply() {
        let inner = stream::iter(Vec::<Result<String, Error>>::new());
        let (mut stream, rx) = AccumulatingStream::new(inner);
        assert!(stream.next().await.is_none());
        assert_eq!(rx.await.unwrap().unwrap(), Message::ai(""));
    }

    #[tokio::test]
    async fn error_discards_accumulated_text() {
        let inner = stream::iter(vec![
            Ok("partial".to_string()),
            Err(Error::transport(None, "connection dropped", None)),
            Ok("never seen".to_string()),
        ]);
        let (mut stream, rx) = AccumulatingStream::new(inner);

        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert_eq!(stream.fragment_count(), 1);
        assert!(stream.next().await.unwrap().unwrap_err().is_transport());
        assert_eq!(stream.fragment_count(), 0);
        assert!(stream.next().await.is_none());

        let result = rx.await.unwrap();
        assert!(result.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn dropping_early_closes_the_receiver() {
        let inner = stream::iter(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let (mut stream, rx) = AccumulatingStream::new(inner);
        assert_eq!(stream.next().await.unwrap().unwrap(), "a");
        drop(stream);
        assert!(rx.await.is_err());
    }
}
