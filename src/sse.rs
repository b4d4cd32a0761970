//! Server-Sent Events (SSE) processing for streaming chat completions.
//!
//! The completion endpoint streams newline-delimited `data: ` frames.  This module turns the raw
//! byte stream of an HTTP response into [`StreamFrame`]s and from there into the text fragments
//! of the reply.
//!
//! Decoding is deliberately permissive: keep-alive lines, blank separators, frames that are not
//! valid JSON, and frames without content all decode to [`StreamFrame::Ignored`] and never end
//! the stream.  Only a failure of the underlying transport surfaces as an error.

use bytes::{Bytes, BytesMut};
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use tokio_util::codec::{Decoder, LinesCodec};

use crate::observability::{STREAM_BYTES, STREAM_FRAMES, STREAM_MALFORMED_FRAMES};
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// Prefix that marks a line as an event carrying data.
pub const DATA_PREFIX: &str = "data: ";

/// Payload the server sends once the reply is complete.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Longest line the decoder buffers.  Longer lines are skipped as malformed.
pub const MAX_LINE_LENGTH: usize = 1 << 20;

/// One decoded line of a completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A non-empty piece of the reply.
    Fragment(String),

    /// The end-of-stream sentinel.
    Done,

    /// A line that carries nothing for the reply.
    Ignored,
}

impl StreamFrame {
    /// Returns the fragment text, if this frame carries one.
    pub fn fragment(&self) -> Option<&str> {
        match self {
            StreamFrame::Fragment(text) => Some(text),
            _ => None,
        }
    }

    /// Returns true for the end-of-stream sentinel.
    pub fn is_done(&self) -> bool {
        matches!(self, StreamFrame::Done)
    }
}

/// Decode a single line of a completion stream.
pub fn decode_line(line: &str) -> StreamFrame {
    let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
        return StreamFrame::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return StreamFrame::Done;
    }
    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => chunk
            .fragment()
            .map(|text| StreamFrame::Fragment(text.to_string()))
            .unwrap_or(StreamFrame::Ignored),
        Err(_) => {
            STREAM_MALFORMED_FRAMES.click();
            StreamFrame::Ignored
        }
    }
}

/// Process a stream of bytes into a stream of decoded frames.
///
/// Chunks may split lines anywhere, including inside a multi-byte character, or carry several
/// lines at once.  A final line without a terminating newline is decoded when the byte stream
/// ends.  Lines that are not UTF-8 or exceed [`MAX_LINE_LENGTH`] are skipped.  A transport error
/// is yielded once and ends the stream.
///
/// ```
/// # use bytes::Bytes;
/// # use futures::{stream, StreamExt};
/// # use dialchat::sse::{decode_stream, fragments};
/// # tokio_test::block_on(async {
/// let body = stream::iter(vec![
///     Ok::<_, std::io::Error>(Bytes::from("data: {\"choices\":[{\"delta\":{\"content\":\"Hel")),
///     Ok(Bytes::from("\"}}]}\n\ndata: [DONE]\n")),
/// ]);
/// let text: Vec<_> = fragments(decode_stream(body)).collect().await;
/// assert_eq!(text.len(), 1);
/// assert_eq!(text[0].as_deref().unwrap(), "Hel");
/// # });
/// ```
pub fn decode_stream<S, E>(byte_stream: S) -> impl Stream<Item = Result<StreamFrame>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream.map(|result| {
        result.map_err(|e| {
            Error::transport(
                None,
                format!("Error in HTTP stream: {e}"),
                Some(Box::new(e)),
            )
        })
    });

    stream::unfold(
        (stream, LineBuffer::default()),
        move |(mut stream, mut lines)| async move {
            loop {
                if lines.failed {
                    return None;
                }
                if let Some(line) = lines.next_line() {
                    STREAM_FRAMES.click();
                    return Some((Ok(decode_line(&line)), (stream, lines)));
                }
                if lines.eof {
                    return None;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        lines.buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        lines.failed = true;
                        return Some((Err(e), (stream, lines)));
                    }
                    None => lines.eof = true,
                }
            }
        },
    )
}

/// Narrow a frame stream to the fragments of the reply, in arrival order.
pub fn fragments<S>(frames: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<StreamFrame>> + Send,
{
    frames.filter_map(|frame| {
        future::ready(match frame {
            Ok(StreamFrame::Fragment(text)) => Some(Ok(text)),
            Ok(StreamFrame::Done | StreamFrame::Ignored) => None,
            Err(e) => Some(Err(e)),
        })
    })
}

struct LineBuffer {
    buffer: BytesMut,
    codec: LinesCodec,
    eof: bool,
    failed: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self {
            buffer: BytesMut::new(),
            codec: LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
            eof: false,
            failed: false,
        }
    }
}

impl LineBuffer {
    fn next_line(&mut self) -> Option<String> {
        loop {
            let decoded = if self.eof {
                self.codec.decode_eof(&mut self.buffer)
            } else {
                self.codec.decode(&mut self.buffer)
            };
            match decoded {
                Ok(line) => return line,
                // Invalid UTF-8 is already consumed; an overlong line is discarded up to its
                // newline by the following decode calls.
                Err(_) => STREAM_MALFORMED_FRAMES.click(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    const HEL: &str = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
    const LO: &str = r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#;

    type ByteChunks = stream::Iter<std::vec::IntoIter<std::result::Result<Bytes, io::Error>>>;

    fn chunks(parts: &[&[u8]]) -> ByteChunks {
        stream::iter(
            parts
                .iter()
                .map(|part| Ok(Bytes::copy_from_slice(part)))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect_fragments<S>(byte_stream: S) -> Vec<Result<String>>
    where
        S: Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin + Send + 'static,
    {
        Box::pin(fragments(decode_stream(byte_stream)))
            .collect()
            .await
    }

    #[test]
    fn decode_reference_sequence() {
        let frames: Vec<_> = [HEL, LO, "data: [DONE]"].iter().map(|l| decode_line(l)).collect();
        assert_eq!(
            frames,
            vec![
                StreamFrame::Fragment("Hel".to_string()),
                StreamFrame::Fragment("lo".to_string()),
                StreamFrame::Done,
            ]
        );
        let reply: String = frames.iter().filter_map(StreamFrame::fragment).collect();
        assert_eq!(reply, "Hello");
    }

    #[test]
    fn lines_without_data_prefix_are_ignored() {
        assert_eq!(decode_line(": keep-alive"), StreamFrame::Ignored);
        assert_eq!(decode_line(""), StreamFrame::Ignored);
        assert_eq!(decode_line("event: message"), StreamFrame::Ignored);
        assert_eq!(decode_line("data:{\"choices\":[]}"), StreamFrame::Ignored);
    }

    #[test]
    fn invalid_json_is_ignored() {
        assert_eq!(decode_line("data: {bad"), StreamFrame::Ignored);
        assert_eq!(decode_line("data: 42"), StreamFrame::Ignored);
        assert_eq!(decode_line(HEL), StreamFrame::Fragment("Hel".to_string()));
    }

    #[test]
    fn done_sentinel_tolerates_whitespace() {
        assert_eq!(decode_line("data: [DONE]"), StreamFrame::Done);
        assert_eq!(decode_line("  data:   [DONE]  \r"), StreamFrame::Done);
        assert!(decode_line("data: [DONE]").is_done());
        assert_eq!(decode_line("data: [DONE]").fragment(), None);
    }

    #[test]
    fn frames_without_content_are_ignored() {
        assert_eq!(decode_line("data: {}"), StreamFrame::Ignored);
        assert_eq!(decode_line(r#"data: {"choices":[]}"#), StreamFrame::Ignored);
        assert_eq!(
            decode_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            StreamFrame::Ignored
        );
    }

    #[tokio::test]
    async fn stream_of_whole_lines() {
        let body = format!("{HEL}\n\n{LO}\n\ndata: [DONE]\n\n");
        let fragments = collect_fragments(chunks(&[body.as_bytes()])).await;
        let fragments: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn lines_split_across_chunks() {
        let body = format!("{HEL}\r\n{LO}\r\ndata: [DONE]\r\n");
        let bytes = body.as_bytes();
        let pieces: Vec<&[u8]> = bytes.chunks(7).collect();
        let fragments = collect_fragments(chunks(&pieces)).await;
        let fragments: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn multibyte_character_split_across_chunks() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo ✓\"}}]}\n".as_bytes();
        let split = body.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let fragments = collect_fragments(chunks(&[&body[..split], &body[split..]])).await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "héllo ✓");
    }

    #[tokio::test]
    async fn malformed_frame_does_not_abort_stream() {
        let body = format!(": keep-alive\ndata: {{bad\n{HEL}\n\u{0}\n{LO}\ndata: [DONE]\n");
        let fragments = collect_fragments(chunks(&[body.as_bytes()])).await;
        let fragments: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_skipped() {
        let fragments = collect_fragments(chunks(&[
            HEL.as_bytes(),
            b"\ndata: \xff\xfe\n",
            LO.as_bytes(),
            b"\n",
        ]))
        .await;
        let fragments: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn overlong_line_is_skipped() {
        let mut body = vec![b'x'; MAX_LINE_LENGTH + 10];
        body.push(b'\n');
        body.extend_from_slice(format!("{HEL}\n").as_bytes());
        let fragments = collect_fragments(chunks(&[&body])).await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_deref().unwrap(), "Hel");
    }

    #[tokio::test]
    async fn overlong_line_across_chunks_is_skipped() {
        let filler = vec![b'x'; MAX_LINE_LENGTH / 2];
        let tail = format!("xx\n{LO}\n");
        let fragments =
            collect_fragments(chunks(&[&filler, &filler, &filler, tail.as_bytes()])).await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_deref().unwrap(), "lo");
    }

    #[test]
    fn unterminated_line_does_not_grow_the_buffer() {
        let mut lines = LineBuffer::default();
        let filler = vec![b'x'; MAX_LINE_LENGTH / 2];
        for _ in 0..8 {
            lines.buffer.extend_from_slice(&filler);
            assert!(lines.next_line().is_none());
            assert!(lines.buffer.len() <= MAX_LINE_LENGTH + filler.len());
        }
    }

    #[tokio::test]
    async fn fragments_after_done_are_still_delivered() {
        let body = format!("{HEL}\ndata: [DONE]\n{LO}\n");
        let fragments = collect_fragments(chunks(&[body.as_bytes()])).await;
        let fragments: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_decoded() {
        let body = format!("{HEL}\n{LO}");
        let fragments = collect_fragments(chunks(&[body.as_bytes()])).await;
        let fragments: Vec<String> = fragments.into_iter().map(|f| f.unwrap()).collect();
        assert_eq!(fragments, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let byte_stream = stream::iter(vec![
            Ok(Bytes::from(format!("{HEL}\n"))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset")),
            Ok(Bytes::from(format!("{LO}\n"))),
        ]);
        let results = collect_fragments(byte_stream).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), "Hel");
        let err = results[1].as_ref().unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("peer reset"));
    }

    #[tokio::test]
    async fn frame_stream_reports_every_line() {
        let body = format!("{HEL}\n\ndata: [DONE]\n");
        let frames: Vec<_> = Box::pin(decode_stream(chunks(&[body.as_bytes()])))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|f| f.unwrap())
            .collect();
        assert_eq!(
            frames,
            vec![
                StreamFrame::Fragment("Hel".to_string()),
                StreamFrame::Ignored,
                StreamFrame::Done,
            ]
        );
    }
}
