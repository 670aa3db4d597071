//! Incremental UTF-8 decoding of a streamed response body.
//!
//! Deliveries from the network rarely line up with character boundaries, so
//! a multi-byte character can arrive split across two reads. The decoder keeps
//! the incomplete tail of one delivery and prepends it to the next instead of
//! decoding each delivery on its own.

use futures_util::{Stream, StreamExt};
use tracing::debug;

use crate::error::{BoxError, DecodeError};

/// Stateful UTF-8 decoder that holds back incomplete trailing sequences.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + data` as forms complete characters.
    ///
    /// An incomplete sequence at the end is kept for the next call. Bytes that
    /// can never form a valid character are replaced with U+FFFD.
    pub fn push(&mut self, data: &[u8]) -> String {
        self.pending.extend_from_slice(data);

        let mut out = String::with_capacity(self.pending.len());
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[..valid]) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        // Truncated sequence at the end, wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is left once no more bytes will arrive.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let bytes = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }
}

/// Turn a byte channel into an ordered stream of text chunks.
///
/// Yields at most one chunk per delivery, in delivery order, and never an
/// empty chunk. A delivery made only of the first bytes of a character yields
/// nothing; its text comes out with the next delivery. A channel error ends
/// the stream with a [`DecodeError`].
pub fn decode<S, B, E>(channel: S) -> impl Stream<Item = Result<String, DecodeError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<BoxError>,
{
    async_stream::stream! {
        let mut decoder = Utf8Decoder::new();
        let mut bytes_read = 0usize;
        futures_util::pin_mut!(channel);

        while let Some(delivery) = channel.next().await {
            match delivery {
                Ok(data) => {
                    let data = data.as_ref();
                    bytes_read += data.len();
                    let text = decoder.push(data);
                    if decoder.pending_bytes() > 0 {
                        debug!(pending = decoder.pending_bytes(), "holding incomplete character");
                    }
                    if !text.is_empty() {
                        yield Ok(text);
                    }
                }
                Err(err) => {
                    yield Err(DecodeError {
                        bytes_read,
                        source: err.into(),
                    });
                    return;
                }
            }
        }

        let tail = decoder.finish();
        if !tail.is_empty() {
            yield Ok(tail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::io;

    async fn collect(deliveries: Vec<Result<Vec<u8>, io::Error>>) -> Vec<Result<String, DecodeError>> {
        decode(stream::iter(deliveries)).collect().await
    }

    fn texts(items: Vec<Result<String, DecodeError>>) -> Vec<String> {
        items.into_iter().map(|item| item.expect("decoded chunk")).collect()
    }

    #[test]
    fn test_push_ascii() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(b"Consider "), "Consider ");
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_push_holds_incomplete_sequence() {
        let euro = "€".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&[b'a', euro[0], euro[1]]), "a");
        assert_eq!(decoder.pending_bytes(), 2);
        assert_eq!(decoder.push(&euro[2..]), "€");
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_push_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(b"ok\xFFok"), "ok\u{FFFD}ok");
    }

    #[test]
    fn test_finish_flushes_partial_sequence_lossily() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&"€".as_bytes()[..2]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[tokio::test]
    async fn test_three_byte_char_split_two_then_one() {
        let euro = "€".as_bytes().to_vec();
        let chunks = texts(collect(vec![Ok(euro[..2].to_vec()), Ok(euro[2..].to_vec())]).await);
        assert_eq!(chunks, vec!["€".to_string()]);
    }

    #[tokio::test]
    async fn test_three_byte_char_split_one_then_two() {
        let peso = "₱".as_bytes().to_vec();
        let chunks = texts(
            collect(vec![
                Ok(b"Cost: ".iter().copied().chain(peso[..1].iter().copied()).collect()),
                Ok(peso[1..].iter().copied().chain(b"500".iter().copied()).collect()),
            ])
            .await,
        );
        assert_eq!(chunks.concat(), "Cost: ₱500");
        assert_eq!(chunks, vec!["Cost: ".to_string(), "₱500".to_string()]);
    }

    #[tokio::test]
    async fn test_four_byte_char_one_byte_per_delivery() {
        let deliveries = "💰".bytes().map(|b| Ok(vec![b])).collect();
        let chunks = texts(collect(deliveries).await);
        assert_eq!(chunks, vec!["💰".to_string()]);
    }

    #[tokio::test]
    async fn test_chunks_keep_delivery_order() {
        let chunks = texts(
            collect(vec![
                Ok(b"Consider ".to_vec()),
                Ok(b"a debt ".to_vec()),
                Ok(b"snowball plan.".to_vec()),
            ])
            .await,
        );
        assert_eq!(chunks, vec!["Consider ", "a debt ", "snowball plan."]);
    }

    #[tokio::test]
    async fn test_empty_channel_yields_nothing() {
        assert!(collect(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_length_delivery_is_skipped() {
        let chunks = texts(collect(vec![Ok(Vec::new()), Ok(b"hi".to_vec()), Ok(Vec::new())]).await);
        assert_eq!(chunks, vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_trailing_partial_sequence_flushed_at_end() {
        let chunks = texts(collect(vec![Ok(b"done".to_vec()), Ok(vec![0xE2, 0x82])]).await);
        assert_eq!(chunks, vec!["done".to_string(), "\u{FFFD}".to_string()]);
    }

    #[tokio::test]
    async fn test_channel_error_is_propagated() {
        let items = collect(vec![
            Ok(b"partial".to_vec()),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed")),
            Ok(b"never seen".to_vec()),
        ])
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("partial"));
        let err = items[1].as_ref().expect_err("channel error");
        assert_eq!(err.bytes_read, 7);
        assert!(err.is_malformed_body());
    }
}
