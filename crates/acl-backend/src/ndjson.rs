//! Newline-delimited JSON decoding, as streamed by Ollama's `/api/chat`.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::framing::{FramedStream, LineDecoder};

/// Decodes each non-blank line as one JSON document of type `T`.
pub struct NdjsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for NdjsonDecoder<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> LineDecoder for NdjsonDecoder<T> {
    type Item = Result<T, serde_json::Error>;

    fn decode_line(&mut self, line: &str) -> Option<Self::Item> {
        if line.trim().is_empty() {
            return None;
        }
        Some(serde_json::from_str(line))
    }
}

/// Create an NDJSON stream of `T` from a byte stream.
pub fn parse_ndjson_stream<S, T>(stream: S) -> FramedStream<S, NdjsonDecoder<T>>
where
    T: DeserializeOwned,
{
    FramedStream::new(stream, NdjsonDecoder::default())
}
