//! Line-framed byte stream decoding.
//!
//! Both wire formats this crate reads are line oriented: Ollama streams
//! newline-delimited JSON and AG-UI streams Server-Sent Events. The framing
//! (buffering bytes across chunk boundaries, splitting on `\n`, stripping
//! `\r`, flushing at end of stream) lives here; a [`LineDecoder`] turns lines
//! into items.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// Turns complete lines into items.
pub trait LineDecoder {
    type Item;

    /// Handle one line (without its terminator). May produce an item.
    fn decode_line(&mut self, line: &str) -> Option<Self::Item>;

    /// Called once after the byte stream ends and the last partial line has
    /// been decoded. Emits anything still accumulated.
    fn finish(&mut self) -> Option<Self::Item> {
        None
    }
}

/// Stream adapter that frames a byte stream into lines and decodes them.
pub struct FramedStream<S, D: LineDecoder> {
    inner: S,
    decoder: D,
    /// Bytes of the current incomplete line. Kept as bytes so multi-byte
    /// UTF-8 sequences split across chunks decode correctly.
    line_buf: Vec<u8>,
    pending: VecDeque<D::Item>,
    finished: bool,
}

impl<S, D: LineDecoder> FramedStream<S, D> {
    pub fn new(inner: S, decoder: D) -> Self {
        Self {
            inner,
            decoder,
            line_buf: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\n' {
                let raw = std::mem::take(&mut self.line_buf);
                self.decode_raw_line(&raw);
            } else {
                self.line_buf.push(b);
            }
        }
    }

    fn decode_raw_line(&mut self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if let Some(item) = self.decoder.decode_line(&line) {
            self.pending.push_back(item);
        }
    }

    fn flush(&mut self) {
        if !self.line_buf.is_empty() {
            let raw = std::mem::take(&mut self.line_buf);
            self.decode_raw_line(&raw);
        }
        if let Some(item) = self.decoder.finish() {
            self.pending.push_back(item);
        }
    }
}

impl<S, D, E> Stream for FramedStream<S, D>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    D: LineDecoder + Unpin,
    D::Item: Unpin,
{
    type Item = Result<D::Item, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(item) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.feed(&bytes),
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => {
                    this.finished = true;
                    this.flush();
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
