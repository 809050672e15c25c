use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, ReadBuf};

/// Serial port stand-in serving canned chunks of bytes.
///
/// Every chunk is delivered by its own read, so a line can be split
/// across reads the way a real port splits it.
pub(crate) struct FakeBuffer {
    chunks: VecDeque<Vec<u8>>,
    hang: bool,
}

impl FakeBuffer {
    pub(crate) fn new(data: impl Into<Vec<u8>>) -> Self {
        Self::chunked(vec![data.into()])
    }

    pub(crate) fn chunked(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().filter(|c| !c.is_empty()).collect(),
            hang: false,
        }
    }

    /// Stay silent after the last chunk instead of signalling end of stream.
    pub(crate) fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

impl AsyncRead for FakeBuffer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.chunks.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                if n < chunk.len() {
                    let rest = chunk.split_off(n);
                    self.chunks.push_front(rest);
                }
                Poll::Ready(Ok(()))
            }
            // Nobody gets woken, the caller's read timeout has to fire.
            None if self.hang => Poll::Pending,
            None => Poll::Ready(Ok(())),
        }
    }
}
