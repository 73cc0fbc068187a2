//! In-memory stream doubles for codec tests.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Reader that hands out a fixed sequence of chunks, one per read call, and
/// counts the reads issued against it. Reads past the script return end of
/// stream.
#[derive(Debug, Default)]
pub(crate) struct ScriptedReader {
    script: VecDeque<Result<Vec<u8>, io::ErrorKind>>,
    reads: usize,
}

impl ScriptedReader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn chunk(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.script.push_back(Ok(data.into()));
        self
    }

    pub(crate) fn error(mut self, kind: io::ErrorKind) -> Self {
        self.script.push_back(Err(kind));
        self
    }

    /// Splits `data` into full chunks of `chunk_size` followed by the remainder.
    pub(crate) fn chunks_of(mut self, data: &[u8], chunk_size: usize) -> Self {
        for piece in data.chunks(chunk_size) {
            self.script.push_back(Ok(piece.to_vec()));
        }
        self
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads
    }
}

impl AsyncRead for ScriptedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.reads += 1;
        match this.script.pop_front() {
            None => Poll::Ready(Ok(())),
            Some(Err(kind)) => Poll::Ready(Err(io::Error::from(kind))),
            Some(Ok(chunk)) => {
                assert!(
                    chunk.len() <= buf.remaining(),
                    "scripted chunk larger than read buffer"
                );
                buf.put_slice(&chunk);
                Poll::Ready(Ok(()))
            }
        }
    }
}
