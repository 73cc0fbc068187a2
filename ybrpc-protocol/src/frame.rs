//! Chunked frame reader.
//!
//! The server side of the stream does not delimit responses by their length
//! prefix alone. A response arrives as one or more chunks, and the end of a
//! frame is signalled either by a read that comes back shorter than the chunk
//! size, or by a read of exactly four zero bytes:
//!
//! ```text
//! read -> 4096 bytes   keep reading
//! read -> 4096 bytes   keep reading
//! read -> 1203 bytes   end of frame (data kept)
//!
//! read -> 4096 bytes   keep reading
//! read -> 00 00 00 00  end of frame (sentinel discarded)
//! ```

use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of each read issued against the stream.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Chunk content marking the end of a frame.
pub const END_OF_FRAME: [u8; 4] = [0; 4];

/// How a frame read finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEnd {
    /// A four-zero-byte chunk was read and discarded.
    Sentinel,
    /// A chunk shorter than [`READ_CHUNK_SIZE`] was read and kept. A
    /// zero-length read (end of stream) also ends here.
    ShortRead,
}

/// Bytes accumulated by one call to [`read_frame`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: BytesMut,
    pub end: FrameEnd,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Reads chunks from `reader` until the end of the current frame.
///
/// Read errors are returned immediately; bytes accumulated before the error
/// are dropped.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Frame>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut data = BytesMut::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut chunk).await?;

        if n == END_OF_FRAME.len() && chunk[..n] == END_OF_FRAME {
            return Ok(Frame {
                data,
                end: FrameEnd::Sentinel,
            });
        }

        data.extend_from_slice(&chunk[..n]);

        if n < READ_CHUNK_SIZE {
            return Ok(Frame {
                data,
                end: FrameEnd::ShortRead,
            });
        }
    }
}
