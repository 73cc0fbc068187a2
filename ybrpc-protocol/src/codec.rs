//! Request encoding and response decoding.
//!
//! Request layout:
//!
//! ```text
//! +-------------+---------------+--------+----------------+---------+
//! | total_len   | header_len    | header | payload_len    | payload |
//! | 4 bytes BE  | compact uint  |        | compact uint   |         |
//! +-------------+---------------+--------+----------------+---------+
//! ```
//!
//! Response layout is the same, except the two inner length prefixes are
//! protobuf varints and `total_len` is informational only.

use crate::error::ProtocolError;
use crate::frame::{read_frame, FrameEnd};
use crate::message::{ErrorStatusPb, RequestHeader, ResponseHeader};
use crate::varint::{compact_len, get_uvarint, put_compact, put_uvarint, uvarint_len};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Size of the big-endian total length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest total length the signed prefix can express.
pub const MAX_FRAME_SIZE: usize = i32::MAX as usize;

/// Encodes a request header and payload into a single frame.
pub fn encode_request<P: Message>(
    header: &RequestHeader,
    payload: &P,
) -> Result<BytesMut, ProtocolError> {
    let header_len = header.encoded_len();
    let payload_len = payload.encoded_len();
    let total = compact_len(header_len as u64)
        + header_len
        + compact_len(payload_len as u64)
        + payload_len;

    let total_prefix = i32::try_from(total).map_err(|_| ProtocolError::FrameTooLarge {
        size: total,
        max: MAX_FRAME_SIZE,
    })?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + total);
    buf.put_i32(total_prefix);

    put_compact(&mut buf, header_len as u64);
    header.encode(&mut buf)?;

    put_compact(&mut buf, payload_len as u64);
    payload.encode(&mut buf)?;

    Ok(buf)
}

/// Encodes a response frame the way the server writes it.
///
/// The client never sends responses; this exists for in-process test
/// servers and benchmarks.
pub fn encode_response<P: Message>(
    header: &ResponseHeader,
    payload: &P,
) -> Result<BytesMut, ProtocolError> {
    let header_len = header.encoded_len();
    let payload_len = payload.encoded_len();
    let total =
        uvarint_len(header_len as u64) + header_len + uvarint_len(payload_len as u64) + payload_len;

    let total_prefix = i32::try_from(total).map_err(|_| ProtocolError::FrameTooLarge {
        size: total,
        max: MAX_FRAME_SIZE,
    })?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + total);
    buf.put_i32(total_prefix);

    put_uvarint(&mut buf, header_len as u64);
    header.encode(&mut buf)?;

    put_uvarint(&mut buf, payload_len as u64);
    payload.encode(&mut buf)?;

    Ok(buf)
}

/// Encodes an error response carrying `status`.
pub fn encode_error_response(
    call_id: i32,
    status: &ErrorStatusPb,
) -> Result<BytesMut, ProtocolError> {
    let header = ResponseHeader {
        call_id,
        is_error: Some(true),
        sidecar_offsets: Vec::new(),
    };
    encode_response(&header, status)
}

/// Parsed fixed part of a response frame.
#[derive(Debug, Clone)]
pub struct ResponsePreamble {
    /// Declared total length. Not validated.
    pub total_len: i32,
    pub header: ResponseHeader,
    /// Declared payload length in bytes.
    pub payload_len: usize,
}

impl ResponsePreamble {
    pub fn is_error(&self) -> bool {
        self.header.is_error.unwrap_or(false)
    }
}

/// Parses the length prefix, header and payload length from the front of
/// `buf`, leaving `buf` positioned at the first payload byte.
pub fn decode_preamble(buf: &mut BytesMut) -> Result<ResponsePreamble, ProtocolError> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::MalformedHeader(format!(
            "response shorter than length prefix ({} bytes)",
            buf.len()
        )));
    }
    let total_len = buf.get_i32();

    let header_len = get_uvarint(buf)? as usize;
    if buf.len() < header_len {
        return Err(ProtocolError::MalformedHeader(format!(
            "declared header length {} exceeds {} available bytes",
            header_len,
            buf.len()
        )));
    }
    let header_bytes = buf.split_to(header_len);
    let header = ResponseHeader::decode(header_bytes.freeze())
        .map_err(|e| ProtocolError::MalformedHeader(e.to_string()))?;

    let payload_len = get_uvarint(buf)? as usize;

    Ok(ResponsePreamble {
        total_len,
        header,
        payload_len,
    })
}

/// Reads one response frame from `reader` and decodes it into `M`.
///
/// A successful response with an empty body decodes to `M::default()`. An
/// error response is returned as [`ProtocolError::Service`] without touching
/// `M`.
pub async fn read_response<R, M>(reader: &mut R) -> Result<M, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Message + Default,
{
    let frame = read_frame(reader).await?;
    decode_response(reader, frame.data).await.map(|(_, msg)| msg)
}

/// Decodes a response whose first frame is already in `buf`, pulling more
/// frames from `reader` if the payload is longer than what was read.
///
/// Returns the response header alongside the decoded message.
pub async fn decode_response<R, M>(
    reader: &mut R,
    mut buf: BytesMut,
) -> Result<(ResponseHeader, M), ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Message + Default,
{
    let preamble = decode_preamble(&mut buf)?;

    if !preamble.is_error() && preamble.payload_len == 0 {
        return Ok((preamble.header, M::default()));
    }

    let payload = accumulate_payload(reader, buf, preamble.payload_len).await?;

    if preamble.is_error() {
        let status = ErrorStatusPb::decode(payload).map_err(ProtocolError::Unprocessable)?;
        return Err(ProtocolError::Service(status.into()));
    }

    let message = M::decode(payload).map_err(ProtocolError::Unprocessable)?;
    Ok((preamble.header, message))
}

/// Collects exactly `declared` payload bytes, starting with what is left in
/// `buf` and reading further frames as needed.
async fn accumulate_payload<R>(
    reader: &mut R,
    mut buf: BytesMut,
    declared: usize,
) -> Result<Bytes, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if buf.len() >= declared {
        buf.truncate(declared);
        return Ok(buf.freeze());
    }

    while buf.len() < declared {
        let frame = read_frame(reader).await?;
        if frame.is_empty() {
            if frame.end == FrameEnd::Sentinel {
                continue;
            }
            return Err(ProtocolError::Truncated {
                declared,
                received: buf.len(),
            });
        }
        buf.extend_from_slice(&frame.data);
        if buf.len() > declared {
            return Err(ProtocolError::Truncated {
                declared,
                received: buf.len(),
            });
        }
    }

    Ok(buf.freeze())
}

/// Reads one request frame, as a server would. Used by in-process test
/// servers; returns `None` on a clean end of stream.
pub async fn read_request<R, P>(reader: &mut R) -> Result<Option<(RequestHeader, P)>, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
    P: Message + Default,
{
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let total = i32::from_be_bytes(prefix);
    let total = usize::try_from(total).map_err(|_| {
        ProtocolError::MalformedHeader(format!("negative request length {}", total))
    })?;

    let mut body = vec![0u8; total];
    reader.read_exact(&mut body).await?;
    let mut body = Bytes::from(body);

    let header_len = crate::varint::get_compact(&mut body)? as usize;
    if body.len() < header_len {
        return Err(ProtocolError::MalformedHeader(
            "request header overruns frame".to_string(),
        ));
    }
    let header = RequestHeader::decode(body.split_to(header_len))
        .map_err(|e| ProtocolError::MalformedHeader(e.to_string()))?;

    let payload_len = crate::varint::get_compact(&mut body)? as usize;
    if body.len() != payload_len {
        return Err(ProtocolError::Truncated {
            declared: payload_len,
            received: body.len(),
        });
    }
    let payload = P::decode(body).map_err(ProtocolError::Unprocessable)?;

    Ok(Some((header, payload)))
}
