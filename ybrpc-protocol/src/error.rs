//! Protocol error types.

use crate::message::{ErrorStatusPb, RpcErrorCodePb};
use thiserror::Error;

/// Errors produced while framing, encoding or decoding RPC messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] prost::EncodeError),

    /// The framed request would not fit the signed 32-bit length prefix.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The response length prefix or header could not be parsed.
    #[error("malformed response header: {0}")]
    MalformedHeader(String),

    /// The payload bytes read do not match the declared payload length.
    #[error("truncated response: declared {declared} payload bytes, accumulated {received}")]
    Truncated { declared: usize, received: usize },

    /// The payload was framed correctly but is not a valid message of the expected type.
    #[error("unprocessable response payload: {0}")]
    Unprocessable(#[source] prost::DecodeError),

    /// The server answered with an error status instead of a result.
    #[error(transparent)]
    Service(#[from] ServiceRpcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// The cluster answered, and the answer was an error.
    pub fn is_application(&self) -> bool {
        matches!(self, ProtocolError::Service(_))
    }

    /// The byte stream did not follow the framing rules. The connection
    /// should not be trusted for further calls.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedHeader(_) | ProtocolError::Truncated { .. }
        )
    }

    /// Returns the remote status if this is an application error.
    pub fn service_error(&self) -> Option<&ServiceRpcError> {
        match self {
            ProtocolError::Service(err) => Some(err),
            _ => None,
        }
    }
}

/// Structured error status returned by the server for a single call.
///
/// `ErrorStatusPb` has no source location. Statuses that carry one arrive
/// as [`AppStatusPb`](crate::message::AppStatusPb) inside response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote error {code}: {message}")]
pub struct ServiceRpcError {
    pub code: RpcErrorCodePb,
    pub message: String,
}

impl ServiceRpcError {
    pub fn new(code: RpcErrorCodePb, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl From<ErrorStatusPb> for ServiceRpcError {
    fn from(status: ErrorStatusPb) -> Self {
        let code = status
            .code
            .and_then(|c| RpcErrorCodePb::try_from(c).ok())
            .unwrap_or_default();
        Self {
            code,
            message: status.message,
        }
    }
}
