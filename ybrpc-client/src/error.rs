//! Client error types.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use ybrpc_protocol::message::{MasterErrorCode, MasterErrorPb};
use ybrpc_protocol::ProtocolError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The request type is not declared by any registered service.
    #[error("no service registered for request type {0}")]
    NoServiceForType(String),

    #[error("failed to send request: {0}")]
    Send(#[source] std::io::Error),

    #[error("connection handshake failed: {0}")]
    Handshake(String),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    /// The transport could not be dialed within the connect timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("request timeout")]
    Timeout,

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    /// Every discovery candidate failed or reported a non-leader role.
    #[error("no reachable leader: {0}")]
    NoReachableLeader(CandidateFailures),

    #[error("leader discovery timed out after {0:?}")]
    DiscoveryTimeout(Duration),

    /// The master answered the call but reported an error in the response body.
    #[error("master error: {0}")]
    Master(MasterErrorPb),
}

impl ClientError {
    /// The cluster answered and refused. The connection is still usable.
    pub fn is_application_error(&self) -> bool {
        match self {
            ClientError::Protocol(e) => e.is_application(),
            ClientError::Master(_) => true,
            _ => false,
        }
    }

    /// The node could not be talked to, or the byte stream cannot be
    /// trusted. Usually means another node should be tried.
    pub fn is_transport_error(&self) -> bool {
        match self {
            ClientError::Io(_)
            | ClientError::Send(_)
            | ClientError::Handshake(_)
            | ClientError::NotConnected
            | ClientError::ConnectionClosed
            | ClientError::ConnectTimeout(_)
            | ClientError::Timeout
            | ClientError::TlsHandshake(_) => true,
            ClientError::Protocol(e) => e.is_framing() || matches!(e, ProtocolError::Io(_)),
            _ => false,
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Send(_) => true,
            ClientError::Timeout => true,
            ClientError::ConnectTimeout(_) => true,
            ClientError::ConnectionClosed => true,
            ClientError::DiscoveryTimeout(_) => true,
            ClientError::NoReachableLeader(_) => true,
            ClientError::Protocol(ProtocolError::Io(_)) => true,
            ClientError::Protocol(ProtocolError::Service(e)) => e.is_retryable(),
            ClientError::Master(e) => matches!(
                MasterErrorCode::try_from(e.code),
                Ok(MasterErrorCode::NotTheLeader
                    | MasterErrorCode::CatalogManagerNotInitialized
                    | MasterErrorCode::CanRetryLoadBalanceCheck)
            ),
            _ => false,
        }
    }
}

/// Why one discovery candidate was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub addr: String,
    pub reason: String,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.addr, self.reason)
    }
}

/// Failures collected over one discovery run, in the order they resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFailures(pub Vec<CandidateFailure>);

impl CandidateFailures {
    pub fn push(&mut self, addr: impl Into<String>, reason: impl Into<String>) {
        self.0.push(CandidateFailure {
            addr: addr.into(),
            reason: reason.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateFailure> {
        self.0.iter()
    }
}

impl fmt::Display for CandidateFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} candidate(s) failed", self.0.len())?;
        for (i, failure) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, failure)?;
        }
        Ok(())
    }
}
