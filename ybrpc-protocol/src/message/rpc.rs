//! RPC envelope messages (`yb.rpc`).
//!
//! These are the header messages that wrap every request and response on
//! the wire. Field tags follow the cluster's `rpc_header.proto`.

use std::fmt;

/// Identifies the remote method a request is addressed to.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoteMethodPb {
    #[prost(string, required, tag = "1")]
    pub service_name: String,
    #[prost(string, required, tag = "2")]
    pub method_name: String,
}

/// Header sent ahead of every request payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestHeader {
    /// Per-connection call sequence number.
    #[prost(int32, optional, tag = "3")]
    pub call_id: Option<i32>,
    #[prost(message, optional, tag = "6")]
    pub remote_method: Option<RemoteMethodPb>,
    /// Advisory timeout the server applies to this call.
    #[prost(uint32, optional, tag = "10")]
    pub timeout_millis: Option<u32>,
}

/// Header received ahead of every response payload.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseHeader {
    #[prost(int32, required, tag = "1")]
    pub call_id: i32,
    #[prost(bool, optional, tag = "2")]
    pub is_error: Option<bool>,
    /// Offsets of out-of-band attachments. Never interpreted by this client.
    #[prost(uint32, repeated, packed = "false", tag = "3")]
    pub sidecar_offsets: Vec<u32>,
}

/// Payload of a response whose header has `is_error` set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorStatusPb {
    #[prost(string, required, tag = "1")]
    pub message: String,
    #[prost(enumeration = "RpcErrorCodePb", optional, tag = "2")]
    pub code: Option<i32>,
}

/// RPC-layer error codes carried by [`ErrorStatusPb`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RpcErrorCodePb {
    FatalUnknown = 10,
    ErrorApplication = 1,
    ErrorNoSuchMethod = 2,
    ErrorNoSuchService = 3,
    ErrorServerTooBusy = 4,
    ErrorInvalidRequest = 5,
    FatalInvalidRpcHeader = 11,
    FatalDeserializingRequest = 12,
    FatalVersionMismatch = 13,
    FatalUnauthorized = 14,
}

impl RpcErrorCodePb {
    /// Fatal codes mean the server tore down the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RpcErrorCodePb::FatalUnknown
                | RpcErrorCodePb::FatalInvalidRpcHeader
                | RpcErrorCodePb::FatalDeserializingRequest
                | RpcErrorCodePb::FatalVersionMismatch
                | RpcErrorCodePb::FatalUnauthorized
        )
    }

    /// Returns whether the same call may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcErrorCodePb::ErrorServerTooBusy)
    }
}

impl fmt::Display for RpcErrorCodePb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RpcErrorCodePb::FatalUnknown => "FATAL_UNKNOWN",
            RpcErrorCodePb::ErrorApplication => "ERROR_APPLICATION",
            RpcErrorCodePb::ErrorNoSuchMethod => "ERROR_NO_SUCH_METHOD",
            RpcErrorCodePb::ErrorNoSuchService => "ERROR_NO_SUCH_SERVICE",
            RpcErrorCodePb::ErrorServerTooBusy => "ERROR_SERVER_TOO_BUSY",
            RpcErrorCodePb::ErrorInvalidRequest => "ERROR_INVALID_REQUEST",
            RpcErrorCodePb::FatalInvalidRpcHeader => "FATAL_INVALID_RPC_HEADER",
            RpcErrorCodePb::FatalDeserializingRequest => "FATAL_DESERIALIZING_REQUEST",
            RpcErrorCodePb::FatalVersionMismatch => "FATAL_VERSION_MISMATCH",
            RpcErrorCodePb::FatalUnauthorized => "FATAL_UNAUTHORIZED",
        };
        f.write_str(name)
    }
}
