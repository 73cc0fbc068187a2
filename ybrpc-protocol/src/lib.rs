//! # ybrpc-protocol
//!
//! Wire protocol for the cluster's binary RPC transport.
//!
//! This crate provides:
//! - Connection preamble and request encoding with compact length prefixes
//! - Chunked frame reading with the four-zero-byte end-of-frame sentinel
//! - Response decoding with payload accumulation across frames
//! - Hand-declared protobuf messages for the master and generic services
//! - A registry mapping request types to `(service, method)` pairs

pub mod codec;
pub mod error;
pub mod frame;
pub mod hybrid_time;
pub mod message;
pub mod object_id;
pub mod registry;
pub mod schema;
pub mod varint;

#[cfg(test)]
mod testing;

pub use codec::{decode_response, encode_request, read_response, LENGTH_PREFIX_SIZE};
pub use error::{ProtocolError, ServiceRpcError};
pub use frame::{read_frame, Frame, FrameEnd, END_OF_FRAME, READ_CHUNK_SIZE};
pub use hybrid_time::HybridTime;
pub use object_id::ObjectId;
pub use registry::{RegistryEntry, ServiceRegistry};
pub use schema::{MethodDescriptor, ServiceDescriptor};

/// Bytes a client writes once, immediately after the transport connects.
pub const CONNECTION_PREAMBLE: [u8; 3] = [b'Y', b'B', PROTOCOL_VERSION];

/// Protocol version carried in the connection preamble.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default RPC port of a master server.
pub const DEFAULT_MASTER_PORT: u16 = 7100;

/// Default RPC port of a tablet server.
pub const DEFAULT_TSERVER_PORT: u16 = 9100;
