//! # ybrpc-client
//!
//! Client engine for the cluster's binary RPC protocol.
//!
//! This crate provides:
//! - Single-node connections with a background handshake and sequential calls
//! - Concurrent leader discovery across master candidates
//! - Plain TCP or TLS transport
//! - Prometheus metrics for calls and discovery
//! - YAML and environment configuration
//! - A typed operation layer over the master and generic services

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod leader;
pub mod metrics;
pub mod stream;
pub mod tls;

pub use client::Client;
pub use config::{ClientConfig, ConfigError};
pub use connection::{Connection, ConnectionConfig};
pub use error::{CandidateFailure, CandidateFailures, ClientError};
pub use leader::{find_leader, DiscoveryConfig, LeaderDiscovery};
pub use metrics::RpcMetrics;
pub use stream::ClientStream;
pub use tls::TlsClientConfig;
