//! Master service messages (`yb.master`).

use super::common::{AppStatusPb, CloudInfoPb, HostPortPb, PeerRole};
use std::fmt;

/// Identity of a running server process.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NodeInstancePb {
    /// Permanent id of the server, as ASCII hex bytes.
    #[prost(bytes = "vec", required, tag = "1")]
    pub permanent_uuid: Vec<u8>,
    /// Incremented each time the process restarts.
    #[prost(int64, required, tag = "2")]
    pub instance_seqno: i64,
}

/// Addresses and placement a server registers with the master.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerRegistrationPb {
    #[prost(message, repeated, tag = "1")]
    pub private_rpc_addresses: Vec<HostPortPb>,
    #[prost(message, repeated, tag = "3")]
    pub http_addresses: Vec<HostPortPb>,
    #[prost(message, optional, tag = "4")]
    pub cloud_info: Option<CloudInfoPb>,
    #[prost(bytes = "vec", optional, tag = "5")]
    pub placement_uuid: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "6")]
    pub broadcast_addresses: Vec<HostPortPb>,
}

/// Tablet server registration.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TsRegistrationPb {
    #[prost(message, optional, tag = "1")]
    pub common: Option<ServerRegistrationPb>,
}

/// Application error embedded in master responses.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MasterErrorPb {
    #[prost(enumeration = "MasterErrorCode", required, tag = "1")]
    pub code: i32,
    #[prost(message, optional, tag = "2")]
    pub status: Option<AppStatusPb>,
}

impl fmt::Display for MasterErrorPb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match MasterErrorCode::try_from(self.code) {
            Ok(code) => write!(f, "{:?}", code)?,
            Err(_) => write!(f, "master error {}", self.code)?,
        }
        if let Some(status) = &self.status {
            write!(f, " [{}]", status)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MasterErrorCode {
    UnknownError = 1,
    InvalidSchema = 2,
    TableNotFound = 3,
    TableAlreadyPresent = 4,
    TooManyTablets = 5,
    CatalogManagerNotInitialized = 6,
    NotTheLeader = 7,
    ReplicationFactorTooHigh = 8,
    TabletNotRunning = 9,
    EvenReplicationFactor = 10,
    IllegalReplicationFactor = 11,
    CanRetryLoadBalanceCheck = 12,
}

/// One master as reported by `ListMasters`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerEntryPb {
    #[prost(message, optional, tag = "1")]
    pub error: Option<AppStatusPb>,
    #[prost(message, optional, tag = "2")]
    pub instance_id: Option<NodeInstancePb>,
    #[prost(message, optional, tag = "3")]
    pub registration: Option<ServerRegistrationPb>,
    #[prost(enumeration = "PeerRole", optional, tag = "4")]
    pub role: Option<i32>,
}

impl ServerEntryPb {
    pub fn peer_role(&self) -> Option<PeerRole> {
        self.role.and_then(|r| PeerRole::try_from(r).ok())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMasterRegistrationRequestPb {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMasterRegistrationResponsePb {
    #[prost(message, optional, tag = "1")]
    pub instance_id: Option<NodeInstancePb>,
    #[prost(message, optional, tag = "2")]
    pub registration: Option<ServerRegistrationPb>,
    #[prost(enumeration = "PeerRole", optional, tag = "3")]
    pub role: Option<i32>,
    #[prost(message, optional, tag = "4")]
    pub error: Option<MasterErrorPb>,
}

impl GetMasterRegistrationResponsePb {
    /// Returns the reported role, or `None` when the field is unset or unknown.
    pub fn peer_role(&self) -> Option<PeerRole> {
        self.role.and_then(|r| PeerRole::try_from(r).ok())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListMastersRequestPb {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListMastersResponsePb {
    #[prost(message, repeated, tag = "1")]
    pub masters: Vec<ServerEntryPb>,
    #[prost(message, optional, tag = "2")]
    pub error: Option<MasterErrorPb>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListTabletServersRequestPb {
    #[prost(bool, optional, tag = "1")]
    pub primary_only: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListTabletServersResponsePb {
    #[prost(message, optional, tag = "1")]
    pub error: Option<MasterErrorPb>,
    #[prost(message, repeated, tag = "2")]
    pub servers: Vec<list_tablet_servers_response_pb::Entry>,
}

pub mod list_tablet_servers_response_pb {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entry {
        #[prost(message, optional, tag = "1")]
        pub instance_id: Option<super::NodeInstancePb>,
        #[prost(message, optional, tag = "2")]
        pub registration: Option<super::TsRegistrationPb>,
        #[prost(int32, optional, tag = "3")]
        pub millis_since_heartbeat: Option<i32>,
        #[prost(bool, optional, tag = "4")]
        pub alive: Option<bool>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IsLoadBalancedRequestPb {
    #[prost(int32, optional, tag = "1")]
    pub expected_num_servers: Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IsLoadBalancedResponsePb {
    #[prost(message, optional, tag = "1")]
    pub error: Option<MasterErrorPb>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IsLoadBalancerIdleRequestPb {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IsLoadBalancerIdleResponsePb {
    #[prost(message, optional, tag = "1")]
    pub error: Option<MasterErrorPb>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChangeLoadBalancerStateRequestPb {
    #[prost(bool, optional, tag = "1")]
    pub is_enabled: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ChangeLoadBalancerStateResponsePb {
    #[prost(message, optional, tag = "1")]
    pub error: Option<MasterErrorPb>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLoadBalancerStateRequestPb {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetLoadBalancerStateResponsePb {
    #[prost(message, optional, tag = "1")]
    pub error: Option<MasterErrorPb>,
    #[prost(bool, optional, tag = "2")]
    pub is_enabled: Option<bool>,
}

/// Master responses that may carry an embedded [`MasterErrorPb`].
pub trait MasterResponse {
    fn master_error(&self) -> Option<&MasterErrorPb>;
}

macro_rules! impl_master_response {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MasterResponse for $ty {
                fn master_error(&self) -> Option<&MasterErrorPb> {
                    self.error.as_ref()
                }
            }
        )*
    };
}

impl_master_response!(
    GetMasterRegistrationResponsePb,
    ListMastersResponsePb,
    ListTabletServersResponsePb,
    IsLoadBalancedResponsePb,
    IsLoadBalancerIdleResponsePb,
    ChangeLoadBalancerStateResponsePb,
    GetLoadBalancerStateResponsePb,
);
