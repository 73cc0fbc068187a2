//! Protobuf message catalogue.
//!
//! Messages are declared by hand with `prost` derives and explicit tags so the
//! encoded bytes match the cluster's protobuf schema. Every request type
//! implements [`prost::Name`]; its fully-qualified name is the key the
//! [`ServiceRegistry`](crate::ServiceRegistry) resolves to a remote method.

pub mod common;
pub mod master;
pub mod rpc;
pub mod server;

pub use common::*;
pub use master::*;
pub use rpc::*;
pub use server::*;

/// Protobuf package of the RPC envelope messages.
pub const RPC_PACKAGE: &str = "yb.rpc";
/// Protobuf package of the master service messages.
pub const MASTER_PACKAGE: &str = "yb.master";
/// Protobuf package of the generic server service messages.
pub const SERVER_PACKAGE: &str = "yb.server";

macro_rules! impl_name {
    ($package:expr => $($ty:ty = $name:literal),* $(,)?) => {
        $(
            impl ::prost::Name for $ty {
                const NAME: &'static str = $name;
                const PACKAGE: &'static str = $package;
            }
        )*
    };
}

impl_name!(RPC_PACKAGE =>
    RequestHeader = "RequestHeader",
    ResponseHeader = "ResponseHeader",
    ErrorStatusPb = "ErrorStatusPB",
);

impl_name!(MASTER_PACKAGE =>
    GetMasterRegistrationRequestPb = "GetMasterRegistrationRequestPB",
    GetMasterRegistrationResponsePb = "GetMasterRegistrationResponsePB",
    ListMastersRequestPb = "ListMastersRequestPB",
    ListMastersResponsePb = "ListMastersResponsePB",
    ListTabletServersRequestPb = "ListTabletServersRequestPB",
    ListTabletServersResponsePb = "ListTabletServersResponsePB",
    IsLoadBalancedRequestPb = "IsLoadBalancedRequestPB",
    IsLoadBalancedResponsePb = "IsLoadBalancedResponsePB",
    IsLoadBalancerIdleRequestPb = "IsLoadBalancerIdleRequestPB",
    IsLoadBalancerIdleResponsePb = "IsLoadBalancerIdleResponsePB",
    ChangeLoadBalancerStateRequestPb = "ChangeLoadBalancerStateRequestPB",
    ChangeLoadBalancerStateResponsePb = "ChangeLoadBalancerStateResponsePB",
    GetLoadBalancerStateRequestPb = "GetLoadBalancerStateRequestPB",
    GetLoadBalancerStateResponsePb = "GetLoadBalancerStateResponsePB",
);

impl_name!(SERVER_PACKAGE =>
    PingRequestPb = "PingRequestPB",
    PingResponsePb = "PingResponsePB",
    ServerClockRequestPb = "ServerClockRequestPB",
    ServerClockResponsePb = "ServerClockResponsePB",
);

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Name;

    #[test]
    fn test_full_names() {
        assert_eq!(
            GetMasterRegistrationRequestPb::full_name(),
            "yb.master.GetMasterRegistrationRequestPB"
        );
        assert_eq!(PingRequestPb::full_name(), "yb.server.PingRequestPB");
        assert_eq!(RequestHeader::full_name(), "yb.rpc.RequestHeader");
    }
}
