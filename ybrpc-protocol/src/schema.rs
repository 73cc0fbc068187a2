//! Service schema metadata.
//!
//! Declares the services this client speaks and, for each method, the
//! fully-qualified names of its input and output messages. The
//! [`ServiceRegistry`](crate::ServiceRegistry) is built by walking these
//! declarations.

/// A method declared by a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    /// Fully-qualified name of the request message.
    pub input_type: &'static str,
    /// Fully-qualified name of the response message.
    pub output_type: &'static str,
}

/// A service and the methods it declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Fully-qualified service name, as placed in the request header.
    pub name: &'static str,
    pub methods: &'static [MethodDescriptor],
}

impl ServiceDescriptor {
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

pub const MASTER_CLUSTER_SERVICE: &str = "yb.master.MasterCluster";
pub const GENERIC_SERVICE: &str = "yb.server.GenericService";

/// Method used by leader discovery to ask a master for its role.
pub const GET_MASTER_REGISTRATION: &str = "GetMasterRegistration";

macro_rules! method {
    ($package:literal, $name:literal) => {
        MethodDescriptor {
            name: $name,
            input_type: concat!($package, ".", $name, "RequestPB"),
            output_type: concat!($package, ".", $name, "ResponsePB"),
        }
    };
}

/// Cluster membership and load balancer administration on the masters.
pub static MASTER_CLUSTER: ServiceDescriptor = ServiceDescriptor {
    name: MASTER_CLUSTER_SERVICE,
    methods: &[
        method!("yb.master", "GetMasterRegistration"),
        method!("yb.master", "ListMasters"),
        method!("yb.master", "ListTabletServers"),
        method!("yb.master", "IsLoadBalanced"),
        method!("yb.master", "IsLoadBalancerIdle"),
        method!("yb.master", "ChangeLoadBalancerState"),
        method!("yb.master", "GetLoadBalancerState"),
    ],
};

/// Methods every server process answers.
pub static GENERIC: ServiceDescriptor = ServiceDescriptor {
    name: GENERIC_SERVICE,
    methods: &[
        method!("yb.server", "Ping"),
        method!("yb.server", "ServerClock"),
    ],
};

/// Schema sources the default registry is built from.
pub static SERVICES: &[&ServiceDescriptor] = &[&MASTER_CLUSTER, &GENERIC];
