//! High-level client API.

use crate::config::{with_default_port, ClientConfig};
use crate::connection::Connection;
use crate::error::ClientError;
use crate::leader::LeaderDiscovery;
use crate::metrics::RpcMetrics;
use prost::{Message, Name};
use std::sync::Arc;
use tokio::sync::Mutex;
use ybrpc_protocol::message::list_tablet_servers_response_pb::Entry as TabletServerEntry;
use ybrpc_protocol::message::*;
use ybrpc_protocol::{HybridTime, ServiceRegistry};

/// Typed operations over one connection.
///
/// Calls are serialized through an async mutex, so a `Client` can be shared
/// between tasks while the underlying [`Connection`] still sees one call at a
/// time.
#[derive(Debug)]
pub struct Client {
    conn: Mutex<Connection>,
    addr: String,
}

impl Client {
    /// Runs leader discovery over the configured masters and wraps the
    /// winning connection.
    pub async fn connect_leader(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::connect_leader_with(config, None).await
    }

    /// Like [`Client::connect_leader`], recording calls and the discovery
    /// outcome in `metrics`.
    pub async fn connect_leader_with(
        config: &ClientConfig,
        metrics: Option<Arc<RpcMetrics>>,
    ) -> Result<Self, ClientError> {
        let registry = Arc::new(ServiceRegistry::default());
        let mut discovery = LeaderDiscovery::new(
            config.discovery_config(),
            config.connection_config(),
            registry,
        );
        if let Some(metrics) = metrics {
            discovery = discovery.with_metrics(metrics);
        }
        let conn = discovery.find_leader().await?;
        Ok(Self::from_connection(conn))
    }

    /// Dials a single node directly, without checking its role.
    pub async fn connect_node(addr: &str, config: &ClientConfig) -> Result<Self, ClientError> {
        let registry = Arc::new(ServiceRegistry::default());
        let conn_config = config
            .connection_config()
            .with_addr(with_default_port(addr));
        let mut conn = Connection::connect(conn_config, registry).await?;
        conn.connected().await?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            addr: conn.addr().to_string(),
            conn: Mutex::new(conn),
        }
    }

    /// Address of the node this client talks to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.lock().await.close().await
    }

    /// Returns the connection, for callers that need raw `execute`.
    pub fn into_connection(self) -> Connection {
        self.conn.into_inner()
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Executes a call without inspecting the response body.
    pub async fn execute<Req, Resp>(&self, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Message + Name,
        Resp: Message + Default,
    {
        self.conn.lock().await.execute(request).await
    }

    /// Executes a master call, turning an embedded master error into
    /// [`ClientError::Master`].
    async fn master_call<Req, Resp>(&self, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Message + Name,
        Resp: Message + Default + MasterResponse,
    {
        let response: Resp = self.execute(request).await?;
        if let Some(error) = response.master_error() {
            return Err(ClientError::Master(error.clone()));
        }
        Ok(response)
    }

    // =========================================================================
    // Cluster membership
    // =========================================================================

    /// Registration and role of the node this client is connected to.
    pub async fn get_master_registration(
        &self,
    ) -> Result<GetMasterRegistrationResponsePb, ClientError> {
        self.master_call(&GetMasterRegistrationRequestPb {}).await
    }

    pub async fn list_masters(&self) -> Result<Vec<ServerEntryPb>, ClientError> {
        let response: ListMastersResponsePb =
            self.master_call(&ListMastersRequestPb {}).await?;
        Ok(response.masters)
    }

    pub async fn list_tablet_servers(
        &self,
        primary_only: bool,
    ) -> Result<Vec<TabletServerEntry>, ClientError> {
        let request = ListTabletServersRequestPb {
            primary_only: Some(primary_only),
        };
        let response: ListTabletServersResponsePb = self.master_call(&request).await?;
        Ok(response.servers)
    }

    // =========================================================================
    // Load balancer
    // =========================================================================

    /// Whether tablet load is balanced. `expected_servers` makes the master
    /// wait until that many tablet servers have registered.
    pub async fn is_load_balanced(
        &self,
        expected_servers: Option<i32>,
    ) -> Result<bool, ClientError> {
        let request = IsLoadBalancedRequestPb {
            expected_num_servers: expected_servers,
        };
        not_yet_is_false(self.master_call::<_, IsLoadBalancedResponsePb>(&request).await)
    }

    pub async fn is_load_balancer_idle(&self) -> Result<bool, ClientError> {
        not_yet_is_false(
            self.master_call::<_, IsLoadBalancerIdleResponsePb>(&IsLoadBalancerIdleRequestPb {})
                .await,
        )
    }

    pub async fn set_load_balancer_enabled(&self, enabled: bool) -> Result<(), ClientError> {
        let request = ChangeLoadBalancerStateRequestPb {
            is_enabled: Some(enabled),
        };
        let _: ChangeLoadBalancerStateResponsePb = self.master_call(&request).await?;
        Ok(())
    }

    /// Whether the load balancer is enabled.
    pub async fn get_load_balancer_state(&self) -> Result<bool, ClientError> {
        let response: GetLoadBalancerStateResponsePb =
            self.master_call(&GetLoadBalancerStateRequestPb {}).await?;
        Ok(response.is_enabled.unwrap_or(false))
    }

    // =========================================================================
    // Generic server operations
    // =========================================================================

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let _: PingResponsePb = self.execute(&PingRequestPb {}).await?;
        Ok(())
    }

    /// Current hybrid time of the server.
    pub async fn server_clock(&self) -> Result<HybridTime, ClientError> {
        let response: ServerClockResponsePb = self.execute(&ServerClockRequestPb {}).await?;
        Ok(response
            .hybrid_time
            .map(HybridTime::from_raw)
            .unwrap_or(HybridTime::INVALID))
    }
}

/// Load balancer checks answer "not yet" with a retryable master error.
fn not_yet_is_false<T>(result: Result<T, ClientError>) -> Result<bool, ClientError> {
    match result {
        Ok(_) => Ok(true),
        Err(ClientError::Master(error))
            if error.code == MasterErrorCode::CanRetryLoadBalanceCheck as i32 =>
        {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master_error(code: MasterErrorCode) -> ClientError {
        ClientError::Master(MasterErrorPb {
            code: code as i32,
            status: None,
        })
    }

    #[test]
    fn test_not_yet_is_false() {
        assert!(not_yet_is_false(Ok(())).unwrap());
        assert!(!not_yet_is_false::<()>(Err(master_error(
            MasterErrorCode::CanRetryLoadBalanceCheck
        )))
        .unwrap());

        let err =
            not_yet_is_false::<()>(Err(master_error(MasterErrorCode::NotTheLeader))).unwrap_err();
        assert!(matches!(err, ClientError::Master(_)));

        let err = not_yet_is_false::<()>(Err(ClientError::ConnectionClosed)).unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
    }
}
