//! Leader discovery.
//!
//! Every candidate master is probed concurrently: connect, finish the
//! handshake, ask for the master registration. The first candidate to report
//! the `LEADER` role wins and its connection is handed to the caller. Every
//! other connection, including ones that resolve after the winner or after
//! the deadline, is closed by a background reaper.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::{CandidateFailure, CandidateFailures, ClientError};
use crate::metrics::{DiscoveryOutcome, RpcMetrics};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use ybrpc_protocol::message::{
    GetMasterRegistrationRequestPb, GetMasterRegistrationResponsePb, PeerRole,
};
use ybrpc_protocol::ServiceRegistry;

/// Default overall discovery deadline.
pub const DEFAULT_DISCOVERY_DEADLINE: Duration = Duration::from_secs(30);

/// Default bound on a single candidate probe.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Leader discovery configuration.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Candidate master addresses as `host:port`.
    pub masters: Vec<String>,
    /// Wall-clock bound on the whole race.
    pub deadline: Duration,
    /// Bound on one candidate's connect, handshake and registration call.
    pub attempt_timeout: Duration,
}

impl DiscoveryConfig {
    pub fn new<I, S>(masters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            masters: masters.into_iter().map(Into::into).collect(),
            deadline: DEFAULT_DISCOVERY_DEADLINE,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }
}

/// Races all configured masters and returns a connection to the leader.
pub struct LeaderDiscovery {
    config: DiscoveryConfig,
    /// Template for every candidate; its `addr` is replaced per candidate.
    connection: ConnectionConfig,
    registry: Arc<ServiceRegistry>,
    metrics: Option<Arc<RpcMetrics>>,
}

type Probe = Result<Connection, CandidateFailure>;

impl LeaderDiscovery {
    pub fn new(
        config: DiscoveryConfig,
        connection: ConnectionConfig,
        registry: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            config,
            connection,
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<RpcMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs the race.
    ///
    /// Fails with [`ClientError::NoReachableLeader`] once every candidate has
    /// been rejected, or with [`ClientError::DiscoveryTimeout`] if the
    /// deadline passes first. Never waits for stragglers once decided.
    pub async fn find_leader(&self) -> Result<Connection, ClientError> {
        let deadline = Instant::now() + self.config.deadline;

        let mut attempts = JoinSet::new();
        for addr in &self.config.masters {
            let config = self.connection.clone().with_addr(addr.clone());
            attempts.spawn(probe(
                config,
                self.registry.clone(),
                self.metrics.clone(),
                self.config.attempt_timeout,
            ));
        }
        tracing::debug!(
            "Discovering leader among {} candidate(s)",
            self.config.masters.len()
        );

        let mut failures = CandidateFailures::default();
        loop {
            let next = tokio::time::timeout_at(deadline, attempts.join_next()).await;
            match next {
                Err(_) => {
                    tracing::warn!(
                        "Leader discovery timed out after {:?} ({} candidate(s) still pending)",
                        self.config.deadline,
                        attempts.len()
                    );
                    reap(attempts);
                    self.record(DiscoveryOutcome::Timeout);
                    return Err(ClientError::DiscoveryTimeout(self.config.deadline));
                }
                Ok(None) => {
                    self.record(DiscoveryOutcome::NoLeader);
                    return Err(ClientError::NoReachableLeader(failures));
                }
                Ok(Some(Ok(Ok(leader)))) => {
                    tracing::info!("Found leader at {}", leader.addr());
                    reap(attempts);
                    self.record(DiscoveryOutcome::Leader);
                    return Ok(leader);
                }
                Ok(Some(Ok(Err(failure)))) => {
                    tracing::warn!("Candidate {} rejected: {}", failure.addr, failure.reason);
                    failures.0.push(failure);
                }
                Ok(Some(Err(join_error))) => {
                    tracing::warn!("Candidate probe task failed: {}", join_error);
                    failures.push("<unknown>", join_error.to_string());
                }
            }
        }
    }

    fn record(&self, outcome: DiscoveryOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_discovery(outcome);
        }
    }
}

/// Convenience wrapper over [`LeaderDiscovery`] without metrics.
pub async fn find_leader(
    config: DiscoveryConfig,
    connection: ConnectionConfig,
    registry: Arc<ServiceRegistry>,
) -> Result<Connection, ClientError> {
    LeaderDiscovery::new(config, connection, registry)
        .find_leader()
        .await
}

/// Probes one candidate. Any connection that is not returned is closed here.
async fn probe(
    config: ConnectionConfig,
    registry: Arc<ServiceRegistry>,
    metrics: Option<Arc<RpcMetrics>>,
    attempt_timeout: Duration,
) -> Probe {
    let addr = config.addr.clone();
    let reject = |reason: String| CandidateFailure {
        addr: addr.clone(),
        reason,
    };

    let attempt = connect_and_check(config, registry, metrics);

    match tokio::time::timeout(attempt_timeout, attempt).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(reason)) => Err(reject(reason)),
        // Dropping the attempt drops its connection, which closes the socket.
        Err(_) => Err(reject(format!("no answer within {:?}", attempt_timeout))),
    }
}

async fn connect_and_check(
    config: ConnectionConfig,
    registry: Arc<ServiceRegistry>,
    metrics: Option<Arc<RpcMetrics>>,
) -> Result<Connection, String> {
    let mut conn = Connection::connect(config, registry)
        .await
        .map_err(|e| e.to_string())?;
    if let Some(metrics) = metrics {
        conn = conn.with_metrics(metrics);
    }

    match check_role(&mut conn).await {
        Ok(()) => Ok(conn),
        Err(reason) => {
            let _ = conn.close().await;
            Err(reason)
        }
    }
}

async fn check_role(conn: &mut Connection) -> Result<(), String> {
    conn.connected().await.map_err(|e| e.to_string())?;

    let response: GetMasterRegistrationResponsePb = conn
        .execute(&GetMasterRegistrationRequestPb {})
        .await
        .map_err(|e| e.to_string())?;

    if let Some(error) = &response.error {
        return Err(format!("master error: {}", error));
    }
    if response.registration.is_none() {
        return Err("registration missing from response".to_string());
    }
    match response.peer_role() {
        Some(PeerRole::Leader) => Ok(()),
        Some(role) => Err(format!("role {}", role)),
        None => Err("role not reported".to_string()),
    }
}

/// Closes every connection still to come out of `attempts`, off the caller's
/// path.
fn reap(mut attempts: JoinSet<Probe>) {
    if attempts.is_empty() {
        return;
    }
    tokio::spawn(async move {
        while let Some(result) = attempts.join_next().await {
            if let Ok(Ok(mut conn)) = result {
                tracing::debug!("Closing late candidate {}", conn.addr());
                let _ = conn.close().await;
            }
        }
    });
}
