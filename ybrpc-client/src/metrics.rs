//! Prometheus metrics for RPC calls and leader discovery.
//!
//! A [`RpcMetrics`] instance is optional everywhere. When one is attached to a
//! connection, every `execute` records its outcome and latency; when one is
//! attached to discovery, every run records how it ended.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Call latency histogram buckets (in seconds).
const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0];

/// How a single RPC ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Ok,
    /// The server answered with an error status.
    RemoteError,
    /// Transport, framing or decode failure.
    Failed,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Ok => "ok",
            CallOutcome::RemoteError => "remote_error",
            CallOutcome::Failed => "failed",
        }
    }
}

/// How a leader discovery run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    Leader,
    NoLeader,
    Timeout,
}

impl DiscoveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryOutcome::Leader => "leader",
            DiscoveryOutcome::NoLeader => "no_leader",
            DiscoveryOutcome::Timeout => "timeout",
        }
    }
}

/// Client-side RPC metrics.
#[derive(Clone)]
pub struct RpcMetrics {
    registry: Registry,
    /// Calls by service, method and outcome.
    pub requests_total: CounterVec,
    /// Call latency by service and method.
    pub request_duration: HistogramVec,
    /// Discovery runs by outcome.
    pub discovery_total: CounterVec,
}

impl RpcMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new(
                "ybrpc_rpc_requests_total",
                "Total RPC calls by service, method and outcome",
            ),
            &["service", "method", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "ybrpc_rpc_duration_seconds",
                "RPC call duration in seconds by service and method",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["service", "method"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let discovery_total = CounterVec::new(
            Opts::new(
                "ybrpc_leader_discovery_total",
                "Leader discovery runs by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(discovery_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            discovery_total,
        })
    }

    pub fn record_call(
        &self,
        service: &str,
        method: &str,
        outcome: CallOutcome,
        elapsed: Duration,
    ) {
        self.requests_total
            .with_label_values(&[service, method, outcome.as_str()])
            .inc();
        self.request_duration
            .with_label_values(&[service, method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn record_discovery(&self, outcome: DiscoveryOutcome) {
        self.discovery_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
