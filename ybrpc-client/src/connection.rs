//! Single-node connection management.
//!
//! A [`Connection`] owns one stream to one node. It sends the connection
//! preamble from a background task as soon as the transport is up, then
//! serves strictly sequential request/response calls: `execute` takes
//! `&mut self`, so there is never more than one call in flight.

use crate::error::ClientError;
use crate::metrics::{CallOutcome, RpcMetrics};
use crate::stream::ClientStream;
use crate::tls::TlsClientConfig;
use prost::{Message, Name};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::oneshot;
use ybrpc_protocol::codec::{decode_response, encode_request};
use ybrpc_protocol::frame::read_frame;
use ybrpc_protocol::message::{RequestHeader, ResponseHeader};
use ybrpc_protocol::{ProtocolError, ServiceRegistry, CONNECTION_PREAMBLE};

/// Default per-call timeout sent in the request header (60 s).
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default transport connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Node address as `host:port`.
    pub addr: String,
    /// Transport connect timeout.
    pub connect_timeout: Duration,
    /// Timeout advertised to the server in every request header.
    pub rpc_timeout: Duration,
    /// Also enforce `rpc_timeout` locally while waiting for the response.
    pub enforce_deadline: bool,
    /// TLS configuration (optional).
    pub tls: Option<TlsClientConfig>,
}

impl ConnectionConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            enforce_deadline: false,
            tls: None,
        }
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_enforced_deadline(mut self) -> Self {
        self.enforce_deadline = true;
        self
    }

    pub fn with_tls(mut self, tls_config: TlsClientConfig) -> Self {
        self.tls = Some(tls_config);
        self
    }

    fn timeout_millis(&self) -> u32 {
        u32::try_from(self.rpc_timeout.as_millis()).unwrap_or(u32::MAX)
    }
}

type HandshakeResult = Result<ClientStream, ClientError>;

enum State {
    /// The preamble task owns the stream until it reports back.
    Handshaking(oneshot::Receiver<HandshakeResult>),
    Ready(ClientStream),
    /// The handshake failed; the stream has been dropped.
    Failed(String),
    /// A call did not finish a clean exchange, so the next bytes on the
    /// stream cannot be attributed. The stream has been dropped.
    Broken(String),
    Closed,
}

/// A connection to a single cluster node.
pub struct Connection {
    config: ConnectionConfig,
    registry: Arc<ServiceRegistry>,
    metrics: Option<Arc<RpcMetrics>>,
    next_call_id: i32,
    state: State,
}

impl Connection {
    /// Opens the transport to `config.addr` and starts the handshake in the
    /// background.
    ///
    /// Returns as soon as the transport is up. The handshake outcome is
    /// observed through [`Connection::connected`], and `execute` waits for it
    /// implicitly.
    pub async fn connect(
        config: ConnectionConfig,
        registry: Arc<ServiceRegistry>,
    ) -> Result<Self, ClientError> {
        let stream =
            ClientStream::connect(&config.addr, config.connect_timeout, config.tls.as_ref())
                .await?;

        let (tx, rx) = oneshot::channel();
        let addr = config.addr.clone();
        tokio::spawn(async move {
            let result = send_preamble(stream).await;
            match &result {
                Ok(_) => tracing::debug!("Handshake with {} complete", addr),
                Err(e) => tracing::debug!("Handshake with {} failed: {}", addr, e),
            }
            // Receiver gone means the connection was closed or dropped
            // mid-handshake; dropping the result closes the stream.
            let _ = tx.send(result);
        });

        Ok(Self {
            config,
            registry,
            metrics: None,
            next_call_id: 0,
            state: State::Handshaking(rx),
        })
    }

    /// Attaches a metrics sink; every subsequent call is recorded.
    pub fn with_metrics(mut self, metrics: Arc<RpcMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Waits for the handshake to finish and returns its outcome.
    ///
    /// Safe to call repeatedly: once resolved, the same outcome is reported
    /// again without touching the network.
    pub async fn connected(&mut self) -> Result<(), ClientError> {
        let rx = match &mut self.state {
            State::Ready(_) => return Ok(()),
            State::Failed(reason) => return Err(ClientError::Handshake(reason.clone())),
            State::Broken(_) => return Err(ClientError::NotConnected),
            State::Closed => return Err(ClientError::ConnectionClosed),
            State::Handshaking(rx) => rx,
        };

        match rx.await {
            Ok(Ok(stream)) => {
                self.state = State::Ready(stream);
                Ok(())
            }
            Ok(Err(e)) => {
                self.state = State::Failed(e.to_string());
                Err(e)
            }
            Err(_) => {
                let reason = "handshake task ended without reporting".to_string();
                self.state = State::Failed(reason.clone());
                Err(ClientError::Handshake(reason))
            }
        }
    }

    /// Sends `request` to the method registered for its type and decodes the
    /// response as `Resp`.
    ///
    /// A successful response with an empty body yields `Resp::default()`. An
    /// error response is returned as [`ClientError::Protocol`] wrapping
    /// [`ProtocolError::Service`].
    pub async fn execute<Req, Resp>(&mut self, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Message + Name,
        Resp: Message + Default,
    {
        let remote_method = self
            .registry
            .lookup(request)
            .map(|entry| entry.remote_method())
            .ok_or_else(|| ClientError::NoServiceForType(Req::full_name()))?;

        self.connected().await?;

        let call_id = self.next_call_id;
        self.next_call_id = self.next_call_id.wrapping_add(1);

        let header = RequestHeader {
            call_id: Some(call_id),
            remote_method: Some(remote_method.clone()),
            timeout_millis: Some(self.config.timeout_millis()),
        };
        let encoded = encode_request(&header, request)?;

        let rpc_timeout = self.config.rpc_timeout;
        let enforce_deadline = self.config.enforce_deadline;

        // The stream stays out of `self.state` until the exchange completes.
        // If this future is dropped mid-call, the connection is left broken.
        let interrupted = State::Broken(format!("call_id={} was interrupted", call_id));
        let mut stream = match std::mem::replace(&mut self.state, interrupted) {
            State::Ready(stream) => stream,
            other => {
                self.state = other;
                return Err(ClientError::NotConnected);
            }
        };

        tracing::debug!(
            "Sending call_id={} {}.{} ({} bytes)",
            call_id,
            remote_method.service_name,
            remote_method.method_name,
            encoded.len()
        );

        let started = Instant::now();
        let result = async {
            stream.write_all(&encoded).await.map_err(ClientError::Send)?;
            stream.flush().await.map_err(ClientError::Send)?;

            let exchange = read_reply::<Resp>(&mut stream);
            if enforce_deadline {
                tokio::time::timeout(rpc_timeout, exchange)
                    .await
                    .map_err(|_| ClientError::Timeout)?
            } else {
                exchange.await
            }
        }
        .await;

        match &result {
            Err(e) if leaves_stream_unsynced(e) => {
                tracing::warn!(
                    "Dropping connection to {} after call_id={} failed: {}",
                    self.config.addr,
                    call_id,
                    e
                );
                self.state = State::Broken(format!("call_id={} failed: {}", call_id, e));
            }
            _ => self.state = State::Ready(stream),
        }

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => CallOutcome::Ok,
                Err(e) if e.is_application_error() => CallOutcome::RemoteError,
                Err(_) => CallOutcome::Failed,
            };
            metrics.record_call(
                &remote_method.service_name,
                &remote_method.method_name,
                outcome,
                started.elapsed(),
            );
        }

        let (response_header, response) = result?;
        if response_header.call_id != call_id {
            tracing::warn!(
                "Response call_id={} does not match request call_id={}",
                response_header.call_id,
                call_id
            );
        }
        tracing::debug!("Call call_id={} complete", call_id);

        Ok(response)
    }

    /// Closes the stream. A second call is a no-op.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Ready(mut stream) => {
                tracing::debug!("Closing connection to {}", self.config.addr);
                match stream.shutdown().await {
                    Ok(()) => Ok(()),
                    // The peer may already have gone away.
                    Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
                    Err(e) => Err(ClientError::Io(e)),
                }
            }
            State::Handshaking(rx) => {
                tracing::debug!(
                    "Closing connection to {} during handshake",
                    self.config.addr
                );
                drop(rx);
                Ok(())
            }
            State::Failed(_) | State::Broken(_) | State::Closed => Ok(()),
        }
    }

    /// Address this connection was opened to.
    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    /// Call id the next `execute` will use.
    pub fn next_call_id(&self) -> i32 {
        self.next_call_id
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// A call failed in a way that left the stream out of step with the
    /// responses; every later call fails with [`ClientError::NotConnected`].
    pub fn is_broken(&self) -> bool {
        matches!(self.state, State::Broken(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    pub fn is_tls(&self) -> bool {
        matches!(&self.state, State::Ready(stream) if stream.is_tls())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Handshaking(_) => "handshaking",
            State::Ready(_) => "ready",
            State::Failed(_) => "failed",
            State::Broken(_) => "broken",
            State::Closed => "closed",
        };
        f.debug_struct("Connection")
            .field("addr", &self.config.addr)
            .field("state", &state)
            .field("next_call_id", &self.next_call_id)
            .finish()
    }
}

async fn send_preamble(mut stream: ClientStream) -> HandshakeResult {
    stream
        .write_all(&CONNECTION_PREAMBLE)
        .await
        .map_err(|e| ClientError::Handshake(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| ClientError::Handshake(e.to_string()))?;
    Ok(stream)
}

/// Whether a failed call may have left unread response bytes on the stream,
/// or never wrote a complete request.
fn leaves_stream_unsynced(err: &ClientError) -> bool {
    match err {
        ClientError::Protocol(e) => e.is_framing() || matches!(e, ProtocolError::Io(_)),
        ClientError::Send(_) | ClientError::Io(_) | ClientError::Timeout => true,
        _ => false,
    }
}

async fn read_reply<Resp>(stream: &mut ClientStream) -> Result<(ResponseHeader, Resp), ClientError>
where
    Resp: Message + Default,
{
    let frame = read_frame(stream).await.map_err(ProtocolError::from)?;
    Ok(decode_response(stream, frame.data).await?)
}
