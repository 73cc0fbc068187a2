//! In-process mock master server for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use ybrpc_protocol::codec::{encode_error_response, encode_response, read_request};
use ybrpc_protocol::frame::{END_OF_FRAME, READ_CHUNK_SIZE};
use ybrpc_protocol::message::*;
use ybrpc_protocol::{HybridTime, CONNECTION_PREAMBLE};

/// What the mock observed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Handshake,
    Call {
        method: String,
        call_id: i32,
        timeout_millis: Option<u32>,
    },
    Closed,
}

#[derive(Debug, Clone)]
pub struct MockMaster {
    /// Role reported by GetMasterRegistration; `None` leaves it unset.
    pub role: Option<PeerRole>,
    pub with_registration: bool,
    /// Embedded master error for GetMasterRegistration.
    pub registration_error: Option<MasterErrorCode>,
    /// Delay before every response.
    pub delay: Duration,
    /// Read requests but never answer.
    pub silent: bool,
    /// Method answered with an RPC-level error status.
    pub rpc_error_for: Option<&'static str>,
    /// Number of ListMasters entries to return.
    pub master_entries: usize,
    pub clock: HybridTime,
}

impl MockMaster {
    pub fn new(role: PeerRole) -> Self {
        Self {
            role: Some(role),
            with_registration: true,
            registration_error: None,
            delay: Duration::ZERO,
            silent: false,
            rpc_error_for: None,
            master_entries: 3,
            clock: HybridTime::from_parts(1_700_000_000_000_000, 5),
        }
    }

    pub fn leader() -> Self {
        Self::new(PeerRole::Leader)
    }

    pub fn follower() -> Self {
        Self::new(PeerRole::Follower)
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Binds a loopback listener and serves connections until the test ends.
    pub async fn spawn(self) -> RunningMock {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let lb_enabled = Arc::new(AtomicBool::new(true));

        let behavior = Arc::new(self);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let behavior = behavior.clone();
                let tx = tx.clone();
                let lb_enabled = lb_enabled.clone();
                tokio::spawn(async move {
                    serve(socket, &behavior, &tx, &lb_enabled).await;
                    let _ = tx.send(Event::Closed);
                });
            }
        });

        RunningMock { addr, events: rx }
    }
}

pub struct RunningMock {
    pub addr: SocketAddr,
    events: mpsc::UnboundedReceiver<Event>,
}

impl RunningMock {
    pub fn addr_string(&self) -> String {
        self.addr.to_string()
    }

    /// Waits for the next event, failing the test after `within`.
    pub async fn next_event(&mut self, within: Duration) -> Event {
        tokio::time::timeout(within, self.events.recv())
            .await
            .expect("timed out waiting for mock event")
            .expect("mock event channel closed")
    }

    /// Waits until a connection to this mock has been closed by the client.
    pub async fn wait_closed(&mut self, within: Duration) {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if self.next_event(remaining).await == Event::Closed {
                return;
            }
        }
    }

    /// Collects the calls observed so far without waiting.
    pub fn drain_calls(&mut self) -> Vec<(String, i32, Option<u32>)> {
        let mut calls = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if let Event::Call {
                method,
                call_id,
                timeout_millis,
            } = event
            {
                calls.push((method, call_id, timeout_millis));
            }
        }
        calls
    }
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

async fn serve(
    mut socket: TcpStream,
    behavior: &MockMaster,
    events: &mpsc::UnboundedSender<Event>,
    lb_enabled: &AtomicBool,
) {
    let mut preamble = [0u8; 3];
    if socket.read_exact(&mut preamble).await.is_err() {
        return;
    }
    assert_eq!(preamble, CONNECTION_PREAMBLE);
    let _ = events.send(Event::Handshake);

    loop {
        // Every request payload here is either empty or a handful of
        // optional fields; decode as an empty message and dispatch on the
        // method name. Unknown fields are skipped.
        let request = read_request::<_, PingRequestPb>(&mut socket).await;
        let (header, _) = match request {
            Ok(Some(call)) => call,
            _ => return,
        };
        let method = header
            .remote_method
            .as_ref()
            .map(|m| m.method_name.clone())
            .unwrap_or_default();
        let call_id = header.call_id.unwrap_or(-1);
        let _ = events.send(Event::Call {
            method: method.clone(),
            call_id,
            timeout_millis: header.timeout_millis,
        });

        if behavior.silent {
            continue;
        }
        if !behavior.delay.is_zero() {
            tokio::time::sleep(behavior.delay).await;
        }

        let response = respond(behavior, &method, call_id, lb_enabled);
        if write_chunked(&mut socket, &response).await.is_err() {
            return;
        }
    }
}

fn respond(behavior: &MockMaster, method: &str, call_id: i32, lb_enabled: &AtomicBool) -> Vec<u8> {
    let ok = ResponseHeader {
        call_id,
        is_error: Some(false),
        sidecar_offsets: Vec::new(),
    };

    if behavior.rpc_error_for == Some(method) {
        let status = ErrorStatusPb {
            message: format!("{} rejected", method),
            code: Some(RpcErrorCodePb::ErrorServerTooBusy as i32),
        };
        return encode_error_response(call_id, &status).unwrap().to_vec();
    }

    let encoded = match method {
        "GetMasterRegistration" => {
            let response = GetMasterRegistrationResponsePb {
                instance_id: Some(instance(call_id)),
                registration: behavior.with_registration.then(registration),
                role: behavior.role.map(|r| r as i32),
                error: behavior.registration_error.map(|code| MasterErrorPb {
                    code: code as i32,
                    status: Some(AppStatusPb {
                        code: AppStatusCode::IllegalState as i32,
                        message: Some("mock master error".to_string()),
                        source_file: None,
                        source_line: None,
                    }),
                }),
            };
            encode_response(&ok, &response)
        }
        "ListMasters" => {
            let masters = (0..behavior.master_entries)
                .map(|i| ServerEntryPb {
                    error: None,
                    instance_id: Some(instance(i as i32)),
                    registration: Some(registration()),
                    role: Some(if i == 0 {
                        PeerRole::Leader as i32
                    } else {
                        PeerRole::Follower as i32
                    }),
                })
                .collect();
            encode_response(
                &ok,
                &ListMastersResponsePb {
                    masters,
                    error: None,
                },
            )
        }
        "ListTabletServers" => {
            let servers = (0..2)
                .map(|i| list_tablet_servers_response_pb::Entry {
                    instance_id: Some(instance(100 + i)),
                    registration: Some(TsRegistrationPb {
                        common: Some(registration()),
                    }),
                    millis_since_heartbeat: Some(250),
                    alive: Some(true),
                })
                .collect();
            encode_response(
                &ok,
                &ListTabletServersResponsePb {
                    error: None,
                    servers,
                },
            )
        }
        "IsLoadBalanced" => encode_response(
            &ok,
            &IsLoadBalancedResponsePb {
                error: Some(MasterErrorPb {
                    code: MasterErrorCode::CanRetryLoadBalanceCheck as i32,
                    status: None,
                }),
            },
        ),
        "IsLoadBalancerIdle" => encode_response(&ok, &IsLoadBalancerIdleResponsePb { error: None }),
        "ChangeLoadBalancerState" => {
            lb_enabled.store(!lb_enabled.load(Ordering::SeqCst), Ordering::SeqCst);
            encode_response(&ok, &ChangeLoadBalancerStateResponsePb { error: None })
        }
        "GetLoadBalancerState" => encode_response(
            &ok,
            &GetLoadBalancerStateResponsePb {
                error: None,
                is_enabled: Some(lb_enabled.load(Ordering::SeqCst)),
            },
        ),
        "Ping" => encode_response(&ok, &PingResponsePb {}),
        "ServerClock" => encode_response(
            &ok,
            &ServerClockResponsePb {
                hybrid_time: Some(behavior.clock.raw()),
            },
        ),
        other => {
            let status = ErrorStatusPb {
                message: format!("no such method {}", other),
                code: Some(RpcErrorCodePb::ErrorNoSuchMethod as i32),
            };
            encode_error_response(call_id, &status)
        }
    };
    encoded.unwrap().to_vec()
}

/// Writes a response the way the server does: full chunks, then the short
/// tail, or a sentinel when the response ends on a chunk boundary.
async fn write_chunked(socket: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    for chunk in data.chunks(READ_CHUNK_SIZE) {
        socket.write_all(chunk).await?;
        socket.flush().await?;
        if chunk.len() == READ_CHUNK_SIZE {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
    if data.len() % READ_CHUNK_SIZE == 0 {
        socket.write_all(&END_OF_FRAME).await?;
        socket.flush().await?;
    }
    Ok(())
}

fn instance(seq: i32) -> NodeInstancePb {
    NodeInstancePb {
        permanent_uuid: format!("{:032x}", seq).into_bytes(),
        instance_seqno: i64::from(seq),
    }
}

fn registration() -> ServerRegistrationPb {
    ServerRegistrationPb {
        private_rpc_addresses: vec![HostPortPb {
            host: "127.0.0.1".to_string(),
            port: 7100,
        }],
        http_addresses: vec![HostPortPb {
            host: "127.0.0.1".to_string(),
            port: 7000,
        }],
        cloud_info: Some(CloudInfoPb {
            placement_cloud: Some("cloud1".to_string()),
            placement_region: Some("region1".to_string()),
            placement_zone: Some("zone1".to_string()),
        }),
        placement_uuid: None,
        broadcast_addresses: Vec::new(),
    }
}
