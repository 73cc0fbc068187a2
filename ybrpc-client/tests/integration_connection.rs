//! Integration tests for single-node connections against a mock master.

mod common;

use common::{Event, MockMaster};
use prost::Name;
use std::sync::Arc;
use std::time::Duration;
use ybrpc_client::{ClientError, Connection, ConnectionConfig, RpcMetrics};
use ybrpc_protocol::message::*;
use ybrpc_protocol::{ProtocolError, ServiceRegistry};

const WAIT: Duration = Duration::from_secs(5);

fn registry() -> Arc<ServiceRegistry> {
    Arc::new(ServiceRegistry::default())
}

#[tokio::test]
async fn handshake_sends_preamble() {
    let mut mock = MockMaster::leader().spawn().await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();
    conn.connected().await.unwrap();
    assert!(conn.is_ready());
    assert!(!conn.is_tls());

    assert_eq!(mock.next_event(WAIT).await, Event::Handshake);

    // A resolved handshake is reported again without waiting.
    conn.connected().await.unwrap();
}

#[tokio::test]
async fn execute_waits_for_handshake() {
    let mock = MockMaster::follower().spawn().await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();
    // No explicit connected(): execute resolves the handshake itself.
    let response: GetMasterRegistrationResponsePb = conn
        .execute(&GetMasterRegistrationRequestPb {})
        .await
        .unwrap();

    assert_eq!(response.peer_role(), Some(PeerRole::Follower));
    assert!(response.registration.is_some());
    assert!(conn.is_ready());
}

#[tokio::test]
async fn call_ids_increment_and_header_carries_timeout() {
    let mut mock = MockMaster::leader().spawn().await;

    let config = ConnectionConfig::new(mock.addr_string()).with_rpc_timeout(Duration::from_millis(1500));
    let mut conn = Connection::connect(config, registry()).await.unwrap();

    for _ in 0..3 {
        let _: PingResponsePb = conn.execute(&PingRequestPb {}).await.unwrap();
    }
    assert_eq!(conn.next_call_id(), 3);

    assert_eq!(mock.next_event(WAIT).await, Event::Handshake);
    for expected in 0..3 {
        assert_eq!(
            mock.next_event(WAIT).await,
            Event::Call {
                method: "Ping".to_string(),
                call_id: expected,
                timeout_millis: Some(1500),
            }
        );
    }
}

#[tokio::test]
async fn unregistered_type_fails_before_sending() {
    let mut mock = MockMaster::leader().spawn().await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();

    // Response types are not registered as request types.
    let request = GetMasterRegistrationResponsePb::default();
    let err = conn
        .execute::<_, PingResponsePb>(&request)
        .await
        .unwrap_err();

    match err {
        ClientError::NoServiceForType(name) => {
            assert_eq!(name, GetMasterRegistrationResponsePb::full_name());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(conn.next_call_id(), 0);

    // The connection stays usable.
    let _: PingResponsePb = conn.execute(&PingRequestPb {}).await.unwrap();
    assert_eq!(mock.next_event(WAIT).await, Event::Handshake);
    assert!(matches!(
        mock.next_event(WAIT).await,
        Event::Call { call_id: 0, .. }
    ));
}

#[tokio::test]
async fn error_response_is_service_error() {
    let mut master = MockMaster::leader();
    master.rpc_error_for = Some("Ping");
    let mock = master.spawn().await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();

    let err = conn
        .execute::<_, PingResponsePb>(&PingRequestPb {})
        .await
        .unwrap_err();
    assert!(err.is_application_error());
    assert!(!err.is_transport_error());
    match err {
        ClientError::Protocol(ProtocolError::Service(status)) => {
            assert_eq!(status.code, RpcErrorCodePb::ErrorServerTooBusy);
            assert_eq!(status.message, "Ping rejected");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // The error payload was fully consumed; the next call decodes cleanly.
    assert!(conn.is_ready());
    let clock: ServerClockResponsePb = conn.execute(&ServerClockRequestPb {}).await.unwrap();
    assert!(clock.hybrid_time.is_some());
}

#[tokio::test]
async fn multi_chunk_response_is_accumulated() {
    let mut master = MockMaster::leader();
    master.master_entries = 250;
    let mock = master.spawn().await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();

    let response: ListMastersResponsePb = conn.execute(&ListMastersRequestPb {}).await.unwrap();
    assert_eq!(response.masters.len(), 250);
    assert_eq!(response.masters[0].peer_role(), Some(PeerRole::Leader));
    assert_eq!(response.masters[249].peer_role(), Some(PeerRole::Follower));

    let _: PingResponsePb = conn.execute(&PingRequestPb {}).await.unwrap();
}

#[tokio::test]
async fn enforced_deadline_times_out() {
    let mock = MockMaster::leader().silent().spawn().await;

    let metrics = Arc::new(RpcMetrics::new().unwrap());
    let config = ConnectionConfig::new(mock.addr_string())
        .with_rpc_timeout(Duration::from_millis(100))
        .with_enforced_deadline();
    let mut conn = Connection::connect(config, registry())
        .await
        .unwrap()
        .with_metrics(metrics.clone());

    let err = conn
        .execute::<_, PingResponsePb>(&PingRequestPb {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
    assert!(err.is_retryable());

    let failed = metrics
        .requests_total
        .with_label_values(&["yb.server.GenericService", "Ping", "failed"])
        .get();
    assert_eq!(failed, 1.0);
}

#[tokio::test]
async fn late_reply_after_timeout_is_never_decoded() {
    let mut mock = MockMaster::leader()
        .delayed(Duration::from_millis(300))
        .spawn()
        .await;

    let config = ConnectionConfig::new(mock.addr_string())
        .with_rpc_timeout(Duration::from_millis(100))
        .with_enforced_deadline();
    let mut conn = Connection::connect(config, registry()).await.unwrap();

    let err = conn
        .execute::<_, GetMasterRegistrationResponsePb>(&GetMasterRegistrationRequestPb {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
    assert!(conn.is_broken());
    assert!(!conn.is_ready());

    // The reply to the first call lands here; it must not be read as the
    // answer to the second.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let err = conn
        .execute::<_, ListMastersResponsePb>(&ListMastersRequestPb {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));
    assert!(err.is_transport_error());
    assert_eq!(conn.next_call_id(), 1);

    mock.wait_closed(WAIT).await;
    conn.close().await.unwrap();
    assert!(conn.is_closed());
}

#[tokio::test]
async fn cancelled_call_breaks_connection() {
    let mut mock = MockMaster::leader()
        .delayed(Duration::from_millis(300))
        .spawn()
        .await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();
    conn.connected().await.unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        conn.execute::<_, PingResponsePb>(&PingRequestPb {}),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(conn.is_broken());

    let err = conn
        .execute::<_, PingResponsePb>(&PingRequestPb {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));

    mock.wait_closed(WAIT).await;
}

#[tokio::test]
async fn metrics_record_successful_calls() {
    let mock = MockMaster::leader().spawn().await;

    let metrics = Arc::new(RpcMetrics::new().unwrap());
    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap()
        .with_metrics(metrics.clone());

    let _: PingResponsePb = conn.execute(&PingRequestPb {}).await.unwrap();
    let _: PingResponsePb = conn.execute(&PingRequestPb {}).await.unwrap();

    let ok = metrics
        .requests_total
        .with_label_values(&["yb.server.GenericService", "Ping", "ok"])
        .get();
    assert_eq!(ok, 2.0);

    let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
    assert!(text.contains("ybrpc_rpc_duration_seconds"));
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let mut mock = MockMaster::leader().spawn().await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();
    conn.connected().await.unwrap();

    conn.close().await.unwrap();
    conn.close().await.unwrap();
    assert!(conn.is_closed());

    mock.wait_closed(WAIT).await;

    let err = conn
        .execute::<_, PingResponsePb>(&PingRequestPb {})
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ConnectionClosed));
}

#[tokio::test]
async fn close_during_handshake() {
    let mock = MockMaster::leader().spawn().await;

    let mut conn = Connection::connect(ConnectionConfig::new(mock.addr_string()), registry())
        .await
        .unwrap();
    conn.close().await.unwrap();
    assert!(conn.is_closed());
    assert!(matches!(
        conn.connected().await,
        Err(ClientError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn connect_refused_is_transport_error() {
    let addr = common::unreachable_addr().await;

    let err = Connection::connect(ConnectionConfig::new(addr), registry())
        .await
        .unwrap_err();
    assert!(err.is_transport_error());
}
