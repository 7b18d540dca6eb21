//! Endpoint mode accounting and activation edge tests.

use std::sync::Arc;

use mgw_endpoint_core::{
    CallId, ConnectionMode, ConnectionOptions, Endpoint, EndpointError, EndpointEvent,
};

async fn open_connection(
    endpoint: &Arc<Endpoint>,
    call_id: CallId,
) -> Arc<mgw_endpoint_core::Connection> {
    let connection = endpoint
        .create_connection(call_id, ConnectionMode::Inactive, false)
        .unwrap();
    connection.open(None, &ConnectionOptions::default()).await.unwrap();
    connection
}

fn assert_invariant(endpoint: &Endpoint) {
    let expected =
        endpoint.loopback_count() == 0 && endpoint.read_count() > 0 && endpoint.write_count() > 0;
    assert_eq!(endpoint.is_active(), expected);
}

#[tokio::test]
async fn activation_follows_the_counter_boundary() {
    let endpoint = Endpoint::new("gw/1");
    let rx = open_connection(&endpoint, CallId(1)).await;
    let tx = open_connection(&endpoint, CallId(1)).await;
    assert!(!endpoint.is_active());

    // Reading alone is not enough.
    rx.update_mode(ConnectionMode::RecvOnly).await.unwrap();
    assert!(!endpoint.is_active());
    assert_invariant(&endpoint);

    // The first writer completes the boundary condition.
    tx.update_mode(ConnectionMode::SendOnly).await.unwrap();
    assert!(endpoint.is_active());
    assert_invariant(&endpoint);

    // Dropping the last reader deactivates.
    rx.update_mode(ConnectionMode::Inactive).await.unwrap();
    assert!(!endpoint.is_active());
    assert_eq!(endpoint.read_count(), 0);
    assert_eq!(endpoint.write_count(), 1);
    assert_invariant(&endpoint);
}

#[tokio::test]
async fn loopback_overrides_duplex_traffic() {
    let endpoint = Endpoint::new("gw/1");
    let duplex = open_connection(&endpoint, CallId(1)).await;
    let probe = open_connection(&endpoint, CallId(2)).await;

    duplex.update_mode(ConnectionMode::SendRecv).await.unwrap();
    assert!(endpoint.is_active());

    // One loopback leg suppresses activation no matter what else runs.
    probe.update_mode(ConnectionMode::NetworkLoopback).await.unwrap();
    assert!(!endpoint.is_active());
    assert_eq!(endpoint.read_count(), 1);
    assert_eq!(endpoint.write_count(), 1);
    assert_eq!(endpoint.loopback_count(), 1);

    probe.update_mode(ConnectionMode::Inactive).await.unwrap();
    assert!(endpoint.is_active());
    assert_invariant(&endpoint);
}

#[tokio::test]
async fn equal_contribution_transition_keeps_activation() {
    let endpoint = Endpoint::new("gw/1");
    let connection = open_connection(&endpoint, CallId(1)).await;
    connection.update_mode(ConnectionMode::SendRecv).await.unwrap();
    assert!(endpoint.is_active());

    // SendRecv and Conference contribute identically; the transition must not
    // re-run the activation primitive (which would report a violation).
    connection.update_mode(ConnectionMode::Conference).await.unwrap();
    assert!(endpoint.is_active());
    assert_eq!(connection.mode(), ConnectionMode::Conference);
}

#[tokio::test]
async fn second_duplex_connection_does_not_reactivate() {
    let endpoint = Endpoint::new("gw/1");
    let first = open_connection(&endpoint, CallId(1)).await;
    let second = open_connection(&endpoint, CallId(1)).await;

    first.update_mode(ConnectionMode::SendRecv).await.unwrap();
    assert!(endpoint.is_active());
    second.update_mode(ConnectionMode::SendRecv).await.unwrap();
    assert!(endpoint.is_active());
    assert_eq!(endpoint.read_count(), 2);
    assert_eq!(endpoint.write_count(), 2);

    first.update_mode(ConnectionMode::Inactive).await.unwrap();
    assert!(endpoint.is_active());
    second.update_mode(ConnectionMode::Inactive).await.unwrap();
    assert!(!endpoint.is_active());
}

#[tokio::test]
async fn delete_reverses_the_counter_contribution() {
    let endpoint = Endpoint::new("gw/1");
    let connection = open_connection(&endpoint, CallId(1)).await;
    connection.update_mode(ConnectionMode::SendRecv).await.unwrap();
    assert!(endpoint.is_active());

    endpoint.delete_connection(CallId(1), connection.id()).await.unwrap();
    assert!(!endpoint.is_active());
    assert_eq!(endpoint.read_count(), 0);
    assert_eq!(endpoint.write_count(), 0);
    assert!(connection.state().is_terminal());
    // The last connection takes its call with it.
    assert!(!endpoint.has_call(CallId(1)));
}

#[tokio::test]
async fn double_delete_reports_the_missing_layer() {
    let endpoint = Endpoint::new("gw/1");
    let kept = open_connection(&endpoint, CallId(1)).await;
    let dropped = open_connection(&endpoint, CallId(1)).await;

    endpoint.delete_connection(CallId(1), dropped.id()).await.unwrap();
    // Call still exists, so the second delete fails on the connection.
    assert!(matches!(
        endpoint.delete_connection(CallId(1), dropped.id()).await,
        Err(EndpointError::ConnectionNotFound { .. })
    ));

    endpoint.delete_connection(CallId(1), kept.id()).await.unwrap();
    // Now the call itself is gone.
    assert!(matches!(
        endpoint.delete_connection(CallId(1), kept.id()).await,
        Err(EndpointError::CallNotFound(_))
    ));
}

#[tokio::test]
async fn delete_connections_distinguishes_empty_from_unknown() {
    let endpoint = Endpoint::new("gw/1");
    assert!(matches!(
        endpoint.delete_connections(CallId(7)).await,
        Err(EndpointError::CallNotFound(_))
    ));

    // A registered call with zero connections deletes successfully.
    endpoint.prepare_call(CallId(7));
    endpoint.delete_connections(CallId(7)).await.unwrap();
    assert!(!endpoint.has_call(CallId(7)));

    let a = open_connection(&endpoint, CallId(8)).await;
    let b = open_connection(&endpoint, CallId(8)).await;
    a.update_mode(ConnectionMode::SendRecv).await.unwrap();
    b.update_mode(ConnectionMode::SendRecv).await.unwrap();
    endpoint.delete_connections(CallId(8)).await.unwrap();
    assert!(!endpoint.has_call(CallId(8)));
    assert!(!endpoint.is_active());
    assert!(a.state().is_terminal());
    assert!(b.state().is_terminal());
}

#[tokio::test]
async fn delete_all_connections_quiesces_the_endpoint() {
    let endpoint = Endpoint::new("gw/1");
    for call in 1..=3u32 {
        let connection = open_connection(&endpoint, CallId(call)).await;
        connection.update_mode(ConnectionMode::SendRecv).await.unwrap();
    }
    assert!(endpoint.is_active());
    assert_eq!(endpoint.call_count(), 3);

    endpoint.delete_all_connections().await;
    assert_eq!(endpoint.call_count(), 0);
    assert!(!endpoint.is_active());
    assert_eq!(endpoint.read_count(), 0);
    assert_eq!(endpoint.write_count(), 0);
    assert_eq!(endpoint.loopback_count(), 0);
}

#[tokio::test]
async fn concurrent_creates_share_one_call() {
    let endpoint = Endpoint::new("gw/1");
    let mut handles = Vec::new();
    for _ in 0..8 {
        let endpoint = endpoint.clone();
        handles.push(tokio::spawn(async move {
            endpoint.create_connection(CallId(1), ConnectionMode::Inactive, false).unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(endpoint.call_count(), 1);
    assert_eq!(endpoint.prepare_call(CallId(1)).len(), 8);
}

#[tokio::test]
async fn redundant_activation_is_an_invariant_violation() {
    let endpoint = Endpoint::new("gw/1");
    assert!(matches!(endpoint.deactivate(), Err(EndpointError::InvariantViolation(_))));
    endpoint.activate().unwrap();
    assert!(matches!(endpoint.activate(), Err(EndpointError::InvariantViolation(_))));
    endpoint.deactivate().unwrap();
    assert!(!endpoint.is_active());
}

#[tokio::test]
async fn activation_edges_publish_events() {
    let endpoint = Endpoint::new("gw/1");
    let mut events = endpoint.take_event_receiver().unwrap();
    assert!(endpoint.take_event_receiver().is_none());

    let connection = open_connection(&endpoint, CallId(1)).await;
    connection.update_mode(ConnectionMode::SendRecv).await.unwrap();
    connection.update_mode(ConnectionMode::Inactive).await.unwrap();

    assert_eq!(events.recv().await, Some(EndpointEvent::Activated));
    assert_eq!(events.recv().await, Some(EndpointEvent::Deactivated));
}
