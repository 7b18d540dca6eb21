//! Modify and delete workflow integration tests.

mod common;

use std::sync::Arc;

use mgw_control_core::{CommandVerb, GatewayController, ParameterKey, Parameters};
use mgw_endpoint_core::{
    CallId, ConnectionId, ConnectionMode, ConnectionState, Endpoint, EndpointManager,
};

fn gateway() -> (GatewayController, Arc<Endpoint>) {
    common::init_tracing();
    let manager = EndpointManager::new();
    let endpoint = Endpoint::new("gw/1");
    manager.install(endpoint.clone());
    (GatewayController::new(manager), endpoint)
}

async fn create(controller: &GatewayController, call: &str, mode: &str) -> ConnectionId {
    let params = Parameters::new()
        .with(ParameterKey::CallId, call)
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::Mode, mode);
    let result = controller.handle(CommandVerb::CreateConnection, 1, &params).await;
    assert_eq!(result.code, 200);
    ConnectionId::from_hex(result.parameters.get(ParameterKey::ConnectionId).unwrap()).unwrap()
}

#[tokio::test]
async fn modify_opens_then_renegotiates() {
    let (controller, endpoint) = gateway();
    let id = create(&controller, "1", "sendrecv").await;
    let connection = endpoint.get_connection(CallId(1), id).unwrap();
    assert_eq!(connection.state(), ConnectionState::HalfOpen);

    // First remote description confirms the half-open connection.
    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, id.to_string())
        .with(ParameterKey::RemoteSdp, common::REMOTE_SDP);
    let result = controller.handle(CommandVerb::ModifyConnection, 2, &params).await;
    assert_eq!(result.code, 200);
    assert!(!result.parameters.get(ParameterKey::LocalSdp).unwrap().is_empty());
    assert_eq!(connection.state(), ConnectionState::Open);

    // A second one renegotiates in place.
    let result = controller.handle(CommandVerb::ModifyConnection, 3, &params).await;
    assert_eq!(result.code, 200);
    assert_eq!(connection.state(), ConnectionState::Open);
}

#[tokio::test]
async fn modify_applies_a_new_mode() {
    let (controller, endpoint) = gateway();
    let id = create(&controller, "1", "sendrecv").await;
    assert!(endpoint.is_active());

    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, id.to_string())
        .with(ParameterKey::Mode, "recvonly");
    let result = controller.handle(CommandVerb::ModifyConnection, 2, &params).await;
    assert_eq!(result.code, 200);
    let connection = endpoint.get_connection(CallId(1), id).unwrap();
    assert_eq!(connection.mode(), ConnectionMode::RecvOnly);
    assert!(!endpoint.is_active());
}

#[tokio::test]
async fn modify_reports_lookup_and_sdp_failures() {
    let (controller, _endpoint) = gateway();
    let id = create(&controller, "1", "sendrecv").await;

    // Unknown call.
    let params = Parameters::new()
        .with(ParameterKey::CallId, "9")
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, id.to_string());
    let result = controller.handle(CommandVerb::ModifyConnection, 2, &params).await;
    assert_eq!(result.code, 516);

    // Unknown connection.
    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, "FF");
    let result = controller.handle(CommandVerb::ModifyConnection, 3, &params).await;
    assert_eq!(result.code, 515);

    // Unknown endpoint.
    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/9")
        .with(ParameterKey::ConnectionId, id.to_string());
    let result = controller.handle(CommandVerb::ModifyConnection, 4, &params).await;
    assert_eq!(result.code, 500);

    // Garbage remote description.
    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, id.to_string())
        .with(ParameterKey::RemoteSdp, "not an sdp");
    let result = controller.handle(CommandVerb::ModifyConnection, 5, &params).await;
    assert_eq!(result.code, 505);
}

#[tokio::test]
async fn delete_single_connection_reports_transfer_counters() {
    let (controller, endpoint) = gateway();
    let id = create(&controller, "1", "sendrecv").await;
    assert!(endpoint.is_active());

    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, id.to_string());
    let result = controller.handle(CommandVerb::DeleteConnection, 2, &params).await;
    assert_eq!(result.code, 250);
    let counters = result.parameters.get(ParameterKey::ConnectionParameters).unwrap();
    assert!(counters.starts_with("PS="));
    assert!(counters.contains("JI="));
    assert!(!endpoint.is_active());
    assert!(!controller.registry().contains(CallId(1)));

    // Deleting the same connection again: its call is gone too.
    let result = controller.handle(CommandVerb::DeleteConnection, 3, &params).await;
    assert_eq!(result.code, 516);
}

#[tokio::test]
async fn double_delete_of_a_sibling_reports_the_connection() {
    let (controller, _endpoint) = gateway();
    let dropped = create(&controller, "1", "sendrecv").await;
    let _kept = create(&controller, "1", "sendrecv").await;

    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, dropped.to_string());
    let result = controller.handle(CommandVerb::DeleteConnection, 2, &params).await;
    assert_eq!(result.code, 250);
    // The call still exists, so the second delete fails on the connection id.
    let result = controller.handle(CommandVerb::DeleteConnection, 3, &params).await;
    assert_eq!(result.code, 515);
}

#[tokio::test]
async fn delete_by_call_clears_the_whole_call() {
    let (controller, endpoint) = gateway();
    create(&controller, "1", "sendrecv").await;
    create(&controller, "1", "sendrecv").await;
    assert_eq!(controller.registry().legs(CallId(1)).len(), 2);

    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/1");
    let result = controller.handle(CommandVerb::DeleteConnection, 2, &params).await;
    assert_eq!(result.code, 250);
    assert!(!endpoint.has_call(CallId(1)));
    assert!(!endpoint.is_active());
    assert!(!controller.registry().contains(CallId(1)));

    // Unknown call id fails; an existing but empty call succeeds as a no-op.
    let result = controller.handle(CommandVerb::DeleteConnection, 3, &params).await;
    assert_eq!(result.code, 516);
    endpoint.prepare_call(CallId(1));
    let result = controller.handle(CommandVerb::DeleteConnection, 4, &params).await;
    assert_eq!(result.code, 250);
}

#[tokio::test]
async fn delete_without_ids_quiesces_the_endpoint() {
    let (controller, endpoint) = gateway();
    create(&controller, "1", "sendrecv").await;
    create(&controller, "2", "sendrecv").await;
    create(&controller, "3", "recvonly").await;
    assert_eq!(endpoint.call_count(), 3);

    let params = Parameters::new().with(ParameterKey::EndpointId, "gw/1");
    let result = controller.handle(CommandVerb::DeleteConnection, 9, &params).await;
    assert_eq!(result.code, 250);
    assert_eq!(endpoint.call_count(), 0);
    assert!(!endpoint.is_active());
    assert_eq!(controller.registry().call_count(), 0);
}

#[tokio::test]
async fn delete_rejects_ambiguous_shapes() {
    let (controller, _endpoint) = gateway();
    let id = create(&controller, "1", "sendrecv").await;

    // A connection id without its call id cannot be resolved.
    let params = Parameters::new()
        .with(ParameterKey::EndpointId, "gw/1")
        .with(ParameterKey::ConnectionId, id.to_string());
    let result = controller.handle(CommandVerb::DeleteConnection, 2, &params).await;
    assert_eq!(result.code, 510);

    // Wildcards address no concrete endpoint.
    let params = Parameters::new()
        .with(ParameterKey::CallId, "1")
        .with(ParameterKey::EndpointId, "gw/*");
    let result = controller.handle(CommandVerb::DeleteConnection, 3, &params).await;
    assert_eq!(result.code, 504);
}
