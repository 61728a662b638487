//! Integration tests for the request channel: the wire protocol end to end,
//! per-connection handles and abandoned requests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use coskit_core::channel::{request_channel, ChannelConnector};
use coskit_core::consent::ConsentChoice;
use coskit_core::protocol::{Request, Response};
use coskit_core::{ConsentPrompter, ErrorCode, StorageBroker};
use serde_json::{json, Value};

use common::{origin, PendingPrompter, ScriptedPrompter};

fn spawn(prompter: Arc<dyn ConsentPrompter>) -> (Arc<StorageBroker>, ChannelConnector) {
    let (_, broker) = common::memory_broker(prompter);
    let (connector, service) = request_channel(Arc::clone(&broker));
    tokio::spawn(service.run());
    (broker, connector)
}

async fn post(port: &coskit_core::channel::OriginPort, message: Value) -> Value {
    let raw = port
        .post(message.to_string())
        .await
        .unwrap()
        .expect("a response");
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_wire_store_and_fetch() {
    let (_, connector) = spawn(ScriptedPrompter::always(ConsentChoice::AllowPersistent));
    let port = connector.connect(origin("https://models.example")).unwrap();
    let (bytes, hash) = common::model();
    let hash_json = serde_json::to_value(&hash).unwrap();
    let encoded = STANDARD.encode(&bytes);

    let granted = post(
        &port,
        json!({
            "action": "requestFileHandle",
            "hash": hash_json,
            "create": true,
            "description": "Large AI Model",
        }),
    )
    .await;
    assert_eq!(
        granted,
        json!({
            "action": "requestFileHandle",
            "hash": hash_json,
            "description": "Large AI Model",
            "success": true,
        })
    );

    let stored = post(
        &port,
        json!({ "action": "storeFileData", "hash": hash_json, "arrayBuffer": encoded }),
    )
    .await;
    assert_eq!(stored["arrayBuffer"], encoded.as_str());
    assert!(stored.get("error").is_none());

    let fetched = post(&port, json!({ "action": "getFileData", "hash": hash_json })).await;
    assert_eq!(fetched["action"], "getFileData");
    assert_eq!(fetched["arrayBuffer"], encoded.as_str());
}

#[tokio::test]
async fn test_lookup_of_absent_hash_reports_not_found() {
    let (_, connector) = spawn(ScriptedPrompter::always(ConsentChoice::AllowOnce));
    let port = connector.connect(origin("https://models.example")).unwrap();
    let (_, hash) = common::model();

    let response = port
        .send(&Request::RequestFileHandle {
            hash: hash.clone(),
            create: false,
            description: "Large AI Model".to_string(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        response,
        Response::RequestFileHandle {
            hash,
            description: "Large AI Model".to_string(),
            success: false,
            error: Some(ErrorCode::NotFoundError),
        }
    );
}

#[tokio::test]
async fn test_unknown_and_malformed_messages_are_dropped() {
    let (_, connector) = spawn(ScriptedPrompter::always(ConsentChoice::AllowOnce));
    let port = connector.connect(origin("https://models.example")).unwrap();

    for message in [
        "{".to_string(),
        json!({ "hash": "x" }).to_string(),
        json!({ "action": "listFiles" }).to_string(),
        json!({ "action": "getFileData", "hash": { "algorithm": "MD5", "value": "00" } })
            .to_string(),
    ] {
        assert_eq!(port.post(message).await.unwrap(), None);
    }

    // the connection stays usable
    let (_, hash) = common::model();
    let response = port
        .send(&Request::GetFileData { hash })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.error(), Some(ErrorCode::InvalidStateError));
}

#[tokio::test]
async fn test_read_handle_cannot_store() {
    let (broker, connector) = spawn(ScriptedPrompter::always(ConsentChoice::AllowOnce));
    let port = connector.connect(origin("https://models.example")).unwrap();
    let (bytes, hash) = common::model();

    broker
        .content_store()
        .put(&hash, &bytes)
        .await
        .unwrap();
    let granted = port
        .send(&Request::RequestFileHandle {
            hash: hash.clone(),
            create: false,
            description: "Large AI Model".to_string(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(granted.error(), None);

    let response = port
        .send(&Request::StoreFileData {
            hash,
            array_buffer: b"other".to_vec(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.error(), Some(ErrorCode::InvalidStateError));
}

#[tokio::test]
async fn test_handles_released_when_port_dropped() {
    let (_, connector) = spawn(ScriptedPrompter::always(ConsentChoice::AllowOnce));
    let site = origin("https://models.example");
    let (bytes, hash) = common::model();

    let port = connector.connect(site.clone()).unwrap();
    port.send(&Request::RequestFileHandle {
        hash: hash.clone(),
        create: true,
        description: "Large AI Model".to_string(),
    })
    .await
    .unwrap();
    drop(port);

    let port = connector.connect(site).unwrap();
    let response = port
        .send(&Request::StoreFileData {
            hash,
            array_buffer: bytes,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.error(), Some(ErrorCode::InvalidStateError));
}

#[tokio::test]
async fn test_abandoned_request_records_nothing() {
    let (broker, connector) = spawn(Arc::new(PendingPrompter));
    let port = connector.connect(origin("https://models.example")).unwrap();
    let (_, hash) = common::model();

    let request = Request::RequestFileHandle {
        hash,
        create: true,
        description: "Large AI Model".to_string(),
    };
    let pending = tokio::time::timeout(Duration::from_millis(50), port.send(&request)).await;
    assert!(pending.is_err());

    // a pending prompt does not block other connections
    let other = connector.connect(origin("https://other.example")).unwrap();
    let response = other
        .send(&Request::GetFileData {
            hash: common::model().1,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.error(), Some(ErrorCode::InvalidStateError));
    assert!(broker.ledger().is_empty());
}
