//! End-to-end coverage for the send -> bus -> fanout -> merger -> pusher
//! pipeline: spawns a real `impush` process and drives its `/send`,
//! `/metrics`, and `/healthz` surfaces over HTTP.

mod common;

use common::TestServer;
use serde_json::json;

#[tokio::test]
async fn accepted_send_is_recorded_and_counted() {
    let server = TestServer::spawn(18090, 19090).await.expect("failed to spawn test server");

    let client = reqwest::Client::new();
    let body = json!({
        "client_msg_id": "c1",
        "send_id": "alice",
        "recv_id": "bob",
        "group_id": null,
        "session_type": "Single",
        "content_type": 101,
        "content": [104, 105],
        "send_time": 0,
        "sender_platform_id": 1,
        "options": 0,
        "offline_push_info": null,
        "ex": null
    });

    let response: serde_json::Value = client
        .post(server.ingress_url("/send"))
        .json(&body)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("response was not json");

    assert!(response["server_msg_id"].as_str().unwrap_or_default().len() > 0);
    assert_eq!(response["client_msg_id"], "c1");

    let metrics = client
        .get(server.metrics_url("/metrics"))
        .send()
        .await
        .expect("metrics request failed")
        .text()
        .await
        .expect("metrics body was not text");

    assert!(metrics.contains("impush_messages_accepted_total 1"));
}

#[tokio::test]
async fn rejected_send_is_labeled_by_error_code() {
    let server = TestServer::spawn(18091, 19091).await.expect("failed to spawn test server");

    let client = reqwest::Client::new();
    let body = json!({
        "client_msg_id": "c1",
        "send_id": "",
        "recv_id": "bob",
        "group_id": null,
        "session_type": "Single",
        "content_type": 101,
        "content": [104, 105],
        "send_time": 0,
        "sender_platform_id": 1,
        "options": 0,
        "offline_push_info": null,
        "ex": null
    });

    let response: serde_json::Value = client
        .post(server.ingress_url("/send"))
        .json(&body)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("response was not json");

    assert_eq!(response["error_code"], "args_invalid");
    assert!(response["server_msg_id"].is_null());

    let metrics = client
        .get(server.metrics_url("/metrics"))
        .send()
        .await
        .expect("metrics request failed")
        .text()
        .await
        .expect("metrics body was not text");

    assert!(metrics.contains("impush_messages_rejected_total{error_code=\"args_invalid\"} 1"));
}

#[tokio::test]
async fn healthz_reports_the_configured_push_provider() {
    let server = TestServer::spawn_with_provider(18092, 19092, "dummy")
        .await
        .expect("failed to spawn test server");

    let client = reqwest::Client::new();
    let healthz = client
        .get(server.metrics_url("/healthz"))
        .send()
        .await
        .expect("healthz request failed")
        .text()
        .await
        .expect("healthz body was not text");

    assert!(healthz.contains("offline_push_provider=dummy"));
}
