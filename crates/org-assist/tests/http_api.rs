//! HTTP API routes over in-memory stores.

mod common;

use common::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use org_assist::server::router;
use org_assist_core::chat::ChatResponse;

async fn serve(h: Harness) -> String {
    let app = router(Arc::new(h.ctx), CancellationToken::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_and_tool_list() {
    let base = serve(harness(ScriptedChat::new(vec![]), FakeGateway::default())).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let tools: Value = client
        .get(format!("{}/tools/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let tools = tools["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 52);
    let create_task = tools.iter().find(|t| t["name"] == "create_task").unwrap();
    assert_eq!(create_task["category"], "projects");
    assert_eq!(create_task["parameters"]["required"], json!(["projectId", "title"]));
}

#[tokio::test]
async fn test_index_stats_remove_roundtrip() {
    let base = serve(harness(ScriptedChat::new(vec![]), FakeGateway::default())).await;
    let client = reqwest::Client::new();

    let indexed: Value = client
        .post(format!("{}/index", base))
        .json(&json!({
            "organizationId": "org1",
            "sourceSchema": "crm",
            "sourceTable": "clients",
            "sourceId": "c1",
            "title": "Acme",
            "rawContent": "Retail account.",
            "contentType": "client"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(indexed["isNew"], true);
    assert_eq!(indexed["chunksCreated"], 1);

    let stats: Value = client
        .get(format!("{}/stats/org1", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["totalDocuments"], 1);
    assert_eq!(stats["byContentType"]["client"], 1);

    let key = json!({
        "organizationId": "org1",
        "sourceSchema": "crm",
        "sourceTable": "clients",
        "sourceId": "c1"
    });
    for expected in [true, false] {
        let removed: Value = client
            .post(format!("{}/remove", base))
            .json(&key)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(removed, json!({ "removed": expected }));
    }
}

#[tokio::test]
async fn test_index_validation_is_bad_request() {
    let base = serve(harness(ScriptedChat::new(vec![]), FakeGateway::default())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/index", base))
        .json(&json!({
            "organizationId": "org1",
            "sourceSchema": "crm",
            "sourceTable": "clients",
            "sourceId": "",
            "title": "Acme",
            "contentType": "client"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "sourceId must not be empty");
}

#[tokio::test]
async fn test_query_session_lifecycle() {
    let base = serve(harness(
        ScriptedChat::new(vec![ChatResponse::text("Nothing indexed yet.")]),
        FakeGateway::default(),
    ))
    .await;
    let client = reqwest::Client::new();

    let answer: Value = client
        .post(format!("{}/query", base))
        .json(&json!({
            "organizationId": "org1",
            "userId": "u1",
            "sessionId": "s1",
            "query": "What is in the wiki?"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(answer["answer"], "Nothing indexed yet.");
    assert_eq!(answer["sessionId"], "s1");
    assert_eq!(answer["isOutOfScope"], false);
    assert_eq!(answer["isActionResponse"], false);

    let history: Value = client
        .get(format!("{}/sessions/s1/history?limit=5", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let turns = history["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[1]["role"], "assistant");

    let cleared = client
        .delete(format!("{}/sessions/s1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status(), 200);
    let again = client
        .delete(format!("{}/sessions/s1", base))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn test_empty_query_is_bad_request() {
    let base = serve(harness(ScriptedChat::new(vec![]), FakeGateway::default())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/query", base))
        .json(&json!({ "organizationId": "org1", "userId": "u1", "query": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["message"], "query must not be empty");
}
