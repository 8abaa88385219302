mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use harness::server::TestServer;
use harness::sse::{find_event, parse_sse, streamed_text};

fn chat_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": uuid::Uuid::new_v4(),
        "message": {
            "id": uuid::Uuid::new_v4(),
            "role": "user",
            "parts": [{ "type": "text", "text": text }]
        },
        "selected_model_id": "mock-model",
        "visibility": "private"
    })
}

async fn remaining_credits(server: &TestServer, account: &str) -> u64 {
    let body: serde_json::Value = server
        .client()
        .get(server.url("/api/credits"))
        .header("x-account-id", account)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["remaining_credits"].as_u64().unwrap()
}

#[tokio::test]
async fn blocked_input_returns_403_without_spending_credits() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    assert_eq!(remaining_credits(&server, "usr_blocked").await, 120);

    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_blocked")
        .json(&chat_body("how to move contraband"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "content_moderation_error");

    // The rejected attempt left the balance untouched
    assert_eq!(remaining_credits(&server, "usr_blocked").await, 120);
    assert_eq!(mock.chat_completion_count(), 0);
}

#[tokio::test]
async fn reviewed_output_is_flagged_but_not_suppressed() {
    let mock = MockProvider::start_with_response("a grisly but legal description").await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_review")
        .json(&chat_body("describe the scene"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let text = resp.text().await.unwrap();
    let events = parse_sse(&text);

    // Content streams unmodified; only the flag is set
    assert_eq!(streamed_text(&events), "a grisly but legal description");
    let metadata = find_event(&events, "message-metadata").expect("metadata event");
    assert_eq!(metadata.data["moderation"], true);
}

#[tokio::test]
async fn allowed_turn_is_not_flagged() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_allowed")
        .json(&chat_body("hello there"))
        .send()
        .await
        .unwrap();

    let text = resp.text().await.unwrap();
    let events = parse_sse(&text);

    let metadata = find_event(&events, "message-metadata").expect("metadata event");
    assert_eq!(metadata.data["moderation"], false);
}
