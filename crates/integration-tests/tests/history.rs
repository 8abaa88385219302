mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use harness::server::TestServer;

fn chat_body_with_id(id: uuid::Uuid, text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "message": {
            "id": uuid::Uuid::new_v4(),
            "role": "user",
            "parts": [{ "type": "text", "text": text }]
        },
        "selected_model_id": "mock-model",
        "visibility": "private"
    })
}

#[tokio::test]
async fn completed_turns_appear_in_history() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let chat_id = uuid::Uuid::new_v4();
    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_history")
        .json(&chat_body_with_id(chat_id, "hello"))
        .send()
        .await
        .unwrap();
    // Drain the stream so persistence and the title update complete
    resp.text().await.unwrap();

    let body: serde_json::Value = server
        .client()
        .get(server.url("/api/history"))
        .header("x-account-id", "usr_history")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let chats = body["chats"].as_array().unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], serde_json::json!(chat_id));
    assert_eq!(chats[0]["title"], "Mock chat title");
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn supplying_both_cursors_is_rejected() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let a = uuid::Uuid::new_v4();
    let b = uuid::Uuid::new_v4();
    let resp = server
        .client()
        .get(server.url(&format!("/api/history?starting_after={a}&ending_before={b}")))
        .header("x-account-id", "usr_cursors")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn guests_cannot_delete_history_or_chats() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let resp = server
        .client()
        .delete(server.url("/api/history"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .client()
        .delete(server.url(&format!("/api/chat?id={}", uuid::Uuid::new_v4())))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn owners_can_delete_a_chat() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let chat_id = uuid::Uuid::new_v4();
    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_delete")
        .json(&chat_body_with_id(chat_id, "hello"))
        .send()
        .await
        .unwrap();
    resp.text().await.unwrap();

    // Another account cannot delete it
    let resp = server
        .client()
        .delete(server.url(&format!("/api/chat?id={chat_id}")))
        .header("x-account-id", "usr_other")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // The owner can
    let resp = server
        .client()
        .delete(server.url(&format!("/api/chat?id={chat_id}")))
        .header("x-account-id", "usr_delete")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = server
        .client()
        .get(server.url("/api/history"))
        .header("x-account-id", "usr_delete")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["chats"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn conversations_are_isolated_between_users() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let chat_id = uuid::Uuid::new_v4();
    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_owner")
        .json(&chat_body_with_id(chat_id, "hello"))
        .send()
        .await
        .unwrap();
    resp.text().await.unwrap();

    // A different user posting into the same conversation is rejected
    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_intruder")
        .json(&chat_body_with_id(chat_id, "mine now"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}
