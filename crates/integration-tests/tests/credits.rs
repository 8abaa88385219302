mod harness;

use harness::config::ConfigBuilder;
use harness::mock_provider::MockProvider;
use harness::server::TestServer;

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

#[tokio::test]
async fn credits_reflect_debits() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let before: serde_json::Value = server
        .client()
        .get(server.url("/api/credits"))
        .header("x-account-id", "usr_credits")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(before["user_type"], "regular");
    assert_eq!(before["remaining_credits"], 120);
    assert_eq!(before["daily_credits"], 120);

    // One turn at the configured cost of 2
    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("x-account-id", "usr_credits")
        .json(&chat_body("hello"))
        .send()
        .await
        .unwrap();
    resp.text().await.unwrap();

    let after: serde_json::Value = server
        .client()
        .get(server.url("/api/credits"))
        .header("x-account-id", "usr_credits")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(after["remaining_credits"], 118);
}

#[tokio::test]
async fn guest_identity_is_provisioned_with_a_cookie() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let resp = server
        .client()
        .get(server.url("/api/credits"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);

    let cookie = resp
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .expect("guest cookie issued")
        .to_owned();
    assert!(cookie.starts_with("guest_id="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=604800"));

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["user_type"], "guest");
    assert_eq!(body["daily_credits"], 40);
}

#[tokio::test]
async fn reused_guest_cookie_keeps_the_same_balance() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let first = server.client().get(server.url("/api/credits")).send().await.unwrap();
    let cookie = first
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_owned();

    // Spend with the issued cookie
    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .header("cookie", &cookie)
        .json(&chat_body("hello"))
        .send()
        .await
        .unwrap();
    resp.text().await.unwrap();

    let body: serde_json::Value = server
        .client()
        .get(server.url("/api/credits"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["remaining_credits"], 38);
}

#[tokio::test]
async fn exhausted_quota_is_rejected_with_figures() {
    let mock = MockProvider::start().await.unwrap();
    let config = ConfigBuilder::new(&mock.base_url())
        .with_guest_daily(1)
        .with_max_borrow(0)
        .build();
    let server = TestServer::start(config).await.unwrap();

    // Cost 2 against a 1-credit day with no borrow headroom
    let resp = server
        .client()
        .post(server.url("/api/chat"))
        .json(&chat_body("hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 429);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["type"], "rate_limit_error");
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("1 remaining"));
    assert!(message.contains("2 required"));
    assert_eq!(mock.chat_completion_count(), 0);
}

#[tokio::test]
async fn borrow_endpoint_respects_the_ceiling() {
    let mock = MockProvider::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new(&mock.base_url()).build()).await.unwrap();

    let resp = server
        .client()
        .post(server.url("/api/credits/borrow"))
        .header("x-account-id", "usr_borrow")
        .json(&serde_json::json!({ "amount": 20 }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["borrowed"], 20);
    assert_eq!(body["remaining_credits"], 140);
    assert_eq!(body["borrow_available"], 0);

    // At the ceiling any further borrow fails
    let resp = server
        .client()
        .post(server.url("/api/credits/borrow"))
        .header("x-account-id", "usr_borrow")
        .json(&serde_json::json!({ "amount": 1 }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 429);
}
