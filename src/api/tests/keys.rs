use super::*;

#[tokio::test]
async fn test_key_lifecycle() {
    let app = test_app().await;

    let response = app
        .post_json(
            "/create_key",
            Some(ADMIN_KEY),
            json!({"name": "alice", "permissions": ["get_info", "get_audio"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["message"], "API key created");
    assert_eq!(created["name"], "alice");
    let alice_key = created["key"].as_str().unwrap().to_string();
    assert_eq!(alice_key.len(), 32);

    let response = app.get("/get_key/alice", Some(ADMIN_KEY)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"name": "alice", "key": alice_key})
    );

    let response = app.get("/get_keys", Some(ADMIN_KEY)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let keys = body_json(response).await;
    assert_eq!(keys["alice"]["permissions"], json!(["get_info", "get_audio"]));
    assert_eq!(keys["admin"]["key"], ADMIN_KEY);

    // The new key works right away
    let response = app
        .post_json("/get_audio", Some(&alice_key), json!({"url": "https://example.com"}))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method("DELETE")
        .uri("/delete_key/alice")
        .header("X-API-Key", ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"message": "API key deleted", "name": "alice"})
    );

    // Gone, and no longer accepted
    let response = app.get("/get_key/alice", Some(ADMIN_KEY)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"]["message"],
        "Key not found"
    );

    let response = app
        .post_json("/get_audio", Some(&alice_key), json!({"url": "https://example.com"}))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_key_requires_name_and_permissions() {
    let app = test_app().await;

    for body in [
        json!({}),
        json!({"name": "bob"}),
        json!({"permissions": ["get_info"]}),
        json!({"name": "", "permissions": ["get_info"]}),
        json!({"name": "bob", "permissions": []}),
    ] {
        let response = app.post_json("/create_key", Some(ADMIN_KEY), body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Name and permissions required"
        );
    }

    assert!(app.service.keys().get("bob").await.is_err());
}

#[tokio::test]
async fn test_delete_unknown_key_is_not_found() {
    let app = test_app().await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/delete_key/nobody")
        .header("X-API-Key", ADMIN_KEY)
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_key_management_requires_permissions() {
    let app = test_app().await;
    let key = app.key_with("viewer", &["get_key"]).await;

    let response = app.get("/get_key/admin", Some(&key)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/get_keys", Some(&key)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json(
            "/create_key",
            Some(&key),
            json!({"name": "eve", "permissions": ["create_key"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.service.keys().get("eve").await.is_err());
}

#[tokio::test]
async fn test_check_permissions() {
    let app = test_app().await;
    let key = app.key_with("alice", &["get_info", "get_audio"]).await;

    let response = app
        .post_json(
            "/check_permissions",
            Some(&key),
            json!({"permissions": ["get_info"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Permissions granted"})
    );

    let response = app
        .post_json(
            "/check_permissions",
            Some(&key),
            json!({"permissions": ["get_info", "create_key"]}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({"message": "Insufficient permissions"})
    );

    let response = app
        .post_json("/check_permissions", None, json!({"permissions": []}))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post_json(
            "/check_permissions",
            Some("bogus"),
            json!({"permissions": []}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_check_permissions_authenticates_before_reading_body() {
    let app = test_app().await;
    let key = app.key_with("alice", &["get_info"]).await;
    let bad_body = json!({"permissions": "get_info"});

    let response = app
        .post_json("/check_permissions", Some("bogus"), bad_body.clone())
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post_json("/check_permissions", Some(&key), bad_body)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_create_key_with_mistyped_permissions_is_bad_request() {
    let app = test_app().await;

    let response = app
        .post_json(
            "/create_key",
            Some(ADMIN_KEY),
            json!({"name": "bob", "permissions": "get_info"}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = body_json(response).await["error"]["message"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("permissions"), "{message}");
}
