use std::sync::Arc;

use axum::http::Method;
use serde_json::json;

use crate::routes::test_helpers::spawn_app;
use crate::services::backend::RequestBody;
use crate::services::backend::test_helpers::MockBackend;
use crate::services::session::Role;

#[tokio::test]
async fn gallery_is_public_and_defaults_to_kartini() {
    let backend = Arc::new(MockBackend::new());
    backend.on(
        Method::GET,
        "/design-images",
        200,
        json!([{ "id": 1, "imageUrl": "/uploads/k1.png", "label": "kartini" }]),
    );
    let app = spawn_app(&backend).await;

    let response = app.client.get(app.url("/design/images")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body[0]["imageUrl"], "/uploads/k1.png");

    let calls = backend.calls_to(&Method::GET, "/design-images");
    assert_eq!(calls[0].query, vec![("label".to_owned(), "kartini".to_owned())]);
    assert!(calls[0].bearer.is_none());
}

#[tokio::test]
async fn unknown_category_is_rejected() {
    let backend = Arc::new(MockBackend::new());
    let app = spawn_app(&backend).await;

    let response = app.client.get(app.url("/design/images?label=ballgown")).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn admin_upload_sends_file_and_label() {
    let backend = Arc::new(MockBackend::new());
    backend.on(
        Method::POST,
        "/design-images",
        201,
        json!([{ "id": 5, "imageUrl": "/uploads/b5.png", "label": "balloon" }]),
    );
    let app = spawn_app(&backend).await;

    let part = reqwest::multipart::Part::bytes(vec![1, 2, 3])
        .file_name("b5.png")
        .mime_str("image/png")
        .unwrap();
    let form = reqwest::multipart::Form::new().text("label", "balloon").part("file", part);
    let response = app
        .client
        .post(app.url("/api/admin/design-images"))
        .header(reqwest::header::COOKIE, app.cookie(Role::Admin))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body[0]["id"], 5);

    let calls = backend.calls_to(&Method::POST, "/design-images");
    let RequestBody::Multipart(sent) = &calls[0].body else {
        panic!("expected multipart body");
    };
    assert_eq!(sent.texts, vec![("label".to_owned(), "balloon".to_owned())]);
    assert_eq!(sent.files[0].file_name, "b5.png");
}

#[tokio::test]
async fn upload_without_file_is_400() {
    let backend = Arc::new(MockBackend::new());
    let app = spawn_app(&backend).await;

    let response = app
        .client
        .post(app.url("/api/admin/design-images"))
        .header(reqwest::header::COOKIE, app.cookie(Role::Admin))
        .multipart(reqwest::multipart::Form::new().text("label", "sabrina"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No file uploaded");
}

#[tokio::test]
async fn admin_delete_is_no_content() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::DELETE, "/design-images/5", 200, json!({}));
    let app = spawn_app(&backend).await;

    let response = app
        .client
        .delete(app.url("/api/admin/design-images/5"))
        .header(reqwest::header::COOKIE, app.cookie(Role::Admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(backend.calls_to(&Method::DELETE, "/design-images/5").len(), 1);
}

#[tokio::test]
async fn customer_cannot_delete_images() {
    let backend = Arc::new(MockBackend::new());
    let app = spawn_app(&backend).await;

    let response = app
        .client
        .delete(app.url("/api/admin/design-images/5"))
        .header(reqwest::header::COOKIE, app.cookie(Role::Customer))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}
