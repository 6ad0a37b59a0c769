mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use catalog_service::http::router;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{TestEnv, workbook};

const BOUNDARY: &str = "catalog-test-boundary";

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn multipart(uri: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn ann() -> Value {
    json!({
        "username": "ann",
        "email": "ann@example.com",
        "password": "correct horse",
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_pool_status() {
    let env = TestEnv::new().await.unwrap();
    let app = router(env.state());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status_code"], 200);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["pool"]["closed"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn user_lifecycle_over_http() {
    let env = TestEnv::new().await.unwrap();
    let app = router(env.state());

    let (status, body) = send(&app, post_json("/users", &ann())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status_code"], 201);
    assert_eq!(body["data"]["username"], "ann");
    assert!(body["data"].get("hashed_password").is_none());
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(&app, post_json("/users", &ann())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
    assert!(body["data"].is_null());

    let (status, body) = send(&app, get(&format!("/users/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ann@example.com");

    let (status, body) = send(&app, get("/users/email/ann@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let login = json!({ "email": "ann@example.com", "password": "correct horse" });
    let (status, body) = send(&app, post_json("/users/login", &login)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let wrong = json!({ "email": "ann@example.com", "password": "wrong horse" });
    let (status, _) = send(&app, post_json("/users/login", &wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let delete = Request::delete(format!("/users/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get(&format!("/users/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status_code"], 404);
}

#[tokio::test(flavor = "multi_thread")]
async fn bad_requests_are_rejected_with_the_envelope() {
    let env = TestEnv::new().await.unwrap();
    let app = router(env.state());

    let (status, body) = send(&app, get("/items?sort_by=price;DROP")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);

    let (status, _) = send(&app, get("/items?limit=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let invalid = json!({ "name": "", "price": -1.0 });
    let (status, body) = send(&app, post_json("/items", &invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("price"));

    let malformed = Request::post("/items")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status_code"], 400);
}

#[tokio::test(flavor = "multi_thread")]
async fn items_bulk_upload_and_export() {
    let env = TestEnv::new().await.unwrap();
    let app = router(env.state());

    let content = workbook(
        &["name", "price"],
        &[vec!["Lamp", "20"], vec!["Chair", "-1"], vec!["Table", "120"]],
    );
    let (status, body) = send(&app, multipart("/items/bulk-upload", "items.xlsx", &content)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "partial_success");
    assert_eq!(body["data"]["success_count"], 2);
    assert_eq!(body["data"]["insert_mode"], "best_effort");

    let (status, body) = send(
        &app,
        multipart(
            "/items/bulk-upload?all_or_nothing=true",
            "items.xlsx",
            &content,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["status"], "error");
    assert_eq!(body["data"]["success_count"], 0);

    let (status, _) = send(&app, multipart("/items/bulk-upload", "items.csv", b"name,price")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/items/download-excel?sort_by=name&sort_direction=asc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.contains("spreadsheetml"));
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"items_"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let rows = catalog_service::bulk::parse_rows("export.xlsx", bytes.to_vec(), &["name"]).unwrap();
    let names: Vec<String> = rows.iter().filter_map(|r| r.text("name")).collect();
    assert_eq!(names, ["Lamp", "Table"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn image_upload_rejects_non_images() {
    let env = TestEnv::new().await.unwrap();
    let app = router(env.state());

    let item = json!({ "name": "Lamp", "price": 20.0 });
    let (status, body) = send(&app, post_json("/items", &item)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        multipart(&format!("/items/{id}/images"), "notes.txt", b"hello"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        multipart(&format!("/items/{id}/images"), "lamp.png", b"\x89PNG fake"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["original_filename"], "lamp.png");

    let (status, body) = send(&app, get(&format!("/items/{id}/images"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_query_and_path_values_get_the_envelope() {
    let env = TestEnv::new().await.unwrap();
    let app = router(env.state());

    for uri in [
        "/items?skip=abc",
        "/users?limit=ten",
        "/reviews?min_score=x",
        "/items/abc",
        "/users/abc",
    ] {
        let (status, body) = send(&app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["status_code"], 400, "{uri}");
        assert!(body["data"].is_null(), "{uri}");
        assert!(!body["message"].as_str().unwrap().is_empty(), "{uri}");
    }
}
