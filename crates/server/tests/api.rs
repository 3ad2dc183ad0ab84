use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Duration;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{Credentials, Engine};
use migration::MigratorTrait;
use server::{ServerConfig, ServerState, router};

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let credentials =
        Credentials::new("api-secret", Duration::hours(1), Duration::hours(24)).with_cost(4);
    let engine = Engine::builder()
        .database(db)
        .credentials(credentials)
        .build()
        .await
        .unwrap();
    router(ServerState::new(engine), &ServerConfig::default())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

async fn signup(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("password_hash").is_none());
    body["token"].as_str().unwrap().to_string()
}

async fn create_category(app: &Router, token: &str, body: Value) -> String {
    let (status, body) = send(app, "POST", "/categories", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn protected_routes_need_a_bearer_token() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/categories", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "unauthorized");

    let (status, _) = send(&app, "GET", "/categories", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_and_read_roots() {
    let app = app().await;
    let token = signup(&app, "u1", "p1").await;

    let id = create_category(
        &app,
        &token,
        json!({ "name": "Food", "level": 1, "path": "|<newId>" }),
    )
    .await;

    let (status, body) = send(&app, "GET", "/categories", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["name"], "Food");
    assert_eq!(list[0]["level"], 1);
    assert!(list[0].get("parent_id").is_none());

    let (status, body) = send(&app, "GET", "/categories/missing", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not-found");
}

#[tokio::test]
async fn move_subtree_and_reject_cycles() {
    let app = app().await;
    let token = signup(&app, "u1", "p1").await;
    let a = create_category(&app, &token, json!({ "name": "A" })).await;
    let b = create_category(&app, &token, json!({ "name": "B", "parent_id": a })).await;
    let c = create_category(&app, &token, json!({ "name": "C", "parent_id": b })).await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/categories/{a}/move?destinationId={c}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "incorrect-input");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/categories/{b}/move?destinationId=root"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let (_, body) = send(&app, "GET", &format!("/categories/{c}"), Some(&token), None).await;
    assert_eq!(body["path"], format!("|{b}|{c}"));
    assert_eq!(body["level"], 2);
    assert_eq!(body["parents"][0]["id"], b.as_str());

    let (status, body) = send(
        &app,
        "GET",
        &format!("/categories/{b}/usages"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "PUT",
        "/categories/missing/move?destinationId=root",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/categories/{c}/move?destinationId="),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "incorrect-input");
    let (_, body) = send(&app, "GET", &format!("/categories/{c}"), Some(&token), None).await;
    assert_eq!(body["parent_id"], b.as_str());

    let (status, body) = send(&app, "DELETE", &format!("/categories/{a}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let (status, _) = send(&app, "DELETE", &format!("/categories/{a}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rename_returns_no_content() {
    let app = app().await;
    let token = signup(&app, "u1", "p1").await;
    let id = create_category(&app, &token, json!({ "name": "Food" })).await;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/categories/{id}"),
        Some(&token),
        Some(json!({ "name": "Groceries", "icon": "cart" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", &format!("/categories/{id}"), Some(&token), None).await;
    assert_eq!(body["name"], "Groceries");
    assert_eq!(body["icon"], "cart");
}

#[tokio::test]
async fn login_round_trip() {
    let app = app().await;
    signup(&app, "u2", "p2").await;

    let (status, body) = send(
        &app,
        "POST",
        "/users/login",
        None,
        Some(json!({ "username": "u2", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: password or user is incorrect");

    let (status, body) = send(
        &app,
        "POST",
        "/users/login",
        None,
        Some(json!({ "username": "u2", "password": "p2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();
    let (status, _) = send(&app, "GET", "/categories", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);

    let refresh = body["refresh_token"].as_str().unwrap();
    let (status, refreshed) = send(
        &app,
        "POST",
        "/users/refresh",
        None,
        Some(json!({ "refresh_token": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(refreshed["token"], body["token"]);

    let (status, _) = send(&app, "GET", "/categories", Some(token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let fresh = refreshed["token"].as_str().unwrap();
    let (status, _) = send(&app, "GET", "/categories", Some(fresh), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_signup_is_a_conflict() {
    let app = app().await;
    signup(&app, "u1", "p1").await;
    let (status, body) = send(
        &app,
        "POST",
        "/users/signup",
        None,
        Some(json!({ "username": "u1", "password": "p1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "conflict");
}

#[tokio::test]
async fn expenses_feed_the_report() {
    let app = app().await;
    let token = signup(&app, "u1", "p1").await;
    let food = create_category(&app, &token, json!({ "name": "Food" })).await;

    let (status, body) = send(
        &app,
        "POST",
        "/expenses",
        Some(&token),
        Some(json!({
            "category_id": food,
            "price": "12.50",
            "currency": "eur",
            "quantity": "2",
            "date": "2021-07-10T18:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_string());

    let (status, body) = send(
        &app,
        "POST",
        "/expenses",
        Some(&token),
        Some(json!({
            "category_id": food,
            "price": "-1",
            "currency": "",
            "quantity": "1",
            "date": "2021-07-10T18:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "incorrect-input");
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &app,
        "GET",
        "/expenses?from=2021-07-01&to=2021-07-31",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["currency"], "EUR");
    assert_eq!(body[0]["date"], "2021-07-10T00:00:00Z");

    let (status, body) = send(
        &app,
        "GET",
        "/report?from=2021-07-01&to=2021-07-31&interval=month",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interval"], "month");
    assert_eq!(body["dates"][0]["date"], "2021-07-01");
    let sum: Decimal = body["total"]["original"][0]["sum"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(sum, Decimal::from(25));
    assert!(body["total"].get("converted").is_none());

    let (status, _) = send(
        &app,
        "GET",
        "/report?from=2021-07-01&to=2021-07-31&interval=week",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        "GET",
        "/report?from=2021-08-01&to=2021-07-31",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
