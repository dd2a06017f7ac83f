//! HTTP surface tests driven through the router without a socket.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use price_serve::http::{self, ApiState};
use price_serve::testing::{assert_prediction_eq, car_price_service};

fn app() -> Router {
    http::router(ApiState::new(car_price_service(2024)), "*")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn predict_on_both_paths() {
    for uri in ["/api/predict", "/predict"] {
        let (status, body) = send(
            app(),
            post(uri, r#"{"features": {"Year": 2018, "Mileage": "60000", "Brand": "Toyota"}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_prediction_eq(body["prediction"].as_f64().unwrap(), 16500.0, uri);
    }
}

#[tokio::test]
async fn predict_ignores_content_type() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(r#"{"Year": 2022, "Mileage": 100, "Brand": "BMW"}"#))
        .unwrap();
    let (status, body) = send(app(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_prediction_eq(body["prediction"].as_f64().unwrap(), 27500.0, "text/plain");
}

#[tokio::test]
async fn faults_are_400_with_message() {
    for payload in [
        "[1, 2]",
        "{}",
        r#"{"features": {}}"#,
        "not json",
        r#"{"Year": "soon", "Brand": "BMW"}"#,
    ] {
        let (status, body) = send(app(), post("/api/predict", payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        let message = body["error"].as_str().unwrap();
        assert!(!message.is_empty(), "{payload}");
        assert!(body.get("prediction").is_none());
    }
}

#[tokio::test]
async fn coercion_message_names_field() {
    let (_, body) = send(
        app(),
        post("/predict", r#"{"Year": "soon", "Mileage": 1, "Brand": "BMW"}"#),
    )
    .await;
    assert!(body["error"].as_str().unwrap().contains("'Year'"));
}

#[tokio::test]
async fn health_reports_model() {
    for uri in ["/api/health", "/health"] {
        let (status, body) = send(app(), get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "ok", "model": "model.json", "model_loaded": true})
        );
    }
}

#[tokio::test]
async fn meta_reports_schema() {
    let (status, body) = send(app(), get("/api/meta")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], json!(true));
    assert_eq!(
        body["features"],
        json!(["Year", "Mileage", "Age", "Mileage_log", "Brand"])
    );
    assert_eq!(body["feature_types"][4], json!("categorical"));
    assert_eq!(body["note"], json!("Car ID removed"));
}

#[tokio::test]
async fn cors_headers_for_any_origin() {
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://example.com")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn static_frontend_is_served_when_present() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>price</h1>").unwrap();
    let app = http::app(ApiState::new(car_price_service(2024)), "*", dir.path());

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>price</h1>");

    let (status, _) = send(app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
}
