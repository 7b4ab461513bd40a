//! Router integration tests.
//!
//! Every request here is answered before the database is touched.

#![allow(clippy::unwrap_used)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use tower::ServiceExt;
use vton_app::shopify::verify::{WEBHOOK_HMAC_HEADER, sign_app_proxy_query, sign_oauth_query, sign_webhook};
use vton_integration_tests::{
    API_SECRET, SHOP, STOREFRONT_ORIGIN, json_body, session_token, test_app, text_body,
};

const CLIENT_IP: &str = "203.0.113.7";

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn proxy_query_at(timestamp: i64) -> String {
    sign_app_proxy_query(
        &format!("shop={SHOP}&path_prefix=%2Fapps%2Ftryon&timestamp={timestamp}"),
        API_SECRET,
    )
}

fn proxy_query() -> String {
    proxy_query_at(chrono::Utc::now().timestamp())
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = test_app().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(text_body(response).await, "ok");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
}

#[tokio::test]
async fn test_unsupported_method() {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/webhooks")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// Install
// =============================================================================

#[tokio::test]
async fn test_auth_requires_shop() {
    let response = test_app().oneshot(get("/auth")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Missing shop parameter");
}

#[tokio::test]
async fn test_auth_rejects_foreign_domain() {
    let response = test_app()
        .oneshot(get("/auth?shop=evil.example.com"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_auth_callback_rejects_bad_hmac() {
    let uri = format!("/auth/callback?code=abc&shop={SHOP}&state=s&timestamp=1&hmac=00ff");
    let response = test_app().oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_callback_rejects_unknown_state() {
    // Valid HMAC, but no OAuth state was stored in this session.
    let query = sign_oauth_query(
        &format!("code=abc&shop={SHOP}&state=forged&timestamp=1767225600"),
        API_SECRET,
    );
    let response = test_app()
        .oneshot(get(&format!("/auth/callback?{query}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid OAuth state");
}

// =============================================================================
// Billing
// =============================================================================

#[tokio::test]
async fn test_plan_catalog() {
    let response = test_app().oneshot(get("/api/billing/plans")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let plans = json_body(response).await;
    let plans = plans.as_array().unwrap();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0]["name"], "Trend");
    assert_eq!(plans[1]["usageLimit"], 500);
}

#[tokio::test]
async fn test_billing_callback_missing_params() {
    let response = test_app()
        .oneshot(get(&format!("/app/billing/callback?shop={SHOP}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Missing charge_id or shop");
}

// =============================================================================
// Session token auth
// =============================================================================

#[tokio::test]
async fn test_admin_api_requires_token() {
    for uri in ["/api/subscription-status", "/api/usage", "/api/button-settings", "/api/usage-tracker"] {
        let response = test_app().oneshot(get(uri)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(
            json_body(response).await["error"],
            "Missing or invalid authorization token"
        );
    }
}

#[tokio::test]
async fn test_admin_api_rejects_expired_token() {
    let token = session_token(SHOP, API_SECRET, -120);
    let request = Request::builder()
        .uri("/api/subscription-status")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_api_rejects_foreign_signature() {
    let token = session_token(SHOP, "another_secret_entirely_7f3c9a", 60);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/billing/subscribe")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"planIndex":0}"#))
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Usage tracker
// =============================================================================

#[tokio::test]
async fn test_tracker_preflight_allows_storefront() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/usage-tracker")
        .header(header::ORIGIN, STOREFRONT_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        STOREFRONT_ORIGIN
    );
}

#[tokio::test]
async fn test_tracker_missing_fields() {
    let mut request = post_json("/api/usage-tracker", r#"{"productId":"gid://shopify/Product/1"}"#);
    request
        .headers_mut()
        .insert(header::ORIGIN, STOREFRONT_ORIGIN.parse().unwrap());
    let response = test_app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        STOREFRONT_ORIGIN
    );
    assert_eq!(json_body(response).await["error"], "Missing productId or shop");
}

#[tokio::test]
async fn test_tracker_invalid_body() {
    let response = test_app()
        .oneshot(post_json("/api/usage-tracker", "not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tracker_invalid_shop() {
    let response = test_app()
        .oneshot(post_json(
            "/api/usage-tracker",
            r#"{"productId":"1","shop":"https://evil.example.com"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid shop domain");
}

// =============================================================================
// Webhooks
// =============================================================================

fn webhook(topic: &str, body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/webhooks")
        .header("x-shopify-topic", topic)
        .header("x-shopify-shop-domain", SHOP)
        .header(WEBHOOK_HMAC_HEADER, signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_webhook_rejects_bad_hmac() {
    let response = test_app()
        .oneshot(webhook("app/uninstalled", "{}", "bm90IGEgc2lnbmF0dXJl"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_customer_privacy_acknowledged() {
    let body = r#"{"shop_domain":"demo-store.myshopify.com","customer":{"id":1}}"#;
    let response = test_app()
        .oneshot(webhook("customers/redact", body, &sign_webhook(body.as_bytes(), API_SECRET)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_unknown_topic_acknowledged() {
    let body = r#"{"id":1}"#;
    let response = test_app()
        .oneshot(webhook("orders/create", body, &sign_webhook(body.as_bytes(), API_SECRET)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// App Proxy
// =============================================================================

#[tokio::test]
async fn test_proxy_rejects_bad_signature() {
    let uri = format!("/proxy/tryon/settings?shop={SHOP}&timestamp=1&signature=deadbeef");
    let response = test_app().oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Invalid signature");
}

#[tokio::test]
async fn test_proxy_rejects_stale_timestamp() {
    let signed_at = chrono::Utc::now().timestamp() - 3600;
    let uri = format!("/proxy/tryon/settings?{}", proxy_query_at(signed_at));
    let response = test_app().oneshot(get(&uri)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Request expired");
}

#[tokio::test]
async fn test_proxy_rejects_missing_timestamp() {
    let query = sign_app_proxy_query(&format!("shop={SHOP}&path_prefix=%2Fapps%2Ftryon"), API_SECRET);
    let response = test_app()
        .oneshot(get(&format!("/proxy/tryon/settings?{query}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_proxy_run_without_vendor() {
    let uri = format!("/proxy/tryon/run?{}", proxy_query());
    let response = test_app()
        .oneshot(post_json(
            &uri,
            r#"{"model_image":"https://cdn.example.com/m.jpg","garment_image":"https://cdn.example.com/g.jpg"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(response).await["error"],
        "Try-on service is not configured"
    );
}

#[tokio::test]
async fn test_proxy_status_without_vendor() {
    let uri = format!("/proxy/tryon/status?{}", proxy_query());
    let response = test_app()
        .oneshot(post_json(&uri, r#"{"process_id":"p-1"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
