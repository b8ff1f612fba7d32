use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::any;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

use super::support::Proxy;

#[tokio::test]
async fn missing_or_malformed_bearer_is_401_without_upstream_call() {
    let proxy = Proxy::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/hotel/booking/AB12").await;
    assert_eq!(reply.status, 401);
    assert_eq!(reply.kind(), "unauthenticated");
    assert_eq!(reply.cache_control(), "no-store");

    for authorization in ["Bearer", "Bearer ", "Bearer a b", "Basic abc", "tok"] {
        let reply = proxy.get_with_auth("/hotel/booking/AB12", authorization).await;
        assert_eq!(reply.status, 401, "{authorization:?}");
    }

    let reply = proxy.post("/checkout", None, "{}").await;
    assert_eq!(reply.status, 401);
}

#[tokio::test]
async fn invalid_booking_code_is_400_without_upstream_call() {
    let proxy = Proxy::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy.upstream)
        .await;

    let long = "A".repeat(65);
    for code in ["bad.code", "ab%20cd", long.as_str()] {
        let reply = proxy
            .get_with_auth(&format!("/hotel/booking/{code}"), "Bearer tok")
            .await;
        assert_eq!(reply.status, 400, "{code}");
        assert_eq!(reply.kind(), "invalid_request");
    }
}

#[tokio::test]
async fn booking_forwards_header_unchanged_and_sanitizes() {
    let proxy = Proxy::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bookings/AB-12"))
        .and(header("authorization", "bearer 7|abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": true,
            "data": {
                "code": "AB-12",
                "hotel": "<b>Grand</b>",
                "notes": "<em>Late</em> arrival<script>x()</script>",
                "nights": 2
            }
        })))
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy
        .get_with_auth("/hotel/booking/AB-12", "bearer 7|abc")
        .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.cache_control(), "no-store");
    assert_eq!(
        reply.body,
        json!({"data": {
            "code": "AB-12",
            "hotel": "Grand",
            "notes": "<em>Late</em> arrival",
            "nights": 2
        }})
    );
}

#[tokio::test]
async fn booking_rejection_carries_upstream_message() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/bookings/ZZ9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": 0, "message": "Booking belongs to another user"})),
        )
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get_with_auth("/hotel/booking/ZZ9", "Bearer tok").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.kind(), "upstream_rejected");
    assert_eq!(reply.error(), "Booking belongs to another user");
    assert_eq!(reply.cache_control(), "no-store");
}

#[tokio::test]
async fn expired_token_upstream_is_401() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/bookings/AB12"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get_with_auth("/hotel/booking/AB12", "Bearer old").await;
    assert_eq!(reply.status, 401);
    assert_eq!(reply.kind(), "unauthenticated");
}

#[tokio::test]
async fn checkout_forwards_order_once() {
    let proxy = Proxy::start().await;
    Mock::given(method("POST"))
        .and(path("/api/checkout"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({"room_id": 3, "nights": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": {"booking_code": "AB12", "receipt_url": "https://pay.example.com/r/1"}
        })))
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy
        .post("/checkout", Some("Bearer tok"), r#"{"room_id": 3, "nights": 2}"#)
        .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.cache_control(), "no-store");
    assert_eq!(
        reply.body,
        json!({"data": {"booking_code": "AB12", "receipt_url": "https://pay.example.com/r/1"}})
    );
}

#[tokio::test]
async fn checkout_rejection_keeps_field_errors() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "message": "Please fix the errors below.",
            "errors": {"card": ["Card declined"]}
        })))
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy
        .post("/checkout", Some("Bearer tok"), r#"{"room_id": 3}"#)
        .await;
    assert_eq!(reply.status, 400);
    assert_eq!(
        reply.body,
        json!({
            "error": "Please fix the errors below.",
            "kind": "upstream_rejected",
            "field_errors": {"card": ["Card declined"]}
        })
    );
}

#[tokio::test]
async fn checkout_is_not_retried_on_failure() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/checkout"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy
        .post("/checkout", Some("Bearer tok"), r#"{"room_id": 3}"#)
        .await;
    assert_eq!(reply.status, 502);
    assert_eq!(reply.kind(), "upstream_fault");
}
