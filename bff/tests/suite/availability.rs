use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::any;
use wiremock::matchers::basic_auth;
use wiremock::matchers::method;
use wiremock::matchers::path;

use super::support::Proxy;
use super::support::SERVICE_PASSWORD;
use super::support::SERVICE_USER;
use super::support::dead_upstream;
use super::support::router_for;
use super::support::send;

#[tokio::test]
async fn invalid_id_is_rejected_before_any_upstream_call() {
    let proxy = Proxy::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .expect(0)
        .mount(&proxy.upstream)
        .await;

    for uri in ["/hotel/availability/abc", "/hotel/availability/0", "/hotel/availability/-4"] {
        let reply = proxy.get(uri).await;
        assert_eq!(reply.status, 400, "{uri}");
        assert_eq!(reply.kind(), "invalid_request");
        assert_eq!(reply.cache_control(), "no-store");
    }
}

#[tokio::test]
async fn non_success_status_means_no_rooms() {
    let proxy = Proxy::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hotels/7/availability"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": 0, "message": "internal upstream detail"})),
        )
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/hotel/availability/7").await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.error(), "No rooms found");
    assert!(!reply.raw.contains("internal upstream detail"));
}

#[tokio::test]
async fn missing_or_empty_rooms_mean_no_rooms() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/hotels/1/availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .mount(&proxy.upstream)
        .await;
    Mock::given(path("/api/hotels/2/availability"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": 1, "data": {"rooms": []}})),
        )
        .mount(&proxy.upstream)
        .await;

    for uri in ["/hotel/availability/1", "/hotel/availability/2"] {
        let reply = proxy.get(uri).await;
        assert_eq!(reply.status, 404, "{uri}");
        assert_eq!(reply.body, json!({"error": "No rooms found", "kind": "upstream_empty"}));
    }
}

#[tokio::test]
async fn rooms_are_sanitized_and_publicly_cacheable() {
    let proxy = Proxy::start().await;
    Mock::given(method("GET"))
        .and(path("/api/hotels/7/availability"))
        .and(basic_auth(SERVICE_USER, SERVICE_PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "1",
            "data": {"rooms": [{
                "id": 3,
                "title": "<img src=x onerror=alert(1)>Suite",
                "description": "<p onmouseover=\"steal()\">Sea <b>view</b></p>",
                "price": "<strong>120</strong><script>x()</script>",
                "images": ["javascript:alert(1)", "https://cdn.example.com/3.jpg"],
                "features": null
            }]}
        })))
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/hotel/availability/7").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.cache_control(), "public, max-age=3600");
    assert_eq!(
        reply.body,
        json!({"data": [{
            "id": 3,
            "title": "Suite",
            "description": "<p>Sea <b>view</b></p>",
            "price": "<strong>120</strong>",
            "currency": "",
            "capacity": 0,
            "images": ["https://cdn.example.com/3.jpg"],
            "features": []
        }]})
    );
    assert!(!reply.raw.contains("onerror"));
    assert!(!reply.raw.contains("<script"));
}

#[tokio::test]
async fn max_age_follows_configuration() {
    let proxy = Proxy::start_with(|config| config.public_max_age = 60).await;
    Mock::given(path("/api/hotels/7/availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 1,
            "rooms": [{"id": 1, "title": "Twin"}]
        })))
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/hotel/availability/7").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.cache_control(), "public, max-age=60");
    assert_eq!(reply.body["data"][0]["title"], "Twin");
}

#[tokio::test]
async fn upstream_errors_are_normalized() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/hotels/1/availability"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "token bad"})))
        .mount(&proxy.upstream)
        .await;
    Mock::given(path("/api/hotels/2/availability"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"trace": "NullPointer at line 9"})),
        )
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/hotel/availability/1").await;
    assert_eq!(reply.status, 401);
    assert_eq!(reply.kind(), "unauthenticated");
    assert_eq!(reply.error(), "Your session has expired. Please log in again.");

    let reply = proxy.get("/hotel/availability/2").await;
    assert_eq!(reply.status, 502);
    assert_eq!(reply.kind(), "upstream_fault");
    assert!(!reply.raw.contains("NullPointer"));
    assert_eq!(reply.cache_control(), "no-store");
}

#[tokio::test]
async fn no_response_is_unreachable() {
    let router = router_for(dead_upstream(), |_| {});
    let reply = send(&router, axum::http::Method::GET, "/hotel/availability/7", None, None).await;
    assert_eq!(reply.status, 502);
    assert_eq!(reply.kind(), "unreachable");
    assert_eq!(
        reply.error(),
        "We couldn't reach the server. Check your connection and try again."
    );
}
