use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::basic_auth;
use wiremock::matchers::path;

use super::support::Proxy;
use super::support::SERVICE_PASSWORD;
use super::support::SERVICE_USER;

#[tokio::test]
async fn hotel_detail_is_sanitized() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/hotels/9"))
        .and(basic_auth(SERVICE_USER, SERVICE_PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 1,
            "data": {
                "id": 9,
                "name": "<b>Grand</b> Hotel",
                "description": "<a href=\"javascript:x()\">Lobby</a>",
                "rating": "4.5",
                "amenities": [{"name": "Spa", "icon": "fa-spa"}]
            }
        })))
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/hotel/9").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.cache_control(), "public, max-age=3600");
    let hotel = &reply.body["data"];
    assert_eq!(hotel["name"], "Grand Hotel");
    assert_eq!(hotel["rating"], 4.5);
    assert_eq!(hotel["address"], "");
    assert_eq!(hotel["images"], json!([]));
    assert_eq!(hotel["amenities"], json!([{"label": "Spa", "icon": "fa-spa"}]));
    assert!(!reply.raw.contains("javascript"));
}

#[tokio::test]
async fn missing_hotel_data_is_not_found() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/hotels/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/hotel/9").await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.kind(), "upstream_empty");
    assert_eq!(reply.error(), "Hotel not found");
}

#[tokio::test]
async fn unknown_routes_get_the_error_shape() {
    let proxy = Proxy::start().await;
    let reply = proxy.get("/nope").await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.kind(), "not_found");

    let reply = proxy.get("/healthz").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.raw, "ok");
}
