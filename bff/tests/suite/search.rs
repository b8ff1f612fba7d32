use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::ResponseTemplate;
use wiremock::matchers::any;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

use super::support::Proxy;

#[tokio::test]
async fn query_length_is_checked_after_trimming() {
    let proxy = Proxy::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&proxy.upstream)
        .await;

    let long = "a".repeat(101);
    for uri in [
        "/locations/search".to_string(),
        "/locations/search?q=%20a%20".to_string(),
        format!("/locations/search?q={long}"),
    ] {
        let reply = proxy.get(&uri).await;
        assert_eq!(reply.status, 400, "{uri}");
        assert_eq!(reply.kind(), "invalid_request");
    }
}

#[tokio::test]
async fn forwards_trimmed_query_and_sanitizes_results() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/locations"))
        .and(query_param("q", "Lon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 1,
            "data": [
                {"id": "LON", "name": "London", "label": "London<script>x()</script>, UK"},
                {"id": 2, "name": "Londrina"}
            ]
        })))
        .expect(1)
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/locations/search?q=%20Lon%20").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.cache_control(), "public, max-age=3600");
    assert_eq!(
        reply.body,
        json!({"data": [
            {"id": "LON", "name": "London", "label": "London, UK"},
            {"id": 2, "name": "Londrina", "label": "Londrina"}
        ]})
    );
}

#[tokio::test]
async fn missing_list_is_empty() {
    let proxy = Proxy::start().await;
    Mock::given(path("/api/locations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .mount(&proxy.upstream)
        .await;

    let reply = proxy.get("/locations/search?q=Paris").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, json!({"data": []}));
}
