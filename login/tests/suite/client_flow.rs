//! The session store wired to a real `BffClient` and file storage.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use staybook_backend_client::BffClient;
use staybook_login::FileSessionStorage;
use staybook_login::RecordingNavigator;
use staybook_login::SessionConfig;
use staybook_login::SessionStore;
use staybook_login::StepOutcome;
use staybook_protocol::LoginRequest;
use tempfile::TempDir;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn store(server: &MockServer, dir: &TempDir) -> (SessionStore, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::new());
    let storage = Arc::new(FileSessionStorage::with_path(dir.path().join("session.json")));
    let api = Arc::new(BffClient::new(&server.uri()).unwrap());
    let store = SessionStore::new(storage, navigator.clone(), api, SessionConfig::default());
    (store, navigator)
}

#[tokio::test]
async fn session_survives_a_restart_and_logout_revokes_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 1,
            "data": {"token": "55|persisted", "user": {"id": 55, "name": "Grace"}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer 55|persisted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 1})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let (first, navigator) = store(&server, &dir);
    first.hydrate();
    first
        .login(&LoginRequest::new("grace@example.com", "pw"))
        .await
        .unwrap();
    assert_eq!(navigator.current().as_deref(), Some("/"));
    drop(first);

    let (second, _navigator) = store(&server, &dir);
    assert!(second.hydrate().is_authenticated());
    assert_eq!(second.token().unwrap().expose(), "55|persisted");

    let report = second.logout().await;
    assert_eq!(report.revoke, StepOutcome::Done);
    assert!(!second.is_authenticated());
    assert!(!dir.path().join("session.json").exists());
}

#[tokio::test]
async fn revoke_failure_is_not_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "token": "t",
            "user": {"id": 1}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let (store, _navigator) = store(&server, &dir);
    store.hydrate();
    store.login(&LoginRequest::new("a@b.c", "pw")).await.unwrap();

    let report = store.logout().await;

    assert!(matches!(report.revoke, StepOutcome::Failed(_)));
    assert!(!store.is_authenticated());
    assert_eq!(store.notice(), None);
}
