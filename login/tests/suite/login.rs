use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;
use staybook_login::Notice;
use staybook_login::SessionState;
use staybook_protocol::ErrorKind;
use staybook_protocol::NormalizedError;
use staybook_protocol::RegistrationSuccess;
use tokio::sync::Notify;

use super::support::Behavior;
use super::support::Harness;
use super::support::credentials;
use super::support::field_error;
use super::support::registration;
use super::support::stored_pair;

#[tokio::test]
async fn success_persists_navigates_and_invalidates() {
    let harness = Harness::anonymous();
    harness.store.hydrate();

    harness.store.login(&credentials()).await.unwrap();

    assert!(harness.store.is_authenticated());
    assert_eq!(harness.storage.snapshot(), stored_pair("tok-1"));
    assert_eq!(harness.navigator.history(), vec!["/".to_string()]);
    assert_eq!(harness.cache.calls(), 1);
    assert_eq!(harness.store.notice(), None);
}

#[tokio::test]
async fn failure_sets_notice_and_keeps_state() {
    let harness = Harness::anonymous();
    harness.store.hydrate();
    *harness.api.login_result.lock().unwrap() = Err(NormalizedError::unauthenticated()
        .with_message("These credentials do not match our records."));

    let err = harness.store.login(&credentials()).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthenticated);
    assert_eq!(harness.store.state(), SessionState::Anonymous);
    assert_eq!(
        harness.store.notice(),
        Some(Notice::Error(
            "These credentials do not match our records.".to_string()
        ))
    );
    assert!(harness.storage.snapshot().is_empty());
    assert!(harness.navigator.history().is_empty());

    harness.store.dismiss_notice();
    assert_eq!(harness.store.notice(), None);
}

#[tokio::test]
async fn failure_while_authenticated_keeps_old_session() {
    let harness = Harness::authenticated();
    *harness.api.login_result.lock().unwrap() =
        Err(NormalizedError::unreachable("connection refused"));

    let err = harness.store.login(&credentials()).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unreachable);
    assert_eq!(harness.store.token().unwrap().expose(), "tok-1");
    assert_eq!(harness.storage.snapshot(), stored_pair("tok-1"));
}

#[tokio::test]
async fn storage_write_failure_fails_the_login() {
    let harness = Harness::anonymous();
    harness.store.hydrate();
    *harness.storage.write.lock().unwrap() = Behavior::Fail;

    let err = harness.store.login(&credentials()).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(!harness.store.is_authenticated());
    assert!(matches!(harness.store.notice(), Some(Notice::Error(_))));
    assert!(harness.navigator.history().is_empty());
}

#[tokio::test]
async fn logout_during_login_wins() {
    let harness = Harness::anonymous();
    harness.store.hydrate();
    let gate = Arc::new(Notify::new());
    *harness.api.login_gate.lock().unwrap() = Some(gate.clone());

    let store = harness.store.clone();
    let login = tokio::spawn(async move { store.login(&credentials()).await });
    while harness.api.login_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let report = harness.store.logout().await;
    assert!(!report.performed);
    gate.notify_one();
    let result = login.await.unwrap();

    assert!(result.is_err());
    harness.assert_logged_out();
    assert!(harness.storage.snapshot().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_while_logging_out_is_discarded() {
    let harness = Harness::authenticated();
    let gate = Arc::new(Barrier::new(2));
    *harness.navigator.gate.lock().unwrap() = Some(gate.clone());

    let store = harness.store.clone();
    let logout = tokio::spawn(async move { store.logout().await });
    let entered = gate.clone();
    tokio::task::spawn_blocking(move || entered.wait())
        .await
        .unwrap();
    assert_eq!(harness.store.state(), SessionState::LoggingOut);

    let err = harness.store.login(&credentials()).await.unwrap_err();

    let release = gate.clone();
    tokio::task::spawn_blocking(move || release.wait())
        .await
        .unwrap();
    let report = logout.await.unwrap();

    assert!(report.performed);
    assert_eq!(err.kind, ErrorKind::Unauthenticated);
    harness.assert_logged_out();
    assert!(harness.storage.snapshot().is_empty());
}

#[tokio::test]
async fn register_success_lands_on_login_page() {
    let harness = Harness::anonymous();
    harness.store.hydrate();

    harness.store.register(&registration()).await.unwrap();

    assert!(!harness.store.is_authenticated());
    assert_eq!(harness.navigator.history(), vec!["/login".to_string()]);
    assert!(matches!(harness.store.notice(), Some(Notice::Success(_))));
}

#[tokio::test]
async fn register_keeps_upstream_success_message() {
    let harness = Harness::anonymous();
    *harness.api.register_result.lock().unwrap() = Ok(RegistrationSuccess {
        message: Some("Check your inbox.".to_string()),
    });

    harness.store.register(&registration()).await.unwrap();

    assert_eq!(
        harness.store.notice(),
        Some(Notice::Success("Check your inbox.".to_string()))
    );
}

#[tokio::test]
async fn register_failure_flattens_field_errors() {
    let harness = Harness::anonymous();
    harness.store.hydrate();
    *harness.api.register_result.lock().unwrap() =
        Err(field_error("email", "The email has already been taken."));

    let err = harness.store.register(&registration()).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidRequest);
    assert_eq!(
        harness.store.notice(),
        Some(Notice::Error("The email has already been taken.".to_string()))
    );
    assert_eq!(harness.store.state(), SessionState::Anonymous);
    assert!(harness.navigator.history().is_empty());
}

#[tokio::test]
async fn expired_session_is_kept_until_logout() {
    let harness = Harness::authenticated();

    harness.store.session_expired();

    assert!(harness.store.is_authenticated());
    assert!(harness.store.is_session_expired());
    assert!(matches!(harness.store.notice(), Some(Notice::Error(_))));
    assert_eq!(harness.storage.snapshot(), stored_pair("tok-1"));

    harness.store.logout().await;
    assert!(!harness.store.is_session_expired());
}

#[tokio::test]
async fn expiry_is_ignored_without_a_session() {
    let harness = Harness::anonymous();
    harness.store.hydrate();

    harness.store.session_expired();

    assert!(!harness.store.is_session_expired());
    assert_eq!(harness.store.notice(), None);
}
