use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;
use staybook_login::LogoutReport;
use staybook_login::SessionState;
use staybook_login::StepOutcome;

use super::support::Behavior;
use super::support::Harness;

#[tokio::test]
async fn anonymous_logout_is_a_no_op() {
    let harness = Harness::anonymous();
    harness.store.hydrate();

    let report = harness.store.logout().await;

    assert_eq!(report, LogoutReport::default());
    assert_eq!(harness.api.revoke_calls(), 0);
    assert!(harness.navigator.history().is_empty());
    assert_eq!(harness.cache.calls(), 0);
}

#[tokio::test]
async fn logout_before_hydration_ends_the_persisted_session() {
    let harness = Harness::new(super::support::stored_pair("tok-1"));

    let report = harness.store.logout().await;

    assert!(report.performed);
    assert_eq!(harness.api.revoke_calls(), 1);
    harness.assert_logged_out();
    assert!(harness.storage.snapshot().is_empty());
}

#[tokio::test]
async fn happy_path_runs_every_step_in_order() {
    let harness = Harness::authenticated();

    let report = harness.store.logout().await;

    assert_eq!(
        report,
        LogoutReport {
            performed: true,
            cache: StepOutcome::Done,
            storage: StepOutcome::Done,
            navigation: StepOutcome::Done,
            emergency: None,
            hard_reload: false,
            revoke: StepOutcome::Done,
        }
    );
    harness.assert_logged_out();
    assert!(harness.storage.snapshot().is_empty());
    assert_eq!(harness.navigator.history(), vec!["/".to_string()]);
    assert_eq!(
        *harness.api.state_at_revoke.lock().unwrap(),
        Some(SessionState::Anonymous)
    );
}

#[tokio::test]
async fn second_logout_does_not_revoke_again() {
    let harness = Harness::authenticated();

    harness.store.logout().await;
    let second = harness.store.logout().await;

    assert!(!second.performed);
    assert_eq!(harness.api.revoke_calls(), 1);
}

#[tokio::test]
async fn navigation_failure_falls_back_to_hard_reload() {
    let harness = Harness::authenticated();
    *harness.navigator.navigate.lock().unwrap() = Behavior::Fail;

    let report = harness.store.logout().await;

    assert!(matches!(report.navigation, StepOutcome::Failed(_)));
    assert!(report.hard_reload);
    assert_eq!(report.emergency, None);
    assert_eq!(harness.navigator.reloads(), 1);
    harness.assert_logged_out();
}

#[tokio::test]
async fn storage_failure_is_swallowed() {
    let harness = Harness::authenticated();
    *harness.storage.clear.lock().unwrap() = Behavior::Fail;

    let report = harness.store.logout().await;

    assert!(matches!(report.storage, StepOutcome::Failed(_)));
    assert_eq!(report.navigation, StepOutcome::Done);
    harness.assert_logged_out();
}

#[tokio::test]
async fn panicking_cache_triggers_emergency_cleanup() {
    let harness = Harness::authenticated();
    harness.cache.panics.store(true, Ordering::SeqCst);

    let report = harness.store.logout().await;

    assert_eq!(report.cache, StepOutcome::Panicked);
    assert_eq!(report.storage, StepOutcome::Done);
    // The emergency pass invalidates again and panics again.
    assert_eq!(report.emergency, Some(StepOutcome::Panicked));
    assert!(report.hard_reload);
    assert_eq!(harness.cache.calls(), 2);
    harness.assert_logged_out();
}

#[tokio::test]
async fn emergency_and_reload_panics_still_log_out() {
    let harness = Harness::authenticated();
    *harness.navigator.navigate.lock().unwrap() = Behavior::Panic;
    harness.navigator.reload_panics.store(true, Ordering::SeqCst);

    let report = harness.store.logout().await;

    assert_eq!(report.navigation, StepOutcome::Panicked);
    assert_eq!(report.emergency, Some(StepOutcome::Panicked));
    assert!(!report.hard_reload);
    assert_eq!(harness.navigator.reloads(), 1);
    harness.assert_logged_out();
}

#[tokio::test(start_paused = true)]
async fn every_failure_combination_ends_logged_out() {
    let storage_modes = [Behavior::Succeed, Behavior::Fail, Behavior::Panic];
    let navigation_modes = [Behavior::Succeed, Behavior::Fail, Behavior::Panic];
    let revoke_modes = [
        Behavior::Succeed,
        Behavior::Fail,
        Behavior::Panic,
        Behavior::Hang,
    ];

    for storage in storage_modes {
        for navigation in navigation_modes {
            for revoke in revoke_modes {
                let harness = Harness::authenticated();
                *harness.storage.clear.lock().unwrap() = storage;
                *harness.navigator.navigate.lock().unwrap() = navigation;
                *harness.api.revoke.lock().unwrap() = revoke;

                let report = harness.store.logout().await;

                let case = format!("storage={storage:?} nav={navigation:?} revoke={revoke:?}");
                assert!(report.performed, "{case}");
                harness.assert_logged_out();
                assert_eq!(harness.api.revoke_calls(), 1, "{case}");
                match revoke {
                    Behavior::Succeed => assert_eq!(report.revoke, StepOutcome::Done, "{case}"),
                    Behavior::Panic => assert_eq!(report.revoke, StepOutcome::Panicked, "{case}"),
                    Behavior::Fail | Behavior::Hang => {
                        assert!(matches!(report.revoke, StepOutcome::Failed(_)), "{case}")
                    }
                }
                if storage == Behavior::Succeed {
                    assert!(harness.storage.snapshot().is_empty(), "{case}");
                }
            }
        }
    }
}
