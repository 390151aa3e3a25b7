//! Integration tests for the error pipeline.
//!
//! These exercise the public facade end to end against a recording surface
//! and a manual clock: handled-state idempotence, per-channel throttling,
//! the silent/toast/fatal decision table and the fatal policies.

use std::sync::Arc;

use cortex_errors::error::{ErrorState, GroupKeyStrategy};
use cortex_errors::notification::{Notification, Permission};
use cortex_errors::ratelimit::ManualClock;
use cortex_errors::{
    create_error, ErrorHandler, ErrorOptions, FatalPolicy, HandlerConfig, Outcome, RaisedError,
    RecordingSurface,
};

fn setup(
    surface: RecordingSurface,
    config: HandlerConfig,
) -> (ErrorHandler, Arc<RecordingSurface>, Arc<ManualClock>) {
    let surface = Arc::new(surface);
    let clock = Arc::new(ManualClock::default());
    let handler = ErrorHandler::with_clock(surface.clone(), config, clock.clone());
    (handler, surface, clock)
}

fn default_setup() -> (ErrorHandler, Arc<RecordingSurface>, Arc<ManualClock>) {
    setup(RecordingSurface::new(), HandlerConfig::default())
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_native_error_shows_toast() {
    let (handler, surface, _) = default_setup();
    let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");

    let handled = handler
        .handle_error(err, ErrorOptions::default())
        .await
        .expect("non-fatal errors never come back as Err");

    let toasts = surface.toasts();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].title, "Error 500");
    assert_eq!(toasts[0].description, "boom");
    assert!(handled.error.is_handled());
    assert_eq!(handled.error.state(), ErrorState::Handled);
}

#[tokio::test]
async fn test_scenario_not_found_twice_within_a_second() {
    let (handler, surface, clock) = default_setup();

    let first = handler
        .handle_error(
            create_error("not found", ErrorOptions::new().status_code(404)),
            ErrorOptions::default(),
        )
        .await
        .unwrap();
    clock.advance_ms(400);
    let second = handler
        .handle_error(
            create_error("not found", ErrorOptions::new().status_code(404)),
            ErrorOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(first.outcome, Outcome::Reported { toast_shown: true });
    assert_eq!(second.outcome, Outcome::Reported { toast_shown: false });
    assert_eq!(surface.toasts().len(), 1);
}

#[tokio::test]
async fn test_scenario_fatal_db_down() {
    let surface = RecordingSurface::new().with_permission_request(Permission::Granted);
    let (handler, surface, _) = setup(surface, HandlerConfig::default());

    let handled = handler
        .handle_error(
            create_error("fatal db down", ErrorOptions::new().status_code(500).fatal(true)),
            ErrorOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(surface.permission_requests(), 1);
    assert_eq!(surface.system_notifications().len(), 1);
    assert_eq!(surface.navigations().len(), 1);
    assert!(surface.toasts().is_empty());
    assert!(matches!(handled.outcome, Outcome::Navigated(_)));
}

#[tokio::test]
async fn test_scenario_silent_still_logs() {
    let (handler, surface, _) = default_setup();

    handler
        .handle_error("background sync failed", ErrorOptions::new().silent(true))
        .await
        .unwrap();

    assert!(surface.toasts().is_empty());
    assert!(surface.system_notifications().is_empty());
    let logs = surface.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].message, "Error details: background sync failed");
}

#[tokio::test]
async fn test_scenario_oauth_group_counts_every_occurrence() {
    let (handler, surface, clock) = default_setup();

    for _ in 0..3 {
        handler
            .handle_error(
                "callback rejected",
                ErrorOptions::new().status_code(401).group_key("oauth-401"),
            )
            .await
            .unwrap();
        clock.advance_ms(600);
    }

    assert_eq!(surface.toasts().len(), 1);
    let group = handler.group("oauth-401").expect("group exists");
    assert_eq!(group.count, 3);
    assert_eq!(group.recent_len(), 3);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_handled_error_produces_no_side_effects() {
    for fatal in [false, true] {
        for silent in [false, true] {
            let (handler, surface, clock) = default_setup();
            let options = ErrorOptions::new().fatal(fatal).silent(silent);

            let error = match handler.handle_error("boom", options.clone()).await {
                Ok(handled) => handled.error,
                Err(err) => err,
            };
            let before = surface.calls();

            clock.advance_ms(1_000_000);
            let again = handler.handle_error(error, options).await.unwrap();

            assert_eq!(again.outcome, Outcome::AlreadyHandled);
            assert_eq!(surface.calls(), before);
        }
    }
}

#[tokio::test]
async fn test_toast_window_yields_one_toast() {
    let (handler, surface, clock) = default_setup();

    for _ in 0..20 {
        handler
            .handle_error("poll failed", ErrorOptions::new().group_key("poll"))
            .await
            .unwrap();
        clock.advance_ms(200);
    }

    assert_eq!(surface.toasts().len(), 1);

    clock.advance_ms(1_000);
    handler
        .handle_error("poll failed", ErrorOptions::new().group_key("poll"))
        .await
        .unwrap();
    assert_eq!(surface.toasts().len(), 2);
}

#[tokio::test]
async fn test_system_window_yields_at_most_one_notification() {
    let (handler, surface, clock) = default_setup();

    for _ in 0..5 {
        let _ = handler
            .handle_error("db down", ErrorOptions::new().fatal(true).group_key("db"))
            .await;
        clock.advance_ms(60_000);
    }

    assert_eq!(surface.system_notifications().len(), 1);
}

#[tokio::test]
async fn test_silent_never_notifies_user() {
    let (handler, surface, _) = default_setup();

    handler
        .handle_error("a", ErrorOptions::new().silent(true).fatal(true))
        .await
        .unwrap();
    handler
        .handle_error("b", ErrorOptions::new().silent(true).fatal(false).group_key("b"))
        .await
        .unwrap();

    assert!(surface.calls().iter().all(|c| !c.is_user_visible()));
}

#[tokio::test]
async fn test_native_error_defaults_to_500() {
    let (handler, _, _) = default_setup();
    let parse_err = "x".parse::<i32>().unwrap_err();

    let handled = handler
        .handle_error(RaisedError::from_error(&parse_err), ErrorOptions::new().group_key("parse"))
        .await
        .unwrap();

    assert_eq!(handled.error.status_code, 500);
}

#[test]
fn test_create_error_keeps_fields() {
    let err = create_error(
        "missing roadmap",
        ErrorOptions::new().status_code(404).with_data("slug", "x"),
    );
    assert_eq!(err.message, "missing roadmap");
    assert_eq!(err.status_code, 404);
    assert_eq!(err.data.unwrap()["slug"], "x");
}

// ============================================================================
// Propagation contract
// ============================================================================

#[tokio::test]
async fn test_exactly_one_propagation_per_fatal_call() {
    let (handler, surface, _) = default_setup();

    let result = handler
        .handle_error("fatal", ErrorOptions::new().fatal(true))
        .await;

    assert!(result.is_ok());
    assert_eq!(surface.navigations().len(), 1);
}

#[tokio::test]
async fn test_rethrow_policy_hands_back_handled_error() {
    let config = HandlerConfig::default().with_fatal_policy(FatalPolicy::Rethrow);
    let (handler, surface, _) = setup(RecordingSurface::new(), config);

    let err = handler
        .handle_error("fatal", ErrorOptions::new().fatal(true).status_code(503))
        .await
        .unwrap_err();

    assert!(err.is_handled());
    assert_eq!(err.status_code, 503);
    assert!(surface.navigations().is_empty());
}

#[tokio::test]
async fn test_fatal_order_of_side_effects() {
    let (handler, surface, _) = default_setup();

    handler
        .handle_error("fatal", ErrorOptions::new().fatal(true))
        .await
        .unwrap();

    let calls = surface.calls();
    assert!(matches!(calls[0], Notification::Log(_)));
    assert!(matches!(calls[1], Notification::System(_)));
    assert!(matches!(calls[2], Notification::Log(_)));
    assert!(matches!(calls[3], Notification::Navigation(_)));
    assert_eq!(calls.len(), 4);
}

#[tokio::test]
async fn test_custom_error_route() {
    let config = HandlerConfig::default().with_error_route("/oops");
    let (handler, surface, _) = setup(RecordingSurface::new().with_route("/lessons/1"), config);

    handler
        .handle_error("fatal", ErrorOptions::new().fatal(true))
        .await
        .unwrap();

    let target = &surface.navigations()[0];
    assert_eq!(target.path, "/oops");
    assert_eq!(target.query["from"], "/lessons/1");
}

#[tokio::test]
async fn test_second_fatal_after_redirect_stays_put() {
    let (handler, surface, clock) = default_setup();

    handler
        .handle_error("first", ErrorOptions::new().fatal(true).group_key("a"))
        .await
        .unwrap();
    clock.advance_ms(10);
    let second = handler
        .handle_error("second", ErrorOptions::new().fatal(true).group_key("b"))
        .await
        .unwrap();

    assert_eq!(second.outcome, Outcome::AlreadyOnErrorRoute);
    assert_eq!(surface.navigations().len(), 1);
}

#[tokio::test]
async fn test_message_strategy_splits_groups() {
    let strategy = GroupKeyStrategy::TypeStatusAndMessage;
    let config = HandlerConfig::default().with_group_key_strategy(strategy);
    let (handler, surface, _) = setup(RecordingSurface::new(), config);

    for message in ["one", "two", "one"] {
        handler
            .handle_error(message, ErrorOptions::default())
            .await
            .unwrap();
    }

    assert_eq!(surface.toasts().len(), 2);
    assert_eq!(handler.groups().len(), 2);
}
