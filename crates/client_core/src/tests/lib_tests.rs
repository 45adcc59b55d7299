use super::*;

use std::time::Duration;

use shared::{domain::HttpMethod, error::ErrorCode};
use tokio::time::timeout;

use crate::mediator::{subscriber_fn, EventSubscriber};

const MENU_JSON: &str = r#"[
    {
        "key": "dashboard",
        "displayName": "Dashboard",
        "scope": "main",
        "sortOrder": 1,
        "screens": { "main": "admin_dashboard" }
    },
    {
        "key": "admin",
        "displayName": "Admin",
        "scope": "main",
        "sortOrder": 2,
        "permissions": ["admin_access"]
    }
]"#;

fn perms(names: &[&str]) -> PermissionSet {
    names.iter().copied().collect()
}

async fn core() -> ClientCore {
    ClientCore::start(Settings::default())
        .await
        .expect("core starts")
}

fn resolved_recorder(seen: Arc<Mutex<Vec<String>>>) -> Arc<dyn EventSubscriber> {
    subscriber_fn(move |event: EventEnvelope| {
        let seen = Arc::clone(&seen);
        async move {
            if let Some(resolved) = event.downcast_ref::<ScreenEventResolved>() {
                seen.lock()
                    .await
                    .push(format!("{}:{}", resolved.screen_key, resolved.event_id));
            }
            Ok::<(), MediatorError>(())
        }
    })
}

#[tokio::test]
async fn menu_payload_is_filtered_by_current_permissions() {
    let core = core().await;
    let mut menu = core.subscribe_menu();

    core.apply_menu_payload(MENU_JSON).await.expect("payload");
    let first = menu.recv().await.expect("first snapshot");
    let keys: Vec<&str> = first.items.iter().map(|item| item.key.as_str()).collect();
    assert_eq!(keys, vec!["dashboard"]);

    core.set_permissions(perms(&["admin_access"]))
        .await
        .expect("permissions");
    let second = menu.recv().await.expect("second snapshot");
    assert_eq!(second.items.len(), 2);

    core.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn malformed_menu_payload_is_rejected() {
    let core = core().await;
    let err = core
        .apply_menu_payload("{ not json")
        .await
        .expect_err("malformed");
    assert!(err.to_string().contains("failed to parse menu payload"));
    core.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn permitted_event_is_published_and_streamed() {
    let core = core().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    core.mediator()
        .subscribe::<ScreenEventResolved>(resolved_recorder(Arc::clone(&seen)))
        .await;
    let mut outcomes = core.subscribe_outcomes();
    core.set_permissions(perms(&["view_dashboard"]))
        .await
        .expect("permissions");

    let result = core
        .handle_screen_event(
            ScreenKey::from("admin_dashboard"),
            ScreenEvent::LoadData,
            EventContext::for_screen("admin_dashboard"),
        )
        .await
        .expect("handled");

    assert!(matches!(
        result,
        Some(EventResult::SubmitTo { method: HttpMethod::Get, .. })
    ));
    assert_eq!(*seen.lock().await, vec!["admin_dashboard:load_data"]);

    let outcome = outcomes.recv().await.expect("outcome");
    assert_eq!(outcome.sequence, 1);
    assert_eq!(outcome.event_id, "load_data");
    assert_eq!(outcome.result, Ok(result));

    core.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn denied_event_streams_a_validation_report() {
    let core = core().await;
    let mut outcomes = core.subscribe_outcomes();

    let err = core
        .handle_screen_event(
            ScreenKey::from("manager_dashboard"),
            ScreenEvent::Submit,
            EventContext::default(),
        )
        .await
        .expect_err("no edit permission");
    assert_eq!(err.code(), ErrorCode::Validation);

    let outcome = outcomes.recv().await.expect("outcome");
    let report = outcome.result.expect_err("error report");
    assert_eq!(report.code, ErrorCode::Validation);
    assert!(report.message.contains("edit_dashboard"));

    core.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn repeated_identical_events_each_produce_an_outcome() {
    let core = core().await;
    let mut outcomes = core.subscribe_outcomes();

    for _ in 0..2 {
        let result = core
            .handle_screen_event(
                ScreenKey::from("login"),
                ScreenEvent::custom("logout"),
                EventContext::default(),
            )
            .await
            .expect("logout");
        assert_eq!(result, Some(EventResult::Logout));
    }

    let first = outcomes.recv().await.expect("first");
    let second = outcomes.recv().await.expect("second");
    assert_eq!((first.sequence, second.sequence), (1, 2));

    core.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shutdown_ends_streams_and_is_not_repeatable() {
    let core = core().await;
    let mut outcomes = core.subscribe_outcomes();
    let mut menu = core.subscribe_menu();

    core.shutdown().await.expect("shutdown");

    let ended = timeout(Duration::from_secs(1), async {
        (outcomes.recv().await, menu.recv().await)
    })
    .await
    .expect("streams end");
    assert_eq!(ended, (None, None));
    assert!(core.shutdown().await.is_err());

    let err = core
        .handle_screen_event(
            ScreenKey::from("login"),
            ScreenEvent::Back,
            EventContext::default(),
        )
        .await
        .expect_err("store closed");
    assert_eq!(err.code(), ErrorCode::Internal);
}
