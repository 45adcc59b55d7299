use super::*;

use shared::{domain::HttpMethod, protocol::FieldValue};

use crate::{config::Settings, contracts::default_registry, mediator::Mediator};

fn processor() -> ScreenEventProcessor {
    let registry = default_registry(&Settings::default()).expect("registry");
    ScreenEventProcessor::new(Arc::new(registry))
}

fn perms(names: &[&str]) -> PermissionSet {
    names.iter().copied().collect()
}

fn admin_dashboard() -> ScreenKey {
    ScreenKey::from("admin_dashboard")
}

#[tokio::test]
async fn permitted_load_becomes_submission() {
    let context = EventContext::for_screen("admin_dashboard").with_field("range", "week");
    let result = processor()
        .process(
            &admin_dashboard(),
            &ScreenEvent::LoadData,
            context,
            &perms(&["view_dashboard"]),
        )
        .await
        .expect("process");

    assert_eq!(
        result,
        Some(EventResult::SubmitTo {
            endpoint: "api:/api/v1/dashboard".into(),
            method: HttpMethod::Get,
            field_values: [("range".to_string(), FieldValue::from("week"))]
                .into_iter()
                .collect(),
        })
    );
}

#[tokio::test]
async fn missing_permission_is_denied_before_dispatch() {
    let err = processor()
        .process(
            &admin_dashboard(),
            &ScreenEvent::Submit,
            EventContext::default(),
            &perms(&["view_dashboard"]),
        )
        .await
        .expect_err("edit permission missing");

    match err {
        ContractError::PermissionDenied {
            screen_key,
            event,
            permission,
        } => {
            assert_eq!(screen_key, admin_dashboard());
            assert_eq!(event, "submit");
            assert_eq!(permission.as_str(), "edit_dashboard");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn custom_event_runs_contract_handler() {
    let context = EventContext::for_screen("login")
        .with_field("email", "ada@example.com")
        .with_field("password", "hunter2");
    let result = processor()
        .process(
            &ScreenKey::from("login"),
            &ScreenEvent::custom("login"),
            context,
            &PermissionSet::new(),
        )
        .await
        .expect("process");

    assert!(matches!(
        result,
        Some(EventResult::SubmitTo { ref endpoint, method: HttpMethod::Post, .. })
            if endpoint == "iam:/api/v1/auth/login"
    ));
}

#[tokio::test]
async fn events_without_endpoint_or_handler_do_nothing() {
    let processor = processor();
    let permissions = perms(&["view_dashboard"]);

    let back = processor
        .process(
            &admin_dashboard(),
            &ScreenEvent::Back,
            EventContext::default(),
            &permissions,
        )
        .await
        .expect("back");
    assert_eq!(back, None);

    let unknown = processor
        .process(
            &admin_dashboard(),
            &ScreenEvent::custom("does_not_exist"),
            EventContext::default(),
            &permissions,
        )
        .await
        .expect("unknown custom event");
    assert_eq!(unknown, None);
}

#[tokio::test]
async fn unknown_screen_is_reported() {
    let err = processor()
        .process(
            &ScreenKey::from("nowhere"),
            &ScreenEvent::LoadData,
            EventContext::default(),
            &PermissionSet::new(),
        )
        .await
        .expect_err("unknown screen");
    assert!(matches!(err, ContractError::NotFound(_)));
}

#[tokio::test]
async fn processor_serves_as_mediator_command_handler() {
    let mediator = Mediator::new();
    mediator
        .register_command_handler::<ProcessScreenEvent, _>(Arc::new(processor()))
        .await
        .expect("register");

    let result = mediator
        .send(ProcessScreenEvent {
            screen_key: ScreenKey::from("login"),
            event: ScreenEvent::custom("login"),
            context: EventContext::default(),
            permissions: PermissionSet::new(),
        })
        .await
        .expect("dispatch");
    assert_eq!(
        result,
        Some(EventResult::error("Email and password are required"))
    );

    let denied = mediator
        .send(ProcessScreenEvent {
            screen_key: admin_dashboard(),
            event: ScreenEvent::Refresh,
            context: EventContext::default(),
            permissions: PermissionSet::new(),
        })
        .await
        .expect_err("denied");
    assert!(matches!(denied, MediatorError::Validation { .. }));
}
