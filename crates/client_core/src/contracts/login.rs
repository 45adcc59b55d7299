use shared::{
    domain::{HttpMethod, Permission, ScreenKey},
    protocol::{Endpoint, EventContext, EventResult, FieldValues, ScreenEvent},
};

use super::{custom_handler, CustomEventHandler, ScreenContract};

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const LOGIN_EVENT: &str = "login";
pub const LOGOUT_EVENT: &str = "logout";
pub const FORGOT_PASSWORD_EVENT: &str = "forgot_password";
const MISSING_CREDENTIALS: &str = "Email and password are required";

/// Public sign-in screen. Everything happens through custom events.
#[derive(Debug, Clone)]
pub struct LoginContract {
    screen_key: ScreenKey,
    endpoint: Endpoint,
}

impl LoginContract {
    pub fn new(iam_prefix: &str) -> Self {
        Self {
            screen_key: ScreenKey::from("login"),
            endpoint: Endpoint::new(format!("{iam_prefix}{LOGIN_PATH}"), HttpMethod::Post),
        }
    }

    fn login_handler(&self) -> CustomEventHandler {
        let endpoint = self.endpoint.clone();
        custom_handler(move |context| {
            let endpoint = endpoint.clone();
            async move { submit_credentials(endpoint, &context) }
        })
    }
}

/// Validates before building a request; never fails, only reports.
/// Blank checks trim, but the submitted values are exactly what was typed.
fn submit_credentials(endpoint: Endpoint, context: &EventContext) -> EventResult {
    if context.text("email").is_none() || context.text("password").is_none() {
        return EventResult::error(MISSING_CREDENTIALS);
    }

    let field_values: FieldValues = ["email", "password"]
        .into_iter()
        .filter_map(|name| {
            context
                .field(name)
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect();
    EventResult::submit_to(endpoint, field_values)
}

impl ScreenContract for LoginContract {
    fn screen_key(&self) -> &ScreenKey {
        &self.screen_key
    }

    fn resource(&self) -> &str {
        "auth"
    }

    fn endpoint_for(&self, _event: &ScreenEvent, _context: &EventContext) -> Option<Endpoint> {
        None
    }

    fn permission_for(&self, _event: &ScreenEvent) -> Option<Permission> {
        None
    }

    fn custom_event_handler(&self, event_id: &str) -> Option<CustomEventHandler> {
        match event_id {
            LOGIN_EVENT => Some(self.login_handler()),
            LOGOUT_EVENT => Some(custom_handler(|_context| async { EventResult::Logout })),
            FORGOT_PASSWORD_EVENT => Some(custom_handler(|_context| async {
                EventResult::navigate(FORGOT_PASSWORD_EVENT)
            })),
            _ => None,
        }
    }
}
