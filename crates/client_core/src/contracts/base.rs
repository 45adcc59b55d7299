use std::{collections::HashMap, fmt};

use shared::{
    domain::{HttpMethod, Permission, ScreenKey},
    protocol::{Endpoint, EventContext, ScreenEvent},
};

use super::{CustomEventHandler, ScreenContract};

/// Contract driven entirely by construction-time constants.
///
/// Reads (`LoadData`, `Refresh`, `LoadMore`) are `GET prefix+path` and need
/// the view permission; `Submit` is `POST prefix+path` and `Delete` is
/// `DELETE prefix+path/{item_id}`, both needing the edit permission. `Back`
/// never touches the network. `Custom` events go through the handler table.
pub struct BaseScreenContract {
    screen_key: ScreenKey,
    resource: String,
    api_prefix: String,
    default_path: String,
    view_permission: Option<Permission>,
    edit_permission: Option<Permission>,
    handlers: HashMap<String, CustomEventHandler>,
}

impl BaseScreenContract {
    pub fn new(
        screen_key: impl Into<ScreenKey>,
        resource: impl Into<String>,
        api_prefix: impl Into<String>,
        default_path: impl Into<String>,
    ) -> Self {
        Self {
            screen_key: screen_key.into(),
            resource: resource.into(),
            api_prefix: api_prefix.into(),
            default_path: default_path.into(),
            view_permission: None,
            edit_permission: None,
            handlers: HashMap::new(),
        }
    }

    pub fn with_view_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.view_permission = Some(permission.into());
        self
    }

    pub fn with_edit_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.edit_permission = Some(permission.into());
        self
    }

    pub fn with_handler(
        mut self,
        event_id: impl Into<String>,
        handler: CustomEventHandler,
    ) -> Self {
        self.handlers.insert(event_id.into(), handler);
        self
    }

    pub fn address(&self) -> String {
        format!("{}{}", self.api_prefix, self.default_path)
    }
}

impl ScreenContract for BaseScreenContract {
    fn screen_key(&self) -> &ScreenKey {
        &self.screen_key
    }

    fn resource(&self) -> &str {
        &self.resource
    }

    fn endpoint_for(&self, event: &ScreenEvent, context: &EventContext) -> Option<Endpoint> {
        match event {
            ScreenEvent::LoadData | ScreenEvent::Refresh | ScreenEvent::LoadMore => {
                Some(Endpoint::new(self.address(), HttpMethod::Get))
            }
            ScreenEvent::Submit => Some(Endpoint::new(self.address(), HttpMethod::Post)),
            ScreenEvent::Delete => context.item_id.as_deref().map(|item_id| {
                Endpoint::new(format!("{}/{item_id}", self.address()), HttpMethod::Delete)
            }),
            ScreenEvent::Back | ScreenEvent::Custom { .. } => None,
        }
    }

    fn permission_for(&self, event: &ScreenEvent) -> Option<Permission> {
        match event {
            ScreenEvent::LoadData
            | ScreenEvent::Refresh
            | ScreenEvent::LoadMore
            | ScreenEvent::Custom { .. } => self.view_permission.clone(),
            ScreenEvent::Submit | ScreenEvent::Delete => self.edit_permission.clone(),
            ScreenEvent::Back => None,
        }
    }

    fn custom_event_handler(&self, event_id: &str) -> Option<CustomEventHandler> {
        self.handlers.get(event_id).cloned()
    }
}

impl fmt::Debug for BaseScreenContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handler_ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        handler_ids.sort_unstable();
        f.debug_struct("BaseScreenContract")
            .field("screen_key", &self.screen_key)
            .field("resource", &self.resource)
            .field("address", &self.address())
            .field("view_permission", &self.view_permission)
            .field("edit_permission", &self.edit_permission)
            .field("handlers", &handler_ids)
            .finish()
    }
}
