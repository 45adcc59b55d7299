use std::sync::Arc;

use shared::{
    domain::{Permission, ScreenKey},
    protocol::{Endpoint, EventContext, ScreenEvent},
};

use super::{CustomEventHandler, ScreenContract};

/// Role-specific screen that reuses a shared contract and only changes its key.
pub struct PersonaContract {
    screen_key: ScreenKey,
    base: Arc<dyn ScreenContract>,
}

impl PersonaContract {
    pub fn new(screen_key: impl Into<ScreenKey>, base: Arc<dyn ScreenContract>) -> Self {
        Self {
            screen_key: screen_key.into(),
            base,
        }
    }

    pub fn base(&self) -> &Arc<dyn ScreenContract> {
        &self.base
    }
}

impl ScreenContract for PersonaContract {
    fn screen_key(&self) -> &ScreenKey {
        &self.screen_key
    }

    fn resource(&self) -> &str {
        self.base.resource()
    }

    fn endpoint_for(&self, event: &ScreenEvent, context: &EventContext) -> Option<Endpoint> {
        self.base.endpoint_for(event, context)
    }

    fn permission_for(&self, event: &ScreenEvent) -> Option<Permission> {
        self.base.permission_for(event)
    }

    fn custom_event_handler(&self, event_id: &str) -> Option<CustomEventHandler> {
        self.base.custom_event_handler(event_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashboardPersona {
    Admin,
    Manager,
    Staff,
}

impl DashboardPersona {
    pub const ALL: [DashboardPersona; 3] = [
        DashboardPersona::Admin,
        DashboardPersona::Manager,
        DashboardPersona::Staff,
    ];

    pub fn screen_key(self) -> ScreenKey {
        let key = match self {
            DashboardPersona::Admin => "admin_dashboard",
            DashboardPersona::Manager => "manager_dashboard",
            DashboardPersona::Staff => "staff_dashboard",
        };
        ScreenKey::from(key)
    }
}
