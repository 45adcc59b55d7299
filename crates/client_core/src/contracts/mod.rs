//! Per-screen contracts: which endpoint an event calls, which permission it
//! needs, and which custom handlers the screen provides.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use shared::{
    domain::{Permission, ScreenKey},
    protocol::{Endpoint, EventContext, EventResult, ScreenEvent},
};

use crate::{config::Settings, error::ContractError};

mod base;
mod login;
mod persona;

pub use base::BaseScreenContract;
pub use login::{LoginContract, LOGIN_PATH};
pub use persona::{DashboardPersona, PersonaContract};

/// Async `EventContext -> EventResult` supplied by a contract for a custom event.
pub type CustomEventHandler =
    Arc<dyn Fn(EventContext) -> BoxFuture<'static, EventResult> + Send + Sync>;

/// Wraps an async closure as a [`CustomEventHandler`].
pub fn custom_handler<F, Fut>(f: F) -> CustomEventHandler
where
    F: Fn(EventContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = EventResult> + Send + 'static,
{
    Arc::new(move |context| -> BoxFuture<'static, EventResult> { Box::pin(f(context)) })
}

pub trait ScreenContract: Send + Sync {
    fn screen_key(&self) -> &ScreenKey;

    fn resource(&self) -> &str;

    /// Network operation for `event`, or `None` for events without one.
    /// Depends only on the contract's fixed configuration and the event.
    fn endpoint_for(&self, event: &ScreenEvent, context: &EventContext) -> Option<Endpoint>;

    /// Permission the caller must hold before performing `event`; `None` is
    /// public. This only declares the requirement.
    fn permission_for(&self, event: &ScreenEvent) -> Option<Permission>;

    fn custom_event_handler(&self, event_id: &str) -> Option<CustomEventHandler>;
}

/// Contracts keyed by screen. Built once, then shared read-only.
#[derive(Default)]
pub struct ScreenContractRegistry {
    contracts: HashMap<ScreenKey, Arc<dyn ScreenContract>>,
}

impl ScreenContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, contract: Arc<dyn ScreenContract>) -> Result<(), ContractError> {
        let key = contract.screen_key().clone();
        if self.contracts.contains_key(&key) {
            return Err(ContractError::DuplicateScreen(key));
        }
        self.contracts.insert(key, contract);
        Ok(())
    }

    pub fn resolve(
        &self,
        screen_key: &ScreenKey,
    ) -> Result<Arc<dyn ScreenContract>, ContractError> {
        self.contracts
            .get(screen_key)
            .cloned()
            .ok_or_else(|| ContractError::NotFound(screen_key.clone()))
    }

    pub fn contains(&self, screen_key: &ScreenKey) -> bool {
        self.contracts.contains_key(screen_key)
    }

    pub fn screen_keys(&self) -> Vec<&ScreenKey> {
        let mut keys: Vec<&ScreenKey> = self.contracts.keys().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

pub const DASHBOARD_RESOURCE: &str = "dashboard";
pub const DASHBOARD_PATH: &str = "/api/v1/dashboard";

/// Login plus one dashboard contract per persona, all sharing one base.
pub fn default_registry(settings: &Settings) -> Result<ScreenContractRegistry, ContractError> {
    let mut registry = ScreenContractRegistry::new();
    registry.register(Arc::new(LoginContract::new(&settings.iam_prefix)))?;

    let dashboard: Arc<dyn ScreenContract> = Arc::new(
        BaseScreenContract::new(
            "dashboard",
            DASHBOARD_RESOURCE,
            settings.api_prefix.as_str(),
            DASHBOARD_PATH,
        )
        .with_view_permission("view_dashboard")
        .with_edit_permission("edit_dashboard"),
    );
    for persona in DashboardPersona::ALL {
        registry.register(Arc::new(PersonaContract::new(
            persona.screen_key(),
            Arc::clone(&dashboard),
        )))?;
    }
    Ok(registry)
}

#[cfg(test)]
#[path = "../tests/contracts_tests.rs"]
mod tests;
