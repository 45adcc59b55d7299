//! Turns a UI event into an [`EventResult`], enforcing the contract's
//! permission before anything is dispatched.

use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{PermissionSet, ScreenKey},
    protocol::{EventContext, EventResult, ScreenEvent},
};
use tracing::{debug, info};

use crate::{
    contracts::ScreenContractRegistry,
    error::{ContractError, MediatorError},
    mediator::{Command, CommandHandler, DomainEvent},
};

pub struct ScreenEventProcessor {
    registry: Arc<ScreenContractRegistry>,
}

impl ScreenEventProcessor {
    pub fn new(registry: Arc<ScreenContractRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ScreenContractRegistry> {
        &self.registry
    }

    /// `Ok(None)` means the event has nothing to do on this screen.
    pub async fn process(
        &self,
        screen_key: &ScreenKey,
        event: &ScreenEvent,
        context: EventContext,
        permissions: &PermissionSet,
    ) -> Result<Option<EventResult>, ContractError> {
        let contract = self.registry.resolve(screen_key)?;

        if let Some(permission) = contract.permission_for(event) {
            if !permissions.contains(&permission) {
                info!(
                    screen = %screen_key,
                    event = event.id(),
                    permission = %permission,
                    "screen event denied"
                );
                return Err(ContractError::PermissionDenied {
                    screen_key: screen_key.clone(),
                    event: event.id().to_string(),
                    permission,
                });
            }
        }

        if let ScreenEvent::Custom { id } = event {
            let Some(handler) = contract.custom_event_handler(id) else {
                debug!(screen = %screen_key, event = %id, "no custom handler; nothing to do");
                return Ok(None);
            };
            return Ok(Some(handler(context).await));
        }

        match contract.endpoint_for(event, &context) {
            Some(endpoint) => {
                debug!(screen = %screen_key, event = event.id(), %endpoint, "event resolved");
                Ok(Some(EventResult::submit_to(endpoint, context.field_values)))
            }
            None => {
                debug!(screen = %screen_key, event = event.id(), "no endpoint; nothing to do");
                Ok(None)
            }
        }
    }
}

/// Mediator request wrapping one screen event.
#[derive(Debug, Clone)]
pub struct ProcessScreenEvent {
    pub screen_key: ScreenKey,
    pub event: ScreenEvent,
    pub context: EventContext,
    pub permissions: PermissionSet,
}

impl Command for ProcessScreenEvent {
    type Response = Option<EventResult>;
}

#[async_trait]
impl CommandHandler<ProcessScreenEvent> for ScreenEventProcessor {
    async fn handle(
        &self,
        command: ProcessScreenEvent,
    ) -> Result<Option<EventResult>, MediatorError> {
        let ProcessScreenEvent {
            screen_key,
            event,
            context,
            permissions,
        } = command;
        self.process(&screen_key, &event, context, &permissions)
            .await
            .map_err(|err| match err {
                ContractError::PermissionDenied { .. } => MediatorError::Validation {
                    message: err.to_string(),
                    source: Some(err.into()),
                },
                other => MediatorError::execution_with("screen event could not be resolved", other),
            })
    }
}

/// Published after a screen event produced a result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenEventResolved {
    pub screen_key: ScreenKey,
    pub event_id: String,
    pub result: EventResult,
}

impl DomainEvent for ScreenEventResolved {
    const EVENT_TYPE: &'static str = "screen_event_resolved";
}

#[cfg(test)]
#[path = "tests/processor_tests.rs"]
mod tests;
