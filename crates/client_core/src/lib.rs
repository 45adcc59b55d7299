use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use shared::{
    domain::{PermissionSet, ScreenKey},
    error::ErrorReport,
    protocol::{parse_menu_payload, EventContext, EventResult, ScreenEvent},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

pub mod config;
pub mod contracts;
pub mod error;
pub mod mediator;
pub mod menu;
pub mod menu_store;
pub mod processor;
pub mod state;

pub use config::{load_settings, Settings};
pub use contracts::{default_registry, ScreenContract, ScreenContractRegistry};
pub use error::{ContractError, MediatorError};
pub use mediator::{EventEnvelope, Mediator, PublishReport, SubscriptionId};
pub use menu::filter_menu;
pub use menu_store::{MenuSnapshot, MenuStore, MenuStoreHandle};
pub use processor::{ProcessScreenEvent, ScreenEventProcessor, ScreenEventResolved};
pub use state::{scan, CancellationToken, ScanExt, StateStream, StateSubscription};

/// One handled screen event as a renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenOutcome {
    /// Monotonic per core, so repeated identical events are still delivered.
    pub sequence: u64,
    pub screen_key: ScreenKey,
    pub event_id: String,
    pub result: Result<Option<EventResult>, ErrorReport>,
}

/// Wires contracts, the mediator, the menu store, and the outcome stream
/// together for one signed-in session.
pub struct ClientCore {
    settings: Settings,
    registry: Arc<ScreenContractRegistry>,
    mediator: Arc<Mediator>,
    menu: MenuStoreHandle,
    menu_task: Mutex<Option<JoinHandle<()>>>,
    outcomes: StateStream<ScreenOutcome>,
    next_sequence: AtomicU64,
}

impl ClientCore {
    /// Starts a core over the default contracts. Needs a running tokio runtime.
    pub async fn start(settings: Settings) -> Result<Self> {
        let registry = default_registry(&settings).context("failed to build screen contracts")?;
        Self::with_registry(settings, Arc::new(registry)).await
    }

    pub async fn with_registry(
        settings: Settings,
        registry: Arc<ScreenContractRegistry>,
    ) -> Result<Self> {
        let mediator = Arc::new(Mediator::new());
        mediator
            .register_command_handler::<ProcessScreenEvent, _>(Arc::new(
                ScreenEventProcessor::new(Arc::clone(&registry)),
            ))
            .await
            .context("failed to register screen event processor")?;

        let (menu, menu_task) = MenuStore::spawn(&settings);
        let outcomes = StateStream::new(settings.state_channel_capacity);
        info!(screens = registry.len(), "client core started");

        Ok(Self {
            settings,
            registry,
            mediator,
            menu,
            menu_task: Mutex::new(Some(menu_task)),
            outcomes,
            next_sequence: AtomicU64::new(1),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ScreenContractRegistry> {
        &self.registry
    }

    /// Shared mediator; callers may register their own handlers and
    /// subscribe to [`ScreenEventResolved`].
    pub fn mediator(&self) -> &Arc<Mediator> {
        &self.mediator
    }

    pub fn menu(&self) -> &MenuStoreHandle {
        &self.menu
    }

    /// Parses a menu payload from the backend and makes it the current raw menu.
    pub async fn apply_menu_payload(&self, raw: &str) -> Result<()> {
        let items = parse_menu_payload(raw).context("failed to parse menu payload")?;
        debug!(roots = items.len(), "menu payload parsed");
        self.menu.replace_menu(items).await
    }

    pub async fn set_permissions(&self, permissions: PermissionSet) -> Result<()> {
        self.menu.replace_permissions(permissions).await
    }

    pub fn subscribe_menu(&self) -> StateSubscription<MenuSnapshot> {
        self.menu.subscribe()
    }

    pub fn subscribe_outcomes(&self) -> StateSubscription<ScreenOutcome> {
        self.outcomes.subscribe()
    }

    /// Runs `event` for `screen_key` with the permissions currently held by
    /// the menu store. Every dispatched event, failed or not, is pushed to
    /// the outcome stream; produced results are also published as
    /// [`ScreenEventResolved`].
    pub async fn handle_screen_event(
        &self,
        screen_key: ScreenKey,
        event: ScreenEvent,
        context: EventContext,
    ) -> Result<Option<EventResult>, MediatorError> {
        let permissions = self
            .menu
            .snapshot()
            .await
            .map_err(|err| MediatorError::execution_with("menu store unavailable", err))?
            .permissions;
        let event_id = event.id().to_string();

        let outcome = self
            .mediator
            .send(ProcessScreenEvent {
                screen_key: screen_key.clone(),
                event,
                context,
                permissions,
            })
            .await;

        match &outcome {
            Ok(Some(result)) => {
                let report = self
                    .mediator
                    .publish(ScreenEventResolved {
                        screen_key: screen_key.clone(),
                        event_id: event_id.clone(),
                        result: result.clone(),
                    })
                    .await;
                debug!(
                    screen = %screen_key,
                    event = %event_id,
                    delivered = report.delivered,
                    failed = report.failed,
                    "screen event resolved"
                );
            }
            Ok(None) => {
                debug!(screen = %screen_key, event = %event_id, "screen event had no effect");
            }
            Err(err) => {
                warn!(screen = %screen_key, event = %event_id, "screen event failed: {err}");
            }
        }

        self.outcomes.publish(ScreenOutcome {
            sequence: self.next_sequence.fetch_add(1, Ordering::Relaxed),
            screen_key,
            event_id,
            result: outcome.as_ref().cloned().map_err(ErrorReport::from),
        });
        outcome
    }

    /// Stops the menu store and ends every menu and outcome subscriber.
    pub async fn shutdown(&self) -> Result<()> {
        self.outcomes.close();
        let task = self
            .menu_task
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("client core already shut down"))?;
        self.menu.shutdown(task).await?;
        info!("client core stopped");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
