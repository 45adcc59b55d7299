//! Command/query dispatch and domain-event fan-out.

use std::{
    any::{type_name, Any, TypeId},
    collections::{hash_map::Entry, BTreeMap, HashMap},
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{future::join_all, FutureExt};
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::MediatorError;

pub trait Command: Send + 'static {
    type Response: Send + 'static;
}

/// Read-only request. Side-effect freedom is a convention, not enforced.
pub trait Query: Send + 'static {
    type Response: Send + 'static;
}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    async fn handle(&self, command: C) -> Result<C::Response, MediatorError>;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync + 'static {
    async fn handle(&self, query: Q) -> Result<Q::Response, MediatorError>;
}

pub trait DomainEvent: fmt::Debug + Send + Sync + 'static {
    const EVENT_TYPE: &'static str;
}

/// Type-erased domain event with the fields every subscriber can rely on.
#[derive(Clone)]
pub struct EventEnvelope {
    event_id: Uuid,
    occurred_at: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
    event_type: String,
    payload: Arc<dyn Any + Send + Sync>,
}

impl EventEnvelope {
    pub fn new<E: DomainEvent>(event: E) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            metadata: BTreeMap::new(),
            event_type: E::EVENT_TYPE.to_string(),
            payload: Arc::new(event),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The original event, or `None` if it is not an `E`.
    pub fn downcast_ref<E: DomainEvent>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }
}

impl fmt::Debug for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("event_id", &self.event_id)
            .field("occurred_at", &self.occurred_at)
            .field("event_type", &self.event_type)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait EventSubscriber: Send + Sync + 'static {
    async fn on_event(&self, event: EventEnvelope) -> Result<(), MediatorError>;
}

struct FnSubscriber<F>(F);

#[async_trait]
impl<F, Fut> EventSubscriber for FnSubscriber<F>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MediatorError>> + Send + 'static,
{
    async fn on_event(&self, event: EventEnvelope) -> Result<(), MediatorError> {
        (self.0)(event).await
    }
}

pub fn subscriber_fn<F, Fut>(f: F) -> Arc<dyn EventSubscriber>
where
    F: Fn(EventEnvelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MediatorError>> + Send + 'static,
{
    Arc::new(FnSubscriber(f))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

struct HandlerSlot {
    type_name: &'static str,
    // Holds an `Arc<dyn CommandHandler<C>>` or `Arc<dyn QueryHandler<Q>>`.
    handler: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
struct HandlerRegistry {
    commands: HashMap<TypeId, HandlerSlot>,
    queries: HashMap<TypeId, HandlerSlot>,
}

struct SubscriberEntry {
    id: SubscriptionId,
    subscriber: Arc<dyn EventSubscriber>,
}

pub struct Mediator {
    registry: RwLock<HandlerRegistry>,
    subscribers: RwLock<HashMap<String, Vec<SubscriberEntry>>>,
    next_subscription: AtomicU64,
}

impl Default for Mediator {
    fn default() -> Self {
        Self::new()
    }
}

impl Mediator {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HandlerRegistry::default()),
            subscribers: RwLock::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Registers the single handler for `C`. A second registration fails and
    /// leaves the first in place.
    pub async fn register_command_handler<C, H>(
        &self,
        handler: Arc<H>,
    ) -> Result<(), MediatorError>
    where
        C: Command,
        H: CommandHandler<C>,
    {
        let handler: Arc<dyn CommandHandler<C>> = handler;
        let mut registry = self.registry.write().await;
        insert_slot(
            &mut registry.commands,
            TypeId::of::<C>(),
            type_name::<C>(),
            "command",
            handler,
        )
    }

    pub async fn register_query_handler<Q, H>(&self, handler: Arc<H>) -> Result<(), MediatorError>
    where
        Q: Query,
        H: QueryHandler<Q>,
    {
        let handler: Arc<dyn QueryHandler<Q>> = handler;
        let mut registry = self.registry.write().await;
        insert_slot(
            &mut registry.queries,
            TypeId::of::<Q>(),
            type_name::<Q>(),
            "query",
            handler,
        )
    }

    pub async fn has_command_handler<C: Command>(&self) -> bool {
        self.registry
            .read()
            .await
            .commands
            .contains_key(&TypeId::of::<C>())
    }

    pub async fn has_query_handler<Q: Query>(&self) -> bool {
        self.registry
            .read()
            .await
            .queries
            .contains_key(&TypeId::of::<Q>())
    }

    pub async fn send<C: Command>(&self, command: C) -> Result<C::Response, MediatorError> {
        let handler = {
            let registry = self.registry.read().await;
            registry
                .commands
                .get(&TypeId::of::<C>())
                .and_then(|slot| slot.handler.downcast_ref::<Arc<dyn CommandHandler<C>>>())
                .cloned()
        };
        let Some(handler) = handler else {
            error!(command = type_name::<C>(), "no command handler registered");
            return Err(MediatorError::handler_not_found::<C>());
        };

        debug!(command = type_name::<C>(), "dispatching command");
        handler.handle(command).await
    }

    pub async fn query<Q: Query>(&self, query: Q) -> Result<Q::Response, MediatorError> {
        let handler = {
            let registry = self.registry.read().await;
            registry
                .queries
                .get(&TypeId::of::<Q>())
                .and_then(|slot| slot.handler.downcast_ref::<Arc<dyn QueryHandler<Q>>>())
                .cloned()
        };
        let Some(handler) = handler else {
            error!(query = type_name::<Q>(), "no query handler registered");
            return Err(MediatorError::handler_not_found::<Q>());
        };

        debug!(query = type_name::<Q>(), "dispatching query");
        handler.handle(query).await
    }

    pub async fn subscribe<E: DomainEvent>(
        &self,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> SubscriptionId {
        self.subscribe_to_type(E::EVENT_TYPE, subscriber).await
    }

    pub async fn subscribe_to_type(
        &self,
        event_type: impl Into<String>,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let event_type = event_type.into();
        debug!(event_type = %event_type, subscription = id.0, "subscriber attached");
        self.subscribers
            .write()
            .await
            .entry(event_type)
            .or_default()
            .push(SubscriberEntry { id, subscriber });
        id
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let mut removed = false;
        subscribers.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            removed |= entries.len() != before;
            !entries.is_empty()
        });
        removed
    }

    pub async fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(event_type)
            .map_or(0, Vec::len)
    }

    pub async fn publish<E: DomainEvent>(&self, event: E) -> PublishReport {
        self.publish_envelope(EventEnvelope::new(event)).await
    }

    /// Delivers `envelope` to every subscriber of its type concurrently and
    /// waits for all of them. Failures and panics are logged and counted;
    /// they never reach the publisher or other subscribers.
    pub async fn publish_envelope(&self, envelope: EventEnvelope) -> PublishReport {
        let targets: Vec<Arc<dyn EventSubscriber>> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .get(envelope.event_type())
                .map(|entries| {
                    entries
                        .iter()
                        .map(|entry| Arc::clone(&entry.subscriber))
                        .collect()
                })
                .unwrap_or_default()
        };

        if targets.is_empty() {
            debug!(event_type = envelope.event_type(), "no subscribers for event");
            return PublishReport::default();
        }

        let deliveries = targets.into_iter().map(|subscriber| {
            let event = envelope.clone();
            async move { AssertUnwindSafe(subscriber.on_event(event)).catch_unwind().await }
        });

        let mut report = PublishReport::default();
        for outcome in join_all(deliveries).await {
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    warn!(
                        event_type = envelope.event_type(),
                        event_id = %envelope.event_id(),
                        "event subscriber failed: {err}"
                    );
                    report.failed += 1;
                }
                Err(_) => {
                    error!(
                        event_type = envelope.event_type(),
                        event_id = %envelope.event_id(),
                        "event subscriber panicked"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}

fn insert_slot<T: Send + Sync + 'static>(
    slots: &mut HashMap<TypeId, HandlerSlot>,
    type_id: TypeId,
    type_name: &'static str,
    kind: &str,
    handler: T,
) -> Result<(), MediatorError> {
    match slots.entry(type_id) {
        Entry::Occupied(existing) => {
            error!(kind, request = type_name, "duplicate handler registration rejected");
            Err(MediatorError::registration(format!(
                "a {kind} handler for {} is already registered",
                existing.get().type_name
            )))
        }
        Entry::Vacant(slot) => {
            slot.insert(HandlerSlot {
                type_name,
                handler: Box::new(handler),
            });
            debug!(kind, request = type_name, "handler registered");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "tests/mediator_tests.rs"]
mod tests;
