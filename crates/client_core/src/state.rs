//! Observable state delivery: broadcast streams, cancellation, and `scan`.

use std::{
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    task::{Context, Poll},
};

use futures::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::warn;

/// Values that may flow through the state layer.
pub trait AsyncState: Clone + PartialEq + Send + Sync + 'static {}

impl<T> AsyncState for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Cooperative cancellation shared by every clone.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Every clone owns the sender, so this only happens mid-teardown.
                futures::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-producer state broadcast. Consumers see values published after
/// they subscribe; nothing is replayed.
pub struct StateStream<T: AsyncState> {
    inner: Mutex<StreamInner<T>>,
}

struct StreamInner<T> {
    sender: Option<broadcast::Sender<T>>,
    last: Option<T>,
}

impl<T: AsyncState> StateStream<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(StreamInner {
                sender: Some(sender),
                last: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamInner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes `value` unless it equals the previous one or the stream is
    /// closed. Returns whether it was sent.
    pub fn publish(&self, value: T) -> bool {
        let mut inner = self.lock();
        let Some(sender) = inner.sender.clone() else {
            return false;
        };
        if inner.last.as_ref() == Some(&value) {
            return false;
        }
        inner.last = Some(value.clone());
        // No receivers is fine; the value is still recorded as current.
        let _ = sender.send(value);
        true
    }

    pub fn current(&self) -> Option<T> {
        self.lock().last.clone()
    }

    pub fn subscribe(&self) -> StateSubscription<T> {
        let receiver = match &self.lock().sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        };
        StateSubscription {
            receiver,
            cancel: None,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .sender
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drops the producer side; every attached consumer then ends.
    pub fn close(&self) {
        self.lock().sender = None;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().sender.is_none()
    }
}

pub struct StateSubscription<T: AsyncState> {
    receiver: broadcast::Receiver<T>,
    cancel: Option<CancellationToken>,
}

impl<T: AsyncState> StateSubscription<T> {
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Next value, or `None` once the producer closed or the token fired.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return None;
            }
            let received = match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return None,
                    received = self.receiver.recv() => received,
                },
                None => self.receiver.recv().await,
            };
            match received {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "state consumer lagged; skipping to newest values");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> BoxStream<'static, T> {
        let values = BroadcastStream::new(self.receiver).filter_map(|item| async move {
            match item {
                Ok(value) => Some(value),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "state stream lagged; skipping to newest values");
                    None
                }
            }
        });
        match self.cancel {
            Some(token) => values
                .take_until(async move { token.cancelled().await })
                .boxed(),
            None => values.boxed(),
        }
    }
}

struct ScanState<T, A, F> {
    source: BoxStream<'static, T>,
    accumulated: A,
    combine: F,
    token: CancellationToken,
}

/// Running fold over a source stream. Each item is the accumulated value
/// after combining one more source item. Not replayable.
pub struct Scan<A> {
    inner: stream::Fuse<BoxStream<'static, A>>,
}

impl<A> Stream for Scan<A> {
    type Item = A;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<A>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Builds a [`Scan`]. The token is checked before pulling from `source` and
/// again after an item arrives; once cancelled the source is dropped and
/// never polled again.
pub fn scan<S, A, F>(source: S, initial: A, token: CancellationToken, combine: F) -> Scan<A>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
    A: Clone + Send + 'static,
    F: FnMut(A, S::Item) -> A + Send + 'static,
{
    let state = ScanState {
        source: source.boxed(),
        accumulated: initial,
        combine,
        token,
    };

    let inner = stream::unfold(state, |mut state| async move {
        if state.token.is_cancelled() {
            return None;
        }
        let next = tokio::select! {
            biased;
            _ = state.token.cancelled() => None,
            next = state.source.next() => next,
        };
        let Some(item) = next else {
            return None;
        };
        if state.token.is_cancelled() {
            return None;
        }
        let accumulated = (state.combine)(state.accumulated.clone(), item);
        state.accumulated = accumulated.clone();
        Some((accumulated, state))
    })
    .boxed()
    .fuse();

    Scan { inner }
}

pub trait ScanExt: Stream + Sized + Send + 'static
where
    Self::Item: Send + 'static,
{
    fn scan_states<A, F>(self, initial: A, token: CancellationToken, combine: F) -> Scan<A>
    where
        A: Clone + Send + 'static,
        F: FnMut(A, Self::Item) -> A + Send + 'static,
    {
        scan(self, initial, token, combine)
    }
}

impl<S> ScanExt for S
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
