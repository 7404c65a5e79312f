//! Delivery of results to registered observers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::WorkerPool;

/// Observer callback invoked for each delivered event.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

#[derive(Clone)]
enum Observer<E> {
    Callback(Callback<E>),
    Channel(mpsc::UnboundedSender<E>),
}

impl<E> Observer<E> {
    fn is_closed(&self) -> bool {
        match self {
            Self::Callback(_) => false,
            Self::Channel(tx) => tx.is_closed(),
        }
    }
}

type Observers<E> = Arc<Mutex<Vec<Observer<E>>>>;

/// Single-task delivery context.
///
/// Events are published without blocking and handed to every observer, in
/// publication order, from one dispatcher task. Observers therefore never
/// run concurrently with each other and need no locking of their own.
///
/// Two kinds of observer are supported: plain callbacks, and channels for
/// callers that drain results from their own event loop.
pub struct Notifier<E> {
    tx: mpsc::UnboundedSender<E>,
    observers: Observers<E>,
}

impl<E> Clone for Notifier<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            observers: self.observers.clone(),
        }
    }
}

impl<E> std::fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &lock(&self.observers).len())
            .finish()
    }
}

impl<E: Clone + Send + 'static> Notifier<E> {
    /// Create a notifier whose dispatcher runs on the pool's runtime.
    pub fn new(pool: &WorkerPool) -> Self {
        Self::with_gate(pool, |_| true)
    }

    /// Create a notifier that only delivers events accepted by `gate`.
    ///
    /// The gate is evaluated by the dispatcher immediately before delivery,
    /// so it sees the latest state of whatever it inspects.
    pub fn with_gate<G>(pool: &WorkerPool, gate: G) -> Self
    where
        G: Fn(&E) -> bool + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<E>();
        let observers: Observers<E> = Arc::new(Mutex::new(Vec::new()));
        let dispatch = observers.clone();

        pool.spawn(async move {
            while let Some(event) = rx.recv().await {
                if !gate(&event) {
                    tracing::trace!("dropping gated event");
                    continue;
                }
                deliver(&dispatch, event);
            }
        });

        Self { tx, observers }
    }

    /// Register a callback observer.
    pub fn on_event<F>(&self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        lock(&self.observers).push(Observer::Callback(Arc::new(callback)));
    }

    /// Register a channel observer and return its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.observers).push(Observer::Channel(tx));
        rx
    }

    /// Queue an event for delivery.
    pub fn publish(&self, event: E) {
        if self.tx.send(event).is_err() {
            tracing::warn!("notifier dispatcher has stopped; event dropped");
        }
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        let mut observers = lock(&self.observers);
        observers.retain(|o| !o.is_closed());
        observers.len()
    }
}

fn deliver<E: Clone>(observers: &Observers<E>, event: E) {
    let snapshot = {
        let mut guard = lock(observers);
        guard.retain(|o| !o.is_closed());
        guard.clone()
    };

    for observer in snapshot {
        match observer {
            Observer::Callback(callback) => {
                if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                    tracing::error!("observer callback panicked");
                }
            }
            Observer::Channel(tx) => {
                let _ = tx.send(event.clone());
            }
        }
    }
}

fn lock<E>(observers: &Observers<E>) -> MutexGuard<'_, Vec<Observer<E>>> {
    observers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_channel_observer_receives_in_order() {
        let pool = WorkerPool::new(1).unwrap();
        let notifier = Notifier::new(&pool);
        let mut rx = notifier.subscribe();

        for i in 0..5u32 {
            notifier.publish(i);
        }

        for expected in 0..5u32 {
            assert_eq!(rx.recv().await, Some(expected));
        }
    }

    #[tokio::test]
    async fn test_callback_and_gate() {
        let pool = WorkerPool::new(1).unwrap();
        let notifier = Notifier::with_gate(&pool, |n: &u32| n % 2 == 0);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        notifier.on_event(move |_| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        });
        let mut rx = notifier.subscribe();

        for i in 0..6u32 {
            notifier.publish(i);
        }

        assert_eq!(rx.recv().await, Some(0));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(4));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stop_delivery() {
        let pool = WorkerPool::new(1).unwrap();
        let notifier = Notifier::new(&pool);
        notifier.on_event(|_: &u32| panic!("observer bug"));
        let mut rx = notifier.subscribe();

        notifier.publish(1);
        notifier.publish(2);

        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let pool = WorkerPool::new(1).unwrap();
        let notifier: Notifier<u32> = Notifier::new(&pool);
        let rx = notifier.subscribe();
        assert_eq!(notifier.observer_count(), 1);
        drop(rx);
        assert_eq!(notifier.observer_count(), 0);
    }
}
