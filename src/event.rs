//! In-process publish/subscribe.
//!
//! Subscribers are plain [`mpsc::Sender`]s registered for named events;
//! [`EventSystem::emit`] delivers a [`Payload`] to each of them in
//! subscription order, waiting at most the configured timeout per subscriber.
//!
//! ```rust
//! use tokio::sync::mpsc;
//! use tsuki::event::EventSystem;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let events = EventSystem::new();
//! let (tx, mut rx) = mpsc::channel(8);
//! events.subscribe(&tx, &["user.created"]);
//!
//! events.emit("user.created", 42_u64).await.unwrap();
//! assert_eq!(rx.recv().await.unwrap().data, 42);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// What a subscriber receives.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload<T> {
    pub event: String,
    pub data: T,
}

pub type Subscriber<T> = mpsc::Sender<Payload<T>>;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum EmitError {
    #[error("event `{0}` timed out waiting for a subscriber")]
    Timeout(String),

    #[error("subscriber of event `{0}` is closed")]
    Closed(String),
}

/// Registry of subscribers by event name.
#[derive(Debug)]
pub struct EventSystem<T> {
    timeout: Duration,
    subscribers: RwLock<HashMap<String, Vec<Subscriber<T>>>>,
}

impl<T> Default for EventSystem<T> {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl<T> EventSystem<T> {
    /// An event system with a 5 second emit timeout.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout, subscribers: RwLock::new(HashMap::new()) }
    }

    /// Adds `subscriber` to each of `events`.
    pub fn subscribe(&self, subscriber: &Subscriber<T>, events: &[&str]) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        for event in events {
            subscribers.entry((*event).to_owned()).or_default().push(subscriber.clone());
        }
        debug!(?events, "subscribed");
    }

    /// Removes every registration of `subscriber` from `events`.
    pub fn unsubscribe(&self, subscriber: &Subscriber<T>, events: &[&str]) {
        let mut subscribers = self.subscribers.write().unwrap_or_else(PoisonError::into_inner);
        for event in events {
            if let Some(list) = subscribers.get_mut(*event) {
                list.retain(|sub| !sub.same_channel(subscriber));
            }
        }
        debug!(?events, "unsubscribed");
    }

    /// Whether `subscriber` listens to any of `events`.
    pub fn is_subscribed(&self, subscriber: &Subscriber<T>, events: &[&str]) -> bool {
        let subscribers = self.subscribers.read().unwrap_or_else(PoisonError::into_inner);
        events.iter().any(|event| {
            subscribers
                .get(*event)
                .is_some_and(|list| list.iter().any(|sub| sub.same_channel(subscriber)))
        })
    }
}

impl<T: Clone + Send> EventSystem<T> {
    /// Delivers `data` to every subscriber of `event`.
    ///
    /// Stops at the first subscriber that is closed, or that does not make
    /// room within the timeout.
    pub async fn emit(&self, event: &str, data: T) -> Result<(), EmitError> {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();

        for subscriber in &subscribers {
            let payload = Payload { event: event.to_owned(), data: data.clone() };
            match tokio::time::timeout(self.timeout, subscriber.send(payload)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(EmitError::Closed(event.to_owned())),
                Err(_) => return Err(EmitError::Timeout(event.to_owned())),
            }
        }

        debug!(event, subscribers = subscribers.len(), "event emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let events = EventSystem::new();
        let (a, mut a_rx) = mpsc::channel(1);
        let (b, mut b_rx) = mpsc::channel(1);
        events.subscribe(&a, &["ping"]);
        events.subscribe(&b, &["ping", "pong"]);

        events.emit("ping", "hi").await.unwrap();

        assert_eq!(a_rx.recv().await.unwrap(), Payload { event: "ping".into(), data: "hi" });
        assert_eq!(b_rx.recv().await.unwrap().data, "hi");
    }

    #[tokio::test]
    async fn unknown_events_are_a_no_op() {
        let events: EventSystem<u8> = EventSystem::new();
        events.emit("nobody", 1).await.unwrap();
    }

    #[test]
    fn subscription_bookkeeping() {
        let events: EventSystem<u8> = EventSystem::new();
        let (tx, _rx) = mpsc::channel(1);
        let (other, _other_rx) = mpsc::channel(1);

        events.subscribe(&tx, &["a", "b"]);
        assert!(events.is_subscribed(&tx, &["a"]));
        assert!(events.is_subscribed(&tx.clone(), &["b"]));
        assert!(!events.is_subscribed(&other, &["a", "b"]));

        events.unsubscribe(&tx, &["a"]);
        assert!(!events.is_subscribed(&tx, &["a"]));
        assert!(events.is_subscribed(&tx, &["a", "b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn full_subscriber_times_out() {
        let events = EventSystem::with_timeout(Duration::from_millis(50));
        let (tx, _rx) = mpsc::channel(1);
        events.subscribe(&tx, &["tick"]);

        events.emit("tick", 1).await.unwrap();
        assert_eq!(events.emit("tick", 2).await, Err(EmitError::Timeout("tick".into())));
    }

    #[tokio::test]
    async fn closed_subscriber_is_reported() {
        let events = EventSystem::new();
        let (tx, rx) = mpsc::channel(1);
        events.subscribe(&tx, &["tick"]);
        drop(rx);

        assert_eq!(events.emit("tick", 1).await, Err(EmitError::Closed("tick".into())));
    }
}
