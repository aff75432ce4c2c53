//! Event dispatcher for tether.
//!
//! This module provides the [`EventDispatcher`], an in-process publish/subscribe
//! bus keyed by [`EventKind`]. It decouples the transport client's callback
//! shapes from the event names application code subscribes to.
//!
//! # Dispatch rules
//!
//! 1. Subscriptions are appended; the same callback may be registered twice
//! 2. [`publish`](EventDispatcher::publish) runs synchronously, in registration order
//! 3. Only subscribers of the published kind are invoked
//! 4. The first failing subscriber stops the publish and its error is returned
//!
//! ```rust,ignore
//! use serde_json::json;
//! use tether_core::{Event, EventDispatcher};
//!
//! let dispatcher = EventDispatcher::new();
//! dispatcher.on("MESSAGE", |event, args| {
//!     println!("{:?} with {:?}", event, args);
//!     Ok(())
//! }, vec![json!("extra")])?;
//! ```
//!
//! There is no cycle detection: a subscriber that publishes the kind it is
//! subscribed to will recurse.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{Level, span, trace};

use crate::error::{DispatchError, DispatchResult};
use crate::event::{Event, EventKind};

/// An extra argument bound at subscription time and appended after the payload.
pub type BoundArg = Value;

/// A subscriber callback.
pub type Callback = Arc<dyn Fn(&Event, &[BoundArg]) -> anyhow::Result<()> + Send + Sync>;

/// A registered subscriber.
#[derive(Clone)]
pub struct Subscription {
    kind: EventKind,
    callback: Callback,
    bound_args: Arc<[BoundArg]>,
}

impl Subscription {
    /// The kind this subscription listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Arguments passed after the payload on every invocation.
    pub fn bound_args(&self) -> &[BoundArg] {
        &self.bound_args
    }

    fn invoke(&self, event: &Event) -> anyhow::Result<()> {
        (self.callback)(event, &self.bound_args)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("bound_args", &self.bound_args)
            .finish()
    }
}

/// The in-process event bus.
///
/// `EventDispatcher` is `Send + Sync`; share it behind an `Arc`.
#[derive(Default)]
pub struct EventDispatcher {
    subscriptions: RwLock<[Vec<Subscription>; EventKind::ALL.len()]>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback` to `kind`.
    ///
    /// `bound_args` are handed to the callback after the event on every call.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F, bound_args: Vec<BoundArg>)
    where
        F: Fn(&Event, &[BoundArg]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let subscription = Subscription {
            kind,
            callback: Arc::new(callback),
            bound_args: bound_args.into(),
        };

        let mut table = self.subscriptions.write();
        table[kind.index()].push(subscription);
        trace!(kind = %kind, total = table[kind.index()].len(), "Subscriber added");
    }

    /// Subscribes by event name (`"READY"`, `"MESSAGE"`, ...).
    ///
    /// Fails with [`DispatchError::InvalidEventKind`] for names outside the
    /// closed set; nothing is registered in that case.
    pub fn on<F>(&self, name: &str, callback: F, bound_args: Vec<BoundArg>) -> DispatchResult<()>
    where
        F: Fn(&Event, &[BoundArg]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let kind = name.parse::<EventKind>()?;
        self.subscribe(kind, callback, bound_args);
        Ok(())
    }

    /// Returns the number of subscribers for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions.read()[kind.index()].len()
    }

    /// Publishes `event` to every subscriber of its kind.
    ///
    /// Subscribers run on the caller's thread in registration order. The
    /// subscriber list is snapshotted first, so callbacks may subscribe
    /// further callbacks; those only see later publishes.
    ///
    /// # Returns
    ///
    /// The number of subscribers invoked, or the first subscriber error.
    pub fn publish(&self, event: &Event) -> DispatchResult<usize> {
        let kind = event.kind();
        let span = span!(Level::TRACE, "publish", kind = %kind);
        let _enter = span.enter();

        let snapshot = self.subscriptions.read()[kind.index()].clone();

        for (position, subscription) in snapshot.iter().enumerate() {
            subscription
                .invoke(event)
                .map_err(|source| DispatchError::CallbackFailed {
                    kind,
                    position,
                    source,
                })?;
        }

        trace!(invoked = snapshot.len(), "Event published");
        Ok(snapshot.len())
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.subscriptions.read();
        let mut debug = f.debug_struct("EventDispatcher");
        for kind in EventKind::ALL {
            debug.field(kind.as_str(), &table[kind.index()].len());
        }
        debug.finish()
    }
}
