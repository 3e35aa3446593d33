// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed event channels with scoped listener registration.
//!
//! Each event kind gets its own [`EventChannel`]. Subscribing returns a
//! [`Subscription`] guard; the listener stays registered exactly as long as
//! the guard lives. Emission runs listeners in registration order on the
//! caller's task, isolating failures so one misbehaving listener cannot stop
//! the others.

use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

type Listener<T> = Arc<dyn Fn(&T) -> anyhow::Result<()> + Send + Sync>;

struct ListenerSet<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A typed notification channel.
///
/// Cloning yields another handle to the same listener set.
pub struct EventChannel<T> {
    name: &'static str,
    inner: Arc<Mutex<ListenerSet<T>>>,
}

impl<T> Clone for EventChannel<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> EventChannel<T> {
    /// Create a channel. `name` only appears in log output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(ListenerSet {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Channel name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener. It is removed when the returned guard is dropped.
    #[must_use = "dropping the subscription immediately unregisters the listener"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = {
            let mut set = self.inner.lock();
            let id = set.next_id;
            set.next_id += 1;
            set.listeners.push((id, Arc::new(listener)));
            id
        };

        let weak: Weak<Mutex<ListenerSet<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            channel: self.name,
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Deliver `event` to every listener registered at the time of the call.
    ///
    /// Returns how many listeners failed (returned an error or panicked).
    pub fn emit(&self, event: &T) -> usize {
        // Snapshot so listeners may (un)subscribe or emit re-entrantly.
        let snapshot: Vec<Listener<T>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut failures = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    tracing::warn!(channel = self.name, error = %e, "Event listener failed");
                }
                Err(_) => {
                    failures += 1;
                    tracing::error!(channel = self.name, "Event listener panicked");
                }
            }
        }
        failures
    }
}

/// Registration guard returned by [`EventChannel::subscribe`].
pub struct Subscription {
    channel: &'static str,
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Name of the channel this subscription belongs to.
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// Unregister now instead of at drop time.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("active", &self.remove.is_some())
            .finish()
    }
}
