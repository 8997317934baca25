use std::sync::Arc;

use tokio::sync::watch;

/// A one-shot broadcast cell.
///
/// A `Relay` accepts a single value through [`Relay::publish`] and then hands a
/// clone of that same value to every [`Subscription`], no matter when it was
/// created or how many times it is read. Reads before publication wait; reads
/// after publication return immediately.
///
/// Cloning a `Relay` gives another producer handle to the same cell, so any
/// holder may publish, but only the first publication is kept.
pub struct Relay<T> {
    sender: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> Default for Relay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Relay<T> {
    /// Create an empty relay. Subscriptions wait until a value is published.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Store `value` if nothing was published yet. Returns false, dropping
    /// `value`, when the relay already holds one.
    pub fn publish(&self, value: T) -> bool {
        let mut value = Some(value);
        self.sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = value.take();
            true
        })
    }

    /// Open an independent read handle on the relay.
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct Subscription<T> {
    receiver: watch::Receiver<Option<T>>,
}

impl<T: Clone> Subscription<T> {
    /// Wait for the published value and return a clone of it.
    ///
    /// Resolves to `None` only if every `Relay` handle was dropped without
    /// publishing anything.
    pub async fn recv(&mut self) -> Option<T> {
        let published = self.receiver.wait_for(Option::is_some).await.ok()?;
        (*published).clone()
    }
}
