/*!
 * Event Publisher
 * Synchronous callback registration and delivery for one event type
 */

use parking_lot::RwLock;

type Listener<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A typed publish point
///
/// Listeners run synchronously, in registration order, on the thread
/// that publishes. A listener must not subscribe to the same publisher
/// from inside its callback.
pub struct Publisher<T> {
    listeners: RwLock<Vec<Listener<T>>>,
}

impl<T> Publisher<T> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Attach a listener
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    /// Deliver `event` to every listener in registration order
    pub fn publish(&self, event: &T) {
        for listener in self.listeners.read().iter() {
            listener(event);
        }
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}
