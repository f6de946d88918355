//! Observer lists
//!
//! Handlers are invoked in registration order. Once a handler marks the
//! event handled, later handlers are skipped.

/// Events that carry a mutable "handled" flag
pub trait Handled {
    fn handled(&self) -> bool;
}

/// Identifies a registered handler so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// An ordered list of event handlers
pub struct EventHandlers<E> {
    handlers: Vec<(HandlerId, Box<dyn FnMut(&mut E)>)>,
    next_id: u64,
}

impl<E> EventHandlers<E> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register a handler at the end of the list
    pub fn subscribe(&mut self, handler: impl FnMut(&mut E) + 'static) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E: Handled> EventHandlers<E> {
    /// Invoke handlers in order until one marks the event handled
    pub fn raise(&mut self, event: &mut E) {
        for (_, handler) in &mut self.handlers {
            if event.handled() {
                break;
            }
            handler(event);
        }
    }
}

impl<E> Default for EventHandlers<E> {
    fn default() -> Self {
        Self::new()
    }
}
