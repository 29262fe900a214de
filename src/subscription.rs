// src/subscription.rs - Disposable subscriptions and handler lists

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A single release callback. Runs at most once, either through
/// [`Subscription::dispose`] or when the handle is dropped.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that owns nothing.
    pub fn empty() -> Self {
        Self { release: None }
    }

    pub fn dispose(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Ordered collection of subscriptions released together.
#[derive(Debug, Default)]
pub struct CompositeSubscription {
    subscriptions: Vec<Subscription>,
}

impl CompositeSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Releases every held subscription in insertion order, then clears the
    /// list. The composite can be reused afterwards.
    pub fn dispose(&mut self) {
        let subscriptions = std::mem::take(&mut self.subscriptions);
        for mut subscription in subscriptions {
            subscription.dispose();
        }
    }
}

impl Drop for CompositeSubscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct Slots<F: ?Sized> {
    next_id: u64,
    handlers: Vec<(u64, Rc<RefCell<Box<F>>>)>,
}

/// A list of handlers of type `F` (usually `dyn FnMut(..)`).
///
/// Cloning an emitter shares the same handler list.
pub struct Emitter<F: ?Sized> {
    slots: Rc<RefCell<Slots<F>>>,
}

impl<F: ?Sized> Clone for Emitter<F> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<F: ?Sized + 'static> Default for Emitter<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized + 'static> Emitter<F> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, handler: Box<F>) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.handlers.push((id, Rc::new(RefCell::new(handler))));
            id
        };

        let slots: Weak<RefCell<Slots<F>>> = Rc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                // The handler is dropped after the borrow ends; its captures
                // may release subscriptions on this same emitter.
                let removed = {
                    let mut slots = slots.borrow_mut();
                    let index = slots
                        .handlers
                        .iter()
                        .position(|(handler_id, _)| *handler_id == id);
                    index.map(|index| slots.handlers.remove(index))
                };
                drop(removed);
            }
        })
    }

    /// Calls `call` with each handler in subscription order. Handlers
    /// released by an earlier handler during the same emission are skipped.
    pub fn emit(&self, mut call: impl FnMut(&mut F)) {
        let snapshot: Vec<(u64, Rc<RefCell<Box<F>>>)> = self
            .slots
            .borrow()
            .handlers
            .iter()
            .map(|(id, handler)| (*id, Rc::clone(handler)))
            .collect();

        for (id, handler) in snapshot {
            if !self.contains(id) {
                continue;
            }
            // A handler re-entering its own emitter is skipped rather than
            // borrowed twice.
            if let Ok(mut handler) = handler.try_borrow_mut() {
                call(&mut **handler);
            }
        }
    }

    fn contains(&self, id: u64) -> bool {
        self.slots
            .borrow()
            .handlers
            .iter()
            .any(|(handler_id, _)| *handler_id == id)
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every handler without running anything.
    pub fn clear(&self) {
        let handlers = std::mem::take(&mut self.slots.borrow_mut().handlers);
        drop(handlers);
    }
}
