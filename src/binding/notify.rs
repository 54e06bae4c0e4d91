//! Synchronous listener registry

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by `subscribe`, used to unsubscribe
pub type ListenerId = u64;

type Listener<E> = Rc<dyn Fn(&E)>;

/// What a consumer must refresh after a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Change {
    /// Same shape, new contents
    ValueChanged,
    /// Row or column count may differ; re-read headers and cells
    StructureChanged,
}

/// Ordered list of callbacks invoked synchronously on `notify`
///
/// Listeners run in registration order. The registry is not borrowed while
/// they run, so a listener may subscribe, unsubscribe or trigger further
/// notifications; a listener added during a dispatch is first called on the
/// next one.
pub struct Notifier<E> {
    next_id: Cell<ListenerId>,
    listeners: RefCell<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> Notifier<E> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener; `false` if the id was not registered
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn notify(&self, event: &E) {
        let snapshot: Vec<Listener<E>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.len())
            .finish()
    }
}
