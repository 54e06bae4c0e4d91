//! Single-writer critical value cell

use super::notify::{ListenerId, Notifier};
use crate::error::{validate_critical_value, Result};
use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

struct CellState {
    value: Cell<f64>,
    pending: RefCell<VecDeque<f64>>,
    dispatching: Cell<bool>,
    listeners: Notifier<f64>,
}

/// Ends the dispatch even if a listener panics
///
/// Values still queued behind a panicking listener are discarded, so a later
/// `set` never commits them.
struct DispatchGuard<'a>(&'a CellState);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.pending.borrow_mut().clear();
        self.0.dispatching.set(false);
    }
}

/// A critical value in [0, 1] with listeners notified on every committed change
///
/// Clones share the same cell. Every successful `set` commits exactly one
/// change and notifies every listener once, in registration order, after
/// the new value is visible through `get`. A `set` issued from inside a
/// listener is queued and committed after the current dispatch finishes, so
/// changes are always delivered in the order they were issued.
#[derive(Clone)]
pub struct CriticalValue {
    inner: Rc<CellState>,
}

impl CriticalValue {
    pub fn new(initial: f64) -> Result<Self> {
        let value = validate_critical_value(initial)?;
        Ok(Self {
            inner: Rc::new(CellState {
                value: Cell::new(value),
                pending: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                listeners: Notifier::new(),
            }),
        })
    }

    /// Latest committed value
    pub fn get(&self) -> f64 {
        self.inner.value.get()
    }

    /// Commit a new value
    ///
    /// Out-of-range values fail with `InvalidParameter` and leave the cell
    /// untouched; no listener runs.
    pub fn set(&self, value: f64) -> Result<()> {
        let value = validate_critical_value(value)?;
        self.inner.pending.borrow_mut().push_back(value);
        if self.inner.dispatching.get() {
            debug!("Critical value {} queued behind active dispatch", value);
            return Ok(());
        }

        self.inner.dispatching.set(true);
        let _guard = DispatchGuard(&self.inner);
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(next) = next else {
                break;
            };
            self.inner.value.set(next);
            self.inner.listeners.notify(&next);
        }
        Ok(())
    }

    pub fn subscribe(&self, listener: impl Fn(&f64) + 'static) -> ListenerId {
        self.inner.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl fmt::Debug for CriticalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriticalValue")
            .field("value", &self.get())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
