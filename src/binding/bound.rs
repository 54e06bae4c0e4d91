//! Threshold-bound test results

use super::critical::CriticalValue;
use super::notify::{ListenerId, Notifier};
use crate::diagnostics::{CorrelationTestResult, TestRequest};
use crate::error::Result;
use crate::triangle::Triangle;
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct BindingState {
    triangle: RefCell<Rc<Triangle>>,
    request: TestRequest,
    result: RefCell<Rc<CorrelationTestResult>>,
    recomputations: Cell<u64>,
    changes: Notifier<Rc<CorrelationTestResult>>,
}

impl BindingState {
    /// Evaluate and swap in the new result, then notify
    ///
    /// The previous result stays in place when evaluation fails.
    fn recompute(&self, critical_value: f64) -> Result<Rc<CorrelationTestResult>> {
        let triangle = self.triangle();
        let result = Rc::new(self.request.run(&triangle, critical_value)?);
        *self.result.borrow_mut() = Rc::clone(&result);
        self.recomputations.set(self.recomputations.get() + 1);
        debug!(
            "Recomputed {} for {} at critical value {}: {:?}",
            self.request.title(),
            triangle.column(),
            critical_value,
            result.verdicts().iter().map(|v| v.label()).collect::<Vec<_>>()
        );
        self.changes.notify(&result);
        Ok(result)
    }

    fn triangle(&self) -> Rc<Triangle> {
        Rc::clone(&self.triangle.borrow())
    }
}

/// One test invocation kept current with a [`CriticalValue`]
///
/// Every committed change of the critical value re-runs the test
/// synchronously and replaces the cached result as a whole; readers see
/// either the old result or the new one, never a mix. Listeners registered
/// with [`subscribe`](Self::subscribe) run after the new result is in place.
///
/// Dropping the binding detaches it from the critical value.
pub struct ThresholdBinding {
    state: Rc<BindingState>,
    critical_value: CriticalValue,
    listener: ListenerId,
}

impl ThresholdBinding {
    /// Evaluate `request` at the cell's current value and follow its changes
    pub fn bind(
        critical_value: &CriticalValue,
        triangle: Rc<Triangle>,
        request: TestRequest,
    ) -> Result<Self> {
        let initial = request.run(&triangle, critical_value.get())?;
        let state = Rc::new(BindingState {
            triangle: RefCell::new(triangle),
            request,
            result: RefCell::new(Rc::new(initial)),
            recomputations: Cell::new(0),
            changes: Notifier::new(),
        });

        let weak: Weak<BindingState> = Rc::downgrade(&state);
        let listener = critical_value.subscribe(move |value| {
            if let Some(state) = weak.upgrade() {
                if let Err(e) = state.recompute(*value) {
                    warn!(
                        "Keeping previous {} result for {}: {}",
                        state.request.title(),
                        state.triangle().column(),
                        e
                    );
                }
            }
        });

        Ok(Self {
            state,
            critical_value: critical_value.clone(),
            listener,
        })
    }

    /// Latest committed result
    pub fn current_result(&self) -> Rc<CorrelationTestResult> {
        Rc::clone(&self.state.result.borrow())
    }

    /// Commit `critical_value` to the bound cell and return the result
    ///
    /// Goes through [`CriticalValue::set`], so every binding sharing the cell
    /// recomputes once, in order. Called from inside a listener, the change
    /// is queued and the returned result is still the one being delivered.
    /// An invalid value fails with `InvalidParameter` and keeps the previous
    /// value and result.
    pub fn on_critical_value_changed(
        &self,
        critical_value: f64,
    ) -> Result<Rc<CorrelationTestResult>> {
        self.critical_value.set(critical_value)?;
        Ok(self.current_result())
    }

    /// Swap in a new triangle and re-run the test at the cell's current value
    ///
    /// The previous triangle and result stay in place when evaluation fails.
    pub fn replace_triangle(&self, triangle: Rc<Triangle>) -> Result<Rc<CorrelationTestResult>> {
        let previous = self.state.triangle.replace(triangle);
        match self.state.recompute(self.critical_value.get()) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.state.triangle.replace(previous);
                Err(e)
            }
        }
    }

    pub fn request(&self) -> TestRequest {
        self.state.request
    }

    pub fn triangle(&self) -> Rc<Triangle> {
        self.state.triangle()
    }

    pub fn critical_value(&self) -> &CriticalValue {
        &self.critical_value
    }

    /// Number of recomputations since binding
    pub fn recomputations(&self) -> u64 {
        self.state.recomputations.get()
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&Rc<CorrelationTestResult>) + 'static,
    ) -> ListenerId {
        self.state.changes.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.state.changes.unsubscribe(id)
    }
}

impl Drop for ThresholdBinding {
    fn drop(&mut self) {
        self.critical_value.unsubscribe(self.listener);
    }
}

impl fmt::Debug for ThresholdBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThresholdBinding")
            .field("column", &self.state.triangle().column())
            .field("request", &self.state.request)
            .field("critical_value", &self.critical_value.get())
            .field("recomputations", &self.recomputations())
            .finish()
    }
}
