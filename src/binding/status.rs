//! One-line status for aggregate test results

use super::bound::ThresholdBinding;
use super::critical::CriticalValue;
use super::notify::{Change, ListenerId, Notifier};
use crate::diagnostics::{CorrelationTestResult, Outcome, TestKind, TestRequest, Verdict};
use crate::error::{DiagnosticsError, Result};
use crate::triangle::Triangle;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// "Status: Pass", "Status: Fail" or "Status: Insufficient Data"
pub fn status_text(verdict: &Verdict) -> String {
    format!("Status: {}", verdict.label())
}

/// Status line for an aggregate result
///
/// A per-period result has no single status and is rejected with
/// `InvalidTestKind`.
pub fn summarize(result: &CorrelationTestResult) -> Result<String> {
    match &result.outcome {
        Outcome::Aggregate(agg) => Ok(status_text(&agg.verdict)),
        Outcome::PerPeriod(_) => Err(DiagnosticsError::InvalidTestKind(format!(
            "per-period {}",
            result.kind
        ))),
    }
}

struct LabelState {
    text: RefCell<String>,
    changes: Notifier<Change>,
}

/// Status line re-derived whenever its critical value changes
pub struct AggregateStatusLabel {
    state: Rc<LabelState>,
    binding: ThresholdBinding,
    listener: ListenerId,
}

impl AggregateStatusLabel {
    pub fn bind(
        critical_value: &CriticalValue,
        triangle: Rc<Triangle>,
        kind: TestKind,
    ) -> Result<Self> {
        let binding =
            ThresholdBinding::bind(critical_value, triangle, TestRequest::aggregate(kind))?;
        Self::from_binding(binding)
    }

    /// Bind by test name, e.g. `"valuation correlation"`
    ///
    /// Unrecognized names fail with `InvalidTestKind`.
    pub fn bind_named(
        critical_value: &CriticalValue,
        triangle: Rc<Triangle>,
        kind: &str,
    ) -> Result<Self> {
        let kind: TestKind = kind.parse()?;
        Self::bind(critical_value, triangle, kind)
    }

    /// Wrap an existing binding; it must produce aggregate results
    pub fn from_binding(binding: ThresholdBinding) -> Result<Self> {
        let state = Rc::new(LabelState {
            text: RefCell::new(summarize(&binding.current_result())?),
            changes: Notifier::new(),
        });

        let weak: Weak<LabelState> = Rc::downgrade(&state);
        let listener = binding.subscribe(move |result| {
            if let Some(state) = weak.upgrade() {
                if let Ok(text) = summarize(result) {
                    *state.text.borrow_mut() = text;
                    state.changes.notify(&Change::ValueChanged);
                }
            }
        });

        Ok(Self {
            state,
            binding,
            listener,
        })
    }

    pub fn text(&self) -> String {
        self.state.text.borrow().clone()
    }

    pub fn kind(&self) -> TestKind {
        self.binding.request().kind()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.binding.current_result().aggregate_verdict().cloned()
    }

    pub fn binding(&self) -> &ThresholdBinding {
        &self.binding
    }

    pub fn subscribe(&self, listener: impl Fn(&Change) + 'static) -> ListenerId {
        self.state.changes.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.state.changes.unsubscribe(id)
    }
}

impl Drop for AggregateStatusLabel {
    fn drop(&mut self) {
        self.binding.unsubscribe(self.listener);
    }
}

impl fmt::Display for AggregateStatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.state.text.borrow())
    }
}

impl fmt::Debug for AggregateStatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateStatusLabel")
            .field("text", &*self.state.text.borrow())
            .field("binding", &self.binding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::fixtures::{calendar_shock_triangle, taylor_ashe_triangle};
    use crate::diagnostics::valuation_correlation;
    use std::cell::Cell;

    #[test]
    fn test_valuation_status_follows_critical_value() {
        let cell = CriticalValue::new(0.10).unwrap();
        let label = AggregateStatusLabel::bind(
            &cell,
            Rc::new(calendar_shock_triangle()),
            TestKind::ValuationCorrelation,
        )
        .unwrap();
        assert_eq!(label.text(), "Status: Fail");

        cell.set(0.001).unwrap();
        assert_eq!(label.text(), "Status: Pass");
        assert_eq!(label.verdict(), Some(Verdict::Pass));
        assert_eq!(label.to_string(), "Status: Pass");
    }

    #[test]
    fn test_development_status() {
        let cell = CriticalValue::new(0.50).unwrap();
        let label =
            AggregateStatusLabel::bind_named(&cell, Rc::new(taylor_ashe_triangle()), "development")
                .unwrap();
        assert_eq!(label.kind(), TestKind::DevelopmentCorrelation);
        assert_eq!(label.text(), "Status: Fail");
        cell.set(0.10).unwrap();
        assert_eq!(label.text(), "Status: Pass");
    }

    #[test]
    fn test_insufficient_status() {
        let cell = CriticalValue::new(0.10).unwrap();
        let single = Triangle::from_rows("paid", 2020, &[12, 24, 36], vec![vec![1.0, 2.0, 3.0]])
            .unwrap();
        let label =
            AggregateStatusLabel::bind(&cell, Rc::new(single), TestKind::DevelopmentCorrelation)
                .unwrap();
        assert_eq!(label.text(), "Status: Insufficient Data");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let cell = CriticalValue::new(0.10).unwrap();
        let err = AggregateStatusLabel::bind_named(&cell, Rc::new(taylor_ashe_triangle()), "tail")
            .unwrap_err();
        assert!(matches!(err, DiagnosticsError::InvalidTestKind(_)));
        assert_eq!(cell.listener_count(), 0);
    }

    #[test]
    fn test_per_period_result_rejected() {
        let tri = taylor_ashe_triangle();
        let per_period = valuation_correlation(&tri, 0.1, false).unwrap();
        assert!(matches!(
            summarize(&per_period),
            Err(DiagnosticsError::InvalidTestKind(_))
        ));

        let cell = CriticalValue::new(0.10).unwrap();
        let binding =
            ThresholdBinding::bind(&cell, Rc::new(tri), TestRequest::ValuationByPeriod).unwrap();
        assert!(AggregateStatusLabel::from_binding(binding).is_err());
    }

    #[test]
    fn test_value_changed_per_recompute() {
        let cell = CriticalValue::new(0.10).unwrap();
        let label = AggregateStatusLabel::bind(
            &cell,
            Rc::new(taylor_ashe_triangle()),
            TestKind::ValuationCorrelation,
        )
        .unwrap();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        label.subscribe(move |change| {
            assert_eq!(*change, Change::ValueChanged);
            c.set(c.get() + 1);
        });
        cell.set(0.2).unwrap();
        cell.set(0.2).unwrap();
        assert_eq!(count.get(), 2);
    }
}
