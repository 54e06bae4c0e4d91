//! Tabular projection of a threshold-bound result

use super::bound::ThresholdBinding;
use super::grid::ResultGrid;
use super::notify::{Change, ListenerId, Notifier};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

struct ProjectionState {
    grid: RefCell<ResultGrid>,
    changes: Notifier<Change>,
}

/// A [`ResultGrid`] kept in step with a [`ThresholdBinding`]
///
/// Each recomputation of the binding re-projects the grid and emits
/// [`Change::StructureChanged`], since the row count may differ.
pub struct TableProjection {
    state: Rc<ProjectionState>,
    binding: ThresholdBinding,
    listener: ListenerId,
}

impl TableProjection {
    pub fn new(binding: ThresholdBinding) -> Self {
        let state = Rc::new(ProjectionState {
            grid: RefCell::new(ResultGrid::from_result(&binding.current_result())),
            changes: Notifier::new(),
        });

        let weak: Weak<ProjectionState> = Rc::downgrade(&state);
        let listener = binding.subscribe(move |result| {
            if let Some(state) = weak.upgrade() {
                *state.grid.borrow_mut() = ResultGrid::from_result(result);
                state.changes.notify(&Change::StructureChanged);
            }
        });

        Self {
            state,
            binding,
            listener,
        }
    }

    /// Snapshot of the current grid
    pub fn grid(&self) -> ResultGrid {
        self.state.grid.borrow().clone()
    }

    pub fn row_labels(&self) -> Vec<String> {
        self.state.grid.borrow().row_labels.clone()
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

impl Drop for TableProjection {
    fn drop(&mut self) {
        self.binding.unsubscribe(self.listener);
    }
}

impl fmt::Debug for TableProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableProjection")
            .field("binding", &self.binding)
            .field("rows", &self.state.grid.borrow().row_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::CriticalValue;
    use crate::diagnostics::fixtures::{calendar_shock_triangle, taylor_ashe_triangle};
    use crate::diagnostics::TestRequest;
    use crate::triangle::Triangle;

    fn projection(cell: &CriticalValue, triangle: Triangle) -> TableProjection {
        let binding =
            ThresholdBinding::bind(cell, Rc::new(triangle), TestRequest::ValuationByPeriod)
                .unwrap();
        TableProjection::new(binding)
    }

    #[test]
    fn test_reprojects_on_change() {
        let cell = CriticalValue::new(0.10).unwrap();
        let table = projection(&cell, calendar_shock_triangle());
        assert_eq!(table.grid().cell(3, 0), Some("Fail"));

        cell.set(0.05).unwrap();
        assert_eq!(table.grid().cell(3, 0), Some("Pass"));
    }

    #[test]
    fn test_row_labels_follow_result() {
        let cell = CriticalValue::new(0.10).unwrap();
        let table = projection(&cell, taylor_ashe_triangle());
        for p in [0.5, 0.01, 0.2] {
            cell.set(p).unwrap();
            let result = table.binding().current_result();
            assert_eq!(table.row_labels(), result.labels());
        }
        assert_eq!(table.row_labels().len(), 9);
    }

    #[test]
    fn test_structure_changed_once_per_recompute() {
        let cell = CriticalValue::new(0.10).unwrap();
        let table = projection(&cell, calendar_shock_triangle());
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        table.subscribe(move |c| e.borrow_mut().push(*c));

        cell.set(0.2).unwrap();
        cell.set(0.3).unwrap();
        assert!(cell.set(1.5).is_err());
        assert_eq!(
            *events.borrow(),
            vec![Change::StructureChanged, Change::StructureChanged]
        );
    }

    #[test]
    fn test_drop_detaches() {
        let cell = CriticalValue::new(0.10).unwrap();
        let table = projection(&cell, calendar_shock_triangle());
        drop(table);
        assert_eq!(cell.listener_count(), 0);
    }

    #[test]
    fn test_replaced_triangle_changes_row_count() {
        let cell = CriticalValue::new(0.10).unwrap();
        let table = projection(&cell, calendar_shock_triangle());
        assert_eq!(table.grid().row_count(), 4);
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = Rc::clone(&events);
        table.subscribe(move |c| e.borrow_mut().push(*c));

        table
            .binding()
            .replace_triangle(Rc::new(taylor_ashe_triangle()))
            .unwrap();
        assert_eq!(table.grid().row_count(), 9);
        assert_eq!(table.row_labels(), table.binding().current_result().labels());
        assert_eq!(*events.borrow(), vec![Change::StructureChanged]);
    }
}
