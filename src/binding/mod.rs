//! Reactive recomputation of test results
//!
//! A [`CriticalValue`] is a single-writer cell. A [`ThresholdBinding`] pairs
//! one cell with one test invocation and re-runs the test on every committed
//! change. Presentation layers observe a binding through a
//! [`TableProjection`] (per-period grids) or an [`AggregateStatusLabel`]
//! (one status line); both notify their listeners synchronously, after the
//! new result is committed.
//!
//! Everything here is single-threaded (`Rc` based).
//!
//! ```rust,ignore
//! let critical = CriticalValue::new(0.10)?;
//! let binding = ThresholdBinding::bind(&critical, triangle, TestRequest::ValuationByPeriod)?;
//! let table = TableProjection::new(binding);
//! table.subscribe(|change| println!("{:?}", change));
//!
//! critical.set(0.05)?;            // recompute, re-project, notify
//! assert!(critical.set(1.2).is_err()); // rejected, previous result kept
//! ```

mod bound;
mod critical;
mod grid;
mod notify;
mod projection;
mod status;

pub use bound::ThresholdBinding;
pub use critical::CriticalValue;
pub use grid::{ResultGrid, PASS_FAIL_HEADER, TOTAL_ROW_HEADER};
pub use notify::{Change, ListenerId, Notifier};
pub use projection::TableProjection;
pub use status::{status_text, summarize, AggregateStatusLabel};
