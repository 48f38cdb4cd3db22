//! # Callhook Scheduler
//!
//! The three reactive handlers and the loops that drive them.
//!
//! ## Architecture
//! ```text
//! document created (notifications/{id})
//!   └── NotificationDispatcher
//!         ├── type != incoming_call → no-op
//!         ├── no targetToken        → no-op (logged)
//!         └── push send → delete record
//!
//! ReaperEngine (tokio interval per policy)
//!   ├── signaling: timestamp < now - 5m                  (every 5 min)
//!   └── calls:     status == ended && endedAt < now - 24h (every 24 h)
//!         └── retention::sweep → query → one atomic batch delete
//! ```
//!
//! Every handler takes `now` and its store/transport explicitly, so tests run
//! against a fixed clock and in-memory fakes.

pub mod dispatcher;
pub mod engine;
pub mod reapers;
pub mod retention;

pub use dispatcher::{DispatchOutcome, DispatchPlan, NotificationDispatcher, SkipReason};
pub use engine::{ReaperEngine, SweepRecord, spawn_reapers};
pub use retention::{RetentionPolicy, SweepReport, sweep};
