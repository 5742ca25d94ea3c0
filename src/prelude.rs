//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use pwalk::prelude::*;
//! ```

// Core
pub use crate::core::errors::{PwalkError, Result};
pub use crate::core::exclude::ExcludeSet;

// Engine
pub use crate::engine::output::{DiagSink, OutputSink};
pub use crate::engine::pool::{MAX_WORKERS, SlotPool, WorkerId};
pub use crate::engine::scratch::PathScratch;

// Report
pub use crate::report::chown::OwnerChange;
pub use crate::report::meta::MetaReport;
pub use crate::report::walker::{Action, EntryRecord, ReportConfig, run_report};

// Purge
pub use crate::purge::quarantine::{PurgeClock, Quarantine};
pub use crate::purge::walker::run_purge;

// Repair
pub use crate::repair::policy::{RepairOptions, RepairPlan, plan_repair};
pub use crate::repair::walker::{RepairConfig, run_repair};
