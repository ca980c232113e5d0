//! Core data model shared by every crate in the router workspace: the
//! per-request [`ExecutionContext`], the error taxonomy, and the I/O Tracker.
//!
//! `router-core` has no dependency on any other workspace crate — it sits
//! at the bottom of the dependency graph and is consumed by all of them
//! (spec.md §2: "Monitoring and I/O tracker are leaf services consumed by
//! everyone").

pub mod context;
pub mod error;
pub mod io_trace;

pub use context::{ExecutionContext, ResolvedTarget};
pub use error::{Category, CoreError, Severity};
pub use io_trace::{Direction, IoRecord};
