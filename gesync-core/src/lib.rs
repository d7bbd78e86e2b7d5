//! Core types for gesync.
//!
//! This crate holds everything that does not speak a wire protocol:
//! - `SourceEvent` / `MirrorEvent` and the conversion between them
//! - `SyncWindow` and relative period parsing
//! - per-item batch outcomes
//! - the `SyncOrchestrator`, generic over the portal and calendar seams

pub mod batch;
pub mod constants;
pub mod error;
pub mod event;
pub mod period;
pub mod sync;
pub mod window;

pub use batch::{BatchReport, ItemOutcome};
pub use error::{SyncError, SyncResult};
pub use event::{MirrorEvent, Reminder, ReminderMethod, SourceEvent};
pub use period::{Period, PeriodUnit, compute_period, compute_sync_period};
pub use window::SyncWindow;
