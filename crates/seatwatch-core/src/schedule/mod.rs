//! Adaptive polling schedule
//!
//! Produces tick events at a variable interval. Away from registration
//! deadlines the ticker fires at the configured default interval; during the
//! hour before each deadline it tightens through four windows
//! (30m → 15m → 5m → 1m) and relaxes back to the default afterwards.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  expand_deadlines  ┌────────────────────┐
//! │  Deadline[]  │ ─────────────────▶ │ ScheduleWindow[]   │
//! └──────────────┘                    └─────────┬──────────┘
//!                                               │ wait_at(now)
//!                                               ▼
//!                                     ┌────────────────────┐  single slot
//!                                     │  AdaptiveTicker    │ ────────────▶ TickStream
//!                                     └────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use seatwatch_core::schedule::{AdaptiveTicker, Deadline};
//!
//! let deadlines = vec![Deadline::parse("2025-09-06T09:00:00+05:00", "First priority")?];
//! let ticker = AdaptiveTicker::from_deadlines(Duration::from_secs(3 * 3600), &deadlines);
//! let mut ticks = ticker.spawn(shutdown.token());
//! while let Some(at) = ticks.recv().await {
//!     tracker.check_once().await?;
//! }
//! ```

mod ticker;
mod windows;

pub use ticker::{AdaptiveTicker, TickStream};
pub use windows::{describe_windows, expand_deadlines, Deadline, ScheduleWindow};
