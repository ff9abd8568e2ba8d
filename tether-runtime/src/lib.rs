#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![warn(unreachable_pub)]
#![doc = include_str!("../README.md")]
//!
//! # Threading Notes
//!
//! Everything here is meant to be driven from one cooperative thread.
//! There is no internal synchronisation; the types are `!Send` to keep it that way.

pub mod registry;
pub mod schedule;

pub use registry::{WeakPeers, COMPACTION_INTERVAL};
pub use schedule::{ScheduleError, ScheduleHandle, TickScheduler};
