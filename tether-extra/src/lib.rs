#![warn(clippy::pedantic)]
#![doc = include_str!("../README.md")]

pub mod future;

pub use future::{changes, list_changes, next_change, wait_until};
