//! Integration tests for the mission runtime
//!
//! This test suite validates, across the core and runtime crates:
//! - Objective and action ordering inside missions
//! - Mission chaining, disabled forwarding and cancellation
//! - Resume from a ledger persisted in SQLite or as a JSON snapshot
//! - Observer and listener delivery order

pub mod test_utils;


#[cfg(test)]
mod cancellation_tests;


#[cfg(test)]
mod observer_tests;
