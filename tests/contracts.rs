//! Contract tests for CDSS.
//!
//! Contracts are invariants that must ALWAYS hold.
//! A failing contract test is a P0 bug.
//!
//! Run with: cargo test --test contracts

mod common;

#[path = "contracts/isolation.rs"]
mod isolation;

#[path = "contracts/lifecycle.rs"]
mod lifecycle;

#[path = "contracts/errors.rs"]
mod errors;

#[path = "contracts/config.rs"]
mod config;
