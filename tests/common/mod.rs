//! Common test utilities for CDSS contract and scenario tests.
//!
//! This module provides:
//! - `TestEnv`: Isolated library directory, subject files and CLI runner
//! - Fixtures: Reusable library documents and subjects

#![allow(dead_code)]

pub mod env;
pub mod fixtures;

pub use env::*;
pub use fixtures::*;
