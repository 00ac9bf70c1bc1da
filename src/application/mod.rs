//! Application Layer
//!
//! Use cases that orchestrate the business flow.
//! This layer:
//! - Depends on Domain layer (entities, services, ports)
//! - Does NOT contain business rules (those are in Domain)
//! - Coordinates between Infrastructure and Domain
//!
//! ## Use Cases
//!
//! - `DecisionEngine::execute` - Run protocols and rules, return proposals and issues
//! - `DecisionEngine::analyze` - Run rules, write back analysis fields, return issues
//! - `DecisionEngine::validate` - Compile and check a library set without running it

mod engine;

pub use engine::DecisionEngine;
