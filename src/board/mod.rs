//! Task board management for Nextslot.
//!
//! This module implements the optimistic reorder pipeline: a pointer gesture
//! is tracked by the drag session, a committed drop is turned into a new
//! board snapshot and a field-level change set by the reorder engine, the
//! store applies it immediately, and the persistence scheduler ships it to
//! the task service. The module follows hexagonal architecture:
//!
//! - Domain types and pure engines in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The observable task store and reconciliation guard in [`store`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
pub mod store;

#[cfg(test)]
mod tests;
