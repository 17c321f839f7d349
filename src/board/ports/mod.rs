//! Port contracts for persisting board changes.
//!
//! The board core never talks HTTP itself; it drives the task service
//! through [`TaskMutationApi`] and adapters supply the transport.

pub mod mutation_api;

pub use mutation_api::{
    PriorityUpdate, TaskMutationApi, TaskMutationError, TaskMutationResult,
};
