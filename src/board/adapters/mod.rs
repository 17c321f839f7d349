//! Adapter implementations of the board ports.

pub mod memory;

pub use memory::{InMemoryTaskApi, RecordedCall};
