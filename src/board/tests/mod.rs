//! Unit tests for the board module.
//!
//! Tests are organised by component: the pure domain engines first, then
//! the store and guard, then the asynchronous scheduler and service.

mod support;
