//! Step definitions for drag-and-drop reorder scenarios.

mod given;
mod then;
mod when;
pub mod world;
