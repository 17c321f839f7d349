//! Nextslot: optimistic drag-and-drop core for a personal task board.
//!
//! The crate keeps an in-memory mirror of a task service (Inbox, Next,
//! calendar slots, Later, Completed, Backlog, Roadmap), lets a user drag
//! tasks between those containers with immediate local feedback, derives
//! priorities from list position, and persists the result through a
//! debounced, retrying scheduler that rolls back on failure.
//!
//! # Architecture
//!
//! Nextslot follows hexagonal architecture principles:
//!
//! - **Domain**: Pure reorder, ladder and drag logic with no I/O
//! - **Ports**: Abstract trait interfaces for the remote task service
//! - **Adapters**: Concrete implementations of ports
//! - **Services**: Orchestration of store, guard, engine and scheduler
//!
//! # Modules
//!
//! - [`board`]: Task board domain, store, persistence and services
//! - [`config`]: Board tuning loaded from defaults or TOML
//! - [`telemetry`]: Tracing subscriber installation

pub mod board;
pub mod config;
pub mod telemetry;
