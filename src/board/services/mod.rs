//! Orchestration services for the board.
//!
//! - [`PersistenceScheduler`] debounces, batches, retries and rolls back
//!   optimistic changes.
//! - [`BoardService`] wires pointer input, button actions and refreshes
//!   through the engine, the store and the scheduler.

pub mod board;
pub mod error;
pub mod scheduler;

pub use board::BoardService;
pub use error::{BoardServiceError, BoardServiceResult};
pub use scheduler::{DebounceKey, PersistenceEvent, PersistenceScheduler, SchedulerSettings};
