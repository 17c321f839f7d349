//! Drag session state machine.
//!
//! `Idle → Armed → Dragging → {Dropped, Cancelled} → Idle`. The session
//! never touches the board: it only turns pointer events into discrete
//! [`DragUpdate`]s, and a drop is reported as a [`DropDescriptor`] for the
//! reorder engine to apply.

use super::{Container, DropDescriptor, TaskId};
use chrono::{DateTime, TimeDelta, Utc};

/// Pointer position in integer screen pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn squared_distance(self, other: Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// Candidate drop location resolved by the renderer's hit-testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTarget {
    /// Container under the pointer.
    pub container: Container,
    /// Insertion index within that container.
    pub index: usize,
    /// Occupant to swap out when the container is full.
    pub evict: Option<TaskId>,
}

impl DropTarget {
    /// Creates a target without eviction.
    #[must_use]
    pub const fn new(container: Container, index: usize) -> Self {
        Self {
            container,
            index,
            evict: None,
        }
    }

    /// Swaps `occupant` out of a full destination on drop.
    #[must_use]
    pub const fn evicting(mut self, occupant: TaskId) -> Self {
        self.evict = Some(occupant);
        self
    }
}

/// Where a gesture started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragOrigin {
    /// Task under the pointer.
    pub task_id: TaskId,
    /// Container of that task.
    pub container: Container,
    /// Index of that task in its container.
    pub index: usize,
    /// Pointer position at press.
    pub position: Point,
    /// Press time.
    pub pressed_at: DateTime<Utc>,
}

/// Input accepted by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    /// Pointer pressed on a draggable task handle.
    Down {
        /// Task under the pointer.
        task_id: TaskId,
        /// Container of that task.
        container: Container,
        /// Index of that task in its container.
        index: usize,
        /// Pointer position.
        position: Point,
    },
    /// Pointer moved.
    Move {
        /// Pointer position.
        position: Point,
        /// Drop target under the pointer, if any.
        target: Option<DropTarget>,
    },
    /// Timer tick used to fire the hold timer without movement.
    Tick,
    /// Pointer released.
    Up {
        /// Drop target under the pointer, if any.
        target: Option<DropTarget>,
    },
    /// Explicit cancel, such as Escape.
    Cancel,
}

/// Observable result of feeding one event to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragUpdate {
    /// Nothing the renderer needs to react to.
    Unchanged,
    /// A press was registered; waiting to tell click from drag.
    Armed,
    /// The gesture became a drag.
    Started {
        /// Dragged task.
        task_id: TaskId,
        /// Container the drag started in.
        source: Container,
        /// Candidate target under the pointer when the drag started.
        target: Option<DropTarget>,
    },
    /// The candidate drop target changed.
    Over(Option<DropTarget>),
    /// The press ended before becoming a drag.
    Clicked(TaskId),
    /// The drag ended over a valid target.
    Dropped(DropDescriptor),
    /// The drag ended without a target or was cancelled.
    Cancelled,
}

/// Session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// Pressed, not yet moved far enough or held long enough.
    Armed(DragOrigin),
    /// Dragging.
    Dragging {
        /// Where the gesture started.
        origin: DragOrigin,
        /// Latest pointer position.
        position: Point,
        /// Latest candidate target.
        target: Option<DropTarget>,
    },
}

/// Thresholds separating a click from a drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSettings {
    /// Hold time after which a press becomes a drag.
    pub hold: TimeDelta,
    /// Movement in pixels beyond which a press becomes a drag.
    pub distance_threshold_px: u32,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            hold: TimeDelta::milliseconds(300),
            distance_threshold_px: 5,
        }
    }
}

/// Drag gesture state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragSession {
    state: DragState,
    settings: DragSettings,
}

impl DragSession {
    /// Creates an idle session.
    #[must_use]
    pub const fn new(settings: DragSettings) -> Self {
        Self {
            state: DragState::Idle,
            settings,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> &DragState {
        &self.state
    }

    /// Returns `true` while a drag is in progress.
    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Feeds one pointer event observed at `now`.
    pub fn handle(&mut self, event: PointerEvent, now: DateTime<Utc>) -> DragUpdate {
        match (self.state, event) {
            (
                DragState::Idle,
                PointerEvent::Down {
                    task_id,
                    container,
                    index,
                    position,
                },
            ) => {
                self.state = DragState::Armed(DragOrigin {
                    task_id,
                    container,
                    index,
                    position,
                    pressed_at: now,
                });
                DragUpdate::Armed
            }
            (DragState::Armed(origin), PointerEvent::Move { position, target }) => {
                if self.exceeds_distance(origin.position, position) || self.held(origin, now) {
                    self.start(origin, position, target)
                } else {
                    DragUpdate::Unchanged
                }
            }
            (DragState::Armed(origin), PointerEvent::Tick) if self.held(origin, now) => {
                self.start(origin, origin.position, None)
            }
            (DragState::Armed(origin), PointerEvent::Up { .. }) => {
                self.state = DragState::Idle;
                DragUpdate::Clicked(origin.task_id)
            }
            (
                DragState::Dragging {
                    origin,
                    target: current,
                    ..
                },
                PointerEvent::Move { position, target },
            ) => {
                self.state = DragState::Dragging {
                    origin,
                    position,
                    target,
                };
                if target == current {
                    DragUpdate::Unchanged
                } else {
                    DragUpdate::Over(target)
                }
            }
            (DragState::Dragging { origin, .. }, PointerEvent::Up { target }) => {
                self.state = DragState::Idle;
                target.map_or(DragUpdate::Cancelled, |landing| {
                    DragUpdate::Dropped(DropDescriptor {
                        task_id: origin.task_id,
                        source: origin.container,
                        source_index: origin.index,
                        destination: landing.container,
                        destination_index: landing.index,
                        evict: landing.evict,
                        at: now,
                    })
                })
            }
            (DragState::Armed(_) | DragState::Dragging { .. }, PointerEvent::Cancel) => {
                self.state = DragState::Idle;
                DragUpdate::Cancelled
            }
            _ => DragUpdate::Unchanged,
        }
    }

    fn start(
        &mut self,
        origin: DragOrigin,
        position: Point,
        target: Option<DropTarget>,
    ) -> DragUpdate {
        self.state = DragState::Dragging {
            origin,
            position,
            target,
        };
        DragUpdate::Started {
            task_id: origin.task_id,
            source: origin.container,
            target,
        }
    }

    fn exceeds_distance(&self, from: Point, to: Point) -> bool {
        let threshold = i64::from(self.settings.distance_threshold_px);
        from.squared_distance(to) > threshold * threshold
    }

    fn held(&self, origin: DragOrigin, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(origin.pressed_at) >= self.settings.hold
    }
}
