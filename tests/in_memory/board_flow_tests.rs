//! End-to-end drops and button actions through [`BoardService`].
//!
//! [`BoardService`]: nextslot::board::services::BoardService

use chrono::NaiveTime;
use crate::in_memory::helpers::{
    at, config, day, drain, listed, load_board, runtime, scheduled, titles,
};
use nextslot::{
    board::{
        adapters::memory::{InMemoryTaskApi, RecordedCall},
        domain::{
            Container, DropTarget, FieldValue, NewTask, Schedule, SlotKey, TaskPatch, TaskStatus,
        },
        services::{BoardServiceError, PersistenceEvent},
    },
    config::BoardConfig,
};
use rstest::rstest;
use std::io;
use tokio::runtime::Runtime;

/// Inbox `[A, B, C]` and an occupied Next slot.
fn seeded_api() -> InMemoryTaskApi {
    InMemoryTaskApi::with_tasks([
        listed("A", TaskStatus::Inbox, 4, 0),
        listed("B", TaskStatus::Inbox, 2, 1),
        listed("C", TaskStatus::Inbox, 1, 2),
        listed("N", TaskStatus::Next, 4, 0),
    ])
}

/// Tests that scheduling an Inbox task writes its status and slot time.
#[rstest]
fn dropping_into_a_slot_schedules_the_task(runtime: io::Result<Runtime>, config: BoardConfig) {
    let rt = runtime.expect("runtime creation");
    let api = seeded_api();
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let b = service
            .members(Container::Inbox)
            .get(1)
            .map(|task| task.id())
            .expect("B is second");
        let slot = Container::Slot(SlotKey::new(day(), at(10, 0)));

        service
            .move_task(b, DropTarget::new(slot, 0))
            .expect("drop applies");
        assert_eq!(titles(&service, Container::Inbox), ["A", "C"]);
        service.flush().await;

        let stored = api.task(b).expect("task exists on the service");
        assert_eq!(stored.status(), TaskStatus::Scheduled);
        assert_eq!(stored.schedule().map(|schedule| schedule.time()), Some(at(10, 0)));
        assert_eq!(service.day_slots(day()).len(), 1);
    });
}

/// Tests that a Next swap frees the slot before claiming it.
#[rstest]
fn swapping_next_moves_the_occupant_out_first(
    runtime: io::Result<Runtime>,
    config: BoardConfig,
) {
    let rt = runtime.expect("runtime creation");
    let api = seeded_api();
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let a = service.members(Container::Inbox).first().map(|task| task.id());
        let n = service.members(Container::Next).first().map(|task| task.id());
        let (a, n) = a.zip(n).expect("A and N are loaded");

        service.make_next(a, Some(n)).expect("swap applies");
        service.flush().await;

        let transitions: Vec<RecordedCall> = api
            .calls()
            .into_iter()
            .filter(|call| {
                matches!(call, RecordedCall::MoveToInbox(_) | RecordedCall::MakeNext(_))
            })
            .collect();
        assert_eq!(
            transitions,
            [RecordedCall::MakeNext(a), RecordedCall::MoveToInbox(n)]
        );
        assert_eq!(api.task(a).map(|task| task.status()), Some(TaskStatus::Next));
        assert_eq!(api.task(n).map(|task| task.status()), Some(TaskStatus::Inbox));
    });
}

/// Tests that a swap into Next persists while the Inbox is at its cap.
#[rstest]
fn swapping_next_with_a_full_inbox_persists(runtime: io::Result<Runtime>, config: BoardConfig) {
    let rt = runtime.expect("runtime creation");
    let api = InMemoryTaskApi::with_tasks([
        listed("A", TaskStatus::Inbox, 4, 0),
        listed("B", TaskStatus::Inbox, 3, 1),
        listed("C", TaskStatus::Inbox, 3, 2),
        listed("D", TaskStatus::Inbox, 2, 3),
        listed("E", TaskStatus::Inbox, 1, 4),
        listed("N", TaskStatus::Next, 4, 0),
    ]);
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let mut events = service.events();
        let a = service.members(Container::Inbox).first().map(|task| task.id());
        let n = service.members(Container::Next).first().map(|task| task.id());
        let (a, n) = a.zip(n).expect("A and N are loaded");

        service.make_next(a, Some(n)).expect("swap applies");
        assert_eq!(titles(&service, Container::Inbox), ["N", "B", "C", "D", "E"]);
        service.flush().await;

        let staging = TaskPatch::new().with(FieldValue::Status(TaskStatus::Backlog));
        let transitions: Vec<RecordedCall> = api
            .calls()
            .into_iter()
            .filter(|call| match call {
                RecordedCall::UpdateTask(_, patch) => patch == &staging,
                RecordedCall::MoveToInbox(_) | RecordedCall::MakeNext(_) => true,
                _ => false,
            })
            .collect();
        assert_eq!(
            transitions,
            [
                RecordedCall::UpdateTask(n, staging),
                RecordedCall::MakeNext(a),
                RecordedCall::MoveToInbox(n),
            ]
        );
        assert_eq!(api.task(a).map(|task| task.status()), Some(TaskStatus::Next));
        assert_eq!(api.task(n).map(|task| task.status()), Some(TaskStatus::Inbox));
        assert!(drain(&mut events)
            .iter()
            .all(|event| !matches!(event, PersistenceEvent::RolledBack { .. })));
        assert_eq!(titles(&service, Container::Next), ["A"]);
        assert_eq!(titles(&service, Container::Inbox), ["N", "B", "C", "D", "E"]);
    });
}

/// Tests that a failed scheduling drop restores status and schedule.
#[rstest]
fn a_failed_slot_drop_restores_status_and_schedule(
    runtime: io::Result<Runtime>,
    config: BoardConfig,
) {
    let rt = runtime.expect("runtime creation");
    let api = seeded_api();
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let before = service.store().snapshot();
        let b = service
            .members(Container::Inbox)
            .get(1)
            .map(|task| task.id())
            .expect("B is second");
        api.set_offline(true);

        service
            .move_task(
                b,
                DropTarget::new(Container::Slot(SlotKey::new(day(), at(10, 0))), 0),
            )
            .expect("drop applies");
        assert_eq!(service.day_slots(day()).len(), 1);
        service.flush().await;

        let restored = service.store().task(b).expect("B is still on the board");
        assert_eq!(restored.status(), TaskStatus::Inbox);
        assert_eq!(restored.schedule(), None);
        assert!(service.day_slots(day()).is_empty());
        assert_eq!(service.store().snapshot(), before);
    });
}

/// Tests that a failed unscheduling drop puts the task back in its slot.
#[rstest]
fn a_failed_unscheduling_drop_restores_the_slot(
    runtime: io::Result<Runtime>,
    config: BoardConfig,
) {
    let rt = runtime.expect("runtime creation");
    let api = seeded_api();
    let meeting = scheduled("S", at(10, 0), 0);
    let meeting_id = meeting.id();
    api.seed([meeting]);
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let before = service.store().snapshot();
        api.set_offline(true);

        service
            .move_task(meeting_id, DropTarget::new(Container::Inbox, 0))
            .expect("inbox has room");
        assert_eq!(titles(&service, Container::Inbox), ["S", "A", "B", "C"]);
        service.flush().await;

        let restored = service.store().task(meeting_id).expect("S is still on the board");
        assert_eq!(restored.status(), TaskStatus::Scheduled);
        assert_eq!(restored.schedule(), Some(Schedule::new(day(), at(10, 0))));
        assert_eq!(titles(&service, Container::Inbox), ["A", "B", "C"]);
        assert_eq!(service.store().snapshot(), before);
    });
}

/// Tests that a failed drop into a shared slot restores every lane time.
#[rstest]
fn a_failed_drop_into_a_shared_slot_restores_lane_times(
    runtime: io::Result<Runtime>,
    config: BoardConfig,
) {
    let rt = runtime.expect("runtime creation");
    let api = seeded_api();
    let first = scheduled("S1", at(10, 0), 0);
    let second = scheduled("S2", lane(10, 6), 1);
    let lane_ids = [first.id(), second.id()];
    api.seed([first, second]);
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let before = service.store().snapshot();
        let slot = Container::Slot(SlotKey::new(day(), at(10, 0)));
        let a = service
            .members(Container::Inbox)
            .first()
            .map(|task| task.id())
            .expect("A is first");
        api.set_offline(true);

        service
            .move_task(a, DropTarget::new(slot, 0))
            .expect("drop applies");
        let shifted: Vec<_> = lane_ids
            .iter()
            .filter_map(|id| service.store().task(*id))
            .filter_map(|task| task.schedule().map(|schedule| schedule.time()))
            .collect();
        assert_eq!(shifted, [lane(10, 6), lane(10, 12)]);
        service.flush().await;

        let restored: Vec<_> = lane_ids
            .iter()
            .filter_map(|id| service.store().task(*id))
            .filter_map(|task| task.schedule().map(|schedule| schedule.time()))
            .collect();
        assert_eq!(restored, [at(10, 0), lane(10, 6)]);
        assert_eq!(titles(&service, slot), ["S1", "S2"]);
        assert_eq!(service.store().snapshot(), before);
    });
}

/// A time `seconds` past the start of `hour`.
fn lane(hour: u32, seconds: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, seconds).expect("valid time")
}

/// Tests that an unreachable service leaves the board as it was.
#[rstest]
fn an_outage_rolls_the_board_back(runtime: io::Result<Runtime>, config: BoardConfig) {
    let rt = runtime.expect("runtime creation");
    let api = seeded_api();
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let mut events = service.events();
        let before = service.store().snapshot();
        let c = service
            .members(Container::Inbox)
            .last()
            .map(|task| task.id())
            .expect("C is last");
        api.set_offline(true);

        service.complete(c).expect("completion applies locally");
        assert_eq!(titles(&service, Container::Completed), ["C"]);
        service.flush().await;

        assert_eq!(service.store().snapshot(), before);
        let rolled_back = drain(&mut events).into_iter().any(|event| {
            matches!(
                event,
                PersistenceEvent::RolledBack {
                    error: BoardServiceError::NetworkFailure { .. },
                    ..
                }
            )
        });
        assert!(rolled_back);
    });
}

/// Tests that created tasks are appended to the Inbox on both sides.
#[rstest]
fn created_tasks_join_the_inbox(runtime: io::Result<Runtime>, config: BoardConfig) {
    let rt = runtime.expect("runtime creation");
    let api = seeded_api();
    rt.block_on(async {
        let service = load_board(&api, config).await;

        let created = service
            .create_task(NewTask::new("D").with_duration(20))
            .await
            .expect("inbox has room");

        assert_eq!(created.duration_minutes(), 30);
        assert_eq!(titles(&service, Container::Inbox), ["A", "B", "C", "D"]);
        assert!(api.task(created.id()).is_some());
    });
}
