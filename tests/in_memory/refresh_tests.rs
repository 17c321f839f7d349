//! Server refreshes interleaved with unpersisted local changes.

use crate::in_memory::helpers::{config, listed, load_board, runtime, titles};
use nextslot::{
    board::{
        adapters::memory::InMemoryTaskApi,
        domain::{Container, DropTarget, Priority, TaskStatus},
        ports::{PriorityUpdate, TaskMutationApi},
    },
    config::BoardConfig,
};
use rstest::rstest;
use std::io;
use tokio::runtime::Runtime;

/// Tests that a pending reorder shields its container from a refresh.
#[rstest]
fn refresh_skips_the_container_being_reordered(
    runtime: io::Result<Runtime>,
    config: BoardConfig,
) {
    let rt = runtime.expect("runtime creation");
    let api = InMemoryTaskApi::with_tasks([
        listed("A", TaskStatus::Inbox, 4, 0),
        listed("B", TaskStatus::Inbox, 2, 1),
        listed("C", TaskStatus::Inbox, 1, 2),
        listed("Z", TaskStatus::Backlog, 4, 0),
        listed("Y", TaskStatus::Backlog, 1, 1),
    ]);
    rt.block_on(async {
        let service = load_board(&api, config).await;
        let inbox = service.members(Container::Inbox);
        let backlog = service.members(Container::Backlog);
        let (a, c) = inbox
            .first()
            .map(|task| task.id())
            .zip(inbox.last().map(|task| task.id()))
            .expect("inbox loaded");
        let y = backlog.last().map(|task| task.id()).expect("backlog loaded");

        service
            .move_task(c, DropTarget::new(Container::Inbox, 0))
            .expect("reorder applies");
        api.batch_update_priority(vec![
            PriorityUpdate {
                task_id: a,
                priority: Priority::LOWEST,
            },
            PriorityUpdate {
                task_id: y,
                priority: Priority::HIGHEST,
            },
        ])
        .await
        .expect("server-side edit");

        let outcome = service.refresh().await.expect("refresh succeeds");

        assert!(outcome.deferred.contains(&TaskStatus::Inbox));
        assert_eq!(titles(&service, Container::Inbox), ["C", "A", "B"]);
        assert_eq!(titles(&service, Container::Backlog), ["Z", "Y"]);
        assert_eq!(
            service
                .members(Container::Backlog)
                .last()
                .map(|task| task.priority().value()),
            Some(4)
        );

        service.flush().await;
        let settled = service.refresh().await.expect("refresh succeeds");

        assert!(settled.deferred.is_empty());
        assert_eq!(titles(&service, Container::Inbox), ["C", "A", "B"]);
        assert!(
            service
                .guard()
                .stale_scopes()
                .expect("lock healthy")
                .is_empty()
        );
    });
}
