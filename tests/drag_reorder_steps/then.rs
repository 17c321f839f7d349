//! Then steps for drag-and-drop reorder scenarios.

use super::world::{DragReorderWorld, split_list};
use nextslot::board::{
    domain::{Container, TaskStatus},
    services::PersistenceEvent,
};
use rstest_bdd_macros::then;

#[then(r#"the inbox order is "{order}""#)]
fn inbox_order(world: &DragReorderWorld, order: String) -> Result<(), eyre::Report> {
    let expected = split_list(&order);
    let actual = world.titles(Container::Inbox);
    if actual != expected {
        return Err(eyre::eyre!("expected inbox {expected:?}, found {actual:?}"));
    }
    Ok(())
}

#[then(r#"the inbox priorities are "{rungs}""#)]
fn inbox_priorities(world: &DragReorderWorld, rungs: String) -> Result<(), eyre::Report> {
    let expected = split_list(&rungs);
    let actual: Vec<String> = world
        .service
        .members(Container::Inbox)
        .iter()
        .map(|task| task.priority().value().to_string())
        .collect();
    if actual != expected {
        return Err(eyre::eyre!(
            "expected priorities {expected:?}, found {actual:?}"
        ));
    }
    Ok(())
}

#[then(r#"the service stores priority {value:u8} for "{title}""#)]
fn service_stores(
    world: &DragReorderWorld,
    value: u8,
    title: String,
) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&title)?;
    let stored = world
        .api
        .task(task_id)
        .ok_or_else(|| eyre::eyre!("{title:?} missing on the service"))?;
    if stored.priority().value() != value {
        return Err(eyre::eyre!(
            "expected stored priority {value}, found {}",
            stored.priority()
        ));
    }
    Ok(())
}

#[then("the drop is rejected because the container is full")]
fn drop_rejected(world: &DragReorderWorld) -> Result<(), eyre::Report> {
    let outcome = world
        .last_drop
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no drop was attempted"))?;
    match outcome {
        Err(err) if err.is_capacity_exceeded() => Ok(()),
        other => Err(eyre::eyre!("expected a capacity error, got {other:?}")),
    }
}

#[then("the board matches its state before the drop")]
fn board_unchanged(world: &DragReorderWorld) -> Result<(), eyre::Report> {
    let before = world
        .before_drop
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no drop was attempted"))?;
    if world.service.store().snapshot() != *before {
        return Err(eyre::eyre!("board differs from its state before the drop"));
    }
    Ok(())
}

#[then("a rollback is reported")]
fn rollback_reported(world: &mut DragReorderWorld) -> Result<(), eyre::Report> {
    while let Ok(event) = world.events.try_recv() {
        if matches!(event, PersistenceEvent::RolledBack { .. }) {
            return Ok(());
        }
    }
    Err(eyre::eyre!("no rollback event was broadcast"))
}

#[then("the inbox refresh is deferred")]
fn refresh_deferred(world: &DragReorderWorld) -> Result<(), eyre::Report> {
    let outcome = world
        .last_refresh
        .as_ref()
        .ok_or_else(|| eyre::eyre!("no refresh ran"))?;
    if !outcome.deferred.contains(&TaskStatus::Inbox) {
        return Err(eyre::eyre!("expected the inbox to be deferred, got {outcome:?}"));
    }
    Ok(())
}
