//! When steps for drag-and-drop reorder scenarios.

use super::world::{DragReorderWorld, container_named, run_async};
use eyre::WrapErr;
use nextslot::board::{
    domain::{DropTarget, Point, PointerEvent, Priority},
    ports::{PriorityUpdate, TaskMutationApi},
};
use rstest_bdd_macros::when;

const ORIGIN: Point = Point::new(200, 200);

/// Presses a task and moves far enough to start a drag over `target`.
fn pick_up(
    world: &DragReorderWorld,
    title: &str,
    target: DropTarget,
) -> Result<(), eyre::Report> {
    let task_id = world.task_id(title)?;
    let (container, index) = world
        .service
        .store()
        .snapshot()
        .position_of(task_id)
        .ok_or_else(|| eyre::eyre!("{title:?} has no position"))?;
    world
        .service
        .handle_pointer(PointerEvent::Down {
            task_id,
            container,
            index,
            position: ORIGIN,
        })
        .wrap_err("press task")?;
    world
        .service
        .handle_pointer(PointerEvent::Move {
            position: Point::new(200, 120),
            target: Some(target),
        })
        .wrap_err("move pointer")?;
    Ok(())
}

#[when(r#""{title}" is dragged to position {index:usize} of the {container}"#)]
fn dragged_to(
    world: &mut DragReorderWorld,
    title: String,
    index: usize,
    container: String,
) -> Result<(), eyre::Report> {
    let target = DropTarget::new(container_named(&container)?, index);
    world.before_drop = Some(world.service.store().snapshot());
    pick_up(world, &title, target)?;
    let outcome = world.service.handle_pointer(PointerEvent::Up {
        target: Some(target),
    });
    world.last_drop = Some(outcome);
    Ok(())
}

#[when(r#""{title}" is picked up and held over the {container}"#)]
fn picked_up(
    world: &mut DragReorderWorld,
    title: String,
    container: String,
) -> Result<(), eyre::Report> {
    let target = DropTarget::new(container_named(&container)?, 0);
    pick_up(world, &title, target)
}

#[when("the pending changes are flushed")]
fn changes_flushed(world: &mut DragReorderWorld) {
    run_async(world.service.flush());
}

#[when(r#"the service raises "{title}" to priority {value:u8}"#)]
fn service_raises(
    world: &mut DragReorderWorld,
    title: String,
    value: u8,
) -> Result<(), eyre::Report> {
    let task_id = world.task_id(&title)?;
    let priority = Priority::new(value).wrap_err("priority in range")?;
    run_async(world.api.batch_update_priority(vec![PriorityUpdate { task_id, priority }]))
        .wrap_err("server-side priority edit")

}

#[when("the board is refreshed")]
fn board_refreshed(world: &mut DragReorderWorld) -> Result<(), eyre::Report> {
    let outcome = run_async(world.service.refresh()).wrap_err("refresh board")?;
    world.last_refresh = Some(outcome);
    Ok(())
}
