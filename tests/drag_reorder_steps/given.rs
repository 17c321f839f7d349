//! Given steps for drag-and-drop reorder scenarios.

use super::world::{DragReorderWorld, run_async, split_list};
use eyre::WrapErr;
use nextslot::board::domain::{PersistedTaskData, Priority, Task, TaskId, TaskStatus};
use rstest_bdd_macros::given;

fn persisted(title: &str, status: TaskStatus, priority: Priority, sort_order: i64) -> Task {
    Task::from_persisted(PersistedTaskData {
        id: TaskId::new(),
        title: title.to_owned(),
        description: None,
        status,
        priority,
        schedule: None,
        duration_minutes: 30,
        sort_order,
        later_since: None,
    })
}

#[given(r#"the inbox holds "{tasks}""#)]
fn inbox_holds(world: &mut DragReorderWorld, tasks: String) -> Result<(), eyre::Report> {
    let mut seeded = Vec::new();
    for (position, entry) in split_list(&tasks).iter().enumerate() {
        let (title, rung) = entry
            .split_once(':')
            .ok_or_else(|| eyre::eyre!("expected TITLE:PRIORITY, got {entry:?}"))?;
        let value: u8 = rung.trim().parse().wrap_err("parse priority")?;
        let priority = Priority::new(value).wrap_err("priority in range")?;
        let sort_order = i64::try_from(position).wrap_err("sort order fits")?;
        seeded.push(persisted(title.trim(), TaskStatus::Inbox, priority, sort_order));
    }
    world.api.seed(seeded);
    Ok(())
}

#[given(r#"the next slot holds "{title}""#)]
fn next_holds(world: &mut DragReorderWorld, title: String) {
    world
        .api
        .seed([persisted(&title, TaskStatus::Next, Priority::HIGHEST, 0)]);
}

#[given("the board is loaded")]
fn board_is_loaded(world: &mut DragReorderWorld) -> Result<(), eyre::Report> {
    run_async(world.service.load()).wrap_err("load board from the task service")?;
    world.api.clear_calls();
    Ok(())
}

#[given("the task service is unreachable")]
fn service_unreachable(world: &mut DragReorderWorld) {
    world.api.set_offline(true);
}
