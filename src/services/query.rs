use std::str::FromStr;

use crate::{
    models::task::{Priority, Task},
    storage::{Storage, StorageError},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, thiserror::Error)]
#[error("Status must be one of: all, active, completed")]
pub struct ParseStatusFilterError;

impl FromStr for StatusFilter {
    type Err = ParseStatusFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" => Ok(StatusFilter::Completed),
            _ => Err(ParseStatusFilterError),
        }
    }
}

/// Filter specification for the listing operation. All dimensions compose
/// by intersection; `None` means "no constraint" on that dimension.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    pub status: StatusFilter,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Loads the collection, applies the filter dimensions, and sorts the
/// result: priority weight descending, then newest first within equal
/// priority. The sort is a presentation order, not a storage order.
pub fn list_tasks(storage: &impl Storage, filter: &TaskFilter) -> Result<Vec<Task>, StorageError> {
    let tasks = match filter.status {
        StatusFilter::All => super::tasks::find_all(storage)?,
        StatusFilter::Active => super::tasks::find_by_status(storage, false)?,
        StatusFilter::Completed => super::tasks::find_by_status(storage, true)?,
    };

    let mut tasks = apply_filters(tasks, filter);
    sort_tasks(&mut tasks);
    Ok(tasks)
}

fn apply_filters(tasks: Vec<Task>, filter: &TaskFilter) -> Vec<Task> {
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    tasks
        .into_iter()
        .filter(|task| match &needle {
            Some(needle) => matches_search(task, needle),
            None => true,
        })
        .filter(|task| match filter.priority {
            Some(priority) => task.priority == priority,
            None => true,
        })
        .filter(|task| match &filter.category {
            Some(category) => &task.category == category,
            None => true,
        })
        .collect()
}

/// Case-insensitive substring match over title, description, and
/// category. The needle must already be lower-cased.
fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task.description.to_lowercase().contains(needle)
        || task.category.to_lowercase().contains(needle)
}

pub fn sort_tasks(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        b.priority
            .weight()
            .cmp(&a.priority.weight())
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
