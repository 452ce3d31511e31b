use std::collections::HashSet;

use jiff::Timestamp;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::task::{Priority, Task, TaskDraft, TaskPatch},
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum CreateTaskError {
    #[error("Invalid task: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum UpdateTaskError {
    #[error("Task '{0}' not found")]
    TaskNotFound(Uuid),

    #[error("Invalid task: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub fn find_all(storage: &impl Storage) -> Result<Vec<Task>, StorageError> {
    storage.load()
}

pub fn find_by_id(storage: &impl Storage, id: Uuid) -> Result<Option<Task>, StorageError> {
    Ok(storage.load()?.into_iter().find(|t| t.id == id))
}

pub fn find_by_status(storage: &impl Storage, completed: bool) -> Result<Vec<Task>, StorageError> {
    Ok(storage
        .load()?
        .into_iter()
        .filter(|t| t.completed == completed)
        .collect())
}

pub fn find_by_priority(
    storage: &impl Storage,
    priority: Priority,
) -> Result<Vec<Task>, StorageError> {
    Ok(storage
        .load()?
        .into_iter()
        .filter(|t| t.priority == priority)
        .collect())
}

pub fn find_by_category(
    storage: &impl Storage,
    category: &str,
) -> Result<Vec<Task>, StorageError> {
    Ok(storage
        .load()?
        .into_iter()
        .filter(|t| t.category == category)
        .collect())
}

/// Distinct non-empty categories across all tasks. Order unspecified.
pub fn get_categories(storage: &impl Storage) -> Result<HashSet<String>, StorageError> {
    Ok(storage
        .load()?
        .into_iter()
        .map(|t| t.category)
        .filter(|c| !c.is_empty())
        .collect())
}

/// Validates the draft in full before anything is persisted; on failure
/// the collection on disk is left untouched.
pub fn create_task(storage: &impl Storage, draft: TaskDraft) -> Result<Task, CreateTaskError> {
    let mut tasks = storage.load()?;

    let task = Task::from_draft(draft, Timestamp::now()).map_err(CreateTaskError::Validation)?;

    tasks.push(task.clone());
    storage.save(&tasks)?;

    Ok(task)
}

/// Applies only the fields present in the patch, then re-validates the
/// entire resulting task. A missing id is reported as not-found, which is
/// distinct from a validation failure.
pub fn update_task(
    storage: &impl Storage,
    id: Uuid,
    patch: TaskPatch,
) -> Result<Task, UpdateTaskError> {
    let mut tasks = storage.load()?;

    let Some(index) = tasks.iter().position(|t| t.id == id) else {
        return Err(UpdateTaskError::TaskNotFound(id));
    };

    let mut updated = tasks[index].clone();
    updated
        .apply_patch(patch, Timestamp::now())
        .map_err(UpdateTaskError::Validation)?;

    tasks[index] = updated.clone();
    storage.save(&tasks)?;

    Ok(updated)
}

/// Returns whether a task was actually removed. Deleting an id twice is
/// not an error: the second call simply reports false.
pub fn delete_task(storage: &impl Storage, id: Uuid) -> Result<bool, StorageError> {
    let mut tasks = storage.load()?;

    let before = tasks.len();
    tasks.retain(|t| t.id != id);
    if tasks.len() == before {
        return Ok(false);
    }

    storage.save(&tasks)?;
    Ok(true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatistics {
    pub total: usize,
    pub completed: usize,
    pub active: usize,
    /// Percentage, raw floating-point division; rounding is left to the
    /// presentation layer. 0 when there are no tasks.
    pub completion_rate: f64,
}

pub fn get_statistics(storage: &impl Storage) -> Result<TaskStatistics, StorageError> {
    let tasks = storage.load()?;

    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    let completion_rate = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    };

    Ok(TaskStatistics {
        total,
        completed,
        active: total - completed,
        completion_rate,
    })
}
