use jiff::Timestamp;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::task::Task,
    storage::{Storage, StorageError},
};

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Task '{0}' not found")]
    TaskNotFound(Uuid),

    #[error("Task '{0}' already has an active session")]
    AlreadyActive(Uuid),

    #[error("Task '{0}' has no active session")]
    NoActiveSession(Uuid),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Live view of the single running timer. `elapsed_ms` is computed from
/// the wall clock at query time, never persisted.
#[derive(Debug, Clone)]
pub struct ActiveTimer {
    pub task_id: Uuid,
    pub title: String,
    pub started_at: Timestamp,
    pub elapsed_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeTrackingStats {
    /// Sum of every task's finalized time, in milliseconds
    pub total_time_tracked: i64,
    /// Tasks that have accumulated any finalized time
    pub tasks_with_time_count: usize,
    /// Finalized sessions across all tasks
    pub total_sessions: usize,
    /// Milliseconds; 0 when there are no sessions
    pub average_session_duration: f64,
}

/// Opens a session on the target task. Starting while a *different* task
/// is running is defined behavior: that task is implicitly stopped first,
/// exactly as `stop_timer` would. Starting the task that is already
/// running is a conflict. The collection-wide invariant holds afterwards:
/// at most one task is active.
pub fn start_timer(storage: &impl Storage, id: Uuid) -> Result<Task, TimerError> {
    let mut tasks = storage.load()?;

    let Some(index) = tasks.iter().position(|t| t.id == id) else {
        return Err(TimerError::TaskNotFound(id));
    };
    if tasks[index].time_tracking.is_active {
        return Err(TimerError::AlreadyActive(id));
    }

    let now = Timestamp::now();
    for task in tasks.iter_mut() {
        if task.id != id && task.time_tracking.is_active {
            task.time_tracking.close_session(now);
            task.touch(now);
        }
    }

    let target = &mut tasks[index];
    target.time_tracking.open_session(now);
    target.touch(now);
    let started = target.clone();

    storage.save(&tasks)?;
    Ok(started)
}

/// Finalizes the open session on the target task.
pub fn stop_timer(storage: &impl Storage, id: Uuid) -> Result<Task, TimerError> {
    let mut tasks = storage.load()?;

    let Some(index) = tasks.iter().position(|t| t.id == id) else {
        return Err(TimerError::TaskNotFound(id));
    };

    let now = Timestamp::now();
    let target = &mut tasks[index];
    if target.time_tracking.close_session(now).is_none() {
        return Err(TimerError::NoActiveSession(id));
    }
    target.touch(now);
    let stopped = target.clone();

    storage.save(&tasks)?;
    Ok(stopped)
}

pub fn active_timer(storage: &impl Storage) -> Result<Option<ActiveTimer>, StorageError> {
    let tasks = storage.load()?;
    let now = Timestamp::now();

    Ok(tasks.into_iter().find_map(|task| {
        let elapsed_ms = task.time_tracking.current_duration(now)?;
        let started_at = task.time_tracking.active_session_start?;
        Some(ActiveTimer {
            task_id: task.id,
            title: task.title,
            started_at,
            elapsed_ms,
        })
    }))
}

/// Stops every running task. The invariant says there is at most one, but
/// the operation handles zero-or-more defensively and returns whatever it
/// stopped.
pub fn stop_all_timers(storage: &impl Storage) -> Result<Vec<Task>, StorageError> {
    let mut tasks = storage.load()?;
    let now = Timestamp::now();

    let mut stopped = Vec::new();
    for task in tasks.iter_mut() {
        if task.time_tracking.close_session(now).is_some() {
            task.touch(now);
            stopped.push(task.clone());
        }
    }

    if !stopped.is_empty() {
        storage.save(&tasks)?;
    }
    Ok(stopped)
}

pub fn time_tracking_stats(storage: &impl Storage) -> Result<TimeTrackingStats, StorageError> {
    let tasks = storage.load()?;

    let total_time_tracked: i64 = tasks.iter().map(|t| t.time_tracking.total_time).sum();
    let tasks_with_time_count = tasks
        .iter()
        .filter(|t| t.time_tracking.total_time > 0)
        .count();
    let total_sessions: usize = tasks.iter().map(|t| t.time_tracking.sessions.len()).sum();
    let average_session_duration = if total_sessions == 0 {
        0.0
    } else {
        total_time_tracked as f64 / total_sessions as f64
    };

    Ok(TimeTrackingStats {
        total_time_tracked,
        tasks_with_time_count,
        total_sessions,
        average_session_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use crate::models::task::TaskDraft;
    use crate::services::tasks::{create_task, find_by_id};
    use crate::storage::json::JsonFileStorage;

    fn test_storage(label: &str) -> (JsonFileStorage, PathBuf) {
        let dir = PathBuf::from("/tmp").join(format!("trak_{}_{}", label, Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        (JsonFileStorage::without_backups(dir.join("tasks.json")), dir)
    }

    fn add(storage: &JsonFileStorage, title: &str) -> Task {
        create_task(
            storage,
            TaskDraft {
                title: title.to_string(),
                ..TaskDraft::default()
            },
        )
        .unwrap()
    }

    fn active_count(storage: &JsonFileStorage) -> usize {
        crate::services::tasks::find_all(storage)
            .unwrap()
            .iter()
            .filter(|t| t.time_tracking.is_active)
            .count()
    }

    #[test]
    fn test_start_and_stop_finalize_one_session() {
        let (storage, dir) = test_storage("start_stop");
        let task = add(&storage, "Timed work");

        let started = start_timer(&storage, task.id).unwrap();
        assert!(started.time_tracking.is_active);
        assert!(started.time_tracking.active_session_start.is_some());

        std::thread::sleep(std::time::Duration::from_millis(20));

        let stopped = stop_timer(&storage, task.id).unwrap();
        assert!(!stopped.time_tracking.is_active);
        assert!(stopped.time_tracking.active_session_start.is_none());
        assert_eq!(stopped.time_tracking.sessions.len(), 1);
        assert!(stopped.time_tracking.total_time >= 20);
        assert_eq!(
            stopped.time_tracking.total_time,
            stopped.time_tracking.sessions[0].duration
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_start_on_missing_task_is_not_found() {
        let (storage, dir) = test_storage("start_missing");
        assert!(matches!(
            start_timer(&storage, Uuid::new_v4()),
            Err(TimerError::TaskNotFound(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_start_on_already_running_task_is_a_conflict() {
        let (storage, dir) = test_storage("start_same");
        let task = add(&storage, "Running");

        start_timer(&storage, task.id).unwrap();
        let err = start_timer(&storage, task.id).unwrap_err();
        assert!(matches!(err, TimerError::AlreadyActive(id) if id == task.id));

        // The running session is untouched by the failed start
        let stored = find_by_id(&storage, task.id).unwrap().unwrap();
        assert!(stored.time_tracking.is_active);
        assert!(stored.time_tracking.sessions.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_start_on_other_task_auto_stops_the_running_one() {
        let (storage, dir) = test_storage("auto_stop");
        let first = add(&storage, "First");
        let second = add(&storage, "Second");

        start_timer(&storage, first.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        start_timer(&storage, second.id).unwrap();

        let first_stored = find_by_id(&storage, first.id).unwrap().unwrap();
        assert!(!first_stored.time_tracking.is_active);
        assert_eq!(first_stored.time_tracking.sessions.len(), 1);
        assert!(first_stored.time_tracking.total_time >= 20);

        let second_stored = find_by_id(&storage, second.id).unwrap().unwrap();
        assert!(second_stored.time_tracking.is_active);

        assert_eq!(active_count(&storage), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stop_without_session_is_a_conflict_and_mutates_nothing() {
        let (storage, dir) = test_storage("stop_idle");
        let task = add(&storage, "Idle");

        let err = stop_timer(&storage, task.id).unwrap_err();
        assert!(matches!(err, TimerError::NoActiveSession(id) if id == task.id));

        let stored = find_by_id(&storage, task.id).unwrap().unwrap();
        assert!(stored.time_tracking.sessions.is_empty());
        assert_eq!(stored.time_tracking.total_time, 0);
        assert_eq!(stored.updated_at, task.updated_at);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_active_timer_reports_live_elapsed_time() {
        let (storage, dir) = test_storage("active");
        assert!(active_timer(&storage).unwrap().is_none());

        let task = add(&storage, "Watched");
        start_timer(&storage, task.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        let active = active_timer(&storage).unwrap().unwrap();
        assert_eq!(active.task_id, task.id);
        assert_eq!(active.title, "Watched");
        assert!(active.elapsed_ms >= 20);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stop_all_is_defensive_about_zero_running_tasks() {
        let (storage, dir) = test_storage("stop_all_empty");
        add(&storage, "Idle");

        assert!(stop_all_timers(&storage).unwrap().is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stop_all_returns_the_stopped_tasks() {
        let (storage, dir) = test_storage("stop_all");
        let task = add(&storage, "Running");
        start_timer(&storage, task.id).unwrap();

        let stopped = stop_all_timers(&storage).unwrap();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].id, task.id);
        assert_eq!(stopped[0].time_tracking.sessions.len(), 1);
        assert_eq!(active_count(&storage), 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_at_most_one_active_after_any_sequence() {
        let (storage, dir) = test_storage("invariant");
        let a = add(&storage, "A");
        let b = add(&storage, "B");
        let c = add(&storage, "C");

        start_timer(&storage, a.id).unwrap();
        start_timer(&storage, b.id).unwrap();
        start_timer(&storage, c.id).unwrap();
        assert_eq!(active_count(&storage), 1);

        stop_timer(&storage, c.id).unwrap();
        assert_eq!(active_count(&storage), 0);

        start_timer(&storage, a.id).unwrap();
        stop_all_timers(&storage).unwrap();
        assert_eq!(active_count(&storage), 0);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_time_tracking_stats_aggregation() {
        let (storage, dir) = test_storage("timer_stats");

        let empty = time_tracking_stats(&storage).unwrap();
        assert_eq!(empty.total_sessions, 0);
        assert_eq!(empty.average_session_duration, 0.0);

        let a = add(&storage, "A");
        let b = add(&storage, "B");

        start_timer(&storage, a.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        stop_timer(&storage, a.id).unwrap();

        start_timer(&storage, b.id).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        stop_timer(&storage, b.id).unwrap();

        let stats = time_tracking_stats(&storage).unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.tasks_with_time_count, 2);
        let expected_total: i64 = crate::services::tasks::find_all(&storage)
            .unwrap()
            .iter()
            .map(|t| t.time_tracking.total_time)
            .sum();
        assert_eq!(stats.total_time_tracked, expected_total);
        assert!(
            (stats.average_session_duration - expected_total as f64 / 2.0).abs() < f64::EPSILON
        );

        fs::remove_dir_all(&dir).unwrap();
    }
}
