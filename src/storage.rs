use std::path::PathBuf;

use thiserror::Error;

use crate::models::task::Task;

pub mod json;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to load tasks from '{path}': {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to initialize data file at '{path}': {source}")]
    InitFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save tasks to '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize tasks to JSON: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create backup at '{path}': {source}")]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to cleanup old backups in '{dir}': {source}")]
    CleanupFailed {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk persistence boundary for the whole task collection. The file
/// is the single source of truth between operations: every operation
/// re-loads it, mutates in memory, and writes the whole collection back.
pub trait Storage {
    fn load(&self) -> Result<Vec<Task>, StorageError>;
    fn save(&self, tasks: &[Task]) -> Result<(), StorageError>;
}
