use std::{
    fs::{self, OpenOptions, rename, write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde_json::to_string_pretty;
use uuid::Uuid;

use crate::{
    models::task::Task,
    storage::{Storage, StorageError},
};

const MAX_BACKUPS: usize = 5;

/// Whole-file JSON persistence. Saves go through a temp file and an
/// atomic rename, serialized by an exclusive lock on a `.lock` sibling,
/// so concurrent readers never observe a half-written file.
pub struct JsonFileStorage {
    path: PathBuf,
    backups_enabled: bool,
}

impl JsonFileStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            backups_enabled: true,
        }
    }

    /// For ephemeral setups (tests) where timestamped copies are noise.
    pub fn without_backups(path: PathBuf) -> Self {
        Self {
            path,
            backups_enabled: false,
        }
    }

    /// Copies the current data file into `backups/` with a timestamped
    /// name. No-op, without error, if backups are disabled or the file
    /// does not exist yet.
    pub fn backup(&self) -> Result<u64, StorageError> {
        if !self.backups_enabled {
            return Ok(0);
        }
        let file_exists = fs::exists(&self.path).map_err(|e| StorageError::BackupFailed {
            path: self.path.clone(),
            source: e,
        })?;
        if !file_exists {
            return Ok(0);
        }

        let backup_path = self.get_backup_path();
        let copy_result = fs::copy(&self.path, &backup_path);
        match copy_result {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.create_backup_dir()?;
                self.backup()
            }
            Err(e) => Err(StorageError::BackupFailed {
                path: backup_path,
                source: e,
            }),
            Ok(bytes) => {
                log::debug!("Backed up task data to '{}'", backup_path.display());
                Ok(bytes)
            }
        }
    }

    fn create_backup_dir(&self) -> Result<(), StorageError> {
        let backups_dir = self.get_backup_dir();
        fs::create_dir(&backups_dir).map_err(|e| StorageError::BackupFailed {
            path: backups_dir,
            source: e,
        })?;
        Ok(())
    }

    fn cleanup_old_backups(&self) -> Result<(), StorageError> {
        let backup_dir = self.get_backup_dir();
        let backup_dir_exists =
            fs::exists(&backup_dir).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        if !backup_dir_exists {
            return Ok(());
        }

        let mut file_entries = fs::read_dir(&backup_dir)
            .map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?
            .flatten()
            .filter(|entry| entry.metadata().map(|m| m.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect::<Vec<_>>();

        file_entries.sort();

        let number_of_files_to_delete = match file_entries.len() {
            x if x > MAX_BACKUPS => x - MAX_BACKUPS,
            _ => 0,
        };

        if number_of_files_to_delete == 0 {
            return Ok(());
        }

        for file_path in &file_entries[0..number_of_files_to_delete] {
            fs::remove_file(file_path).map_err(|e| StorageError::CleanupFailed {
                dir: backup_dir.clone(),
                source: e,
            })?;
        }

        Ok(())
    }

    fn get_backup_dir(&self) -> PathBuf {
        let parent_store_path = self.path.parent().unwrap_or(Path::new("."));
        parent_store_path.join("backups")
    }

    fn get_backup_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tasks".to_string());

        // Millisecond timestamps sort lexicographically, which is what
        // cleanup_old_backups relies on.
        let timestamp = jiff::Timestamp::now().as_millisecond();
        self.get_backup_dir()
            .join(format!("{}-{}.json", stem, timestamp))
    }

    fn init_empty_file(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::InitFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        write(&self.path, "[]").map_err(|e| StorageError::InitFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Vec<Task>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<Task>>(&content) {
                Ok(tasks) => Ok(tasks),
                Err(e) => {
                    // Data-loss-tolerant read: a corrupt file is logged
                    // and treated as an empty collection, never an error.
                    log::warn!(
                        "Unreadable task data in '{}' ({}); starting from an empty list",
                        self.path.display(),
                        e
                    );
                    Ok(Vec::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.init_empty_file()?;
                Ok(Vec::new())
            }
            Err(e) => Err(StorageError::LoadFailed {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn save(&self, tasks: &[Task]) -> Result<(), StorageError> {
        let json = to_string_pretty(tasks).map_err(|e| StorageError::SerializeFailed { source: e })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::SaveFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let unique_temp = format!("{}.tmp.{}", self.path.display(), Uuid::new_v4());
        let temp_path = PathBuf::from(&unique_temp);
        write(&temp_path, json).map_err(|e| StorageError::SaveFailed {
            path: temp_path.clone(),
            source: e,
        })?;

        let lock_file_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&lock_file_path)
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path.clone(),
                source: e,
            })?;
        lock_file
            .lock_exclusive()
            .map_err(|e| StorageError::SaveFailed {
                path: lock_file_path,
                source: e,
            })?;

        self.backup()?;
        self.cleanup_old_backups()?;

        rename(&temp_path, &self.path).map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;
        log::debug!(
            "Saved {} task(s) to '{}'",
            tasks.len(),
            self.path.display()
        );

        lock_file.unlock().map_err(|e| StorageError::SaveFailed {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}
