//! File-backed list of managed jobs.
//!
//! The file holds a JSON object with a `jobs` array:
//! ```json
//! { "jobs": [ { "job_id": "gsiftp://ce.example.org:2811/jobs/12345", ... } ] }
//! ```
//!
//! Access is coordinated through an `fs4` advisory lock on a sidecar file
//! (`jobs.json.lock` next to `jobs.json`) whose inode never changes. Readers
//! hold it shared. Writers hold it exclusive for the whole read-modify-write
//! and replace the list by renaming a sibling temporary file over it. Within
//! a process, writers are also serialized by an async mutex so they do not
//! park blocking threads on the file lock.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::job::Job;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Cannot access job list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed job list {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Job list task failed: {0}")]
    Task(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobList {
    jobs: Vec<Job>,
}

pub struct JobRegistry {
    path: PathBuf,
    write_mutex: AsyncMutex<()>,
}

impl JobRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_mutex: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sidecar file carrying the advisory lock.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// All stored jobs. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<Job>, RegistryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let path = self.path.clone();
        let lock_path = self.lock_path();
        let jobs = tokio::task::spawn_blocking(move || -> Result<Vec<Job>, RegistryError> {
            let lock = open_lock(&path, &lock_path)?;
            lock.lock_shared().map_err(io_error(&lock_path))?;
            // Lock is released when the lock file is dropped
            read_jobs(&path)
        })
        .await
        .map_err(|e| RegistryError::Task(e.to_string()))??;

        tracing::debug!(path = %self.path.display(), jobs = jobs.len(), "Job list loaded");
        Ok(jobs)
    }

    /// Replace the stored list with `jobs`.
    pub async fn store(&self, jobs: &[Job]) -> Result<(), RegistryError> {
        let _guard = self.write_mutex.lock().await;

        let path = self.path.clone();
        let lock_path = self.lock_path();
        let jobs = jobs.to_vec();
        let stored = tokio::task::spawn_blocking(move || -> Result<usize, RegistryError> {
            let lock = open_lock(&path, &lock_path)?;
            lock.lock_exclusive().map_err(io_error(&lock_path))?;
            write_jobs(&path, jobs)
        })
        .await
        .map_err(|e| RegistryError::Task(e.to_string()))??;

        tracing::debug!(path = %self.path.display(), jobs = stored, "Job list stored");
        Ok(())
    }

    /// Drop the jobs with the given ids, returning how many were removed.
    /// The list is read and rewritten under one exclusive lock.
    pub async fn remove(&self, ids: &[String]) -> Result<usize, RegistryError> {
        let _guard = self.write_mutex.lock().await;

        let path = self.path.clone();
        let lock_path = self.lock_path();
        let ids: HashSet<String> = ids.iter().cloned().collect();
        let removed = tokio::task::spawn_blocking(move || -> Result<usize, RegistryError> {
            let lock = open_lock(&path, &lock_path)?;
            lock.lock_exclusive().map_err(io_error(&lock_path))?;

            let mut jobs = if path.exists() {
                read_jobs(&path)?
            } else {
                Vec::new()
            };
            let before = jobs.len();
            jobs.retain(|j| !ids.contains(&j.job_id));
            let removed = before - jobs.len();

            if removed > 0 {
                write_jobs(&path, jobs)?;
            }
            Ok(removed)
        })
        .await
        .map_err(|e| RegistryError::Task(e.to_string()))??;

        tracing::info!(path = %self.path.display(), removed, "Jobs removed from job list");
        Ok(removed)
    }
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> RegistryError + '_ {
    move |source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn open_lock(path: &Path, lock_path: &Path) -> Result<File, RegistryError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(io_error(lock_path))
}

fn read_jobs(path: &Path) -> Result<Vec<Job>, RegistryError> {
    let content = std::fs::read_to_string(path).map_err(io_error(path))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: JobList = serde_json::from_str(&content).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(list.jobs)
}

/// Stage `jobs` in a sibling temporary file and rename it over `path`. The
/// caller holds the exclusive lock. The temporary file is removed when the
/// write or the rename fails.
fn write_jobs(path: &Path, jobs: Vec<Job>) -> Result<usize, RegistryError> {
    let count = jobs.len();
    let content = serde_json::to_string_pretty(&JobList { jobs }).map_err(|source| {
        RegistryError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let temp_file_name = format!(
        "{}.tmp.{}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4()
    );
    let temp_path = path.with_file_name(temp_file_name);

    let staged =
        std::fs::write(&temp_path, &content).and_then(|()| std::fs::rename(&temp_path, path));
    if let Err(source) = staged {
        let _ = std::fs::remove_file(&temp_path);
        return Err(RegistryError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(count)
}
