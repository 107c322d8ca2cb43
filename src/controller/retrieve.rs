use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::config::Credentials;
use crate::controller::urls::join_path;
use crate::error::{GridError, Result};
use crate::remote::{bounded, DataMover};

/// Everything a controller needs to copy a job's remote directory home.
pub struct Download<'a> {
    pub mover: &'a dyn DataMover,
    pub credentials: &'a Credentials,
    pub timeout: Duration,
}

/// Local directory a job's files are downloaded into: `download_dir/<name>`.
pub fn job_download_dir(download_dir: &Path, name: &str) -> Result<PathBuf> {
    if !is_contained(name) {
        return Err(GridError::InvalidJobId(name.to_string()));
    }
    Ok(std::path::absolute(download_dir)?.join(name))
}

/// A listed path that stays below the download directory.
fn is_contained(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl Download<'_> {
    /// Copy every file below `source` into `destination`, keeping relative
    /// paths, and return how many were copied.
    ///
    /// A host-level failure aborts at once. Any other failure is logged and
    /// the remaining files are still attempted; the job then reports
    /// [`GridError::IncompleteDownload`].
    pub async fn directory(&self, job_id: &str, source: &Url, destination: &Path) -> Result<usize> {
        let files = bounded(
            self.timeout,
            "directory listing",
            self.mover.list(source, self.credentials),
        )
        .await?;
        tokio::fs::create_dir_all(destination).await?;
        tracing::debug!(%job_id, source = %source, files = files.len(), "Downloading job files");

        let mut failed = 0;
        for file in &files {
            if !is_contained(file) {
                tracing::warn!(%job_id, file = %file, "Listed path escapes the job directory");
                failed += 1;
                continue;
            }

            let local = destination.join(file);
            if let Some(parent) = local.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let remote = join_path(source, file);
            let target = Url::from_file_path(&local).map_err(|_| {
                GridError::Internal(format!("{} is not an absolute path", local.display()))
            })?;

            match bounded(
                self.timeout,
                "file download",
                self.mover.transfer(&remote, &target, self.credentials),
            )
            .await
            {
                Ok(()) => {}
                Err(e) if e.is_host_level() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(%job_id, source = %remote, error = %e, "Failed downloading file");
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            return Err(GridError::IncompleteDownload {
                job_id: job_id.to_string(),
                failed,
                total: files.len(),
            });
        }
        Ok(files.len())
    }
}
