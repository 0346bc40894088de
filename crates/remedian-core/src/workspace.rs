//! Scoped working-directory changes.
//!
//! The working directory is process-wide state; when the pipeline
//! operates on a cloned target it changes directory through this guard,
//! which restores the caller's original directory on every exit path,
//! including panics, via `Drop`.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::WorkspaceError;

/// RAII guard around a directory change.
#[derive(Debug)]
pub struct Workspace {
    original: PathBuf,
    target: PathBuf,
}

impl Workspace {
    /// Change into `target`, remembering the current directory.
    pub fn enter(target: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let target = target.as_ref().to_path_buf();
        let original = env::current_dir().map_err(|err| WorkspaceError::Enter {
            path: target.display().to_string(),
            detail: format!("could not resolve current directory: {err}"),
        })?;
        env::set_current_dir(&target).map_err(|err| WorkspaceError::Enter {
            path: target.display().to_string(),
            detail: err.to_string(),
        })?;
        Ok(Self { original, target })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(err) = env::set_current_dir(&self.original) {
            tracing::warn!(
                original = %self.original.display(),
                detail = %err,
                "failed to restore original working directory"
            );
        }
    }
}
