//! Scratch directory for generated chart files.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ReportResult;

/// Directory owned by one report run.
///
/// `reset` clears and recreates it at the start of a run; files stay until
/// the next reset or an explicit `teardown`.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reset(&self) -> ReportResult<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        std::fs::create_dir_all(&self.root)?;
        debug!("Scratch directory ready at {}", self.root.display());
        Ok(())
    }

    /// `<root>/<subsection>.<extension>`
    pub fn path_for(&self, subsection: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{}.{}", subsection, extension))
    }

    pub fn teardown(&self) -> ReportResult<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        Ok(())
    }

    /// Files currently in the directory, sorted.
    pub fn files(&self) -> ReportResult<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut files = std::fs::read_dir(&self.root)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        files.sort();
        Ok(files)
    }
}
