//! Invalidate command implementation.

use std::io::Write;

use pipelog::{CacheKey, StoragePaths, purge_run};
use serde::Serialize;

use crate::cli::RunRef;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for the invalidate command.
///
/// Works on the cache directory alone; no service URL is needed.
pub struct InvalidateCommand<'a> {
    paths: &'a StoragePaths,
}

impl<'a> InvalidateCommand<'a> {
    /// Creates a new invalidate command handler.
    #[must_use]
    pub const fn new(paths: &'a StoragePaths) -> Self {
        Self { paths }
    }

    /// Deletes the run's cached directory.
    ///
    /// # Errors
    ///
    /// Returns error if the ids are invalid or the directory cannot be removed.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        run: &RunRef,
    ) -> Result<(), CliError> {
        let key = CacheKey::new(&run.project, run.pipeline_id, run.run_id)?;
        let removed = purge_run(self.paths, &key).await?;
        let output = InvalidateOutput {
            project: run.project.clone(),
            pipeline_id: run.pipeline_id,
            run_id: run.run_id,
            removed,
        };
        format.write(out, &output)
    }
}

/// Result of an invalidate command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateOutput {
    /// Project name.
    pub project: String,
    /// Pipeline id.
    pub pipeline_id: u64,
    /// Run id.
    pub run_id: u64,
    /// Whether anything was cached.
    pub removed: bool,
}

impl TableDisplay for InvalidateOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let run = format!("{}/{}/{}", self.project, self.pipeline_id, self.run_id);
        if self.removed {
            writeln!(writer, "Removed cached logs for {run}")?;
        } else {
            writeln!(writer, "Nothing cached for {run}")?;
        }
        Ok(())
    }
}
