//! Fetch command implementation.

use std::io::Write;

use pipelog::LogService;

use crate::cli::RunRef;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the fetch command.
pub struct FetchCommand<'a> {
    service: &'a LogService,
}

impl<'a> FetchCommand<'a> {
    /// Creates a new fetch command handler.
    #[must_use]
    pub const fn new(service: &'a LogService) -> Self {
        Self { service }
    }

    /// Resolves the run and prints what is cached for it.
    ///
    /// # Errors
    ///
    /// Returns error if the run cannot be downloaded or listed.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        run: &RunRef,
    ) -> Result<(), CliError> {
        let files = self
            .service
            .run_files(&run.project, run.pipeline_id, run.run_id)
            .await?;
        format.write(out, &files)
    }
}
