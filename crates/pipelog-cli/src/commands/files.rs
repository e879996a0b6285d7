//! Files command implementation.

use std::io::Write;

use pipelog::{LogService, list_cached_files};

use crate::cli::FilesArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the files command.
///
/// With `--dir` no service is needed, so the handler holds it optionally.
pub struct FilesCommand<'a> {
    service: Option<&'a LogService>,
}

impl<'a> FilesCommand<'a> {
    /// Creates a new files command handler.
    #[must_use]
    pub const fn new(service: Option<&'a LogService>) -> Self {
        Self { service }
    }

    /// Lists a directory, or the directory of a resolved run.
    ///
    /// # Errors
    ///
    /// Returns error if the run cannot be resolved or the directory read.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &FilesArgs,
    ) -> Result<(), CliError> {
        let files = match (&args.dir, args.run(), self.service) {
            (Some(dir), _, _) => list_cached_files(dir).await?,
            (None, Some(run), Some(service)) => {
                service
                    .run_files(&run.project, run.pipeline_id, run.run_id)
                    .await?
            }
            (None, Some(_), None) => {
                return Err(CliError::Config(
                    "listing a run requires --base-url or PIPELOG_BASE_URL".into(),
                ));
            }
            (None, None, _) => {
                return Err(CliError::InvalidArgument(
                    "pass a run (project, pipeline, run) or --dir".into(),
                ));
            }
        };
        format.write(out, &files)
    }
}
