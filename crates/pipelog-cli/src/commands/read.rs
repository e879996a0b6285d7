//! Read command implementation.

use std::io::Write;

use pipelog::{LogService, LogSlice};
use serde::Serialize;

use crate::cli::ReadArgs;
use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for the read command.
pub struct ReadCommand<'a> {
    service: &'a LogService,
}

impl<'a> ReadCommand<'a> {
    /// Creates a new read command handler.
    #[must_use]
    pub const fn new(service: &'a LogService) -> Self {
        Self { service }
    }

    /// Prints the requested log window.
    ///
    /// # Errors
    ///
    /// Returns error if the run cannot be resolved or the log is missing.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &ReadArgs,
    ) -> Result<(), CliError> {
        let slice = self
            .service
            .read_log(
                &args.run.project,
                args.run.pipeline_id,
                args.run.run_id,
                args.log_id,
                args.offset,
                args.limit,
            )
            .await?;
        let paginated = args.offset.is_some() || args.limit.is_some();
        let output = ReadOutput {
            log_id: args.log_id,
            offset: paginated.then(|| args.offset.unwrap_or(0)),
            slice,
        };
        format.write(out, &output)
    }
}

/// A log window together with where it starts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOutput {
    /// Log id.
    pub log_id: u32,
    /// First line of the window, when paginated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    /// The window itself.
    #[serde(flatten)]
    pub slice: LogSlice,
}

impl TableDisplay for ReadOutput {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        write!(writer, "{}", self.slice.content)?;
        if !self.slice.content.is_empty() && !self.slice.content.ends_with('\n') {
            writeln!(writer)?;
        }

        let Some(offset) = self.offset else {
            return Ok(());
        };
        if self.slice.line_count == 0 {
            writeln!(writer, "-- no lines at offset {offset} of {} --", self.slice.total_lines)?;
        } else {
            write!(
                writer,
                "-- lines {}-{} of {}",
                offset + 1,
                offset + self.slice.line_count,
                self.slice.total_lines
            )?;
            if self.slice.has_more {
                write!(writer, ", more after --offset {}", offset + self.slice.line_count)?;
            }
            writeln!(writer, " --")?;
        }
        Ok(())
    }
}
