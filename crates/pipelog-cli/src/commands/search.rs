//! Search command implementation.

use std::io::Write;

use pipelog::{LogService, SearchOptions};

use crate::cli::SearchArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the search command.
pub struct SearchCommand<'a> {
    service: &'a LogService,
}

impl<'a> SearchCommand<'a> {
    /// Creates a new search command handler.
    #[must_use]
    pub const fn new(service: &'a LogService) -> Self {
        Self { service }
    }

    /// Runs the search and prints the matches.
    ///
    /// # Errors
    ///
    /// Returns error if the options are invalid, the run cannot be resolved
    /// or a log cannot be read.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &SearchArgs,
    ) -> Result<(), CliError> {
        let results = self
            .service
            .search_logs(
                &args.run.project,
                args.run.pipeline_id,
                args.run.run_id,
                &args.pattern,
                &search_options(args),
            )
            .await?;
        format.write(out, &results)
    }
}

/// Translates command-line flags into search options.
#[must_use]
pub fn search_options(args: &SearchArgs) -> SearchOptions {
    let context = args.context.unwrap_or(0);
    let mut options = SearchOptions::new()
        .with_ignore_case(args.ignore_case)
        .with_invert_match(args.invert_match)
        .with_before_context(args.before_context.unwrap_or(context))
        .with_after_context(args.after_context.unwrap_or(context));
    if let Some(max) = args.max_matches {
        options = options.with_max_matches(max);
    }
    if !args.log_ids.is_empty() {
        options = options.with_log_ids(args.log_ids.iter().copied());
    }
    options
}
