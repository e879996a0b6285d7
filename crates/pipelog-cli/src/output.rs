//! Output formatting for CLI commands.
//!
//! Supports plain (human-readable) and JSON output formats.

use std::io::Write;

use pipelog::{CachedFiles, SearchResults};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value in human-readable form.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for CachedFiles {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Directory: {}", self.directory.display())?;
        writeln!(writer)?;

        if self.files.is_empty() {
            writeln!(writer, "No cached files")?;
        } else {
            writeln!(writer, "{:<24}  {:>12}  {:<20}", "FILE", "SIZE", "MODIFIED")?;
            writeln!(writer, "{}", "─".repeat(60))?;
            for file in &self.files {
                let modified = file
                    .modified_time
                    .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
                writeln!(
                    writer,
                    "{:<24}  {:>12}  {:<20}",
                    truncate(&file.file_name, 24),
                    file.size,
                    modified
                )?;
            }
            writeln!(writer)?;
            writeln!(writer, "Total: {} file(s)", self.files.len())?;
        }

        if let Some(summary) = &self.summary {
            writeln!(
                writer,
                "Downloaded {} log(s), {} bytes at {}",
                summary.total_logs,
                summary.total_bytes,
                summary.downloaded_at.format("%Y-%m-%d %H:%M:%S UTC")
            )?;
            for skipped in &summary.skipped {
                writeln!(writer, "  skipped log {}: {}", skipped.log_id, skipped.reason)?;
            }
        }
        Ok(())
    }
}

impl TableDisplay for SearchResults {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        for file in &self.matches {
            writeln!(writer, "{} ({} match(es))", file.file_name, file.match_count_in_file)?;
            for (i, m) in file.matches.iter().enumerate() {
                let has_context = m.before_context.is_some() || m.after_context.is_some();
                if has_context && i > 0 {
                    writeln!(writer, "--")?;
                }
                let before = m.before_context.as_deref().unwrap_or_default();
                let first = m.line_number - before.len();
                for (offset, line) in before.iter().enumerate() {
                    writeln!(writer, "{:>6}- {line}", first + offset)?;
                }
                writeln!(writer, "{:>6}: {}", m.line_number, m.line_text)?;
                for (offset, line) in m.after_context.iter().flatten().enumerate() {
                    writeln!(writer, "{:>6}- {line}", m.line_number + 1 + offset)?;
                }
            }
            writeln!(writer)?;
        }

        write!(
            writer,
            "Total: {} match(es) in {} of {} file(s)",
            self.total_matches,
            self.matches.len(),
            self.files_searched
        )?;
        if self.truncated {
            write!(writer, " (stopped at match limit)")?;
        }
        writeln!(writer)?;
        Ok(())
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{kept}...")
    }
}
