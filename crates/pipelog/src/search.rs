//! Regex search across the cached logs of a run.
//!
//! Files are scanned in ascending log-id order and lines in ascending order,
//! so results are deterministic regardless of how the files were fetched.
//! The match cap is global: once it is reached nothing else is read.

use std::ops::Range;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::{LogError, Result};
use crate::paths::{log_file_name, parse_log_file_name};
use crate::reader::{read_log_text, split_lines};
use crate::types::{FileMatches, LogId, SearchMatch, SearchOptions, SearchResults};

/// Compiles `pattern` honoring the case option.
///
/// # Errors
///
/// Returns [`LogError::InvalidPattern`] for malformed patterns.
pub fn compile_pattern(pattern: &str, options: &SearchOptions) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern)
        .case_insensitive(options.ignore_case)
        .build()?)
}

/// Searches the logs in `dir` for `pattern`.
///
/// The pattern and options are checked before any file is touched. When
/// `options.log_ids` is set only those logs are read; requested logs that
/// are not cached are skipped.
///
/// # Errors
///
/// Returns a validation error for bad options or patterns, or an I/O error
/// if the directory cannot be listed or a log cannot be read.
pub async fn search(dir: &Path, pattern: &str, options: &SearchOptions) -> Result<SearchResults> {
    options.validate()?;
    let regex = compile_pattern(pattern, options)?;

    let ids = match &options.log_ids {
        Some(ids) => {
            let mut ids = ids.clone();
            ids.sort_unstable();
            ids.dedup();
            ids
        }
        None => discover_logs(dir).await?,
    };

    let mut results = SearchResults::default();
    for log_id in ids {
        let remaining = options
            .max_matches
            .map(|max| max.saturating_sub(results.total_matches));
        if remaining == Some(0) {
            results.truncated = true;
            break;
        }

        let text = match read_log_text(dir, log_id).await {
            Ok(text) => text,
            Err(LogError::LogFileNotFound { path, .. }) => {
                debug!(log_id = %log_id, path = %path.display(), "requested log not cached, skipping");
                continue;
            }
            Err(e) => return Err(e),
        };
        results.files_searched += 1;

        let matches = scan_lines(&split_lines(&text), &regex, options, remaining);
        if matches.is_empty() {
            continue;
        }
        results.total_matches += matches.len();
        results.matches.push(FileMatches {
            log_id,
            file_name: log_file_name(log_id),
            match_count_in_file: matches.len(),
            matches,
        });
    }

    if options.max_matches == Some(results.total_matches) {
        results.truncated = true;
    }

    debug!(
        dir = %dir.display(),
        pattern,
        files = results.files_searched,
        matches = results.total_matches,
        truncated = results.truncated,
        "search finished"
    );
    Ok(results)
}

/// Log ids present in `dir`, ascending and unique.
async fn discover_logs(dir: &Path) -> Result<Vec<LogId>> {
    let mut ids = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(id) = entry.file_name().to_str().and_then(parse_log_file_name) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(ids)
}

/// Scans one file's lines, stopping after `limit` hits.
fn scan_lines(
    lines: &[&str],
    regex: &Regex,
    options: &SearchOptions,
    limit: Option<usize>,
) -> Vec<SearchMatch> {
    let (before, after) = (options.before_context, options.after_context);
    let mut matches = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if limit == Some(matches.len()) {
            break;
        }
        if regex.is_match(line) == options.invert_match {
            continue;
        }
        let after_end = index.saturating_add(1 + after).min(lines.len());
        matches.push(SearchMatch {
            line_number: index + 1,
            line_text: (*line).to_string(),
            before_context: context(lines, index.saturating_sub(before)..index, before),
            after_context: context(lines, index + 1..after_end, after),
        });
    }
    matches
}

fn context(lines: &[&str], range: Range<usize>, requested: usize) -> Option<Vec<String>> {
    (requested > 0).then(|| lines[range].iter().map(|l| (*l).to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    const SAMPLE: &str = "start\nERROR: x\nmid\nERROR: y\nend\n";

    fn run_dir(files: &[(u32, &str)]) -> TempDir {
        let dir = TempDir::new().expect("create temp dir");
        for (id, body) in files {
            std::fs::write(dir.path().join(log_file_name(LogId(*id))), body).expect("write log");
        }
        dir
    }

    fn line_numbers(results: &SearchResults) -> Vec<(u32, usize)> {
        results
            .matches
            .iter()
            .flat_map(|f| f.matches.iter().map(move |m| (f.log_id.0, m.line_number)))
            .collect()
    }

    fn strings(lines: &[&str]) -> Option<Vec<String>> {
        Some(lines.iter().map(|l| (*l).to_string()).collect())
    }

    #[tokio::test]
    async fn matches_with_context() {
        let dir = run_dir(&[(1, SAMPLE)]);
        let options = SearchOptions::new().with_context(1);

        let results = search(dir.path(), "ERROR", &options).await.expect("search");

        assert_eq!(results.total_matches, 2);
        assert_eq!(results.files_searched, 1);
        assert!(!results.truncated);
        let file = &results.matches[0];
        assert_eq!(file.file_name, "log-001.txt");
        assert_eq!(file.match_count_in_file, 2);
        assert_eq!(file.matches[0].line_number, 2);
        assert_eq!(file.matches[0].before_context, strings(&["start"]));
        assert_eq!(file.matches[0].after_context, strings(&["mid"]));
        assert_eq!(file.matches[1].line_number, 4);
        assert_eq!(file.matches[1].before_context, strings(&["mid"]));
        assert_eq!(file.matches[1].after_context, strings(&["end"]));
    }

    #[tokio::test]
    async fn inverted_search_stops_at_cap() {
        let dir = run_dir(&[(1, SAMPLE), (2, "later\n")]);
        let options = SearchOptions::new()
            .with_invert_match(true)
            .with_max_matches(2);

        let results = search(dir.path(), "ERROR", &options).await.expect("search");

        assert_eq!(line_numbers(&results), vec![(1, 1), (1, 3)]);
        assert_eq!(results.total_matches, 2);
        assert_eq!(results.files_searched, 1);
        assert!(results.truncated);
    }

    #[tokio::test]
    async fn cap_spans_files() {
        let dir = run_dir(&[(1, "hit\nmiss\n"), (2, "hit\nhit\n"), (3, "hit\n")]);
        let options = SearchOptions::new().with_max_matches(2);

        let results = search(dir.path(), "hit", &options).await.expect("search");

        assert_eq!(line_numbers(&results), vec![(1, 1), (2, 1)]);
        assert_eq!(results.matches[1].match_count_in_file, 1);
        assert!(results.truncated);
    }

    #[tokio::test]
    async fn no_context_fields_unless_requested() {
        let dir = run_dir(&[(1, SAMPLE)]);

        let results = search(dir.path(), "mid", &SearchOptions::new())
            .await
            .expect("search");

        let m = &results.matches[0].matches[0];
        assert!(m.before_context.is_none());
        assert!(m.after_context.is_none());
    }

    #[test_case(0, 1, &[], &["b"] ; "first line")]
    #[test_case(4, 3, &["b", "c", "d"], &[] ; "last line")]
    #[test_case(1, 10, &["a"], &["c", "d", "e"] ; "wide context clamps")]
    fn context_is_clamped(index: usize, n: usize, before: &[&str], after: &[&str]) {
        let lines = ["a", "b", "c", "d", "e"];
        let regex = Regex::new(&format!("^{}$", lines[index])).expect("regex");
        let options = SearchOptions::new().with_context(n);

        let matches = scan_lines(&lines, &regex, &options, None);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].before_context, strings(before));
        assert_eq!(matches[0].after_context, strings(after));
    }

    #[tokio::test]
    async fn ignore_case() {
        let dir = run_dir(&[(1, "Error one\nerror two\nok\n")]);

        let sensitive = search(dir.path(), "ERROR", &SearchOptions::new())
            .await
            .expect("search");
        let insensitive = search(dir.path(), "ERROR", &SearchOptions::new().with_ignore_case(true))
            .await
            .expect("search");

        assert_eq!(sensitive.total_matches, 0);
        assert!(sensitive.matches.is_empty());
        assert_eq!(sensitive.files_searched, 1);
        assert_eq!(insensitive.total_matches, 2);
    }

    #[tokio::test]
    async fn files_reported_in_id_order() {
        let dir = run_dir(&[(10, "x\n"), (2, "x\n"), (7, "y\n"), (1, "x\n")]);
        std::fs::write(dir.path().join("summary.json"), "x").expect("write");
        std::fs::write(dir.path().join("log-abc.txt"), "x").expect("write");

        let results = search(dir.path(), "x", &SearchOptions::new())
            .await
            .expect("search");

        let ids: Vec<u32> = results.matches.iter().map(|f| f.log_id.0).collect();
        assert_eq!(ids, vec![1, 2, 10]);
        assert_eq!(results.files_searched, 4);
    }

    #[tokio::test]
    async fn unpadded_alias_does_not_search_a_log_twice() {
        let dir = run_dir(&[(1, SAMPLE)]);
        std::fs::write(dir.path().join("log-1.txt"), SAMPLE).expect("write");

        let results = search(dir.path(), "ERROR", &SearchOptions::new())
            .await
            .expect("search");

        assert_eq!(results.files_searched, 1);
        assert_eq!(results.total_matches, 2);
        assert_eq!(line_numbers(&results), vec![(1, 2), (1, 4)]);
    }

    #[tokio::test]
    async fn explicit_log_ids_restrict_and_skip_missing() {
        let dir = run_dir(&[(1, "x\n"), (2, "x\n"), (3, "x\n")]);
        let options = SearchOptions::new().with_log_ids([3, 1, 9, 3]);

        let results = search(dir.path(), "x", &options).await.expect("search");

        let ids: Vec<u32> = results.matches.iter().map(|f| f.log_id.0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(results.files_searched, 2);
    }

    #[tokio::test]
    async fn bad_pattern_fails_before_io() {
        let missing = Path::new("/definitely/not/a/run/dir");

        let err = search(missing, "(unclosed", &SearchOptions::new())
            .await
            .expect_err("must fail");

        assert!(matches!(err, LogError::InvalidPattern(_)));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn bad_options_fail_before_io() {
        let missing = Path::new("/definitely/not/a/run/dir");

        let err = search(missing, "x", &SearchOptions::new().with_before_context(11))
            .await
            .expect_err("must fail");

        assert!(matches!(err, LogError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_directory_is_io_error() {
        let dir = TempDir::new().expect("create temp dir");

        let err = search(&dir.path().join("gone"), "x", &SearchOptions::new())
            .await
            .expect_err("must fail");

        assert!(matches!(err, LogError::Io(_)));
    }

    #[tokio::test]
    async fn repeated_search_is_identical() {
        let dir = run_dir(&[(1, SAMPLE), (2, "ERROR: z\n")]);
        let options = SearchOptions::new().with_context(2).with_ignore_case(true);

        let first = search(dir.path(), "error", &options).await.expect("search");
        let second = search(dir.path(), "error", &options).await.expect("search");

        assert_eq!(
            serde_json::to_vec(&first).expect("serialize"),
            serde_json::to_vec(&second).expect("serialize")
        );
    }
}
