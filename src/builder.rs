use rayon::prelude::*;
use url::Url;

use crate::error::RowError;
use crate::tree::UrlTree;

/// A row that was left out of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based position in the input
    pub line: usize,
    pub row: String,
    pub reason: RowError,
}

/// Result of a build: the tree plus a diagnostic per malformed row
pub struct BuildOutcome {
    pub tree: UrlTree,
    pub skipped: Vec<SkippedRow>,
}

/// Split a row into its non-empty, still percent-encoded path segments.
pub fn url_segments(row: &str) -> Result<Vec<String>, RowError> {
    let url = Url::parse(row)?;
    Ok(url
        .path()
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect())
}

/// Builds a `UrlTree` from raw rows.
///
/// Rows are parsed in parallel but inserted strictly in input order, so the
/// resulting child order is first-appearance order.
pub struct TreeBuilder;

impl TreeBuilder {
    pub fn build<S>(rows: &[S]) -> BuildOutcome
    where
        S: AsRef<str> + Sync,
    {
        let parsed: Vec<Option<Result<Vec<String>, RowError>>> = rows
            .par_iter()
            .map(|row| {
                let row = row.as_ref().trim();
                if row.is_empty() {
                    None
                } else {
                    Some(url_segments(row))
                }
            })
            .collect();

        let mut tree = UrlTree::new();
        let mut skipped = Vec::new();

        for (index, result) in parsed.into_iter().enumerate() {
            let line = index + 1;
            match result {
                None => log::debug!("Skipping blank row {}", line),
                Some(Ok(segments)) => {
                    tree.insert_path(&segments);
                }
                Some(Err(reason)) => {
                    let row = rows[index].as_ref().trim().to_string();
                    log::warn!("Skipping invalid URL on row {}: {:?} ({})", line, row, reason);
                    skipped.push(SkippedRow { line, row, reason });
                }
            }
        }

        log::info!(
            "Built URL tree: {} nodes from {} rows ({} skipped)",
            tree.len(),
            rows.len(),
            skipped.len()
        );

        BuildOutcome { tree, skipped }
    }
}
