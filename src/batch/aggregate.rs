//! Writing batch results.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::JobOutcome;
use crate::error::Result;
use crate::model::{Row, Table, Value};

/// Column naming the format of each merged row.
pub const FORMAT_COLUMN: &str = "Format";

/// Column naming the job prefix of each merged row.
pub const REPORT_COLUMN: &str = "Report identifier";

/// File name of the merged table inside the output directory.
pub const MERGED_FILE: &str = "merged.csv";

/// Merge successful tables into one.
///
/// Columns are the union of the tables' columns in first-seen order,
/// followed by `Format` and, when any table carries a prefix, `Report
/// identifier`. Cells a table lacks are left empty.
pub fn merge<'a, I>(tables: I) -> Table
where
    I: IntoIterator<Item = (&'a Table, Option<&'a str>)>,
{
    let tables: Vec<(&Table, Option<&str>)> = tables.into_iter().collect();
    let with_report = tables.iter().any(|(_, prefix)| prefix.is_some());

    let mut columns: Vec<String> = Vec::new();
    for (table, _) in &tables {
        for column in &table.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }
    let data_columns = columns.len();
    columns.push(FORMAT_COLUMN.to_string());
    if with_report {
        columns.push(REPORT_COLUMN.to_string());
    }

    let mut merged = Table::new("", columns);
    for (table, prefix) in tables {
        let positions: Vec<usize> = table
            .columns
            .iter()
            .filter_map(|c| merged.column_index(c))
            .collect();
        for row in &table.rows {
            let mut cells: Vec<Option<Value>> = vec![None; data_columns];
            for (value, &pos) in row.cells.iter().zip(&positions) {
                cells[pos] = value.clone();
            }
            cells.push(Some(Value::Text(table.format.clone())));
            if with_report {
                cells.push(prefix.map(|p| Value::Text(p.to_string())));
            }
            merged.push(Row::new(cells));
        }
    }
    merged
}

/// Name of a separate output file: `{prefix}-{format}.csv` or `{format}.csv`.
pub fn separate_file_name(prefix: Option<&str>, format: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}-{}.csv", prefix, format),
        None => format!("{}.csv", format),
    }
}

/// Write the successful jobs as one `merged.csv` in `dir`.
pub fn write_merged(dir: &Path, outcomes: &[JobOutcome]) -> Result<PathBuf> {
    let merged = merge(
        outcomes
            .iter()
            .filter_map(|o| o.table().map(|t| (t, o.prefix.as_deref()))),
    );
    let path = dir.join(MERGED_FILE);
    merged.write_csv(BufWriter::new(File::create(&path)?))?;
    log::info!("{} rows written to {}", merged.len(), path.display());
    Ok(path)
}

/// Write every successful job to its own file in `dir`.
///
/// A name already used by an earlier job gets the job's 1-based position
/// appended (`EURIZON-3.csv`).
pub fn write_separate(dir: &Path, outcomes: &[JobOutcome]) -> Result<Vec<PathBuf>> {
    let mut used = HashSet::new();
    let mut written = Vec::new();
    for outcome in outcomes {
        let Some(table) = outcome.table() else {
            continue;
        };
        let mut name = separate_file_name(outcome.prefix.as_deref(), &table.format);
        if used.contains(&name) {
            name = numbered_name(&name, outcome.index + 1, |n| used.contains(n));
            log::warn!("Output name already used, writing job {} to {}", outcome.index + 1, name);
        }
        used.insert(name.clone());
        let path = dir.join(&name);
        table.write_csv(BufWriter::new(File::create(&path)?))?;
        log::info!("{} rows written to {}", table.len(), path.display());
        written.push(path);
    }
    Ok(written)
}

/// `name` with `-<number>` inserted before its extension. The number is
/// increased until `taken` accepts the candidate.
pub fn numbered_name<F>(name: &str, number: usize, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    (number..)
        .map(|n| format!("{}-{}{}", stem, n, ext))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| format!("{}-{}{}", stem, number, ext))
}
