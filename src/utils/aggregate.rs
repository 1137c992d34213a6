/// Merging of per-sample CSV outputs into one report with a single header.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use crate::config::defs::PipelineError;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum HeaderPolicy {
    /// Every input header must equal the first one.
    #[default]
    Strict,
    /// Take the first header and skip the comparison.
    Trust,
}

#[derive(Debug, Default, PartialEq)]
pub struct MergedTable {
    pub header: String,
    pub rows: Vec<String>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl MergedTable {
    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(self.header.len() + self.rows.iter().map(|r| r.len() + 1).sum::<usize>() + 1);
        out.push_str(&self.header);
        out.push('\n');
        for row in &self.rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }
}

#[derive(Debug)]
pub struct AggregateSummary {
    pub report: PathBuf,
    pub inputs: usize,
    pub data_rows: usize,
    pub skipped: Vec<(PathBuf, String)>,
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
}

/// Merges in-memory tables: the header of the first non-empty input,
/// followed by every data line of every input.
///
/// # Arguments
///
/// * `sources` - (origin path, file contents) per successful sample.
/// * `report` - Report path, named in the error when nothing can be merged.
/// * `policy` - Whether headers are compared against the first one.
///
/// # Returns
/// Result<MergedTable, PipelineError>: EmptyAggregation when no input has a header,
/// HeaderMismatch under the strict policy.
pub fn merge_tables(sources: &[(PathBuf, String)], report: &Path, policy: HeaderPolicy) -> Result<MergedTable, PipelineError> {
    let mut header: Option<String> = None;
    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (path, text) in sources {
        let mut lines = non_blank_lines(text);
        let Some(first) = lines.next() else {
            warn!("{} is empty; not aggregated", path.display());
            skipped.push((path.clone(), "empty per-sample output".to_string()));
            continue;
        };

        match &header {
            None => header = Some(first.to_string()),
            Some(expected) if policy == HeaderPolicy::Strict && expected != first => {
                return Err(PipelineError::HeaderMismatch {
                    path: path.clone(),
                    expected: expected.clone(),
                    found: first.to_string(),
                });
            }
            Some(_) => {}
        }

        let before = rows.len();
        rows.extend(lines.map(str::to_string));
        debug!("{}: {} data rows", path.display(), rows.len() - before);
    }

    match header {
        Some(header) => Ok(MergedTable { header, rows, skipped }),
        None => Err(PipelineError::EmptyAggregation(report.to_path_buf())),
    }
}

/// Reads every per-sample CSV and writes the merged report.
/// The report is written to a temporary sibling and renamed into place.
///
/// # Arguments
///
/// * `inputs` - Per-sample CSV paths; all transforms must already have finished.
/// * `report` - Destination of the merged table.
/// * `policy` - Header comparison policy.
///
/// # Returns
/// AggregateSummary with counts and any inputs that were skipped.
pub fn aggregate_reports(inputs: &[PathBuf], report: &Path, policy: HeaderPolicy) -> Result<AggregateSummary, PipelineError> {
    if inputs.is_empty() {
        return Err(PipelineError::EmptyAggregation(report.to_path_buf()));
    }

    let mut sources = Vec::with_capacity(inputs.len());
    let mut unreadable = Vec::new();
    for path in inputs {
        match fs::read_to_string(path) {
            Ok(text) => sources.push((path.clone(), text)),
            Err(e) => {
                warn!("Cannot read {}: {}; not aggregated", path.display(), e);
                unreadable.push((path.clone(), e.to_string()));
            }
        }
    }

    let mut merged = merge_tables(&sources, report, policy)?;
    let inputs_used = sources.len() - merged.skipped.len();
    merged.skipped.extend(unreadable);

    let tmp = report.with_extension("csv.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(merged.to_csv().as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, report)?;

    let summary = AggregateSummary {
        report: report.to_path_buf(),
        inputs: inputs_used,
        data_rows: merged.rows.len(),
        skipped: merged.skipped,
    };
    info!("Wrote {} ({} rows from {} samples)", report.display(), summary.data_rows, summary.inputs);
    Ok(summary)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn src(name: &str, text: &str) -> (PathBuf, String) {
        (PathBuf::from(name), text.to_string())
    }

    #[test]
    fn test_merge_two_tables() -> Result<(), PipelineError> {
        let merged = merge_tables(&[src("a.csv", "h,v\n1,2"), src("b.csv", "h,v\n3,4")], Path::new("r.csv"), HeaderPolicy::Strict)?;
        assert_eq!(merged.header, "h,v");
        let mut rows = merged.rows.clone();
        rows.sort();
        assert_eq!(rows, vec!["1,2", "3,4"]);
        assert_eq!(merged.to_csv(), "h,v\n1,2\n3,4\n");
        Ok(())
    }

    #[test]
    fn test_line_count_property() -> Result<(), PipelineError> {
        let sources = vec![
            src("a.csv", "h,v\n1,2\n5,6\n"),
            src("b.csv", "h,v\r\n3,4\r\n"),
            src("c.csv", "h,v\n\n7,8\n\n"),
        ];
        let merged = merge_tables(&sources, Path::new("r.csv"), HeaderPolicy::Strict)?;
        let csv = merged.to_csv();
        assert_eq!(csv.lines().count(), 1 + 2 + 1 + 1);
        assert_eq!(csv.lines().filter(|l| *l == "h,v").count(), 1);
        assert!(!csv.contains("\n\n"));
        assert!(!csv.contains('\r'));
        Ok(())
    }

    #[test]
    fn test_zero_inputs_fails() {
        let result = merge_tables(&[], Path::new("r.csv"), HeaderPolicy::Strict);
        assert!(matches!(result, Err(PipelineError::EmptyAggregation(_))));

        let dir = tempdir().unwrap();
        let report = dir.path().join("r.csv");
        let result = aggregate_reports(&[], &report, HeaderPolicy::Strict);
        assert!(matches!(result, Err(PipelineError::EmptyAggregation(_))));
        assert!(!report.exists());
    }

    #[test]
    fn test_only_empty_inputs_fails() {
        let result = merge_tables(&[src("a.csv", ""), src("b.csv", "\n")], Path::new("r.csv"), HeaderPolicy::Strict);
        assert!(matches!(result, Err(PipelineError::EmptyAggregation(_))));
    }

    #[test]
    fn test_header_mismatch() {
        let sources = vec![src("a.csv", "h,v\n1,2"), src("b.csv", "h,w\n3,4")];
        let strict = merge_tables(&sources, Path::new("r.csv"), HeaderPolicy::Strict);
        match strict {
            Err(PipelineError::HeaderMismatch { path, .. }) => assert_eq!(path, PathBuf::from("b.csv")),
            other => panic!("Expected HeaderMismatch, got {:?}", other),
        }

        let trusted = merge_tables(&sources, Path::new("r.csv"), HeaderPolicy::Trust).unwrap();
        assert_eq!(trusted.header, "h,v");
        assert_eq!(trusted.rows.len(), 2);
    }

    #[test]
    fn test_empty_input_is_skipped() -> Result<(), PipelineError> {
        let merged = merge_tables(&[src("a.csv", ""), src("b.csv", "h,v\n3,4")], Path::new("r.csv"), HeaderPolicy::Strict)?;
        assert_eq!(merged.rows, vec!["3,4"]);
        assert_eq!(merged.skipped.len(), 1);
        Ok(())
    }

    #[test]
    fn test_aggregate_reports_writes_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let a = dir.path().join("S1_unaligned_summary.csv");
        let b = dir.path().join("S2_unaligned_summary.csv");
        fs::write(&a, "h,v\n1,2\n")?;
        fs::write(&b, "h,v\n3,4\n")?;
        let report = dir.path().join("all.csv");

        let summary = aggregate_reports(&[a, b], &report, HeaderPolicy::Strict)?;
        assert_eq!(summary.data_rows, 2);
        assert_eq!(summary.inputs, 2);
        let text = fs::read_to_string(&report)?;
        assert!(text.starts_with("h,v\n"));
        assert!(text.contains("1,2\n") && text.contains("3,4\n"));
        assert!(!dir.path().join("all.csv.tmp").exists());
        Ok(())
    }
}
