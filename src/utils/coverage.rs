/// Per-base coverage tables (`Position,TotalReads[,Mismatches]`).
use std::io::BufRead;
use std::path::Path;
use anyhow::{anyhow, Result};
use crate::utils::file::open_text_reader;

pub const POSITION_COLUMN: &str = "Position";
pub const TOTAL_READS_COLUMN: &str = "TotalReads";
pub const MISMATCHES_COLUMN: &str = "Mismatches";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoveragePoint {
    /// 1-based position
    pub pos: usize,
    pub total_reads: f64,
    pub mismatches: Option<f64>,
}

impl CoveragePoint {
    /// Mismatch rate, undefined where there are no reads.
    pub fn mismatch_rate(&self) -> Option<f64> {
        match self.mismatches {
            Some(m) if self.total_reads > 0.0 => Some(m / self.total_reads),
            _ => None,
        }
    }
}

fn column_index(header: &[&str], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim().trim_matches('"') == name)
}

fn parse_field(fields: &[&str], idx: usize, line_no: usize, path: &Path) -> Result<f64> {
    let raw = fields
        .get(idx)
        .ok_or_else(|| anyhow!("{}:{}: missing column {}", path.display(), line_no, idx + 1))?
        .trim();
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| anyhow!("{}:{}: invalid number '{}'", path.display(), line_no, raw))
}

fn parse_position(fields: &[&str], idx: usize, line_no: usize, path: &Path) -> Result<usize> {
    let raw = fields
        .get(idx)
        .ok_or_else(|| anyhow!("{}:{}: missing column {}", path.display(), line_no, idx + 1))?
        .trim();
    match raw.parse::<usize>() {
        Ok(pos) if pos >= 1 => Ok(pos),
        _ => Err(anyhow!("{}:{}: position must be a whole number >= 1, got '{}'", path.display(), line_no, raw)),
    }
}

/// Reads a per-base coverage CSV.
///
/// # Arguments
///
/// * `path` - CSV with at least `Position` and `TotalReads` columns.
///
/// # Returns
/// Coverage points in file order.
pub fn read_coverage(path: &Path) -> Result<Vec<CoveragePoint>> {
    let reader = open_text_reader(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let mut lines = reader.lines();

    let header_line = match lines.next() {
        Some(line) => line?,
        None => return Err(anyhow!("{} is empty", path.display())),
    };
    let header: Vec<&str> = header_line.split(',').collect();
    let pos_idx = column_index(&header, POSITION_COLUMN)
        .ok_or_else(|| anyhow!("{} has no {} column", path.display(), POSITION_COLUMN))?;
    let total_idx = column_index(&header, TOTAL_READS_COLUMN)
        .ok_or_else(|| anyhow!("{} has no {} column", path.display(), TOTAL_READS_COLUMN))?;
    let mismatch_idx = column_index(&header, MISMATCHES_COLUMN);

    let mut points = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = i + 2;
        let fields: Vec<&str> = line.split(',').collect();
        let pos = parse_position(&fields, pos_idx, line_no, path)?;
        let total_reads = parse_field(&fields, total_idx, line_no, path)?;
        let mismatches = match mismatch_idx {
            Some(idx) => Some(parse_field(&fields, idx, line_no, path)?),
            None => None,
        };
        points.push(CoveragePoint { pos, total_reads, mismatches });
    }

    if points.is_empty() {
        return Err(anyhow!("{} contains no coverage rows", path.display()));
    }
    Ok(points)
}
