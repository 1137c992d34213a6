/// Per-sample unaligned-contig statistics from SPAdes-style contig names.
use std::collections::HashSet;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use crate::config::defs::{UNALIGNED_SUMMARY_HEADER, UNALIGNED_SUMMARY_SUFFIX};
use crate::utils::file::{open_text_reader, remove_stale_output, sample_output_path};

lazy_static! {
    static ref CONTIG_RE: Regex = Regex::new(r"NODE_\d+_length_\d+_cov_[\d.]+").unwrap();
    static ref LENGTH_COV_RE: Regex = Regex::new(r"length_(\d+)_cov_([\d.]+)").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContigRecord {
    pub contig: String,
    pub length: f64,
    pub cov: f64,
}

impl ContigRecord {
    pub fn bases(&self) -> f64 {
        self.length * self.cov
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnalignedStats {
    pub sample_id: String,
    pub total_bases: f64,
    pub unaligned_bases: f64,
    pub unaligned_pct: f64,
}

impl UnalignedStats {
    pub fn to_record(&self) -> [String; 4] {
        [
            self.sample_id.clone(),
            (self.total_bases.round_ties_even() as i64).to_string(),
            (self.unaligned_bases.round_ties_even() as i64).to_string(),
            format!("{:.8}", self.unaligned_pct),
        ]
    }

    /// One CSV data row (no line terminator). Identifiers containing commas or
    /// quotes are quoted.
    pub fn to_csv_row(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        writer.write_record(&self.to_record())?;
        let bytes = writer.into_inner().map_err(|e| anyhow!("CSV buffer error: {}", e))?;
        let row = String::from_utf8(bytes)?;
        Ok(row.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Parses a contig record out of one alignment line, if the line names a contig.
/// Coverage strings that are not valid floats (e.g. `1.2.3`) are ignored.
pub fn parse_contig(line: &str) -> Option<ContigRecord> {
    let contig = CONTIG_RE.find(line)?.as_str();
    let caps = LENGTH_COV_RE.captures(contig)?;
    let length = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let cov = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some(ContigRecord { contig: contig.to_string(), length, cov })
}

/// Reads the set of unaligned contig names, one per line.
pub fn read_unaligned_contigs(path: &Path) -> Result<HashSet<String>> {
    let reader = open_text_reader(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let mut contigs = HashSet::new();
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() {
            contigs.insert(name.to_string());
        }
    }
    Ok(contigs)
}

/// Reads every contig record from an alignment summary TSV.
pub fn read_alignment_contigs(path: &Path) -> Result<Vec<ContigRecord>> {
    let reader = open_text_reader(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let mut records = Vec::new();
    for line in reader.lines() {
        if let Some(record) = parse_contig(&line?) {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn compute_unaligned_stats(sample_id: &str, records: &[ContigRecord], unaligned: &HashSet<String>) -> Result<UnalignedStats> {
    if records.is_empty() {
        return Err(anyhow!("No contigs parsed for {}", sample_id));
    }
    // Empty f64 sums are -0.0, which would print as "-0.00000000"
    let total_bases = records.iter().map(ContigRecord::bases).fold(0.0, |acc, b| acc + b);
    let unaligned_bases = records
        .iter()
        .filter(|r| unaligned.contains(&r.contig))
        .map(ContigRecord::bases)
        .fold(0.0, |acc, b| acc + b);
    let unaligned_pct = if total_bases > 0.0 { unaligned_bases / total_bases * 100.0 } else { 0.0 };

    Ok(UnalignedStats {
        sample_id: sample_id.to_string(),
        total_bases,
        unaligned_bases,
        unaligned_pct,
    })
}

/// Computes the unaligned summary for one sample and writes
/// `<out_dir>/<sample_id>_unaligned_summary.csv`.
///
/// # Arguments
///
/// * `sample_id` - Sample identifier, written as the first column.
/// * `unaligned_file` - List of unaligned contig names.
/// * `alignment_tsv` - Alignment summary containing contig names.
/// * `out_dir` - Output directory.
///
/// # Returns
/// Path of the written CSV.
pub fn write_unaligned_summary(sample_id: &str, unaligned_file: &Path, alignment_tsv: &Path, out_dir: &Path) -> Result<PathBuf> {
    let out_path = sample_output_path(out_dir, sample_id, UNALIGNED_SUMMARY_SUFFIX);
    remove_stale_output(&out_path).map_err(|e| anyhow!("Cannot remove stale {}: {}", out_path.display(), e))?;

    let unaligned = read_unaligned_contigs(unaligned_file)?;
    let records = read_alignment_contigs(alignment_tsv)?;
    let stats = compute_unaligned_stats(sample_id, &records, &unaligned)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(&out_path)
        .map_err(|e| anyhow!("Failed to create {}: {}", out_path.display(), e))?;
    writer.write_record(UNALIGNED_SUMMARY_HEADER.split(','))?;
    writer.write_record(&stats.to_record())?;
    writer.flush()?;
    Ok(out_path)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_contig() {
        let line = "1\t500\t1\t500\tref\tNODE_3_length_500_cov_10.5\t99.8";
        let record = parse_contig(line).unwrap();
        assert_eq!(record.contig, "NODE_3_length_500_cov_10.5");
        assert_eq!(record.length, 500.0);
        assert_eq!(record.cov, 10.5);
        assert_eq!(record.bases(), 5250.0);
        assert!(parse_contig("CONTIG\tunrelated").is_none());
    }

    #[test]
    fn test_compute_stats() -> Result<()> {
        let records = vec![
            parse_contig("NODE_1_length_100_cov_2.0").unwrap(),
            parse_contig("NODE_2_length_300_cov_1.0").unwrap(),
        ];
        let unaligned: HashSet<String> = ["NODE_2_length_300_cov_1.0".to_string()].into_iter().collect();
        let stats = compute_unaligned_stats("S1", &records, &unaligned)?;
        assert_eq!(stats.total_bases, 500.0);
        assert_eq!(stats.unaligned_bases, 300.0);
        assert_eq!(stats.to_csv_row()?, "S1,500,300,60.00000000");
        Ok(())
    }

    #[test]
    fn test_rounding_half_to_even() -> Result<()> {
        let stats = UnalignedStats { sample_id: "S".into(), total_bases: 2.5, unaligned_bases: 3.5, unaligned_pct: 0.0 };
        assert_eq!(stats.to_csv_row()?, "S,2,4,0.00000000");
        Ok(())
    }

    #[test]
    fn test_no_unaligned_contigs_is_positive_zero() -> Result<()> {
        let records = vec![parse_contig("NODE_1_length_10_cov_1.0").unwrap()];
        let stats = compute_unaligned_stats("S", &records, &HashSet::new())?;
        assert!(stats.unaligned_bases.is_sign_positive());
        assert_eq!(stats.to_csv_row()?, "S,10,0,0.00000000");
        Ok(())
    }

    #[test]
    fn test_sample_id_with_comma_is_quoted() -> Result<()> {
        let dir = tempdir()?;
        let unaligned = dir.path().join("u.txt");
        let alignments = dir.path().join("a.tsv");
        fs::write(&unaligned, "")?;
        fs::write(&alignments, "1\t10\t1\t10\tref\tNODE_1_length_10_cov_1.0\t100.0\n")?;

        let out = write_unaligned_summary("S1,rep2", &unaligned, &alignments, dir.path())?;
        let text = fs::read_to_string(out)?;
        assert_eq!(text, "sample_id,total_bases,unaligned_bases,unaligned_pct\n\"S1,rep2\",10,0,0.00000000\n");

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        assert_eq!(reader.headers()?.len(), 4);
        for record in reader.records() {
            let record = record?;
            assert_eq!(record.len(), 4);
            assert_eq!(&record[0], "S1,rep2");
        }
        Ok(())
    }

    #[test]
    fn test_failed_write_leaves_no_previous_output() -> Result<()> {
        let dir = tempdir()?;
        let stale = dir.path().join("S1_unaligned_summary.csv");
        fs::write(&stale, "sample_id,total_bases,unaligned_bases,unaligned_pct\nS1,1,1,100.00000000\n")?;
        let unaligned = dir.path().join("u.txt");
        let alignments = dir.path().join("a.tsv");
        fs::write(&unaligned, "")?;
        fs::write(&alignments, "no contigs here\n")?;

        assert!(write_unaligned_summary("S1", &unaligned, &alignments, dir.path()).is_err());
        assert!(!stale.exists());
        Ok(())
    }

    #[test]
    fn test_no_contigs_is_error() {
        let result = compute_unaligned_stats("S1", &[], &HashSet::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_write_unaligned_summary() -> Result<()> {
        let dir = tempdir()?;
        let unaligned = dir.path().join("S1.unaligned.info");
        let alignments = dir.path().join("all_alignments_S1.tsv");
        fs::write(&unaligned, "NODE_2_length_200_cov_3.0\n\n")?;
        fs::write(
            &alignments,
            "S1\tE1\tS2\tE2\tReference\tContig\tIDY\n\
             1\t100\t1\t100\tref\tNODE_1_length_100_cov_4.0\t100.0\n\
             CONTIG\tNODE_2_length_200_cov_3.0\t200\tunaligned\n",
        )?;

        let out = write_unaligned_summary("S1", &unaligned, &alignments, dir.path())?;
        assert_eq!(out, dir.path().join("S1_unaligned_summary.csv"));
        let text = fs::read_to_string(out)?;
        assert_eq!(text, "sample_id,total_bases,unaligned_bases,unaligned_pct\nS1,1000,600,60.00000000\n");
        Ok(())
    }
}
