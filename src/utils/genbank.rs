/// Minimal GenBank reader: sequence length and the feature table.
use std::io::BufRead;
use std::path::Path;
use anyhow::{anyhow, Result};
use crate::utils::file::open_text_reader;

const FEATURE_INDENT: usize = 21;

/// 0-based half-open interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub kind: String,
    pub parts: Vec<Span>,
    pub complement: bool,
    pub qualifiers: Vec<(String, String)>,
}

impl Feature {
    pub fn qualifier(&self, key: &str) -> Option<&str> {
        self.qualifiers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn start(&self) -> usize {
        self.parts.iter().map(|p| p.start).min().unwrap_or(0)
    }

    pub fn end(&self) -> usize {
        self.parts.iter().map(|p| p.end).max().unwrap_or(0)
    }

    /// True for multi-part features listed across the origin, e.g. `join(900..1000,1..50)`.
    pub fn wraps_origin(&self) -> bool {
        self.parts.windows(2).any(|w| w[1].start < w[0].start)
    }

    /// Number of bases covered by the feature.
    pub fn size(&self) -> usize {
        if self.wraps_origin() {
            self.parts.iter().map(Span::len).sum()
        } else {
            self.end() - self.start()
        }
    }

    /// Midpoint of the feature in sequence coordinates, following the feature
    /// across the origin when it wraps.
    pub fn midpoint(&self, seq_len: usize) -> f64 {
        if self.wraps_origin() && seq_len > 0 {
            let first = self.parts[0].start as f64;
            (first + self.size() as f64 / 2.0) % seq_len as f64
        } else {
            (self.start() + self.end()) as f64 / 2.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenomeMap {
    pub name: String,
    pub length: usize,
    pub features: Vec<Feature>,
}

/// Parses a GenBank location string into spans.
///
/// Handles `a..b`, single bases, `a^b`, `complement(...)`, `join(...)`/`order(...)`
/// and fuzzy `<`/`>` markers. Remote references (`ACC:1..5`) are rejected.
pub fn parse_location(location: &str) -> Result<(Vec<Span>, bool)> {
    let compact: String = location.chars().filter(|c| !c.is_whitespace()).collect();
    let complement = compact.contains("complement(");
    let inner = compact
        .replace("complement(", "")
        .replace("join(", "")
        .replace("order(", "")
        .replace(')', "");

    let mut parts = Vec::new();
    for piece in inner.split(',').filter(|p| !p.is_empty()) {
        if piece.contains(':') {
            return Err(anyhow!("Remote location '{}' is not supported", piece));
        }
        let cleaned: String = piece.chars().filter(|c| *c != '<' && *c != '>').collect();
        let (a, b) = match cleaned.split_once("..") {
            Some((a, b)) => (a.to_string(), b.to_string()),
            None => match cleaned.split_once('^') {
                Some((a, _)) => (a.to_string(), a.to_string()),
                None => (cleaned.clone(), cleaned.clone()),
            },
        };
        let start: usize = a.parse().map_err(|_| anyhow!("Invalid location '{}'", location))?;
        let end: usize = b.parse().map_err(|_| anyhow!("Invalid location '{}'", location))?;
        if start == 0 || end < start {
            return Err(anyhow!("Invalid location '{}'", location));
        }
        parts.push(Span { start: start - 1, end });
    }
    if parts.is_empty() {
        return Err(anyhow!("Empty location '{}'", location));
    }
    Ok((parts, complement))
}

fn push_qualifier(feature: &mut Feature, raw: &str) {
    let raw = raw.trim_start_matches('/');
    let (key, value) = match raw.split_once('=') {
        Some((k, v)) => (k.to_string(), v.trim_matches('"').to_string()),
        None => (raw.to_string(), String::new()),
    };
    feature.qualifiers.push((key, value));
}

struct PendingFeature {
    kind: String,
    location: String,
    qualifiers: Vec<String>,
}

impl PendingFeature {
    fn finish(self) -> Result<Feature> {
        let (parts, complement) = parse_location(&self.location)?;
        let mut feature = Feature { kind: self.kind, parts, complement, qualifiers: Vec::new() };
        for raw in &self.qualifiers {
            push_qualifier(&mut feature, raw);
        }
        Ok(feature)
    }
}

enum Section {
    Header,
    Features,
    Origin,
}

/// Reads the first record of a GenBank file.
///
/// # Arguments
///
/// * `path` - GenBank file, optionally gzipped.
///
/// # Returns
/// GenomeMap with the LOCUS length (or the counted ORIGIN residues when the
/// LOCUS line carries no length) and every parsable feature.
pub fn read_genbank(path: &Path) -> Result<GenomeMap> {
    let reader = open_text_reader(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;

    let mut name = String::new();
    let mut locus_length: Option<usize> = None;
    let mut origin_residues = 0usize;
    let mut features = Vec::new();
    let mut pending: Option<PendingFeature> = None;
    let mut section = Section::Header;

    for line in reader.lines() {
        let line = line?;
        if line.starts_with("//") {
            break;
        }
        if line.starts_with("LOCUS") {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            name = tokens.get(1).map(|s| s.to_string()).unwrap_or_default();
            locus_length = tokens
                .windows(2)
                .find(|w| w[1] == "bp" || w[1] == "aa")
                .and_then(|w| w[0].parse().ok());
            continue;
        }
        if line.starts_with("FEATURES") {
            section = Section::Features;
            continue;
        }
        if line.starts_with("ORIGIN") {
            if let Some(p) = pending.take() {
                features.push(p.finish()?);
            }
            section = Section::Origin;
            continue;
        }

        match section {
            Section::Header => {}
            Section::Origin => {
                origin_residues += line.chars().filter(|c| c.is_ascii_alphabetic()).count();
            }
            Section::Features => {
                // Any other top-level keyword ends the feature table
                if !line.starts_with(' ') {
                    if let Some(p) = pending.take() {
                        features.push(p.finish()?);
                    }
                    section = Section::Header;
                    continue;
                }
                let key_field = line.get(..FEATURE_INDENT.min(line.len())).unwrap_or("").trim();
                let rest = line.get(FEATURE_INDENT..).unwrap_or("").trim();
                if !key_field.is_empty() {
                    if let Some(p) = pending.take() {
                        features.push(p.finish()?);
                    }
                    let (kind, location) = match line.trim().split_once(char::is_whitespace) {
                        Some((k, loc)) => (k.to_string(), loc.trim().to_string()),
                        None => (key_field.to_string(), String::new()),
                    };
                    pending = Some(PendingFeature { kind, location, qualifiers: Vec::new() });
                } else if let Some(p) = pending.as_mut() {
                    if rest.starts_with('/') {
                        p.qualifiers.push(rest.to_string());
                    } else if let Some(last) = p.qualifiers.last_mut() {
                        last.push(' ');
                        last.push_str(rest);
                    } else {
                        p.location.push_str(rest);
                    }
                }
            }
        }
    }
    if let Some(p) = pending.take() {
        features.push(p.finish()?);
    }

    let length = locus_length.filter(|l| *l > 0).unwrap_or(origin_residues);
    if length == 0 {
        return Err(anyhow!("{} has no sequence length", path.display()));
    }
    Ok(GenomeMap { name, length, features })
}
