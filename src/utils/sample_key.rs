/// Sample identifier extraction from file naming conventions.
use std::fmt;
use std::path::Path;
use crate::config::defs::GZIP_EXT;

/// Canonical per-sample key. May be empty when a base name equals its prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(String);

impl SampleId {
    pub fn new(id: impl Into<String>) -> Self {
        SampleId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleId {
    fn from(s: &str) -> Self {
        SampleId(s.to_string())
    }
}

/// Removes `prefix` from the start of `base` if present, otherwise returns `base` unchanged.
///
/// # Arguments
///
/// * `base` - File base name.
/// * `prefix` - Literal prefix of the input collection, e.g. `all_alignments_`.
///
/// # Returns
/// The sample identifier as a `&str` borrowed from `base`.
pub fn strip_sample_prefix<'a>(base: &'a str, prefix: &str) -> &'a str {
    base.strip_prefix(prefix).unwrap_or(base)
}

/// Naming rule for one input collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyRule {
    pub prefix: String,
    pub suffix: Option<String>,
}

impl KeyRule {
    pub fn new(prefix: &str, suffix: Option<&str>) -> Self {
        KeyRule {
            prefix: prefix.to_string(),
            suffix: suffix.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    pub fn extract(&self, base: &str) -> SampleId {
        let id = strip_sample_prefix(base, &self.prefix);
        let id = match &self.suffix {
            Some(suffix) => id.strip_suffix(suffix.as_str()).unwrap_or(id),
            None => id,
        };
        SampleId::new(id)
    }
}

/// Gets the base name of a file: the file name minus its final extension.
/// A trailing `.gz` is removed together with the extension underneath it.
///
/// # Arguments
///
/// * `path` - Path to an input artifact.
///
/// # Returns
/// Option<String>: None if the path has no file name component.
pub fn base_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    let gz = format!(".{}", GZIP_EXT);
    let name = match name.strip_suffix(gz.as_str()) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => name,
    };
    match name.rfind('.') {
        Some(0) | None => Some(name),
        Some(idx) => Some(name[..idx].to_string()),
    }
}
