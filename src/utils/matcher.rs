/// Pairing of two independently named artifact collections on sample identifier.
use std::path::{Path, PathBuf};
use fxhash::FxHashMap;
use log::{debug, warn};
use crate::config::defs::PipelineError;
use crate::utils::sample_key::{base_name, KeyRule, SampleId};

/// One input file tagged with the sample it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRef {
    pub sample_id: SampleId,
    pub path: PathBuf,
}

/// Identifier-indexed collection with at most one artifact per sample.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    pub name: String,
    artifacts: FxHashMap<SampleId, ArtifactRef>,
}

impl ArtifactSet {
    pub fn new(name: &str) -> Self {
        ArtifactSet {
            name: name.to_string(),
            artifacts: FxHashMap::default(),
        }
    }

    /// Adds an artifact; a second artifact for the same sample is a collision.
    pub fn insert(&mut self, artifact: ArtifactRef) -> Result<(), PipelineError> {
        if let Some(existing) = self.artifacts.get(&artifact.sample_id) {
            return Err(PipelineError::KeyCollision {
                collection: self.name.clone(),
                sample_id: artifact.sample_id.to_string(),
                first: existing.path.clone(),
                second: artifact.path,
            });
        }
        self.artifacts.insert(artifact.sample_id.clone(), artifact);
        Ok(())
    }

    /// Builds a collection from file paths using the collection's naming rule.
    ///
    /// # Arguments
    ///
    /// * `name` - Collection label used in logs and errors.
    /// * `paths` - Discovered input files.
    /// * `rule` - Prefix/suffix rule for extracting sample identifiers.
    ///
    /// # Returns
    /// Result<ArtifactSet, PipelineError>: KeyCollision if two files map to one sample.
    pub fn from_paths<P: AsRef<Path>>(name: &str, paths: &[P], rule: &KeyRule) -> Result<Self, PipelineError> {
        let mut set = ArtifactSet::new(name);
        for path in paths {
            let path = path.as_ref();
            let base = base_name(path).ok_or_else(|| {
                PipelineError::InvalidConfig(format!("Cannot derive a base name from {}", path.display()))
            })?;
            let sample_id = rule.extract(&base);
            debug!("{}: {} -> sample '{}'", name, path.display(), sample_id);
            set.insert(ArtifactRef { sample_id, path: path.to_path_buf() })?;
        }
        Ok(set)
    }

    pub fn get(&self, sample_id: &SampleId) -> Option<&ArtifactRef> {
        self.artifacts.get(sample_id)
    }

    pub fn contains(&self, sample_id: &SampleId) -> bool {
        self.artifacts.contains_key(sample_id)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn sample_ids(&self) -> impl Iterator<Item = &SampleId> {
        self.artifacts.keys()
    }
}

/// A sample present in both collections, with one artifact from each.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub sample_id: SampleId,
    pub left: ArtifactRef,
    pub right: ArtifactRef,
}

/// Limit on the number of matched pairs kept after the join.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MatchCap {
    #[default]
    Unlimited,
    /// Smoke testing only. Drops real samples when left on.
    DebugLimit(usize),
}

impl From<Option<usize>> for MatchCap {
    fn from(limit: Option<usize>) -> Self {
        match limit {
            Some(n) => MatchCap::DebugLimit(n),
            None => MatchCap::Unlimited,
        }
    }
}

#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub pairs: Vec<MatchedPair>,
    pub only_left: Vec<SampleId>,
    pub only_right: Vec<SampleId>,
    pub truncated: usize,
}

/// Inner join of two artifact collections on sample identifier.
/// Samples present in only one collection are excluded and logged.
///
/// # Arguments
///
/// * `left` - First collection (e.g. unaligned contigs).
/// * `right` - Second collection (e.g. alignment summaries).
/// * `cap` - Optional debug cap, applied as a prefix of the joined sequence.
///
/// # Returns
/// JoinOutcome with the matched pairs and the excluded identifiers of each side.
pub fn inner_join(left: &ArtifactSet, right: &ArtifactSet, cap: MatchCap) -> JoinOutcome {
    let mut outcome = JoinOutcome::default();

    for (sample_id, left_ref) in &left.artifacts {
        match right.get(sample_id) {
            Some(right_ref) => outcome.pairs.push(MatchedPair {
                sample_id: sample_id.clone(),
                left: left_ref.clone(),
                right: right_ref.clone(),
            }),
            None => outcome.only_left.push(sample_id.clone()),
        }
    }
    outcome.only_right = right
        .sample_ids()
        .filter(|id| !left.contains(id))
        .cloned()
        .collect();
    // Callers must not rely on pair order; sorting only makes the debug cap repeatable.
    outcome.pairs.sort_by(|a, b| a.sample_id.cmp(&b.sample_id));
    outcome.only_left.sort();
    outcome.only_right.sort();

    if let MatchCap::DebugLimit(n) = cap {
        if outcome.pairs.len() > n {
            outcome.truncated = outcome.pairs.len() - n;
            outcome.pairs.truncate(n);
            warn!(
                "Debug match cap active: kept {} of {} matched samples ({} dropped). Do not use in production.",
                n,
                n + outcome.truncated,
                outcome.truncated
            );
        }
    }

    for id in &outcome.only_left {
        warn!("Sample '{}' found in {} but not in {}; excluded", id, left.name, right.name);
    }
    for id in &outcome.only_right {
        warn!("Sample '{}' found in {} but not in {}; excluded", id, right.name, left.name);
    }

    outcome
}
