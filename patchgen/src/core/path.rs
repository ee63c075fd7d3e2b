//! Resolution of LLM-written paths against the known file set.

use crate::core::types::FileContentMap;

/// Outcome of looking up a requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    Exact(String),
    /// Matched under a different spelling; holds the real path.
    CaseResolved(String),
    /// Several files match ignoring case; none is chosen.
    Ambiguous(Vec<String>),
    Missing,
}

impl PathResolution {
    /// The real path to diff against, if any.
    pub fn resolved(&self) -> Option<&str> {
        match self {
            PathResolution::Exact(path) | PathResolution::CaseResolved(path) => Some(path),
            PathResolution::Ambiguous(_) | PathResolution::Missing => None,
        }
    }
}

/// Looks up requested paths in some view of the repository.
pub trait PathProbe {
    fn resolve(&self, requested: &str) -> PathResolution;
}

/// Probe over the in-memory original snapshot.
impl PathProbe for FileContentMap {
    fn resolve(&self, requested: &str) -> PathResolution {
        resolve_among(self.keys().map(String::as_str), requested)
    }
}

/// Resolve `requested` among `candidates`: exact, then case-insensitive full
/// path.
///
/// Only case drift is forgiven. A request never resolves to a file in another
/// directory, so `tests/lib.rs` stays a new file next to `src/lib.rs`.
pub fn resolve_among<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    requested: &str,
) -> PathResolution {
    let candidates: Vec<&str> = candidates.into_iter().collect();
    if candidates.contains(&requested) {
        return PathResolution::Exact(requested.to_string());
    }

    let lowered = requested.to_lowercase();
    let mut matches: Vec<&str> = candidates
        .iter()
        .copied()
        .filter(|candidate| candidate.to_lowercase() == lowered)
        .collect();
    matches.sort_unstable();
    matches.dedup();
    match matches.as_slice() {
        [] => PathResolution::Missing,
        [only] => PathResolution::CaseResolved((*only).to_string()),
        _ => PathResolution::Ambiguous(matches.iter().map(|path| (*path).to_string()).collect()),
    }
}
