//! Missing-files classification.
//!
//! # Design
//! - Pure and deterministic: the same envelope, path and context always yield
//!   the same classification.
//! - Manual overrides win over anything derived from the envelope.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use reclaim_config::ExecutionModel;
use reclaim_torrent_core::{ErrorClass, ErrorEnvelope, MissingFilesKind, RecoveryAction};
use serde::{Deserialize, Serialize};

/// Drive-letter (`X:` / `X:\`) or UNC share (`\\server\share`) prefix.
static ROOT_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z]:\\?|\\\\[^\\]+\\[^\\]+)").ok());

const VOLUME_LOSS_HINTS: &[&str] = &[
    "no such device",
    "not mounted",
    "device is not ready",
    "network path",
    "volume",
    "drive",
];
const PATH_LOSS_HINTS: &[&str] = &[
    "no such file or directory",
    "cannot find the path",
    "directory not found",
    "path not found",
    "path-unreachable",
    "does not exist",
    "enoent",
];
const ACCESS_DENIED_HINTS: &[&str] = &[
    "permission denied",
    "access denied",
    "access is denied",
    "read-only",
    "eacces",
    "eperm",
];
const DATA_GAP_HINTS: &[&str] = &[
    "files are missing",
    "missing pieces",
    "size mismatch",
    "incomplete",
];

/// How much the classification can be trusted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Filesystem checks are authoritative.
    Certain,
    /// Strong signals agree.
    Likely,
    /// Best guess.
    Unknown,
}

/// Signals that the derived kind should be double-checked by the user.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// Nothing suspicious.
    #[default]
    None,
    /// The reported kind disagrees with the message heuristics.
    Conflict,
    /// Heuristics matched more than one kind.
    MultipleCandidates,
}

/// Inferred category of a missing-files error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissingFilesClassification {
    /// Failure category.
    pub kind: MissingFilesKind,
    /// Trust level.
    pub confidence: Confidence,
    /// Download path the classification refers to.
    pub path: Option<String>,
    /// Volume or share root of `path`.
    pub root: Option<String>,
    /// Actions worth offering, most useful first.
    pub recommended_actions: Vec<RecoveryAction>,
    /// Whether the result needs a second look.
    pub escalation: Escalation,
}

/// Manually chosen classification for one torrent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationOverride {
    /// Kind to use instead of the derived one.
    pub kind: MissingFilesKind,
    /// Confidence to report; derived from `kind` when absent.
    pub confidence: Option<Confidence>,
    /// Path to report instead of the download directory.
    pub path: Option<String>,
    /// Root to report instead of the one derived from the path.
    pub root: Option<String>,
}

impl ClassificationOverride {
    /// Override that only pins the kind.
    #[must_use]
    pub const fn kind(kind: MissingFilesKind) -> Self {
        Self {
            kind,
            confidence: None,
            path: None,
            root: None,
        }
    }
}

/// Store of manual overrides keyed by torrent id or info hash.
#[derive(Debug, Clone, Default)]
pub struct ClassificationOverrides {
    entries: HashMap<String, ClassificationOverride>,
}

impl ClassificationOverrides {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an override, replacing any previous one for `key`.
    pub fn set(&mut self, key: impl Into<String>, value: ClassificationOverride) {
        self.entries.insert(key.into(), value);
    }

    /// Remove the override for `key`. Returns whether one existed.
    pub fn clear(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Override stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ClassificationOverride> {
        self.entries.get(key)
    }

    /// Drop overrides whose key is not in `present`. Returns how many were dropped.
    pub fn prune(&mut self, present: &HashSet<&str>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| present.contains(key.as_str()));
        before - self.entries.len()
    }

    /// Number of stored overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Inputs besides the envelope and path.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Torrent whose override should be consulted.
    pub torrent_id: Option<&'a str>,
    /// Where the engine runs relative to this process.
    pub execution_model: ExecutionModel,
    /// Manual overrides, if any.
    pub overrides: Option<&'a ClassificationOverrides>,
}

impl ClassifyContext<'_> {
    /// Context with no torrent id and no overrides.
    #[must_use]
    pub const fn new(execution_model: ExecutionModel) -> Self {
        Self {
            torrent_id: None,
            execution_model,
            overrides: None,
        }
    }
}

/// Classify a missing-files failure.
#[must_use]
pub fn classify(
    envelope: Option<&ErrorEnvelope>,
    download_dir: Option<&str>,
    context: &ClassifyContext<'_>,
) -> MissingFilesClassification {
    let path = download_dir
        .map(str::trim)
        .filter(|path| !path.is_empty())
        .map(str::to_string);
    let error_class = envelope.map_or(ErrorClass::None, |envelope| envelope.error_class);

    let manual = context
        .torrent_id
        .zip(context.overrides)
        .and_then(|(id, overrides)| overrides.get(id));
    if let Some(manual) = manual {
        let path = manual.path.clone().or(path);
        let root = manual
            .root
            .clone()
            .or_else(|| path.as_deref().map(derive_root));
        return MissingFilesClassification {
            kind: manual.kind,
            confidence: manual.confidence.unwrap_or_else(|| {
                derive_confidence(manual.kind, error_class, context.execution_model)
            }),
            root,
            path,
            recommended_actions: recommended_actions(manual.kind),
            escalation: Escalation::None,
        };
    }

    let reported = envelope.and_then(|envelope| envelope.recovery_kind);
    let candidates = envelope.map(candidate_kinds).unwrap_or_default();
    let kind = reported
        .or_else(|| candidates.first().copied())
        .unwrap_or(MissingFilesKind::DataGap);
    let escalation = match reported {
        Some(reported) if !candidates.is_empty() && !candidates.contains(&reported) => {
            Escalation::Conflict
        }
        None if candidates.len() > 1 => Escalation::MultipleCandidates,
        _ => Escalation::None,
    };

    MissingFilesClassification {
        kind,
        confidence: derive_confidence(kind, error_class, context.execution_model),
        root: path.as_deref().map(derive_root),
        path,
        recommended_actions: recommended_actions(kind),
        escalation,
    }
}

/// Actions offered for each kind, most useful first.
#[must_use]
pub fn recommended_actions(kind: MissingFilesKind) -> Vec<RecoveryAction> {
    match kind {
        MissingFilesKind::DataGap => {
            vec![RecoveryAction::DownloadMissing, RecoveryAction::OpenFolder]
        }
        MissingFilesKind::PathLoss => vec![RecoveryAction::Locate, RecoveryAction::DownloadMissing],
        MissingFilesKind::VolumeLoss => vec![RecoveryAction::Retry, RecoveryAction::Locate],
        MissingFilesKind::AccessDenied => {
            vec![RecoveryAction::ChooseLocation, RecoveryAction::Locate]
        }
    }
}

/// Volume or share root of `path`, or the whole path when it has neither prefix.
#[must_use]
pub fn derive_root(path: &str) -> String {
    ROOT_PATTERN
        .as_ref()
        .and_then(|pattern| pattern.find(path))
        .map_or_else(|| path.to_string(), |found| found.as_str().to_string())
}

fn derive_confidence(
    kind: MissingFilesKind,
    error_class: ErrorClass,
    execution_model: ExecutionModel,
) -> Confidence {
    if execution_model == ExecutionModel::Local {
        return Confidence::Certain;
    }
    let strong_kind = matches!(
        kind,
        MissingFilesKind::PathLoss | MissingFilesKind::VolumeLoss | MissingFilesKind::AccessDenied
    );
    if error_class == ErrorClass::MissingFiles || strong_kind {
        Confidence::Likely
    } else {
        Confidence::Unknown
    }
}

fn candidate_kinds(envelope: &ErrorEnvelope) -> Vec<MissingFilesKind> {
    let message = envelope
        .error_message
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let mentions = |hints: &[&str]| hints.iter().any(|hint| message.contains(hint));

    let mut kinds = Vec::new();
    if mentions(VOLUME_LOSS_HINTS) {
        kinds.push(MissingFilesKind::VolumeLoss);
    }
    if mentions(PATH_LOSS_HINTS) {
        kinds.push(MissingFilesKind::PathLoss);
    }
    if envelope.error_class == ErrorClass::PermissionDenied || mentions(ACCESS_DENIED_HINTS) {
        kinds.push(MissingFilesKind::AccessDenied);
    }
    if envelope.error_class == ErrorClass::PartialFiles || mentions(DATA_GAP_HINTS) {
        kinds.push(MissingFilesKind::DataGap);
    }
    kinds
}
