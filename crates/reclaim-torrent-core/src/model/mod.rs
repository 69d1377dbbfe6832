//! Torrent snapshot types and error envelopes reported by the daemon.

use serde::{Deserialize, Serialize};

/// Lifecycle state reported for a torrent on each daemon refresh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Waiting for a queue slot.
    Queued,
    /// Hash-checking on-disk data.
    Checking,
    /// Actively downloading.
    Downloading,
    /// Complete and uploading.
    Seeding,
    /// Stopped by request.
    Paused,
    /// The engine cannot find the payload on disk.
    MissingFiles,
    /// Any other engine-side error.
    Error,
}

impl TorrentState {
    /// Whether the engine is currently working on the torrent without an error.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Queued | Self::Checking | Self::Downloading | Self::Seeding
        )
    }

    /// Render the state as its `snake_case` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Checking => "checking",
            Self::Downloading => "downloading",
            Self::Seeding => "seeding",
            Self::Paused => "paused",
            Self::MissingFiles => "missing_files",
            Self::Error => "error",
        }
    }
}

/// Coarse error category attached to an [`ErrorEnvelope`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// No error.
    #[default]
    None,
    /// Tracker replied with a warning.
    TrackerWarning,
    /// Tracker could not be reached or rejected the announce.
    TrackerError,
    /// Generic local failure.
    LocalError,
    /// The target volume ran out of space.
    DiskFull,
    /// The engine could not write to the download location.
    PermissionDenied,
    /// Payload files are missing.
    MissingFiles,
    /// Some pieces failed verification or are absent.
    PartialFiles,
    /// Metadata could not be resolved.
    Metadata,
    /// Daemon reported an error it could not categorise.
    Unknown,
}

/// Recovery progress reported by the daemon alongside an error.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    /// Nothing to recover.
    #[default]
    Ok,
    /// The daemon expects the condition to clear on its own.
    Transient,
    /// A person has to pick an action.
    NeedsUserAction,
    /// The daemon is re-verifying data.
    Verifying,
    /// Recovery cannot proceed.
    Blocked,
}

/// Category of a missing-files failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissingFilesKind {
    /// The folder exists but some payload data is absent.
    DataGap,
    /// The download folder itself is gone.
    PathLoss,
    /// The drive or network share holding the folder is unavailable.
    VolumeLoss,
    /// The folder exists but cannot be read or written.
    AccessDenied,
}

impl MissingFilesKind {
    /// Render the kind as its `snake_case` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataGap => "data_gap",
            Self::PathLoss => "path_loss",
            Self::VolumeLoss => "volume_loss",
            Self::AccessDenied => "access_denied",
        }
    }
}

/// Action that can be requested against a torrent in an error state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Resume the torrent as-is.
    Resume,
    /// Re-verify on-disk data.
    Verify,
    /// Force a tracker announce.
    Reannounce,
    /// Download whatever data is missing into the current location.
    DownloadMissing,
    /// Point the torrent at the folder that now holds its data.
    Locate,
    /// Pick a new writable download location.
    ChooseLocation,
    /// Reveal the download folder.
    OpenFolder,
    /// Retry the previous attempt.
    Retry,
    /// Move or re-target storage.
    SetLocation,
}

impl RecoveryAction {
    /// Render the action as its `snake_case` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Verify => "verify",
            Self::Reannounce => "reannounce",
            Self::DownloadMissing => "download_missing",
            Self::Locate => "locate",
            Self::ChooseLocation => "choose_location",
            Self::OpenFolder => "open_folder",
            Self::Retry => "retry",
            Self::SetLocation => "set_location",
        }
    }
}

/// Structured error information attached to a torrent snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// Coarse error category.
    #[serde(default)]
    pub error_class: ErrorClass,
    /// Daemon-supplied message.
    pub error_message: Option<String>,
    /// Stable identity key for the error, preferred over the torrent hash.
    pub fingerprint: Option<String>,
    /// Daemon-side recovery progress.
    #[serde(default)]
    pub recovery_state: RecoveryState,
    /// Daemon-reported missing-files category, when known.
    pub recovery_kind: Option<MissingFilesKind>,
    /// Actions the daemon considers applicable.
    #[serde(default)]
    pub recovery_actions: Vec<RecoveryAction>,
}

impl ErrorEnvelope {
    /// Envelope with only an error class and message.
    #[must_use]
    pub fn new(error_class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            error_class,
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the envelope describes any error at all.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error_class != ErrorClass::None
    }
}

/// Read-only view of a torrent produced on every daemon refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentSnapshot {
    /// Daemon-assigned identifier.
    pub id: String,
    /// Info hash, when known.
    pub hash: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Current lifecycle state.
    pub state: TorrentState,
    /// Error envelope; may linger after the engine has recovered.
    pub error_envelope: Option<ErrorEnvelope>,
    /// Download directory assigned to the torrent.
    pub download_dir: Option<String>,
}

impl TorrentSnapshot {
    /// Minimal snapshot with an identifier, name and state.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, state: TorrentState) -> Self {
        Self {
            id: id.into(),
            hash: None,
            name: name.into(),
            state,
            error_envelope: None,
            download_dir: None,
        }
    }

    /// Error class of the attached envelope, or [`ErrorClass::None`].
    #[must_use]
    pub fn error_class(&self) -> ErrorClass {
        self.error_envelope
            .as_ref()
            .map_or(ErrorClass::None, |envelope| envelope.error_class)
    }

    /// Display name, falling back to the identifier when the daemon sent none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Free-space reply for a filesystem path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreeSpace {
    /// Path the daemon measured.
    pub path: String,
    /// Bytes available to the daemon.
    pub free_bytes: u64,
    /// Total capacity of the volume, when reported.
    pub total_bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states_exclude_paused_and_errors() {
        for state in [
            TorrentState::Queued,
            TorrentState::Checking,
            TorrentState::Downloading,
            TorrentState::Seeding,
        ] {
            assert!(state.is_active(), "{} should be active", state.as_str());
        }
        for state in [
            TorrentState::Paused,
            TorrentState::MissingFiles,
            TorrentState::Error,
        ] {
            assert!(!state.is_active(), "{} should not be active", state.as_str());
        }
    }

    #[test]
    fn envelope_deserializes_with_defaults() -> Result<(), serde_json::Error> {
        let envelope: ErrorEnvelope = serde_json::from_str(
            r#"{"error_class":"missing_files","error_message":"gone","fingerprint":"fp-1","recovery_kind":"path_loss"}"#,
        )?;
        assert_eq!(envelope.error_class, ErrorClass::MissingFiles);
        assert_eq!(envelope.recovery_state, RecoveryState::Ok);
        assert_eq!(envelope.recovery_kind, Some(MissingFilesKind::PathLoss));
        assert!(envelope.recovery_actions.is_empty());
        assert!(envelope.is_error());
        Ok(())
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let mut snapshot = TorrentSnapshot::new("7", "  ", TorrentState::Paused);
        assert_eq!(snapshot.display_name(), "7");
        snapshot.name = "ubuntu.iso".into();
        assert_eq!(snapshot.display_name(), "ubuntu.iso");
        assert_eq!(snapshot.error_class(), ErrorClass::None);
    }

    #[test]
    fn action_labels_match_serde_names() -> Result<(), serde_json::Error> {
        let action = RecoveryAction::DownloadMissing;
        assert_eq!(
            serde_json::to_value(action)?,
            serde_json::Value::from(action.as_str())
        );
        Ok(())
    }
}
