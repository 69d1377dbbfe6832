//! Recovery actions executed against the daemon adapter.
//!
//! Every entry point returns a [`RecoveryOutcome`]; adapter failures and
//! missing capabilities are mapped to outcomes and never surface as errors.

use std::io;

use reclaim_torrent_core::{
    ClientError, ErrorClass, ErrorEnvelope, RecoveryAction, RecoveryClient, TorrentSnapshot,
};
use tracing::{debug, warn};

use crate::outcome::{AutoDetail, BlockReason, DecisionReason, RecoveryOutcome};

const NOT_FOUND_CODES: &[&str] = &["ENOENT", "ENOTDIR", "2", "3", "4001"];
const ACCESS_DENIED_CODES: &[&str] = &["EACCES", "EPERM", "EROFS", "13", "5", "4003"];
const NO_SPACE_CODES: &[&str] = &["ENOSPC", "EDQUOT", "28", "39", "112"];

const NOT_FOUND_HINTS: &[&str] = &[
    "no such file",
    "not found",
    "cannot find",
    "path-unreachable",
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
const NO_SPACE_HINTS: &[&str] = &[
    "no space",
    "disk full",
    "not enough space",
    "quota exceeded",
    "enospc",
];

/// Filesystem condition behind an adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorKind {
    /// Path does not exist.
    NotFound,
    /// Path exists but cannot be accessed.
    AccessDenied,
    /// Volume is out of space.
    NoSpace,
    /// Anything else.
    Other,
}

/// Map an adapter failure to a filesystem condition.
///
/// Error codes are consulted first, then the transport's IO error kind, then
/// the message text. Unrecognised shapes fall through to [`FsErrorKind::Other`].
#[must_use]
pub fn classify_fs_error(error: &ClientError) -> FsErrorKind {
    if let Some(code) = error.code() {
        let code = code.trim().to_ascii_uppercase();
        if NOT_FOUND_CODES.contains(&code.as_str()) {
            return FsErrorKind::NotFound;
        }
        if ACCESS_DENIED_CODES.contains(&code.as_str()) {
            return FsErrorKind::AccessDenied;
        }
        if NO_SPACE_CODES.contains(&code.as_str()) {
            return FsErrorKind::NoSpace;
        }
    }

    match error.io_kind() {
        Some(io::ErrorKind::NotFound) => return FsErrorKind::NotFound,
        Some(io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem) => {
            return FsErrorKind::AccessDenied;
        }
        Some(io::ErrorKind::StorageFull) => {
            return FsErrorKind::NoSpace;
        }
        _ => {}
    }

    let detail = error.detail().to_ascii_lowercase();
    let mentions = |hints: &[&str]| hints.iter().any(|hint| detail.contains(hint));
    if mentions(NOT_FOUND_HINTS) {
        FsErrorKind::NotFound
    } else if mentions(ACCESS_DENIED_HINTS) {
        FsErrorKind::AccessDenied
    } else if mentions(NO_SPACE_HINTS) {
        FsErrorKind::NoSpace
    } else {
        FsErrorKind::Other
    }
}

/// Runner family selected from a torrent's error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Probe the download directory and recreate it when absent.
    MissingFiles,
    /// Ask the user for a writable location.
    PermissionDenied,
    /// Report free space and ask the user.
    DiskFull,
    /// Re-verify on-disk data.
    PartialFiles,
    /// Re-announce to trackers.
    TrackerReannounce,
}

impl ProbeKind {
    /// Probe matching the envelope's error class, if the class is recoverable.
    #[must_use]
    pub fn for_envelope(envelope: Option<&ErrorEnvelope>) -> Option<Self> {
        match envelope?.error_class {
            ErrorClass::MissingFiles => Some(Self::MissingFiles),
            ErrorClass::PermissionDenied => Some(Self::PermissionDenied),
            ErrorClass::DiskFull => Some(Self::DiskFull),
            ErrorClass::PartialFiles => Some(Self::PartialFiles),
            ErrorClass::TrackerWarning | ErrorClass::TrackerError => Some(Self::TrackerReannounce),
            ErrorClass::None
            | ErrorClass::LocalError
            | ErrorClass::Metadata
            | ErrorClass::Unknown => None,
        }
    }
}

/// Executes recovery actions through a [`RecoveryClient`].
#[derive(Clone, Copy)]
pub struct RecoveryRunner<'a> {
    client: &'a dyn RecoveryClient,
}

impl<'a> RecoveryRunner<'a> {
    /// Runner bound to `client`.
    #[must_use]
    pub const fn new(client: &'a dyn RecoveryClient) -> Self {
        Self { client }
    }

    /// Run `action` for `torrent`.
    ///
    /// Location-picking actions need a path from the user and resolve to a
    /// decision; resume-style actions probe the torrent's error first and only
    /// resume once the probe reports the torrent as recovered.
    pub async fn run(&self, action: RecoveryAction, torrent: &TorrentSnapshot) -> RecoveryOutcome {
        debug!(torrent_id = %torrent.id, action = ?action, "running recovery action");
        match action {
            RecoveryAction::Verify => self.verify(torrent).await,
            RecoveryAction::Reannounce => self.reannounce(torrent).await,
            RecoveryAction::Locate
            | RecoveryAction::ChooseLocation
            | RecoveryAction::SetLocation
            | RecoveryAction::OpenFolder => decision_for(torrent),
            RecoveryAction::Resume | RecoveryAction::Retry | RecoveryAction::DownloadMissing => {
                let probed = match ProbeKind::for_envelope(torrent.error_envelope.as_ref()) {
                    Some(kind) => self.probe(kind, torrent).await,
                    None => RecoveryOutcome::AutoRecovered,
                };
                if probed == RecoveryOutcome::AutoRecovered {
                    self.resume(torrent).await
                } else {
                    probed
                }
            }
        }
    }

    /// Run the probe family `kind` for `torrent`.
    pub async fn probe(&self, kind: ProbeKind, torrent: &TorrentSnapshot) -> RecoveryOutcome {
        match kind {
            ProbeKind::MissingFiles => self.probe_missing_files(torrent).await,
            ProbeKind::PermissionDenied => permission_denied(torrent),
            ProbeKind::DiskFull => self.probe_disk_full(torrent).await,
            ProbeKind::PartialFiles => self.verify(torrent).await,
            ProbeKind::TrackerReannounce => self.reannounce(torrent).await,
        }
    }

    /// Check the download directory and recreate it when it is gone.
    pub async fn probe_missing_files(&self, torrent: &TorrentSnapshot) -> RecoveryOutcome {
        let Some(dir) = download_dir(torrent) else {
            return RecoveryOutcome::decision(DecisionReason::Missing, None);
        };
        if !self.client.capabilities().check_free_space {
            return RecoveryOutcome::AutoRecovered;
        }

        match self.client.check_free_space(dir).await {
            Ok(space) if space.free_bytes > 0 => RecoveryOutcome::AutoRecovered,
            Ok(space) => RecoveryOutcome::NeedsUserDecision {
                reason: DecisionReason::DiskFull,
                hint_path: Some(dir.to_string()),
                free_bytes: Some(space.free_bytes),
            },
            Err(err) if err.is_unsupported() => RecoveryOutcome::AutoRecovered,
            Err(err) => {
                let kind = classify_fs_error(&err);
                warn!(torrent_id = %torrent.id, error = %err.detail(), kind = ?kind, "free-space probe failed");
                match kind {
                    FsErrorKind::NotFound => self.recreate_directory(torrent, dir).await,
                    FsErrorKind::AccessDenied => {
                        RecoveryOutcome::decision(DecisionReason::Unwritable, Some(dir))
                    }
                    FsErrorKind::NoSpace => {
                        RecoveryOutcome::decision(DecisionReason::DiskFull, Some(dir))
                    }
                    FsErrorKind::Other => {
                        RecoveryOutcome::decision(DecisionReason::Missing, Some(dir))
                    }
                }
            }
        }
    }

    async fn recreate_directory(&self, torrent: &TorrentSnapshot, dir: &str) -> RecoveryOutcome {
        if !self.client.capabilities().create_directory {
            return RecoveryOutcome::decision(DecisionReason::Missing, Some(dir));
        }
        match self.client.create_directory(dir).await {
            Ok(()) => {
                debug!(torrent_id = %torrent.id, path = dir, "recreated download directory");
                RecoveryOutcome::AutoRecovered
            }
            Err(err) => {
                warn!(torrent_id = %torrent.id, error = %err.detail(), "directory creation failed");
                if classify_fs_error(&err) == FsErrorKind::AccessDenied {
                    RecoveryOutcome::decision(DecisionReason::Unwritable, Some(dir))
                } else {
                    RecoveryOutcome::decision(DecisionReason::Missing, Some(dir))
                }
            }
        }
    }

    /// Report the obtainable free-space figure for a full volume.
    pub async fn probe_disk_full(&self, torrent: &TorrentSnapshot) -> RecoveryOutcome {
        if !self.client.capabilities().check_free_space {
            return RecoveryOutcome::blocked(BlockReason::Unsupported);
        }
        let dir = download_dir(torrent);
        let free_bytes = match dir {
            Some(dir) => match self.client.check_free_space(dir).await {
                Ok(space) => Some(space.free_bytes),
                Err(err) => {
                    warn!(torrent_id = %torrent.id, error = %err.detail(), "free-space probe failed");
                    None
                }
            },
            None => None,
        };
        RecoveryOutcome::NeedsUserDecision {
            reason: DecisionReason::DiskFull,
            hint_path: dir.map(str::to_string),
            free_bytes,
        }
    }

    /// Ask the daemon to re-verify the torrent's data.
    pub async fn verify(&self, torrent: &TorrentSnapshot) -> RecoveryOutcome {
        if !self.client.capabilities().verify {
            return RecoveryOutcome::blocked(BlockReason::Unsupported);
        }
        match self.client.verify(std::slice::from_ref(&torrent.id)).await {
            Ok(()) => RecoveryOutcome::AutoInProgress {
                detail: AutoDetail::Verify,
            },
            Err(err) => blocked_by(&err, torrent),
        }
    }

    /// Ask the daemon to re-announce the torrent.
    pub async fn reannounce(&self, torrent: &TorrentSnapshot) -> RecoveryOutcome {
        if !self.client.capabilities().reannounce {
            return RecoveryOutcome::blocked(BlockReason::Unsupported);
        }
        match self.client.reannounce(&torrent.id).await {
            Ok(()) => RecoveryOutcome::AutoInProgress {
                detail: AutoDetail::Reannounce,
            },
            Err(err) => blocked_by(&err, torrent),
        }
    }

    /// Resume the torrent as-is.
    pub async fn resume(&self, torrent: &TorrentSnapshot) -> RecoveryOutcome {
        if !self.client.capabilities().resume {
            return RecoveryOutcome::blocked(BlockReason::Unsupported);
        }
        match self.client.resume(std::slice::from_ref(&torrent.id)).await {
            Ok(()) => RecoveryOutcome::AutoRecovered,
            Err(err) => blocked_by(&err, torrent),
        }
    }

    /// Point the torrent at `path`, then verify when the daemon supports it.
    pub async fn relocate(
        &self,
        torrent: &TorrentSnapshot,
        path: &str,
        move_data: bool,
    ) -> RecoveryOutcome {
        let capabilities = self.client.capabilities();
        if !capabilities.set_location {
            return RecoveryOutcome::blocked(BlockReason::Unsupported);
        }
        if let Err(err) = self.client.set_location(&torrent.id, path, move_data).await {
            let kind = classify_fs_error(&err);
            warn!(torrent_id = %torrent.id, error = %err.detail(), kind = ?kind, "set-location failed");
            return match kind {
                FsErrorKind::NotFound => {
                    RecoveryOutcome::decision(DecisionReason::Missing, Some(path))
                }
                FsErrorKind::AccessDenied => {
                    RecoveryOutcome::decision(DecisionReason::Unwritable, Some(path))
                }
                FsErrorKind::NoSpace => {
                    RecoveryOutcome::decision(DecisionReason::DiskFull, Some(path))
                }
                FsErrorKind::Other => RecoveryOutcome::blocked(BlockReason::Failed),
            };
        }
        if capabilities.verify {
            self.verify(torrent).await
        } else {
            RecoveryOutcome::AutoRecovered
        }
    }
}

/// Decision outcome for actions that need a location from the user.
#[must_use]
pub fn decision_for(torrent: &TorrentSnapshot) -> RecoveryOutcome {
    let reason = match torrent.error_class() {
        ErrorClass::PermissionDenied => DecisionReason::Unwritable,
        ErrorClass::DiskFull => DecisionReason::DiskFull,
        _ => DecisionReason::Missing,
    };
    RecoveryOutcome::decision(reason, download_dir(torrent))
}

fn permission_denied(torrent: &TorrentSnapshot) -> RecoveryOutcome {
    RecoveryOutcome::decision(DecisionReason::Unwritable, download_dir(torrent))
}

fn blocked_by(err: &ClientError, torrent: &TorrentSnapshot) -> RecoveryOutcome {
    warn!(
        torrent_id = %torrent.id,
        operation = err.operation(),
        error = %err.detail(),
        "recovery action failed"
    );
    if err.is_unsupported() {
        RecoveryOutcome::blocked(BlockReason::Unsupported)
    } else {
        RecoveryOutcome::blocked(BlockReason::Failed)
    }
}

fn download_dir(torrent: &TorrentSnapshot) -> Option<&str> {
    torrent
        .download_dir
        .as_deref()
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reclaim_test_support::fixtures::TorrentFixture;
    use reclaim_test_support::mocks::{MockCall, MockClient, MockFailure};
    use reclaim_torrent_core::ClientCapabilities;

    fn missing() -> TorrentSnapshot {
        TorrentFixture::missing("1", "fp-1").build()
    }

    #[test]
    fn fs_error_codes_win_over_messages() {
        let coded = ClientError::rejected("check_free_space", Some("EACCES"), "no such file");
        assert_eq!(classify_fs_error(&coded), FsErrorKind::AccessDenied);
        let numeric = ClientError::rejected("check_free_space", Some("28"), "oops");
        assert_eq!(classify_fs_error(&numeric), FsErrorKind::NoSpace);
        let daemon = ClientError::rejected("create_directory", Some("4001"), "path-unreachable");
        assert_eq!(classify_fs_error(&daemon), FsErrorKind::NotFound);
        let io = ClientError::transport(
            "check_free_space",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(classify_fs_error(&io), FsErrorKind::AccessDenied);
        let text = ClientError::rejected("check_free_space", None, "No space left on device");
        assert_eq!(classify_fs_error(&text), FsErrorKind::NoSpace);
        let other = ClientError::rejected("check_free_space", None, "daemon busy");
        assert_eq!(classify_fs_error(&other), FsErrorKind::Other);
    }

    #[test]
    fn probe_kind_follows_error_class() {
        let tracker = ErrorEnvelope::new(ErrorClass::TrackerError, "timed out");
        assert_eq!(
            ProbeKind::for_envelope(Some(&tracker)),
            Some(ProbeKind::TrackerReannounce)
        );
        let metadata = ErrorEnvelope::new(ErrorClass::Metadata, "bad info dict");
        assert_eq!(ProbeKind::for_envelope(Some(&metadata)), None);
        assert_eq!(ProbeKind::for_envelope(None), None);
    }

    #[tokio::test]
    async fn missing_files_without_directory_needs_decision() {
        let client = MockClient::new();
        let torrent = TorrentFixture::missing("1", "fp-1")
            .without_download_dir()
            .build();
        let outcome = RecoveryRunner::new(&client)
            .probe_missing_files(&torrent)
            .await;
        assert_eq!(
            outcome,
            RecoveryOutcome::decision(DecisionReason::Missing, None)
        );
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_files_without_free_space_capability_is_best_effort() {
        let client = MockClient::with_capabilities(ClientCapabilities {
            check_free_space: false,
            ..ClientCapabilities::all()
        });
        let outcome = RecoveryRunner::new(&client)
            .probe_missing_files(&missing())
            .await;
        assert_eq!(outcome, RecoveryOutcome::AutoRecovered);
    }

    #[tokio::test]
    async fn missing_files_free_space_results() {
        let client = MockClient::new();
        let runner = RecoveryRunner::new(&client);
        assert_eq!(
            runner.probe_missing_files(&missing()).await,
            RecoveryOutcome::AutoRecovered
        );

        client.set_free_bytes(0);
        assert_eq!(
            runner.probe_missing_files(&missing()).await,
            RecoveryOutcome::NeedsUserDecision {
                reason: DecisionReason::DiskFull,
                hint_path: Some("/downloads".into()),
                free_bytes: Some(0),
            }
        );
    }

    #[tokio::test]
    async fn missing_directory_is_recreated() {
        let client = MockClient::new();
        client.fail_free_space(MockFailure::code("ENOENT"));
        let outcome = RecoveryRunner::new(&client)
            .probe_missing_files(&missing())
            .await;
        assert_eq!(outcome, RecoveryOutcome::AutoRecovered);
        assert_eq!(
            client.calls(),
            vec![
                MockCall::CheckFreeSpace("/downloads".into()),
                MockCall::CreateDirectory("/downloads".into()),
            ]
        );
    }

    #[tokio::test]
    async fn directory_creation_failures_need_decisions() {
        let client = MockClient::new();
        let runner = RecoveryRunner::new(&client);

        client.fail_free_space(MockFailure::code("ENOENT"));
        client.fail_create_directory(MockFailure::message("Permission denied"));
        assert_eq!(
            runner.probe_missing_files(&missing()).await,
            RecoveryOutcome::decision(DecisionReason::Unwritable, Some("/downloads"))
        );

        client.fail_free_space(MockFailure::code("ENOENT"));
        client.fail_create_directory(MockFailure::message("device busy"));
        assert_eq!(
            runner.probe_missing_files(&missing()).await,
            RecoveryOutcome::decision(DecisionReason::Missing, Some("/downloads"))
        );
    }

    #[tokio::test]
    async fn probe_errors_map_to_decisions() {
        let client = MockClient::new();
        let runner = RecoveryRunner::new(&client);

        client.fail_free_space(MockFailure::Io(io::ErrorKind::PermissionDenied));
        assert_eq!(
            runner.probe_missing_files(&missing()).await,
            RecoveryOutcome::decision(DecisionReason::Unwritable, Some("/downloads"))
        );

        client.fail_free_space(MockFailure::code("ENOSPC"));
        assert_eq!(
            runner.probe_missing_files(&missing()).await,
            RecoveryOutcome::decision(DecisionReason::DiskFull, Some("/downloads"))
        );

        client.fail_free_space(MockFailure::message("rpc exploded"));
        assert_eq!(
            runner.probe_missing_files(&missing()).await,
            RecoveryOutcome::decision(DecisionReason::Missing, Some("/downloads"))
        );
    }

    #[tokio::test]
    async fn permission_denied_never_auto_fixes() {
        let client = MockClient::new();
        let outcome = RecoveryRunner::new(&client)
            .probe(ProbeKind::PermissionDenied, &missing())
            .await;
        assert_eq!(
            outcome,
            RecoveryOutcome::decision(DecisionReason::Unwritable, Some("/downloads"))
        );
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn disk_full_reports_free_space_or_blocks() {
        let client = MockClient::new();
        client.set_free_bytes(512);
        assert_eq!(
            RecoveryRunner::new(&client).probe_disk_full(&missing()).await,
            RecoveryOutcome::NeedsUserDecision {
                reason: DecisionReason::DiskFull,
                hint_path: Some("/downloads".into()),
                free_bytes: Some(512),
            }
        );

        let limited = MockClient::with_capabilities(ClientCapabilities::none());
        assert_eq!(
            RecoveryRunner::new(&limited).probe_disk_full(&missing()).await,
            RecoveryOutcome::blocked(BlockReason::Unsupported)
        );
    }

    #[tokio::test]
    async fn verify_and_reannounce_outcomes() {
        let client = MockClient::new();
        let runner = RecoveryRunner::new(&client);
        let torrent = missing();
        assert_eq!(
            runner.verify(&torrent).await,
            RecoveryOutcome::AutoInProgress {
                detail: AutoDetail::Verify
            }
        );
        client.fail_reannounce(MockFailure::message("tracker offline"));
        assert_eq!(
            runner.reannounce(&torrent).await,
            RecoveryOutcome::blocked(BlockReason::Failed)
        );

        let limited = MockClient::with_capabilities(ClientCapabilities::none());
        assert_eq!(
            RecoveryRunner::new(&limited).reannounce(&torrent).await,
            RecoveryOutcome::blocked(BlockReason::Unsupported)
        );
    }

    #[tokio::test]
    async fn resume_action_probes_then_resumes() {
        let client = MockClient::new();
        let outcome = RecoveryRunner::new(&client)
            .run(RecoveryAction::Resume, &missing())
            .await;
        assert_eq!(outcome, RecoveryOutcome::AutoRecovered);
        assert_eq!(
            client.calls().last(),
            Some(&MockCall::Resume(vec!["1".into()]))
        );
    }

    #[tokio::test]
    async fn relocate_sets_location_then_verifies() {
        let client = MockClient::new();
        let outcome = RecoveryRunner::new(&client)
            .relocate(&missing(), "/mnt/new", true)
            .await;
        assert_eq!(
            outcome,
            RecoveryOutcome::AutoInProgress {
                detail: AutoDetail::Verify
            }
        );
        assert_eq!(
            client.calls(),
            vec![
                MockCall::SetLocation("1".into(), "/mnt/new".into(), true),
                MockCall::Verify(vec!["1".into()]),
            ]
        );

        client.fail_set_location(MockFailure::code("EACCES"));
        assert_eq!(
            RecoveryRunner::new(&client)
                .relocate(&missing(), "/mnt/ro", false)
                .await,
            RecoveryOutcome::decision(DecisionReason::Unwritable, Some("/mnt/ro"))
        );
    }
}
