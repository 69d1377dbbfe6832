//! Snapshot fixtures.

use reclaim_torrent_core::{
    ErrorClass, ErrorEnvelope, MissingFilesKind, TorrentSnapshot, TorrentState,
};

/// Builder for [`TorrentSnapshot`] values used in tests.
#[derive(Debug, Clone)]
pub struct TorrentFixture {
    snapshot: TorrentSnapshot,
}

impl TorrentFixture {
    /// Paused torrent named after its id with no error attached.
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            snapshot: TorrentSnapshot::new(id, format!("torrent-{id}"), TorrentState::Paused),
        }
    }

    /// Torrent in the missing-files state with an envelope carrying `fingerprint`.
    #[must_use]
    pub fn missing(id: &str, fingerprint: &str) -> Self {
        Self::new(id)
            .state(TorrentState::MissingFiles)
            .envelope(ErrorEnvelope {
                fingerprint: Some(fingerprint.to_string()),
                ..ErrorEnvelope::new(ErrorClass::MissingFiles, "files are missing")
            })
            .download_dir("/downloads")
    }

    /// Override the lifecycle state.
    #[must_use]
    pub const fn state(mut self, state: TorrentState) -> Self {
        self.snapshot.state = state;
        self
    }

    /// Set the info hash.
    #[must_use]
    pub fn hash(mut self, hash: &str) -> Self {
        self.snapshot.hash = Some(hash.to_string());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.snapshot.name = name.to_string();
        self
    }

    /// Set the download directory.
    #[must_use]
    pub fn download_dir(mut self, path: &str) -> Self {
        self.snapshot.download_dir = Some(path.to_string());
        self
    }

    /// Drop the download directory.
    #[must_use]
    pub fn without_download_dir(mut self) -> Self {
        self.snapshot.download_dir = None;
        self
    }

    /// Attach an error envelope.
    #[must_use]
    pub fn envelope(mut self, envelope: ErrorEnvelope) -> Self {
        self.snapshot.error_envelope = Some(envelope);
        self
    }

    /// Attach an envelope with the given class and message.
    #[must_use]
    pub fn error(self, class: ErrorClass, message: &str) -> Self {
        self.envelope(ErrorEnvelope::new(class, message))
    }

    /// Set the reported recovery kind on the attached envelope, creating one if needed.
    #[must_use]
    pub fn recovery_kind(mut self, kind: MissingFilesKind) -> Self {
        self.snapshot
            .error_envelope
            .get_or_insert_with(|| ErrorEnvelope::new(ErrorClass::MissingFiles, "files are missing"))
            .recovery_kind = Some(kind);
        self
    }

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> TorrentSnapshot {
        self.snapshot
    }
}
