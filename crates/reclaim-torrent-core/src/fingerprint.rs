//! Stable recovery identity for torrents.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::model::TorrentSnapshot;

/// Placeholder used when a snapshot carries no usable identity.
pub const UNKNOWN_FINGERPRINT: &str = "<unknown-torrent>";

/// Key identifying a torrent for recovery ownership and de-duplication.
///
/// Resolution order: envelope fingerprint, info hash, daemon id, then
/// [`UNKNOWN_FINGERPRINT`]. Blank values are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an existing key.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive the fingerprint for a snapshot. Never fails.
    #[must_use]
    pub fn of(torrent: &TorrentSnapshot) -> Self {
        let envelope = torrent
            .error_envelope
            .as_ref()
            .and_then(|envelope| envelope.fingerprint.as_deref());
        [envelope, torrent.hash.as_deref(), Some(torrent.id.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|candidate| !candidate.is_empty())
            .map_or_else(|| Self::new(UNKNOWN_FINGERPRINT), Self::new)
    }

    /// Borrow the key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the placeholder for an unidentifiable torrent.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_FINGERPRINT
    }
}

impl Display for Fingerprint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl Borrow<str> for Fingerprint {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ErrorClass, ErrorEnvelope, TorrentState};

    fn torrent(id: &str, hash: Option<&str>, envelope_fp: Option<&str>) -> TorrentSnapshot {
        let mut snapshot = TorrentSnapshot::new(id, "demo", TorrentState::MissingFiles);
        snapshot.hash = hash.map(str::to_string);
        snapshot.error_envelope = envelope_fp.map(|fp| ErrorEnvelope {
            fingerprint: Some(fp.to_string()),
            ..ErrorEnvelope::new(ErrorClass::MissingFiles, "missing")
        });
        snapshot
    }

    #[test]
    fn resolution_prefers_envelope_then_hash_then_id() {
        assert_eq!(
            Fingerprint::of(&torrent("1", Some("abc"), Some("fp-1"))).as_str(),
            "fp-1"
        );
        assert_eq!(Fingerprint::of(&torrent("1", Some("abc"), None)).as_str(), "abc");
        assert_eq!(Fingerprint::of(&torrent("1", None, None)).as_str(), "1");
    }

    #[test]
    fn blank_fields_fall_through_to_sentinel() {
        let fp = Fingerprint::of(&torrent(" ", Some(""), Some("  ")));
        assert!(fp.is_unknown());
        assert_eq!(fp.to_string(), UNKNOWN_FINGERPRINT);
    }

    #[test]
    fn identical_identity_yields_identical_fingerprint() {
        let first = torrent("9", Some("deadbeef"), None);
        let mut second = first.clone();
        second.state = TorrentState::Downloading;
        second.name = "renamed".into();
        assert_eq!(Fingerprint::of(&first), Fingerprint::of(&second));
    }
}
