//! Daemon adapter traits consumed by the recovery controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::model::{FreeSpace, TorrentSnapshot};

/// Which recovery calls the connected daemon supports.
///
/// Computed once when the adapter is constructed; recovery code consults these
/// flags instead of probing the adapter at call time.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCapabilities {
    /// `verify(ids)` is available.
    pub verify: bool,
    /// `resume(ids)` is available.
    pub resume: bool,
    /// `check_free_space(path)` is available.
    pub check_free_space: bool,
    /// `create_directory(path)` is available.
    pub create_directory: bool,
    /// `reannounce(id)` is available.
    pub reannounce: bool,
    /// `set_location(id, path, move_data)` is available.
    pub set_location: bool,
}

impl ClientCapabilities {
    /// Every capability enabled.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            verify: true,
            resume: true,
            check_free_space: true,
            create_directory: true,
            reannounce: true,
            set_location: true,
        }
    }

    /// No capability enabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            verify: false,
            resume: false,
            check_free_space: false,
            create_directory: false,
            reannounce: false,
            set_location: false,
        }
    }
}

/// Recovery-facing subset of the daemon RPC surface.
///
/// Every call defaults to [`ClientError::Unsupported`] so adapters only
/// implement what their daemon offers.
#[async_trait]
pub trait RecoveryClient: Send + Sync {
    /// Capability flags for this adapter.
    fn capabilities(&self) -> ClientCapabilities;

    /// Re-verify on-disk data for the given torrents.
    async fn verify(&self, ids: &[String]) -> ClientResult<()> {
        let _ = ids;
        Err(ClientError::Unsupported { operation: "verify" })
    }

    /// Resume the given torrents.
    async fn resume(&self, ids: &[String]) -> ClientResult<()> {
        let _ = ids;
        Err(ClientError::Unsupported { operation: "resume" })
    }

    /// Query free space for a path on the daemon host.
    async fn check_free_space(&self, path: &str) -> ClientResult<FreeSpace> {
        let _ = path;
        Err(ClientError::Unsupported {
            operation: "check_free_space",
        })
    }

    /// Create a directory (and parents) on the daemon host.
    async fn create_directory(&self, path: &str) -> ClientResult<()> {
        let _ = path;
        Err(ClientError::Unsupported {
            operation: "create_directory",
        })
    }

    /// Force a tracker announce.
    async fn reannounce(&self, id: &str) -> ClientResult<()> {
        let _ = id;
        Err(ClientError::Unsupported {
            operation: "reannounce",
        })
    }

    /// Point a torrent at a new location, optionally moving its data.
    async fn set_location(&self, id: &str, path: &str, move_data: bool) -> ClientResult<()> {
        let _ = (id, path, move_data);
        Err(ClientError::Unsupported {
            operation: "set_location",
        })
    }
}

/// Source of torrent snapshots polled by the reconciliation driver.
#[async_trait]
pub trait TorrentInspector: Send + Sync {
    /// Retrieve the full torrent list.
    async fn list(&self) -> anyhow::Result<Vec<TorrentSnapshot>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareClient;

    #[async_trait]
    impl RecoveryClient for BareClient {
        fn capabilities(&self) -> ClientCapabilities {
            ClientCapabilities::none()
        }
    }

    #[tokio::test]
    async fn default_methods_report_unsupported() {
        let client = BareClient;
        let ids = vec!["1".to_string()];
        assert!(matches!(
            client.verify(&ids).await,
            Err(ClientError::Unsupported { operation: "verify" })
        ));
        assert!(client.resume(&ids).await.is_err());
        assert!(client.reannounce("1").await.is_err());
        assert!(client.create_directory("/data").await.is_err());
        assert!(client.set_location("1", "/data", false).await.is_err());
        let err = client
            .check_free_space("/data")
            .await
            .expect_err("free space should be unsupported");
        assert_eq!(err.operation(), "check_free_space");
        assert!(err.is_unsupported());
    }

    #[test]
    fn capability_presets() {
        assert!(ClientCapabilities::all().set_location);
        assert_eq!(ClientCapabilities::none(), ClientCapabilities::default());
    }
}
