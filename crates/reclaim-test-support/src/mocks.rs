//! Scripted daemon adapter and snapshot inspector.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reclaim_torrent_core::{
    ClientCapabilities, ClientError, ClientResult, FreeSpace, RecoveryClient, TorrentInspector,
    TorrentSnapshot,
};

/// Adapter calls recorded by [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `verify(ids)`.
    Verify(Vec<String>),
    /// `resume(ids)`.
    Resume(Vec<String>),
    /// `check_free_space(path)`.
    CheckFreeSpace(String),
    /// `create_directory(path)`.
    CreateDirectory(String),
    /// `reannounce(id)`.
    Reannounce(String),
    /// `set_location(id, path, move_data)`.
    SetLocation(String, String, bool),
}

/// Scripted failure returned by a [`MockClient`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFailure {
    /// Daemon rejection with optional code.
    Rejected {
        /// Error code string.
        code: Option<String>,
        /// Error message.
        message: String,
    },
    /// Transport failure wrapping an IO error of the given kind.
    Io(io::ErrorKind),
}

impl MockFailure {
    /// Rejection carrying only an error code.
    #[must_use]
    pub fn code(code: &str) -> Self {
        Self::Rejected {
            code: Some(code.to_string()),
            message: format!("{code} reported by daemon"),
        }
    }

    /// Rejection carrying only a message.
    #[must_use]
    pub fn message(message: &str) -> Self {
        Self::Rejected {
            code: None,
            message: message.to_string(),
        }
    }

    fn into_error(self, operation: &'static str) -> ClientError {
        match self {
            Self::Rejected { code, message } => ClientError::Rejected {
                operation,
                code,
                message,
            },
            Self::Io(kind) => ClientError::transport(operation, io::Error::new(kind, "io failure")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Method {
    Verify,
    Resume,
    CheckFreeSpace,
    CreateDirectory,
    Reannounce,
    SetLocation,
}

impl Method {
    const fn operation(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Resume => "resume",
            Self::CheckFreeSpace => "check_free_space",
            Self::CreateDirectory => "create_directory",
            Self::Reannounce => "reannounce",
            Self::SetLocation => "set_location",
        }
    }

    const fn enabled(self, capabilities: ClientCapabilities) -> bool {
        match self {
            Self::Verify => capabilities.verify,
            Self::Resume => capabilities.resume,
            Self::CheckFreeSpace => capabilities.check_free_space,
            Self::CreateDirectory => capabilities.create_directory,
            Self::Reannounce => capabilities.reannounce,
            Self::SetLocation => capabilities.set_location,
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    failures: HashMap<Method, VecDeque<MockFailure>>,
    free_bytes: u64,
}

/// In-memory [`RecoveryClient`] with scripted failures and call recording.
///
/// Calls succeed unless a failure was queued for that method; queued failures
/// are consumed in order. Methods whose capability flag is off return
/// [`ClientError::Unsupported`].
#[derive(Clone)]
pub struct MockClient {
    capabilities: ClientCapabilities,
    delay: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl MockClient {
    /// Client supporting every capability, reporting 1 GiB free.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(ClientCapabilities::all())
    }

    /// Client supporting only the given capabilities.
    #[must_use]
    pub fn with_capabilities(capabilities: ClientCapabilities) -> Self {
        Self {
            capabilities,
            delay: None,
            state: Arc::new(Mutex::new(MockState {
                free_bytes: 1 << 30,
                ..MockState::default()
            })),
        }
    }

    /// Sleep for `delay` (tokio time) before answering any call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Free bytes reported by successful `check_free_space` calls.
    pub fn set_free_bytes(&self, free_bytes: u64) {
        self.lock().free_bytes = free_bytes;
    }

    /// Queue a failure for the next `check_free_space` call.
    pub fn fail_free_space(&self, failure: MockFailure) {
        self.push_failure(Method::CheckFreeSpace, failure);
    }

    /// Queue a failure for the next `create_directory` call.
    pub fn fail_create_directory(&self, failure: MockFailure) {
        self.push_failure(Method::CreateDirectory, failure);
    }

    /// Queue a failure for the next `verify` call.
    pub fn fail_verify(&self, failure: MockFailure) {
        self.push_failure(Method::Verify, failure);
    }

    /// Queue a failure for the next `reannounce` call.
    pub fn fail_reannounce(&self, failure: MockFailure) {
        self.push_failure(Method::Reannounce, failure);
    }

    /// Queue a failure for the next `set_location` call.
    pub fn fail_set_location(&self, failure: MockFailure) {
        self.push_failure(Method::SetLocation, failure);
    }

    /// Queue a failure for the next `resume` call.
    pub fn fail_resume(&self, failure: MockFailure) {
        self.push_failure(Method::Resume, failure);
    }

    /// Calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_failure(&self, method: Method, failure: MockFailure) {
        self.lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(failure);
    }

    async fn answer(&self, method: Method, call: MockCall) -> ClientResult<()> {
        if !method.enabled(self.capabilities) {
            return Err(ClientError::Unsupported {
                operation: method.operation(),
            });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failure = {
            let mut state = self.lock();
            state.calls.push(call);
            state
                .failures
                .get_mut(&method)
                .and_then(VecDeque::pop_front)
        };
        failure.map_or(Ok(()), |failure| Err(failure.into_error(method.operation())))
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecoveryClient for MockClient {
    fn capabilities(&self) -> ClientCapabilities {
        self.capabilities
    }

    async fn verify(&self, ids: &[String]) -> ClientResult<()> {
        self.answer(Method::Verify, MockCall::Verify(ids.to_vec()))
            .await
    }

    async fn resume(&self, ids: &[String]) -> ClientResult<()> {
        self.answer(Method::Resume, MockCall::Resume(ids.to_vec()))
            .await
    }

    async fn check_free_space(&self, path: &str) -> ClientResult<FreeSpace> {
        self.answer(
            Method::CheckFreeSpace,
            MockCall::CheckFreeSpace(path.to_string()),
        )
        .await?;
        Ok(FreeSpace {
            path: path.to_string(),
            free_bytes: self.lock().free_bytes,
            total_bytes: None,
        })
    }

    async fn create_directory(&self, path: &str) -> ClientResult<()> {
        self.answer(
            Method::CreateDirectory,
            MockCall::CreateDirectory(path.to_string()),
        )
        .await
    }

    async fn reannounce(&self, id: &str) -> ClientResult<()> {
        self.answer(Method::Reannounce, MockCall::Reannounce(id.to_string()))
            .await
    }

    async fn set_location(&self, id: &str, path: &str, move_data: bool) -> ClientResult<()> {
        self.answer(
            Method::SetLocation,
            MockCall::SetLocation(id.to_string(), path.to_string(), move_data),
        )
        .await
    }
}

/// [`TorrentInspector`] returning whatever snapshot list was last stored.
#[derive(Clone, Default)]
pub struct MockInspector {
    snapshots: Arc<Mutex<Option<Vec<TorrentSnapshot>>>>,
}

impl MockInspector {
    /// Inspector that initially reports an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(Some(Vec::new()))),
        }
    }

    /// Replace the reported list.
    pub fn set(&self, snapshots: Vec<TorrentSnapshot>) {
        *self.snapshots.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshots);
    }

    /// Make subsequent `list` calls fail.
    pub fn fail(&self) {
        *self.snapshots.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl TorrentInspector for MockInspector {
    async fn list(&self) -> anyhow::Result<Vec<TorrentSnapshot>> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| anyhow::anyhow!("daemon unreachable"))
    }
}
