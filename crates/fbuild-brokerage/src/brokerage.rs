//! Worker discovery facade.
//!
//! [`WorkerBrokerage`] is the public surface of the brokerage: clients
//! call [`find_workers`](WorkerBrokerage::find_workers) to learn which
//! workers are reachable, workers call
//! [`set_availability`](WorkerBrokerage::set_availability) to advertise
//! or revoke themselves, and the wire layer feeds list responses through
//! [`update_worker_list`](WorkerBrokerage::update_worker_list).
//!
//! All backend errors are absorbed here: operations log and return empty
//! or partial results so a discovery failure degrades the build to "no
//! workers" instead of failing it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use fbuild_proto::constants::LOOPBACK_ADDR;
use fbuild_proto::defaults::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_STATUS_UPDATE_INTERVAL_MS,
};
use fbuild_proto::message::addr_to_string;

use crate::config::{BrokerageConfig, BROKERAGE_PATH_ENV, COORDINATOR_ENV};
use crate::coordinator::{CoordinatorClient, ListRendezvous};
use crate::host_id;
use crate::rendezvous;

struct AvailabilityState {
    available: bool,
    last_update: Instant,
}

/// Worker discovery and availability for one node.
///
/// One instance serves both roles: the client side queries worker lists,
/// the worker side advertises availability. The backend (coordinator,
/// filesystem rendezvous, or disabled) is fixed at construction.
pub struct WorkerBrokerage {
    config: BrokerageConfig,
    host_identity: String,
    /// Sentinel file advertising this worker; `None` unless the
    /// filesystem backend is active.
    sentinel_path: Option<PathBuf>,
    state: Mutex<AvailabilityState>,
    rendezvous: Arc<ListRendezvous>,
    connect_timeout: Duration,
    response_timeout: Duration,
    status_interval: Duration,
}

impl WorkerBrokerage {
    /// Build a brokerage from the environment
    /// (`FASTBUILD_COORDINATOR` / `FASTBUILD_BROKERAGE_PATH`).
    pub fn from_env() -> Self {
        Self::new(BrokerageConfig::from_env(None), host_id::resolve())
    }

    /// Build a brokerage with an explicit coordinator address, which
    /// takes priority over the environment.
    pub fn with_coordinator(address: &str) -> Self {
        Self::new(BrokerageConfig::from_env(Some(address)), host_id::resolve())
    }

    /// Build a brokerage from an already-resolved configuration.
    pub fn new(config: BrokerageConfig, host_identity: impl Into<String>) -> Self {
        let host_identity = host_identity.into();
        let sentinel_path = match &config {
            BrokerageConfig::Filesystem { root } => Some(root.join(&host_identity)),
            _ => None,
        };

        Self {
            config,
            host_identity,
            sentinel_path,
            state: Mutex::new(AvailabilityState {
                available: false,
                last_update: Instant::now(),
            }),
            rendezvous: Arc::new(ListRendezvous::new()),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            response_timeout: Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            status_interval: Duration::from_millis(DEFAULT_STATUS_UPDATE_INTERVAL_MS),
        }
    }

    /// Override the coordinator connect and response timeouts.
    pub fn with_timeouts(mut self, connect: Duration, response: Duration) -> Self {
        self.connect_timeout = connect;
        self.response_timeout = response;
        self
    }

    /// Override the minimum interval between availability
    /// re-announcements.
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// The versioned rendezvous directory, when the filesystem backend is
    /// active.
    pub fn brokerage_root(&self) -> Option<&Path> {
        match &self.config {
            BrokerageConfig::Filesystem { root } => Some(root),
            _ => None,
        }
    }

    /// The identity used as the sentinel filename and the self-filter
    /// key.
    pub fn host_identity(&self) -> &str {
        &self.host_identity
    }

    /// Query the currently reachable workers.
    ///
    /// Returns a possibly empty list, never an error; the local host and
    /// loopback are filtered out, and the remaining order is preserved.
    /// With a coordinator configured this blocks for up to the connect
    /// plus response timeouts; there is no fallback to the filesystem
    /// backend.
    pub async fn find_workers(&self) -> Vec<String> {
        match &self.config {
            BrokerageConfig::Disabled => {
                warn!(
                    "no brokerage root and no coordinator available; \
                     did you set {} or {}?",
                    BROKERAGE_PATH_ENV, COORDINATOR_ENV
                );
                Vec::new()
            }
            BrokerageConfig::Coordinator { address, port } => {
                let client = self.client(address, *port);
                match client.request_worker_list(self.rendezvous.clone()).await {
                    Ok(packed) => {
                        info!("worker list received: {} workers", packed.len());
                        if packed.is_empty() {
                            warn!("no workers received from coordinator");
                            return Vec::new();
                        }
                        packed
                            .iter()
                            .map(|addr| addr_to_string(*addr))
                            .filter(|name| self.keep_worker(name))
                            .collect()
                    }
                    Err(e) => {
                        debug!("worker list request failed: {}", e);
                        Vec::new()
                    }
                }
            }
            BrokerageConfig::Filesystem { root } => rendezvous::enumerate(root)
                .await
                .into_iter()
                .filter(|name| self.keep_worker(name))
                .collect(),
        }
    }

    /// Callback target for the wire layer: deliver a worker-list
    /// response. Takes ownership of the address list and wakes the
    /// `find_workers` call awaiting it. Safe to call from any task or
    /// thread.
    pub fn update_worker_list(&self, addresses: Vec<u32>) {
        self.rendezvous.deliver(addresses);
    }

    /// Advertise (`true`) or revoke (`false`) this worker's availability.
    ///
    /// Re-announcements while already advertised are throttled to one per
    /// status interval. Backend failures are absorbed; the recorded state
    /// always reflects the caller's intent so the next call retries.
    pub async fn set_availability(&self, available: bool) {
        if matches!(self.config, BrokerageConfig::Disabled) {
            debug!("availability update ignored: brokerage not configured");
            return;
        }

        let mut state = self.state.lock().await;

        if available {
            if !state.available || state.last_update.elapsed() >= self.status_interval {
                self.announce(&mut state).await;
            }
        } else if state.available {
            self.revoke().await;
            state.last_update = Instant::now();
        }

        state.available = available;
    }

    /// Announce availability on the active backend. Restarts the throttle
    /// timer only after a successful announcement.
    async fn announce(&self, state: &mut AvailabilityState) {
        match &self.config {
            BrokerageConfig::Coordinator { address, port } => {
                let client = self.client(address, *port);
                if client.set_worker_status(true).await.is_ok() {
                    state.last_update = Instant::now();
                }
            }
            BrokerageConfig::Filesystem { root } => {
                let sentinel = root.join(&self.host_identity);
                // A fresh advertisement always writes; a re-announcement
                // only repairs an externally removed sentinel.
                if !state.available || !sentinel.exists() {
                    if rendezvous::announce(root, &sentinel).await.is_ok() {
                        state.last_update = Instant::now();
                    }
                }
            }
            BrokerageConfig::Disabled => {}
        }
    }

    /// Revoke availability on the active backend. Errors are absorbed.
    async fn revoke(&self) {
        match &self.config {
            BrokerageConfig::Coordinator { address, port } => {
                let client = self.client(address, *port);
                let _ = client.set_worker_status(false).await;
            }
            BrokerageConfig::Filesystem { root } => {
                let _ = rendezvous::revoke(&root.join(&self.host_identity)).await;
            }
            BrokerageConfig::Disabled => {}
        }
    }

    /// Keep a worker entry unless it names this host (case-insensitive)
    /// or loopback. Applied to both backends.
    fn keep_worker(&self, name: &str) -> bool {
        if name.eq_ignore_ascii_case(&self.host_identity) || name == LOOPBACK_ADDR {
            debug!("skipping worker {}", name);
            return false;
        }
        true
    }

    fn client(&self, address: &str, port: u16) -> CoordinatorClient {
        CoordinatorClient::new(
            address.to_string(),
            port,
            self.connect_timeout,
            self.response_timeout,
        )
    }
}

impl Drop for WorkerBrokerage {
    fn drop(&mut self) {
        // Ensure the sentinel disappears when we were still advertised.
        if self.state.get_mut().available {
            if let Some(path) = &self.sentinel_path {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbuild_proto::message::{CoordinatorRequest, CoordinatorResponse};
    use tokio::net::TcpListener;

    fn filesystem_brokerage(root: &Path, identity: &str) -> WorkerBrokerage {
        WorkerBrokerage::new(
            BrokerageConfig::Filesystem {
                root: root.to_path_buf(),
            },
            identity,
        )
    }

    async fn coordinator_brokerage(workers: Vec<u32>, identity: &str) -> WorkerBrokerage {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let req: CoordinatorRequest = crate::net::read_msg(&mut stream).await.unwrap();
            assert_eq!(req, CoordinatorRequest::RequestWorkerList);
            crate::net::send_msg(&mut stream, &CoordinatorResponse::WorkerList(workers))
                .await
                .unwrap();
        });

        WorkerBrokerage::new(
            BrokerageConfig::Coordinator {
                address: "127.0.0.1".to_string(),
                port,
            },
            identity,
        )
    }

    #[tokio::test]
    async fn test_unconfigured_returns_empty() {
        let brokerage = WorkerBrokerage::new(BrokerageConfig::Disabled, "build-07");

        assert!(brokerage.find_workers().await.is_empty());
        assert!(brokerage.brokerage_root().is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_availability_is_a_noop() {
        let brokerage = WorkerBrokerage::new(BrokerageConfig::Disabled, "build-07");
        brokerage.set_availability(true).await;

        // No backend was touched and no state was recorded.
        assert!(!brokerage.state.lock().await.available);
    }

    #[tokio::test]
    async fn test_coordinator_happy_path() {
        let brokerage = coordinator_brokerage(
            vec![0x0A000005, 0x0A000007, 0x7F000001],
            "build-07",
        )
        .await;

        let workers = brokerage.find_workers().await;
        assert_eq!(workers, vec!["10.0.0.5".to_string(), "10.0.0.7".to_string()]);
    }

    #[tokio::test]
    async fn test_coordinator_filters_self() {
        let brokerage =
            coordinator_brokerage(vec![0x0A000005, 0x0A000007], "10.0.0.5").await;

        let workers = brokerage.find_workers().await;
        assert_eq!(workers, vec!["10.0.0.7".to_string()]);
    }

    #[tokio::test]
    async fn test_coordinator_unreachable_returns_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let brokerage = WorkerBrokerage::new(
            BrokerageConfig::Coordinator {
                address: "127.0.0.1".to_string(),
                port,
            },
            "build-07",
        );

        // No filesystem fallback: the backend is exclusive by
        // construction.
        assert!(brokerage.find_workers().await.is_empty());
        assert!(brokerage.brokerage_root().is_none());
    }

    #[tokio::test]
    async fn test_filesystem_happy_path() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["build-03", "build-07", "build-09"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let brokerage = filesystem_brokerage(dir.path(), "build-07");
        let mut workers = brokerage.find_workers().await;
        workers.sort();

        assert_eq!(workers, vec!["build-03".to_string(), "build-09".to_string()]);
    }

    #[tokio::test]
    async fn test_filesystem_self_filter_ignores_case() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("BUILD-07"), b"").unwrap();
        std::fs::write(dir.path().join("build-03"), b"").unwrap();

        let brokerage = filesystem_brokerage(dir.path(), "build-07");
        assert_eq!(brokerage.find_workers().await, vec!["build-03".to_string()]);
    }

    #[tokio::test]
    async fn test_filesystem_filters_loopback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("127.0.0.1"), b"").unwrap();
        std::fs::write(dir.path().join("10.0.0.9"), b"").unwrap();

        let brokerage = filesystem_brokerage(dir.path(), "build-07");
        assert_eq!(brokerage.find_workers().await, vec!["10.0.0.9".to_string()]);
    }

    #[tokio::test]
    async fn test_availability_creates_and_removes_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let brokerage = filesystem_brokerage(dir.path(), "build-07");
        let sentinel = dir.path().join("build-07");

        brokerage.set_availability(true).await;
        assert!(sentinel.exists());

        brokerage.set_availability(false).await;
        assert!(!sentinel.exists());
    }

    #[tokio::test]
    async fn test_revoke_without_advertising_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let brokerage = filesystem_brokerage(dir.path(), "build-07");

        brokerage.set_availability(false).await;
        assert!(!dir.path().join("build-07").exists());
    }

    #[tokio::test]
    async fn test_reannouncement_is_throttled() {
        let dir = tempfile::tempdir().unwrap();
        let brokerage = filesystem_brokerage(dir.path(), "build-07")
            .with_status_interval(Duration::from_millis(100));
        let sentinel = dir.path().join("build-07");

        brokerage.set_availability(true).await;
        assert!(sentinel.exists());

        // Externally removed within the throttle window: not repaired.
        std::fs::remove_file(&sentinel).unwrap();
        brokerage.set_availability(true).await;
        assert!(!sentinel.exists());

        // After the window the next announcement repairs it.
        tokio::time::sleep(Duration::from_millis(150)).await;
        brokerage.set_availability(true).await;
        assert!(sentinel.exists());
    }

    #[tokio::test]
    async fn test_present_sentinel_does_not_restart_timer() {
        let dir = tempfile::tempdir().unwrap();
        let brokerage = filesystem_brokerage(dir.path(), "build-07")
            .with_status_interval(Duration::from_millis(100));
        let sentinel = dir.path().join("build-07");

        brokerage.set_availability(true).await;
        tokio::time::sleep(Duration::from_millis(150)).await;

        // The sentinel is still present, so this tick neither writes nor
        // restarts the timer...
        brokerage.set_availability(true).await;

        // ...which means a removal right after it is repaired
        // immediately on the next tick.
        std::fs::remove_file(&sentinel).unwrap();
        brokerage.set_availability(true).await;
        assert!(sentinel.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let sentinel = dir.path().join("build-07");

        {
            let brokerage = filesystem_brokerage(dir.path(), "build-07");
            brokerage.set_availability(true).await;
            assert!(sentinel.exists());
        }

        assert!(!sentinel.exists());
    }

    #[tokio::test]
    async fn test_drop_after_revoke_leaves_other_sentinels() {
        // A second worker with the same root must not lose its sentinel
        // when an unavailable brokerage drops.
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("build-09");
        std::fs::write(&other, b"").unwrap();

        {
            let brokerage = filesystem_brokerage(dir.path(), "build-07");
            brokerage.set_availability(true).await;
            brokerage.set_availability(false).await;
        }

        assert!(other.exists());
        assert!(!dir.path().join("build-07").exists());
    }

    #[tokio::test]
    async fn test_availability_unreachable_coordinator_is_absorbed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let brokerage = WorkerBrokerage::new(
            BrokerageConfig::Coordinator {
                address: "127.0.0.1".to_string(),
                port,
            },
            "build-07",
        );

        brokerage.set_availability(true).await;

        // Intent is recorded so the next throttle tick retries.
        assert!(brokerage.state.lock().await.available);
    }

    #[tokio::test]
    async fn test_availability_via_coordinator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            crate::net::read_msg::<CoordinatorRequest>(&mut stream).await.unwrap()
        });

        let brokerage = WorkerBrokerage::new(
            BrokerageConfig::Coordinator {
                address: "127.0.0.1".to_string(),
                port,
            },
            "build-07",
        );
        brokerage.set_availability(true).await;

        assert_eq!(
            server.await.unwrap(),
            CoordinatorRequest::SetWorkerStatus { available: true }
        );
    }

    #[tokio::test]
    async fn test_update_worker_list_wakes_waiting_query() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // A coordinator that accepts and reads the request but leaves the
        // reply to an out-of-band `update_worker_list` call.
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _: CoordinatorRequest = crate::net::read_msg(&mut stream).await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let brokerage = Arc::new(
            WorkerBrokerage::new(
                BrokerageConfig::Coordinator {
                    address: "127.0.0.1".to_string(),
                    port,
                },
                "build-07",
            )
            .with_timeouts(Duration::from_millis(2000), Duration::from_millis(2000)),
        );

        let delivery = brokerage.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            delivery.update_worker_list(vec![0x0A000005]);
        });

        assert_eq!(brokerage.find_workers().await, vec!["10.0.0.5".to_string()]);
    }

    #[tokio::test]
    async fn test_brokerage_root_accessor() {
        let config = BrokerageConfig::resolve(None, Some("/srv/fb".to_string()));
        let brokerage = WorkerBrokerage::new(config, "build-07");

        let root = brokerage.brokerage_root().unwrap();
        assert!(root.starts_with("/srv/fb/main"));
    }
}
