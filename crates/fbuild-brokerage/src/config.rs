//! Backend selection for the brokerage.
//!
//! Exactly one backend is active per brokerage instance. The selection is
//! a sum type rather than a pair of maybe-empty strings so that a
//! configured coordinator can never silently fall through to the
//! filesystem within a single call.

use std::env;
use std::path::PathBuf;

use tracing::info;

use fbuild_proto::constants::{COORDINATOR_PORT, PLATFORM_TAG, PROTOCOL_VERSION};

/// Environment variable naming the coordinator host or IP.
pub const COORDINATOR_ENV: &str = "FASTBUILD_COORDINATOR";

/// Environment variable naming the shared brokerage root directory.
pub const BROKERAGE_PATH_ENV: &str = "FASTBUILD_BROKERAGE_PATH";

/// The backend a brokerage instance talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerageConfig {
    /// Central worker registry reached over framed TCP.
    Coordinator { address: String, port: u16 },
    /// Shared-filesystem rendezvous. `root` is the fully versioned
    /// directory, not the user-provided path.
    Filesystem { root: PathBuf },
    /// Neither backend configured. Every operation degrades to a no-op.
    Disabled,
}

impl BrokerageConfig {
    /// Resolve the backend from the environment.
    ///
    /// An `explicit_coordinator` (e.g. from a command-line flag) beats
    /// `FASTBUILD_COORDINATOR`, which beats `FASTBUILD_BROKERAGE_PATH`.
    pub fn from_env(explicit_coordinator: Option<&str>) -> Self {
        let coordinator = explicit_coordinator
            .map(str::to_owned)
            .or_else(|| env::var(COORDINATOR_ENV).ok());
        let root = env::var(BROKERAGE_PATH_ENV).ok();
        Self::resolve(coordinator, root)
    }

    /// Resolve the backend from explicit values. Empty strings count as
    /// unset.
    pub fn resolve(coordinator: Option<String>, root: Option<String>) -> Self {
        if let Some(address) = coordinator.filter(|addr| !addr.is_empty()) {
            info!("using coordinator at {}", address);
            return BrokerageConfig::Coordinator {
                address,
                port: COORDINATOR_PORT,
            };
        }

        if let Some(root) = root.filter(|root| !root.is_empty()) {
            let root = versioned_root(&root);
            info!("using brokerage folder {}", root.display());
            return BrokerageConfig::Filesystem { root };
        }

        BrokerageConfig::Disabled
    }
}

/// The versioned rendezvous directory under the user-provided root:
/// `<root>/main/<version>.<platform>/`.
fn versioned_root(root: &str) -> PathBuf {
    PathBuf::from(root)
        .join("main")
        .join(format!("{}.{}", PROTOCOL_VERSION, PLATFORM_TAG))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_beats_filesystem() {
        let config = BrokerageConfig::resolve(
            Some("10.0.0.1".to_string()),
            Some("/srv/fb".to_string()),
        );
        assert_eq!(
            config,
            BrokerageConfig::Coordinator {
                address: "10.0.0.1".to_string(),
                port: COORDINATOR_PORT,
            }
        );
    }

    #[test]
    fn test_filesystem_root_is_versioned() {
        let config = BrokerageConfig::resolve(None, Some("/srv/fb".to_string()));
        match config {
            BrokerageConfig::Filesystem { root } => {
                let expected = PathBuf::from("/srv/fb")
                    .join("main")
                    .join(format!("{}.{}", PROTOCOL_VERSION, PLATFORM_TAG));
                assert_eq!(root, expected);
            }
            other => panic!("expected filesystem backend, got {:?}", other),
        }
    }

    #[test]
    fn test_neither_configured_is_disabled() {
        assert_eq!(
            BrokerageConfig::resolve(None, None),
            BrokerageConfig::Disabled
        );
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        assert_eq!(
            BrokerageConfig::resolve(Some(String::new()), Some(String::new())),
            BrokerageConfig::Disabled
        );

        // An empty coordinator does not mask a real filesystem root.
        let config =
            BrokerageConfig::resolve(Some(String::new()), Some("/srv/fb".to_string()));
        assert!(matches!(config, BrokerageConfig::Filesystem { .. }));
    }

    #[test]
    fn test_explicit_coordinator_wins_over_env() {
        // The explicit argument is honored regardless of process
        // environment, so this stays deterministic under parallel tests.
        let config = BrokerageConfig::from_env(Some("build-coordinator"));
        assert_eq!(
            config,
            BrokerageConfig::Coordinator {
                address: "build-coordinator".to_string(),
                port: COORDINATOR_PORT,
            }
        );
    }
}
