/// Protocol and system constants for the fbuild build farm.

/// Distributed compilation protocol version.
///
/// Bumping this partitions the fleet: the filesystem rendezvous directory
/// embeds it, so workers and clients on different versions never see each
/// other and no manual cleanup is needed.
pub const PROTOCOL_VERSION: u32 = 22;

/// Port the coordinator listens on for worker and client connections.
pub const COORDINATOR_PORT: u16 = 31392;

/// Platform tag embedded in the rendezvous directory name.
///
/// Sentinel namespaces are partitioned per OS alongside the protocol
/// version since toolchains do not mix across platforms.
#[cfg(target_os = "windows")]
pub const PLATFORM_TAG: &str = "windows";
#[cfg(target_os = "macos")]
pub const PLATFORM_TAG: &str = "osx";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const PLATFORM_TAG: &str = "linux";

/// Loopback address excluded from every worker list a client receives.
pub const LOOPBACK_ADDR: &str = "127.0.0.1";
