//! Tunable operational defaults for the fbuild build farm.
//!
//! Protocol-level constants (version, ports, platform tags) remain in
//! [`crate::constants`]. This module centralizes the configurable
//! defaults that callers can override per brokerage instance.

// ─── Coordinator Exchange ───────────────────────────────────────────────────

/// TCP connect timeout for a coordinator exchange (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// How long a client waits for the coordinator's worker-list response
/// before giving up (milliseconds). A coordinator that accepts the
/// connection but never replies must not hang the build, so the wait is
/// bounded at 4x the connect timeout.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 4 * DEFAULT_CONNECT_TIMEOUT_MS;

/// Maximum size of a single coordinator wire message (bytes). 1 MB.
/// Protects against corrupt length prefixes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

// ─── Availability ───────────────────────────────────────────────────────────

/// Minimum interval between availability re-announcements while a worker
/// is already advertised (milliseconds). Keeps repeated
/// `set_availability(true)` calls from hammering the coordinator or the
/// shared filesystem.
pub const DEFAULT_STATUS_UPDATE_INTERVAL_MS: u64 = 10_000;
