/// Coordinator wire messages.
///
/// Both directions are framed as a big-endian `u32` length prefix followed
/// by the bincode-serialized enum. Worker addresses travel packed as
/// big-endian `u32` IPv4 values and are converted to dotted-quad strings
/// on the client side.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Client-initiated messages to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorRequest {
    /// Ask for the current worker registry. The coordinator answers with
    /// a [`CoordinatorResponse::WorkerList`].
    RequestWorkerList,
    /// Advertise or revoke this worker's availability. No response is
    /// awaited.
    SetWorkerStatus { available: bool },
}

/// Coordinator replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoordinatorResponse {
    /// The registered workers, as packed big-endian IPv4 addresses.
    WorkerList(Vec<u32>),
}

/// Render a packed big-endian IPv4 address as a dotted-quad string.
pub fn addr_to_string(packed: u32) -> String {
    Ipv4Addr::from(packed).to_string()
}

/// Pack an IPv4 address into its big-endian `u32` wire form.
pub fn pack_addr(addr: Ipv4Addr) -> u32 {
    u32::from(addr)
}
