//! Local host identity resolution.
//!
//! The identity names this node within the fleet: it is both the sentinel
//! filename under the rendezvous directory and the key used to filter
//! this node out of the worker lists it receives.
//!
//! On macOS the identity is the IPv4 address of the primary interface
//! (`en0`) when one is bound, because hostnames there are frequently not
//! resolvable by other fleet members. Everywhere else it is the OS
//! hostname. An unresolvable identity degrades to an empty string, which
//! still yields a consistent (if degenerate) sentinel path.

/// Resolve the local host identity. Called once at brokerage construction.
pub fn resolve() -> String {
    #[cfg(target_os = "macos")]
    if let Some(ip) = primary_interface_ip4() {
        return ip;
    }

    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_default()
}

/// First IPv4 address bound to `en0`, as a dotted quad.
#[cfg(target_os = "macos")]
fn primary_interface_ip4() -> Option<String> {
    let addrs = if_addrs::get_if_addrs().ok()?;
    addrs
        .into_iter()
        .filter(|ifa| ifa.name == "en0")
        .find_map(|ifa| match ifa.addr {
            if_addrs::IfAddr::V4(v4) => Some(v4.ip.to_string()),
            _ => None,
        })
}
