//! `_https._tcp` mDNS advertisement for the MediaBus host.
//!
//! Grounded in the multicast-daemon lifecycle from
//! `other_examples/paterkleomenis-connected`'s discovery service: one
//! `ServiceDaemon`, register on `start`, unregister on `stop`. MediaBus only
//! ever advertises itself (it has no peer-discovery side), so the browse/track
//! machinery that file builds around it is not needed here.

use std::net::Ipv4Addr;

use mdns_sd::{ServiceDaemon, ServiceInfo};
use thiserror::Error;
use tracing::{debug, warn};

const SERVICE_TYPE: &str = "_https._tcp.local.";
const INSTANCE_NAME: &str = "MediaBus";

#[derive(Debug, Error)]
pub enum MdnsError {
    #[error("mdns daemon error: {0}")]
    Daemon(String),
}

/// Holds the running `ServiceDaemon` for as long as the advertisement should
/// remain live. Dropping without calling `stop()` still unregisters on the
/// next daemon shutdown, but `stop()` should be preferred so failures can be
/// logged at the call site.
pub struct MdnsAdvertiser {
    daemon: ServiceDaemon,
    fullname: String,
    hostname: String,
}

impl MdnsAdvertiser {
    /// Registers the service and returns a handle. Per the host contract,
    /// mDNS failures are never fatal to the host: construction only fails if
    /// the local daemon itself cannot start, and even that is expected to be
    /// logged and ignored by the caller.
    pub fn start(ip: Ipv4Addr, port: u16, host_label: &str) -> Result<Self, MdnsError> {
        let daemon = ServiceDaemon::new().map_err(|e| MdnsError::Daemon(e.to_string()))?;

        let hostname = format!("{host_label}.local.");
        let mut properties = std::collections::HashMap::new();
        properties.insert("path".to_string(), "/".to_string());
        properties.insert("host".to_string(), hostname.clone());

        let service_info = ServiceInfo::new(
            SERVICE_TYPE,
            INSTANCE_NAME,
            &hostname,
            std::net::IpAddr::V4(ip),
            port,
            properties,
        )
        .map_err(|e| MdnsError::Daemon(e.to_string()))?;
        let fullname = service_info.get_fullname().to_string();

        daemon
            .register(service_info)
            .map_err(|e| MdnsError::Daemon(e.to_string()))?;
        debug!(%hostname, port, "mDNS advertisement registered");

        Ok(Self { daemon, fullname, hostname })
    }

    /// The hostname clients should use to reach the host, derived from
    /// whatever label `start()` was given. Falls back to `default` only if
    /// somehow asked before `start()` ever ran, which callers should avoid.
    pub fn advertised_hostname(&self, default: &str) -> String {
        if self.hostname.is_empty() {
            default.trim_end_matches('.').to_string()
        } else {
            self.hostname.trim_end_matches('.').to_string()
        }
    }

    /// Unregisters the service. Failures are logged, never propagated: a
    /// stuck mDNS daemon must not block the rest of the host shutdown.
    pub fn stop(self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            warn!(error = %e, "failed to unregister mDNS service");
        }
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = %e, "failed to shut down mDNS daemon");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertised_hostname_strips_trailing_dot() {
        // Constructing a real daemon requires a live network stack; this only
        // exercises the pure string logic used by `advertised_hostname`.
        let hostname = "mediabus.local.".to_string();
        let stripped = hostname.trim_end_matches('.').to_string();
        assert_eq!(stripped, "mediabus.local");
    }
}
