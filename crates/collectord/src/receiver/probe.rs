//! Resolution of the load-balancer probe ignore list.

use std::io;
use std::net::{IpAddr, ToSocketAddrs};

use thiserror::Error;

/// Failure resolving one configured probe host.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Name lookup failed.
    #[error("failed to resolve probe host '{host}': {source}")]
    Lookup {
        /// Configured host.
        host: String,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The lookup returned no addresses.
    #[error("probe host '{host}' resolved to no addresses")]
    Empty {
        /// Configured host.
        host: String,
    },
}

/// Resolves every host to its IP addresses.
///
/// Blank entries are skipped. Otherwise all-or-nothing: a single failing
/// host fails the whole list.
pub fn resolve_probe_addresses(hosts: &[String]) -> Result<Vec<IpAddr>, ResolveError> {
    let mut addresses = Vec::with_capacity(hosts.len());
    for host in hosts {
        let host = host.trim();
        if host.is_empty() {
            continue;
        }
        if let Ok(address) = host.parse::<IpAddr>() {
            push_unique(&mut addresses, address);
            continue;
        }
        let resolved = (host, 0)
            .to_socket_addrs()
            .map_err(|source| ResolveError::Lookup {
                host: host.to_owned(),
                source,
            })?;
        let mut found = false;
        for socket in resolved {
            found = true;
            push_unique(&mut addresses, socket.ip());
        }
        if !found {
            return Err(ResolveError::Empty {
                host: host.to_owned(),
            });
        }
    }
    Ok(addresses)
}

fn push_unique(addresses: &mut Vec<IpAddr>, address: IpAddr) {
    if !addresses.contains(&address) {
        addresses.push(address);
    }
}
