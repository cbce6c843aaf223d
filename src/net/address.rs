//! Backend address value type.
//!
//! A `BackendAddress` is the registry key, the session-cache value and the
//! dial target. It compares by value and renders as `"<host>:<port>"`.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::ProxyError;

/// A `(host, port)` pair identifying one backend server.
///
/// Ordering is by host, then port; the registry iterates in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendAddress {
    host: String,
    port: u16,
}

impl BackendAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to the first socket address the host maps to.
    pub async fn resolve(&self) -> Result<SocketAddr, ProxyError> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| ProxyError::AddressError {
                addr: self.to_string(),
                reason: e.to_string(),
            })?;

        addrs.next().ok_or_else(|| ProxyError::AddressError {
            addr: self.to_string(),
            reason: "host resolved to no addresses".to_string(),
        })
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for BackendAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl FromStr for BackendAddress {
    type Err = ProxyError;

    /// Parse `"<host>:<port>"`, splitting on the last `:`. IPv6 hosts may be bracketed.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ProxyError::AddressError {
            addr: s.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        let host = match host.strip_prefix('[') {
            Some(inner) => inner.strip_suffix(']').ok_or_else(|| invalid("unclosed '['"))?,
            None if host.ends_with(']') => return Err(invalid("unopened ']'")),
            None => host,
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

        Ok(Self::new(host, port))
    }
}
