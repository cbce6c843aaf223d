//! Balancing algorithm selection.
//!
//! Every variant maps to a strategy object. Variants without an
//! implementation map to [`Unsupported`], which fails at selection time.

use std::fmt;
use std::str::FromStr;

use crate::error::ProxyError;
use crate::load_balancer::{key_hash::KeyHash, round_robin::RoundRobin, SelectionState, Strategy};
use crate::net::BackendAddress;

/// The closed set of known balancing algorithms.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    #[default]
    RoundRobin = 0,
    WeightedRoundRobin = 1,
    /// Key-hash affinity over the client's `host:port`.
    IpHash = 2,
    LeastConnection = 3,
    LeastResponse = 4,
    ResourceBased = 5,
}

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::RoundRobin,
        Algorithm::WeightedRoundRobin,
        Algorithm::IpHash,
        Algorithm::LeastConnection,
        Algorithm::LeastResponse,
        Algorithm::ResourceBased,
    ];

    /// Canonical name, as used in configuration files.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "RoundRobin",
            Algorithm::WeightedRoundRobin => "WeightedRoundRobin",
            Algorithm::IpHash => "IPHash",
            Algorithm::LeastConnection => "LeastConnection",
            Algorithm::LeastResponse => "LeastResponse",
            Algorithm::ResourceBased => "ResourceBased",
        }
    }

    pub fn is_implemented(self) -> bool {
        matches!(self, Algorithm::RoundRobin | Algorithm::IpHash)
    }

    /// The strategy object that performs selection for this algorithm.
    pub fn strategy(self) -> &'static dyn Strategy {
        static ROUND_ROBIN: RoundRobin = RoundRobin;
        static KEY_HASH: KeyHash = KeyHash;
        static WEIGHTED_ROUND_ROBIN: Unsupported = Unsupported(Algorithm::WeightedRoundRobin);
        static LEAST_CONNECTION: Unsupported = Unsupported(Algorithm::LeastConnection);
        static LEAST_RESPONSE: Unsupported = Unsupported(Algorithm::LeastResponse);
        static RESOURCE_BASED: Unsupported = Unsupported(Algorithm::ResourceBased);

        match self {
            Algorithm::RoundRobin => &ROUND_ROBIN,
            Algorithm::IpHash => &KEY_HASH,
            Algorithm::WeightedRoundRobin => &WEIGHTED_ROUND_ROBIN,
            Algorithm::LeastConnection => &LEAST_CONNECTION,
            Algorithm::LeastResponse => &LEAST_RESPONSE,
            Algorithm::ResourceBased => &RESOURCE_BASED,
        }
    }
}

impl From<u8> for Algorithm {
    fn from(val: u8) -> Self {
        match val {
            1 => Algorithm::WeightedRoundRobin,
            2 => Algorithm::IpHash,
            3 => Algorithm::LeastConnection,
            4 => Algorithm::LeastResponse,
            5 => Algorithm::ResourceBased,
            _ => Algorithm::RoundRobin,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ProxyError;

    /// Accepts canonical names plus kebab/snake aliases, case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "roundrobin" | "rr" => Ok(Algorithm::RoundRobin),
            "weightedroundrobin" | "wrr" => Ok(Algorithm::WeightedRoundRobin),
            "iphash" | "keyhash" | "iph" => Ok(Algorithm::IpHash),
            "leastconnection" | "leastconnections" | "lcn" => Ok(Algorithm::LeastConnection),
            "leastresponse" | "leastresponsetime" | "lrp" => Ok(Algorithm::LeastResponse),
            "resourcebased" | "rb" => Ok(Algorithm::ResourceBased),
            _ => Err(ProxyError::UnsupportedAlgorithm(value.to_string())),
        }
    }
}

/// Terminal strategy for known-but-unimplemented algorithms.
#[derive(Debug)]
pub struct Unsupported(pub Algorithm);

impl Strategy for Unsupported {
    fn select(
        &self,
        _healthy: &[BackendAddress],
        _client_key: &str,
        _state: &mut SelectionState,
    ) -> Result<BackendAddress, ProxyError> {
        Err(ProxyError::UnsupportedAlgorithm(self.0.name().to_string()))
    }
}
