//! The version/contract layer: parses and compares client/server versions,
//! enforces the min-version and ban-list, and reports the result as a
//! wire-level verdict the HTTP handlers translate into status codes.

use semver::Version;
use serde::{Deserialize, Serialize};

/// The version this build of the server identifies as.
pub fn server_version() -> Version {
    env!("CARGO_PKG_VERSION")
        .parse()
        .expect("CARGO_PKG_VERSION must be a valid semver string")
}

/// Outcome of comparing a client-declared version against this server's
/// contract (minimum supported version plus an explicit ban list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionVerdict {
    Ok,
    TooOld,
    Banned,
}

/// The server's version contract: the oldest client version it still
/// serves, plus a list of versions it refuses outright (e.g. known-broken
/// releases) even if they're newer than `min_version`.
#[derive(Debug, Clone)]
pub struct VersionContract {
    pub min_version: Version,
    pub banned: Vec<Version>,
}

impl VersionContract {
    pub fn new(min_version: Version, banned: Vec<Version>) -> Self {
        Self {
            min_version,
            banned,
        }
    }

    pub fn check(&self, client: &Version) -> VersionVerdict {
        if self.banned.contains(client) {
            VersionVerdict::Banned
        } else if *client < self.min_version {
            VersionVerdict::TooOld
        } else {
            VersionVerdict::Ok
        }
    }
}

/// `GET /supported` payload: the oldest version this server still
/// accepts plus its explicit ban list, keyed the way a client's
/// `info["min"]`/`info["banned"]` lookup expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedInfo {
    pub min: Version,
    pub banned: Vec<Version>,
}

impl SupportedInfo {
    pub fn new(contract: &VersionContract) -> Self {
        Self {
            min: contract.min_version.clone(),
            banned: contract.banned.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn rejects_too_old() {
        let contract = VersionContract::new(v("2.0.0"), vec![]);
        assert_eq!(contract.check(&v("1.9.9")), VersionVerdict::TooOld);
    }

    #[test]
    fn accepts_at_min() {
        let contract = VersionContract::new(v("2.0.0"), vec![]);
        assert_eq!(contract.check(&v("2.0.0")), VersionVerdict::Ok);
    }

    #[test]
    fn rejects_banned_even_if_newer() {
        let contract = VersionContract::new(v("1.0.0"), vec![v("3.1.4")]);
        assert_eq!(contract.check(&v("3.1.4")), VersionVerdict::Banned);
    }
}
