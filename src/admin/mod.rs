//! The admin verifier.
//!
//! Admin requests carry a signed envelope over a canonical message. This
//! module mints/consumes nonces (see [`nonce`]), checks the caller's
//! declared version against the server's contract, and verifies the
//! envelope's signature against a pre-configured SSH public key using the
//! `ssh-key` crate. Canonicalization uses a `BTreeMap` for `args` so key
//! order is always sorted, which the signer on the other end must
//! reproduce byte-for-byte.

pub mod nonce;

use std::collections::BTreeMap;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use semver::Version;
use serde::{Deserialize, Serialize};
use ssh_key::{PublicKey, Signature};

use crate::error::Error;
use crate::version::VersionContract;
use nonce::NoncePool;

/// The message that gets signed, client side. Field order here doesn't
/// matter for serialization (args is a `BTreeMap`, the rest are scalars)
/// but it does need to match the signer's serialization exactly — both
/// ends use plain `serde_json` with no custom field order, so as long as
/// both use `serde_json::to_vec` on this same shape, they agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminMessage {
    pub path: String,
    pub args: BTreeMap<String, String>,
    pub uid: String,
}

impl AdminMessage {
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// The POST body of an admin request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminEnvelope {
    pub signature: String,
    pub uid: String,
    pub version: Version,
}

/// Refuses plaintext admin transport unless the server is in debug mode.
/// `is_tls` is supplied by the HTTP layer (derived from the connection or
/// an `X-Forwarded-Proto` header when behind a reverse proxy); this
/// function is the pure, testable policy the caller applies it with.
pub fn enforce_transport(debug: bool, is_tls: bool) -> Result<(), Error> {
    if debug || is_tls {
        Ok(())
    } else {
        Err(Error::AdminAccessDenied)
    }
}

/// Full admin-request verification: nonce consumption, version gate, then
/// signature check, in that order (a consumed nonce is never refunded
/// even if a later step fails — replay protection must not depend on the
/// rest of the request being well formed).
pub fn verify(
    pool: &NoncePool,
    public_key: &PublicKey,
    contract: &VersionContract,
    path: &str,
    args: &BTreeMap<String, String>,
    envelope: &AdminEnvelope,
) -> Result<(), Error> {
    if !pool.consume(&envelope.uid) {
        return Err(Error::AdminBadNonce);
    }

    if contract.check(&envelope.version) != crate::version::VersionVerdict::Ok {
        return Err(Error::IllegalAdminVersion {
            min_version: contract.min_version.clone(),
        });
    }

    let message = AdminMessage {
        path: path.to_string(),
        args: args.clone(),
        uid: envelope.uid.clone(),
    };
    let canonical = message.canonical_bytes()?;

    let sig_bytes = BASE64_STANDARD
        .decode(&envelope.signature)
        .map_err(|_| Error::AdminAccessDenied)?;
    let signature = Signature::new(public_key.algorithm(), sig_bytes)
        .map_err(|_| Error::AdminAccessDenied)?;

    public_key
        .verify(&canonical, &signature)
        .map_err(|_| Error::AdminAccessDenied)
}
