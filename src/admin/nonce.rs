//! The admin nonce pool: single-use anti-replay tokens for admin requests.
//!
//! A process-scoped set of freshly minted single-use opaque strings.
//! `consume` removes-and-returns in one step so a replayed nonce can never
//! be accepted twice, even under concurrent admin requests.

use std::collections::HashSet;

use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct NoncePool {
    issued: Mutex<HashSet<String>>,
}

impl NoncePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints `n` fresh nonces, remembers them as outstanding, and returns
    /// them to the caller (the `GET /admin/uid` response body).
    pub fn issue(&self, n: usize) -> Vec<String> {
        let mut issued = self.issued.lock();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let id = Uuid::new_v4().to_string();
            issued.insert(id.clone());
            out.push(id);
        }
        out
    }

    /// Atomically checks out a nonce. Returns `false` if it was never
    /// issued or has already been consumed.
    pub fn consume(&self, uid: &str) -> bool {
        self.issued.lock().remove(uid)
    }
}
