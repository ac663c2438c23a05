//! Authorization registry
//!
//! Grant-only set of principals allowed to submit articles, request analysis,
//! authorize others and request counter decryption. Seeded with the deployer.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LedgerError, Result};

/// Caller identity, passed explicitly on every operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
pub struct AuthorizationRegistry {
    granted: HashSet<Principal>,
    /// Grant order, for listing
    order: Vec<Principal>,
}

impl AuthorizationRegistry {
    pub fn with_deployer(deployer: Principal) -> Self {
        Self {
            granted: HashSet::from([deployer.clone()]),
            order: vec![deployer],
        }
    }

    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.granted.contains(principal)
    }

    /// Fail with `Unauthorized` unless `principal` holds a grant
    pub fn ensure_authorized(&self, principal: &Principal) -> Result<()> {
        if self.is_authorized(principal) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized(principal.to_string()))
        }
    }

    /// Grant `target` authorization on behalf of `caller`
    ///
    /// Returns `true` if the grant is new, `false` if `target` was already authorized.
    pub fn authorize(&mut self, caller: &Principal, target: Principal) -> Result<bool> {
        self.ensure_authorized(caller)?;

        if !self.granted.insert(target.clone()) {
            return Ok(false);
        }
        info!("Principal {} authorized by {}", target, caller);
        self.order.push(target);
        Ok(true)
    }

    /// Authorized principals in grant order
    pub fn principals(&self) -> &[Principal] {
        &self.order
    }
}
