//! Category tally ledger
//!
//! One encrypted running counter per bias category, created lazily the first
//! time an article is classified into it. The discovery list (insertion order),
//! the counter map and the hash index are only ever extended together.
//!
//! Increments are split into `prepare_increment`, which performs every crypto
//! call without touching ledger state, and `apply_increment`, which cannot fail.
//! The callback handler relies on this to commit all-or-nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::correlator::RequestId;
use crate::crypto::{CipherHandle, FheService};
use crate::error::{LedgerError, Result};

/// SHA-256 of a category label, the form in which external parties name categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CategoryHash([u8; 32]);

impl CategoryHash {
    pub fn of(label: &str) -> Self {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&Sha256::digest(label.as_bytes()));
        Self(hash)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCounter {
    pub label: String,
    /// Encrypted running count
    pub handle: CipherHandle,
    pub created_at: DateTime<Utc>,
    /// Outstanding decryption request, if any
    pub pending_request: Option<RequestId>,
}

/// Audit record for a served counter decryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecryptedCount {
    pub request_id: RequestId,
    pub category: String,
    pub count: u32,
    pub resolved_at: DateTime<Utc>,
}

/// Increment computed against the crypto service but not yet applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedIncrement {
    label: String,
    /// New counter handle after adding one
    handle: CipherHandle,
    creates_category: bool,
}

#[derive(Debug, Default)]
pub struct CategoryTallyLedger {
    counters: HashMap<String, CategoryCounter>,
    discovery: Vec<String>,
    by_hash: HashMap<CategoryHash, String>,
    audit: Vec<DecryptedCount>,
}

impl CategoryTallyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the counter's next handle without changing ledger state
    ///
    /// For an unknown label the base is a fresh encrypted zero.
    pub fn prepare_increment(
        &self,
        label: &str,
        crypto: &dyn FheService,
    ) -> Result<PreparedIncrement> {
        let (base, creates_category) = match self.counters.get(label) {
            Some(counter) => (counter.handle, false),
            None => {
                let hash = CategoryHash::of(label);
                if let Some(existing) = self.by_hash.get(&hash) {
                    return Err(LedgerError::CategoryHashCollision {
                        existing: existing.clone(),
                        label: label.to_string(),
                    });
                }
                (crypto.encrypt_constant(0)?, true)
            }
        };

        let one = crypto.encrypt_constant(1)?;
        let handle = crypto.add(base, one)?;
        Ok(PreparedIncrement {
            label: label.to_string(),
            handle,
            creates_category,
        })
    }

    /// Apply a prepared increment; returns `true` if the category was created
    pub fn apply_increment(&mut self, prepared: PreparedIncrement, at: DateTime<Utc>) -> bool {
        let PreparedIncrement {
            label,
            handle,
            creates_category,
        } = prepared;

        match self.counters.get_mut(&label) {
            Some(counter) => {
                counter.handle = handle;
                debug!("Category '{}' counter incremented", label);
                false
            }
            None => {
                // Counter is in place before the label becomes discoverable
                self.counters.insert(
                    label.clone(),
                    CategoryCounter {
                        label: label.clone(),
                        handle,
                        created_at: at,
                        pending_request: None,
                    },
                );
                self.discovery.push(label.clone());
                self.by_hash.insert(CategoryHash::of(&label), label.clone());
                info!("Category '{}' created", label);
                debug_assert!(creates_category);
                true
            }
        }
    }

    /// Add one to `label`'s encrypted counter, creating it if needed
    pub fn increment(
        &mut self,
        label: &str,
        crypto: &dyn FheService,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let prepared = self.prepare_increment(label, crypto)?;
        Ok(self.apply_increment(prepared, at))
    }

    /// Check that a counter decryption may be requested for `label`
    pub fn ensure_decryptable(&self, label: &str) -> Result<&CategoryCounter> {
        let counter = self.counter(label)?;
        if let Some(request_id) = counter.pending_request {
            return Err(LedgerError::RequestOutstanding {
                entity: format!("category '{}'", label),
                request_id,
            });
        }
        Ok(counter)
    }

    pub fn mark_decryption_requested(&mut self, label: &str, request_id: RequestId) -> Result<()> {
        self.ensure_decryptable(label)?;
        let counter = self
            .counters
            .get_mut(label)
            .ok_or_else(|| LedgerError::CategoryNotFound(label.to_string()))?;
        counter.pending_request = Some(request_id);
        Ok(())
    }

    /// Record the cleartext count served for `request_id`
    ///
    /// The counter handle itself is unchanged.
    pub fn resolve_decrypted_count(
        &mut self,
        request_id: RequestId,
        label: &str,
        count: u32,
        at: DateTime<Utc>,
    ) -> Result<&DecryptedCount> {
        let counter = self
            .counters
            .get_mut(label)
            .ok_or_else(|| LedgerError::CategoryNotFound(label.to_string()))?;
        if counter.pending_request == Some(request_id) {
            counter.pending_request = None;
        }

        info!("Category '{}' decrypted count: {}", label, count);
        self.audit.push(DecryptedCount {
            request_id,
            category: label.to_string(),
            count,
            resolved_at: at,
        });
        Ok(&self.audit[self.audit.len() - 1])
    }

    /// Reverse lookup from label hash
    pub fn category_for_hash(&self, hash: &CategoryHash) -> Result<&str> {
        self.by_hash
            .get(hash)
            .map(String::as_str)
            .ok_or_else(|| LedgerError::CategoryNotFound(hash.to_hex()))
    }

    /// Raw (still encrypted) counter handle
    pub fn encrypted_count(&self, label: &str) -> Result<CipherHandle> {
        self.counter(label).map(|counter| counter.handle)
    }

    pub fn counter(&self, label: &str) -> Result<&CategoryCounter> {
        self.counters
            .get(label)
            .ok_or_else(|| LedgerError::CategoryNotFound(label.to_string()))
    }

    /// Known categories in discovery order
    pub fn categories(&self) -> &[String] {
        &self.discovery
    }

    /// Decrypted-count history for `label`, oldest first
    pub fn decrypted_counts(&self, label: &str) -> Result<Vec<DecryptedCount>> {
        self.counter(label)?;
        Ok(self
            .audit
            .iter()
            .filter(|entry| entry.category == label)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::LocalFheService;

    #[test]
    fn test_first_increment_creates_category() {
        let (crypto, _rx) = LocalFheService::new();
        let mut tally = CategoryTallyLedger::new();

        assert!(tally.increment("HighlyBiased", &crypto, Utc::now()).unwrap());
        assert_eq!(tally.categories(), &["HighlyBiased".to_string()]);

        let handle = tally.encrypted_count("HighlyBiased").unwrap();
        assert_eq!(crypto.decrypt(handle).unwrap(), 1);
    }

    #[test]
    fn test_repeated_increments_discover_once() {
        let (crypto, _rx) = LocalFheService::new();
        let mut tally = CategoryTallyLedger::new();

        for _ in 0..5 {
            tally.increment("Neutral", &crypto, Utc::now()).unwrap();
        }
        tally.increment("SlightlyBiased", &crypto, Utc::now()).unwrap();
        tally.increment("Neutral", &crypto, Utc::now()).unwrap();

        assert_eq!(
            tally.categories(),
            &["Neutral".to_string(), "SlightlyBiased".to_string()]
        );
        let handle = tally.encrypted_count("Neutral").unwrap();
        assert_eq!(crypto.decrypt(handle).unwrap(), 6);
    }

    #[test]
    fn test_prepare_leaves_state_untouched() {
        let (crypto, _rx) = LocalFheService::new();
        let mut tally = CategoryTallyLedger::new();

        let prepared = tally.prepare_increment("Neutral", &crypto).unwrap();
        assert!(prepared.creates_category);
        assert!(tally.categories().is_empty());
        assert!(matches!(
            tally.encrypted_count("Neutral"),
            Err(LedgerError::CategoryNotFound(_))
        ));

        assert!(tally.apply_increment(prepared, Utc::now()));
        assert_eq!(tally.categories().len(), 1);
    }

    #[test]
    fn test_hash_lookup() {
        let (crypto, _rx) = LocalFheService::new();
        let mut tally = CategoryTallyLedger::new();
        tally.increment("ModeratelyBiased", &crypto, Utc::now()).unwrap();

        let hash = CategoryHash::of("ModeratelyBiased");
        assert_eq!(tally.category_for_hash(&hash).unwrap(), "ModeratelyBiased");
        assert_eq!(CategoryHash::from_hex(&hash.to_hex()), Some(hash));

        let stale = CategoryHash::of("Neutral");
        assert!(matches!(
            tally.category_for_hash(&stale),
            Err(LedgerError::CategoryNotFound(_))
        ));
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(CategoryHash::from_hex("zz").is_none());
        assert!(CategoryHash::from_hex("abcd").is_none());
    }

    #[test]
    fn test_decryption_request_bookkeeping() {
        let (crypto, _rx) = LocalFheService::new();
        let mut tally = CategoryTallyLedger::new();
        tally.increment("Neutral", &crypto, Utc::now()).unwrap();

        assert!(matches!(
            tally.ensure_decryptable("Unknown"),
            Err(LedgerError::CategoryNotFound(_))
        ));

        tally.mark_decryption_requested("Neutral", 77).unwrap();
        assert!(matches!(
            tally.mark_decryption_requested("Neutral", 78),
            Err(LedgerError::RequestOutstanding { request_id: 77, .. })
        ));

        let entry = tally
            .resolve_decrypted_count(77, "Neutral", 1, Utc::now())
            .unwrap()
            .clone();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.request_id, 77);
        assert!(tally.ensure_decryptable("Neutral").is_ok());
        assert_eq!(tally.decrypted_counts("Neutral").unwrap(), vec![entry]);
    }

    #[test]
    fn test_decrypted_counts_unknown_category() {
        let tally = CategoryTallyLedger::new();
        assert!(tally.decrypted_counts("Neutral").is_err());
    }
}
