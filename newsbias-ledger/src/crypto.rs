//! Cryptographic capability interface
//!
//! The ledger never inspects ciphertext. Everything it does with encrypted
//! values goes through an injected [`FheService`]: encrypting constants,
//! homomorphic addition, submitting decryption requests and verifying the
//! proofs that accompany decrypted results.
//!
//! [`LocalFheService`] is an in-process stand-in used by the development
//! binary and the tests. It keeps plaintexts in a table behind random handles,
//! queues decryption requests on a channel for the relayer, and signs
//! cleartexts with a keyed SHA-256 digest.

use std::collections::HashMap;
use std::sync::Mutex;

use newsbias_common::events::TargetKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::codec;
use crate::correlator::RequestId;

/// Opaque reference to a ciphertext held by the crypto service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherHandle(Uuid);

impl CipherHandle {
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for CipherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Crypto service errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("unknown ciphertext handle {0}")]
    UnknownHandle(CipherHandle),

    #[error("proof verification failed: {0}")]
    VerificationFailed(String),

    #[error("encrypted arithmetic overflow")]
    Overflow,

    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Decryption request handed to the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionRequest {
    pub request_id: RequestId,
    /// Handles to decrypt, in payload order
    pub handles: Vec<CipherHandle>,
    /// Which callback the result is meant for
    pub callback: TargetKind,
}

/// Decrypted result as delivered to the callback boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionResponse {
    pub request_id: RequestId,
    pub cleartexts: Vec<u8>,
    pub proof: Vec<u8>,
}

/// Capability interface to the external homomorphic-compute service
///
/// Calls are made while the ledger holds its write lock, so implementations
/// must not block: `request_decryption` only enqueues.
pub trait FheService: Send + Sync {
    /// Encrypt a public constant
    fn encrypt_constant(&self, value: u32) -> Result<CipherHandle, CryptoError>;

    /// Homomorphic addition, returning a fresh handle
    fn add(&self, lhs: CipherHandle, rhs: CipherHandle) -> Result<CipherHandle, CryptoError>;

    /// Submit a decryption request; the result arrives later via the callback boundary
    fn request_decryption(&self, request: DecryptionRequest) -> Result<(), CryptoError>;

    /// Check that `proof` attests `cleartexts` as the decryption for `request_id`
    fn verify(&self, request_id: RequestId, cleartexts: &[u8], proof: &[u8])
        -> Result<(), CryptoError>;
}

/// In-process simulation of the crypto service
///
/// Handles are never freed: the table grows by one entry per homomorphic
/// addition for the lifetime of the process.
pub struct LocalFheService {
    plaintexts: Mutex<HashMap<CipherHandle, u32>>,
    /// Public constants, encrypted once
    constants: Mutex<HashMap<u32, CipherHandle>>,
    signing_key: [u8; 32],
    requests_tx: mpsc::UnboundedSender<DecryptionRequest>,
}

impl LocalFheService {
    /// Create the service and the receiving end of its decryption queue
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DecryptionRequest>) {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let service = Self {
            plaintexts: Mutex::new(HashMap::new()),
            constants: Mutex::new(HashMap::new()),
            signing_key: rand::thread_rng().gen(),
            requests_tx,
        };
        (service, requests_rx)
    }

    /// Encrypt a value, producing a fresh handle
    pub fn encrypt(&self, value: u32) -> Result<CipherHandle, CryptoError> {
        let handle = CipherHandle(Uuid::new_v4());
        self.table()?.insert(handle, value);
        Ok(handle)
    }

    /// Oracle-side decryption of a single handle
    pub fn decrypt(&self, handle: CipherHandle) -> Result<u32, CryptoError> {
        self.table()?
            .get(&handle)
            .copied()
            .ok_or(CryptoError::UnknownHandle(handle))
    }

    /// Decrypt every handle of a request and sign the encoded cleartexts
    pub fn fulfil(&self, request: &DecryptionRequest) -> Result<DecryptionResponse, CryptoError> {
        let values = request
            .handles
            .iter()
            .map(|handle| self.decrypt(*handle))
            .collect::<Result<Vec<_>, _>>()?;

        let cleartexts = codec::encode_words(&values);
        let proof = self.sign(request.request_id, &cleartexts);
        Ok(DecryptionResponse {
            request_id: request.request_id,
            cleartexts,
            proof,
        })
    }

    /// Proof over `(request_id, cleartexts)`
    pub fn sign(&self, request_id: RequestId, cleartexts: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_key);
        hasher.update(request_id.to_be_bytes());
        hasher.update(cleartexts);
        hasher.finalize().to_vec()
    }

    fn table(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CipherHandle, u32>>, CryptoError> {
        self.plaintexts
            .lock()
            .map_err(|_| CryptoError::Unavailable("plaintext table poisoned".to_string()))
    }
}

impl FheService for LocalFheService {
    fn encrypt_constant(&self, value: u32) -> Result<CipherHandle, CryptoError> {
        let mut constants = self
            .constants
            .lock()
            .map_err(|_| CryptoError::Unavailable("constant table poisoned".to_string()))?;
        if let Some(handle) = constants.get(&value) {
            return Ok(*handle);
        }
        let handle = self.encrypt(value)?;
        constants.insert(value, handle);
        Ok(handle)
    }

    fn add(&self, lhs: CipherHandle, rhs: CipherHandle) -> Result<CipherHandle, CryptoError> {
        let sum = self
            .decrypt(lhs)?
            .checked_add(self.decrypt(rhs)?)
            .ok_or(CryptoError::Overflow)?;
        self.encrypt(sum)
    }

    fn request_decryption(&self, request: DecryptionRequest) -> Result<(), CryptoError> {
        for handle in &request.handles {
            if !self.table()?.contains_key(handle) {
                return Err(CryptoError::UnknownHandle(*handle));
            }
        }
        self.requests_tx
            .send(request)
            .map_err(|_| CryptoError::Unavailable("decryption queue closed".to_string()))
    }

    fn verify(
        &self,
        request_id: RequestId,
        cleartexts: &[u8],
        proof: &[u8],
    ) -> Result<(), CryptoError> {
        if self.sign(request_id, cleartexts).as_slice() == proof {
            Ok(())
        } else {
            Err(CryptoError::VerificationFailed(format!(
                "signature mismatch for request {}",
                request_id
            )))
        }
    }
}
