//! Decryption target kinds
//!
//! Supporting type for events that refer to a decryption request.

use serde::{Deserialize, Serialize};

/// Kind of entity a decryption request resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TargetKind {
    /// Feature vector of a single article
    Article,
    /// Running tally of a bias category
    Category,
}

impl TargetKind {
    /// Number of cleartext words a callback for this kind must carry
    pub fn expected_arity(&self) -> usize {
        match self {
            TargetKind::Article => 3,
            TargetKind::Category => 1,
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Article => write!(f, "Article"),
            TargetKind::Category => write!(f, "Category"),
        }
    }
}
