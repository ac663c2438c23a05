//! Cleartext payload codec
//!
//! Decrypted values cross the callback boundary as a sequence of 32-byte
//! big-endian words, one unsigned integer per word. Encrypted features are
//! 32-bit values, so the upper 28 bytes of each word must be zero.

use thiserror::Error;

/// Width of one encoded word in bytes
pub const WORD_LEN: usize = 32;

/// Payload shape errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Length is not a whole number of words
    #[error("payload length {0} is not a multiple of 32-byte words")]
    Misaligned(usize),

    /// Wrong number of words for the target
    #[error("expected {expected} words, found {found}")]
    Arity { expected: usize, found: usize },

    /// A word does not fit in 32 bits
    #[error("word {index} exceeds the 32-bit range")]
    Overflow { index: usize },
}

/// Encode values as consecutive 32-byte big-endian words
pub fn encode_words(values: &[u32]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * WORD_LEN];
    for (word, value) in out.chunks_exact_mut(WORD_LEN).zip(values) {
        word[WORD_LEN - 4..].copy_from_slice(&value.to_be_bytes());
    }
    out
}

/// Decode exactly `expected` words
pub fn decode_words(bytes: &[u8], expected: usize) -> Result<Vec<u32>, CodecError> {
    if bytes.len() % WORD_LEN != 0 {
        return Err(CodecError::Misaligned(bytes.len()));
    }

    let found = bytes.len() / WORD_LEN;
    if found != expected {
        return Err(CodecError::Arity { expected, found });
    }

    bytes
        .chunks_exact(WORD_LEN)
        .enumerate()
        .map(|(index, word)| {
            let (high, low) = word.split_at(WORD_LEN - 4);
            if high.iter().any(|b| *b != 0) {
                return Err(CodecError::Overflow { index });
            }
            Ok(u32::from_be_bytes([low[0], low[1], low[2], low[3]]))
        })
        .collect()
}
