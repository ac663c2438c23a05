//! Bias classifier
//!
//! Pure functions mapping decrypted article features to the three labels of a
//! bias analysis. Threshold checks run in strictly descending order, so a value
//! sitting exactly on a threshold falls into the lower bucket.

use serde::{Deserialize, Serialize};

/// Reference point for deviation checks
pub const BASELINE: u32 = 50;

/// Decrypted article features, in payload order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub content_score: u32,
    pub sentiment: u32,
    pub keyword_signature: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiasTier {
    HighlyBiased,
    ModeratelyBiased,
    SlightlyBiased,
    Neutral,
}

impl BiasTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiasTier::HighlyBiased => "HighlyBiased",
            BiasTier::ModeratelyBiased => "ModeratelyBiased",
            BiasTier::SlightlyBiased => "SlightlyBiased",
            BiasTier::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Deviation {
    SignificantDeviation,
    ModerateDeviation,
    WithinNormalRange,
}

impl Deviation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Deviation::SignificantDeviation => "SignificantDeviation",
            Deviation::ModerateDeviation => "ModerateDeviation",
            Deviation::WithinNormalRange => "WithinNormalRange",
        }
    }
}

/// Attributed outlet
///
/// Attribution is a placeholder heuristic (`keyword_signature mod 5`), not a
/// keyword-matching algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaOutlet {
    OutletA,
    OutletB,
    OutletC,
    OutletD,
    OutletE,
}

impl MediaOutlet {
    const ALL: [MediaOutlet; 5] = [
        MediaOutlet::OutletA,
        MediaOutlet::OutletB,
        MediaOutlet::OutletC,
        MediaOutlet::OutletD,
        MediaOutlet::OutletE,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaOutlet::OutletA => "OutletA",
            MediaOutlet::OutletB => "OutletB",
            MediaOutlet::OutletC => "OutletC",
            MediaOutlet::OutletD => "OutletD",
            MediaOutlet::OutletE => "OutletE",
        }
    }
}

/// The three labels derived from one feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub tier: BiasTier,
    pub deviation: Deviation,
    pub outlet: MediaOutlet,
}

/// Weighted score `(content*2 + sentiment*3) / 5`, truncating
pub fn bias_score(content_score: u32, sentiment: u32) -> u64 {
    (u64::from(content_score) * 2 + u64::from(sentiment) * 3) / 5
}

pub fn classify_bias_tier(content_score: u32, sentiment: u32) -> BiasTier {
    let score = bias_score(content_score, sentiment);
    if score > 80 {
        BiasTier::HighlyBiased
    } else if score > 60 {
        BiasTier::ModeratelyBiased
    } else if score > 40 {
        BiasTier::SlightlyBiased
    } else {
        BiasTier::Neutral
    }
}

pub fn classify_deviation(content_score: u32, sentiment: u32) -> Deviation {
    let content_diff = content_score.abs_diff(BASELINE);
    let sentiment_diff = sentiment.abs_diff(BASELINE);
    let max_diff = content_diff.max(sentiment_diff);

    if max_diff > 30 {
        Deviation::SignificantDeviation
    } else if max_diff > 15 {
        Deviation::ModerateDeviation
    } else {
        Deviation::WithinNormalRange
    }
}

pub fn identify_outlet(keyword_signature: u32) -> MediaOutlet {
    MediaOutlet::ALL[(keyword_signature % 5) as usize]
}

pub fn classify(features: Features) -> Classification {
    Classification {
        tier: classify_bias_tier(features.content_score, features.sentiment),
        deviation: classify_deviation(features.content_score, features.sentiment),
        outlet: identify_outlet(features.keyword_signature),
    }
}
