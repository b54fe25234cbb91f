//! Callback authentication.
//!
//! The processor never echoes `CodeForHash` back. Instead it sends
//! `hashValue = hex(SHA256(upper(CodeForHash) + suffix))` where the suffix is
//! `T` for an approved payment and `F` for a declined one. Only the order's
//! stored secret can produce either digest, so the digest alone decides the
//! outcome; amount, currency and result codes in the callback are
//! informational.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SUCCESS_SUFFIX: &str = "T";
const FAILURE_SUFFIX: &str = "F";

/// Result of checking a callback digest against an order's secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashVerdict {
    Success,
    Failure,
    Invalid,
}

impl HashVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashVerdict::Success => "success",
            HashVerdict::Failure => "failure",
            HashVerdict::Invalid => "invalid",
        }
    }
}

/// Which digest to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Declined,
}

impl Outcome {
    fn suffix(&self) -> &'static str {
        match self {
            Outcome::Approved => SUCCESS_SUFFIX,
            Outcome::Declined => FAILURE_SUFFIX,
        }
    }
}

/// Lowercase hex SHA-256 of the uppercased secret followed by the outcome suffix.
pub fn digest(code_for_hash: &str, outcome: Outcome) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_for_hash.to_uppercase().as_bytes());
    hasher.update(outcome.suffix().as_bytes());
    hex::encode(hasher.finalize())
}

/// Both digests for a secret, `(success, failure)`.
pub fn expected_digests(code_for_hash: &str) -> (String, String) {
    (
        digest(code_for_hash, Outcome::Approved),
        digest(code_for_hash, Outcome::Declined),
    )
}

/// Classifies `candidate` against the secret.
///
/// Fails closed: an empty secret or an empty candidate is `Invalid`. Both
/// comparisons always run so the timing does not reveal which digest matched.
pub fn verify(code_for_hash: &str, candidate: &str) -> HashVerdict {
    let secret = code_for_hash.trim();
    let candidate = candidate.trim();
    if secret.is_empty() || candidate.is_empty() {
        return HashVerdict::Invalid;
    }

    let (success, failure) = expected_digests(secret);
    let is_success: bool = success.as_bytes().ct_eq(candidate.as_bytes()).into();
    let is_failure: bool = failure.as_bytes().ct_eq(candidate.as_bytes()).into();

    match (is_success, is_failure) {
        (true, _) => HashVerdict::Success,
        (false, true) => HashVerdict::Failure,
        (false, false) => HashVerdict::Invalid,
    }
}

/// Constant-time string equality for non-digest secrets such as order keys.
pub fn secure_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
