//! Client fingerprinting
//!
//! A fingerprint is a coarse bucketing key, not a security token: the digest
//! is deliberately truncated to [`FINGERPRINT_HEX_LEN`] hex characters.
//!
//! The tuple order used by [`fingerprint_for`] is part of the contract.
//! Reordering it changes every fingerprint ever issued.

use sha2::{Digest, Sha256};

use crate::types::{RequestContext, Submission};
use crate::UNKNOWN;

/// Literal tag prepended to every fingerprint
pub const FINGERPRINT_TAG: &str = "fp_";

/// Number of hex characters kept from the SHA-256 digest (8 bytes)
pub const FINGERPRINT_HEX_LEN: usize = 16;

/// Separator between tuple parts
const DELIMITER: &str = "|";

/// One element of the fingerprint tuple
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FingerprintPart<'a> {
    Text(&'a str),
    Number(f64),
    Absent,
}

impl<'a> From<&'a str> for FingerprintPart<'a> {
    fn from(value: &'a str) -> Self {
        FingerprintPart::Text(value)
    }
}

impl<'a> From<Option<&'a str>> for FingerprintPart<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(FingerprintPart::Absent, FingerprintPart::Text)
    }
}

impl From<Option<f64>> for FingerprintPart<'_> {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FingerprintPart::Absent, FingerprintPart::Number)
    }
}

impl std::fmt::Display for FingerprintPart<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(n) => write!(f, "{}", n),
            Self::Absent => f.write_str(UNKNOWN),
        }
    }
}

/// Compute a fingerprint over an ordered sequence of parts
pub fn fingerprint(parts: &[FingerprintPart<'_>]) -> String {
    let joined = parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(DELIMITER);

    let digest = hex::encode(Sha256::digest(joined.as_bytes()));
    format!("{}{}", FINGERPRINT_TAG, &digest[..FINGERPRINT_HEX_LEN])
}

/// Fingerprint a submission using the fixed tuple
/// `(user_agent, locale, timezone, screen, cores, memory, subnet)`
pub fn fingerprint_for(submission: &Submission, context: &RequestContext) -> String {
    let hints = &submission.hints;
    fingerprint(&[
        FingerprintPart::Text(&context.user_agent),
        hints.locale.as_deref().into(),
        hints.timezone.as_deref().into(),
        hints.screen.as_deref().into(),
        hints.cores.into(),
        hints.memory.into(),
        FingerprintPart::Text(&context.subnet),
    ])
}
