//! Pickup codes
//!
//! A pickup code is a fixed-width, zero-padded decimal string (`000000`..=`999999`).
//! Codes are short enough to read out loud; they are not secrets and the keyspace is
//! sized for a few minutes of live items, not for resisting guessing.

use crate::constants::{CODE_DIGITS, CODE_SPACE};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated pickup code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PickupCode(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pickup code: {0:?}")]
pub struct InvalidCode(pub String);

impl PickupCode {
    /// Format a number in `[0, CODE_SPACE)` as a code. Larger values wrap.
    pub fn from_number(n: u32) -> Self {
        PickupCode(format!("{:0width$}", n % CODE_SPACE, width = CODE_DIGITS))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PickupCode {
    type Err = InvalidCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() == CODE_DIGITS && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(PickupCode(s.to_string()))
        } else {
            Err(InvalidCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for PickupCode {
    type Error = InvalidCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PickupCode> for String {
    fn from(code: PickupCode) -> Self {
        code.0
    }
}

impl fmt::Display for PickupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PickupCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of candidate pickup codes.
///
/// Implementations do not check uniqueness; the item registry retries on collision.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> PickupCode;
}

/// Uniformly distributed codes from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodes;

impl CodeSource for RandomCodes {
    fn next_code(&self) -> PickupCode {
        PickupCode::from_number(rand::rng().random_range(0..CODE_SPACE))
    }
}
