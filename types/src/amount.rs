//! Vote-weight amounts.
//!
//! Amounts are fixed-point integers with eight fractional digits, the same
//! resolution the backend uses for its `BigDecimal` scalar. The smallest unit
//! is one "zat"; `1` whole unit is `100_000_000` zats. On the wire an amount
//! is a plain decimal string such as `"10000.5"`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// Number of fractional decimal digits carried by a [`VoteWeight`].
pub const DECIMALS: u32 = 8;

const UNIT: u64 = 10u64.pow(DECIMALS);

/// A decimal vote-weight amount, stored as integer zats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoteWeight(u64);

impl VoteWeight {
    pub const ZERO: Self = Self(0);

    pub fn from_zats(zats: u64) -> Self {
        Self(zats)
    }

    /// An amount with no fractional part.
    pub fn from_whole(units: u64) -> Result<Self, TypesError> {
        units
            .checked_mul(UNIT)
            .map(Self)
            .ok_or(TypesError::AmountOverflow)
    }

    pub fn zats(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_mul(self, factor: u64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl FromStr for VoteWeight {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| TypesError::InvalidAmount {
            input: s.to_string(),
            reason,
        };
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }
        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("expected an unsigned decimal number"));
        }
        if frac.len() > DECIMALS as usize {
            return Err(invalid("more than 8 fractional digits"));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| TypesError::AmountOverflow)?
        };
        let mut frac_zats: u64 = 0;
        if !frac.is_empty() {
            let scale = 10u64.pow(DECIMALS - frac.len() as u32);
            frac_zats = frac.parse::<u64>().map_err(|_| invalid("bad fraction"))? * scale;
        }

        whole
            .checked_mul(UNIT)
            .and_then(|w| w.checked_add(frac_zats))
            .map(Self)
            .ok_or(TypesError::AmountOverflow)
    }
}

impl fmt::Display for VoteWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNIT;
        let frac = self.0 % UNIT;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{:08}", frac);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl Serialize for VoteWeight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VoteWeight {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // The GraphQL BigDecimal scalar arrives as a string, hand-written
        // config files may use a bare number.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Whole(u64),
            Float(f64),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Whole(n) => n.to_string(),
            Raw::Float(x) => x.to_string(),
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}
