use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A transaction amount. Stored and compared at full decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,
    #[error("Invalid amount: {0}")]
    Invalid(String),
}

impl Amount {
    pub fn new(decimal: Decimal) -> Self {
        Amount(decimal)
    }

    pub fn zero() -> Self {
        Amount(Decimal::ZERO)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Parses bank-export style amounts: `1,234.56`, `$12.00`, `-5`, `(75.25)`,
    /// and scientific notation.
    pub fn parse(raw: &str) -> Result<Self, AmountError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (negative, s) = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
            Some(inner) => (true, inner),
            None => (false, s),
        };
        let cleaned = s.replace([',', '$', ' '], "");
        // A sign inside accounting parentheses is ambiguous.
        if cleaned.is_empty() || (negative && cleaned.starts_with(['-', '+'])) {
            return Err(AmountError::Invalid(raw.trim().to_string()));
        }
        let dec = Decimal::from_str(&cleaned)
            .or_else(|_| Decimal::from_scientific(&cleaned))
            .map_err(|_| AmountError::Invalid(raw.trim().to_string()))?;
        Ok(Amount(if negative { -dec } else { dec }))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Amount {
    fn from(decimal: Decimal) -> Self {
        Amount(decimal)
    }
}
