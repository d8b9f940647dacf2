use fastnum::{UD64, decimal::Context};
use serde_json::Value;

const KEYS: &str = "keys";
const METAL: &str = "metal";

/// Listing price decomposed into the fixed set of in-game denominations.
#[derive(Clone, Copy, derive_more::Debug, Default, PartialEq)]
pub struct NormalizedCurrency {
    #[debug("{keys}")]
    pub keys: UD64,
    #[debug("{metal}")]
    pub metal: UD64,
}

impl std::fmt::Display for NormalizedCurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} keys, {} ref", self.keys, self.metal)
    }
}

/// Reason a raw currency payload failed shape validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CurrencyError {
    #[error("currencies must be a non-empty object")]
    NotAnObject,

    #[error("currencies carry neither keys nor metal")]
    NoDenomination,

    #[error("invalid {denomination} amount: {value}")]
    InvalidAmount {
        denomination: &'static str,
        value: String,
    },
}

/// Currency payload that passed shape validation.
///
/// Can only be obtained from [`CurrencyNormalizer::validate`], which makes
/// [`ValidCurrencies::normalize`] total.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidCurrencies {
    keys: Option<UD64>,
    metal: Option<UD64>,
}

/// Validates and normalizes raw `currencies` payloads.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrencyNormalizer;

impl CurrencyNormalizer {
    /// Checks the payload is a non-empty object with at least one known
    /// denomination, and that every known denomination present holds a
    /// non-negative amount. Unknown fields are ignored.
    pub fn validate(raw: &Value) -> Result<ValidCurrencies, CurrencyError> {
        let obj = raw
            .as_object()
            .filter(|obj| !obj.is_empty())
            .ok_or(CurrencyError::NotAnObject)?;
        if !obj.contains_key(KEYS) && !obj.contains_key(METAL) {
            return Err(CurrencyError::NoDenomination);
        }
        let keys = obj.get(KEYS).map(|v| amount(KEYS, v)).transpose()?;
        let metal = obj.get(METAL).map(|v| amount(METAL, v)).transpose()?;
        Ok(ValidCurrencies { keys, metal })
    }

    /// Validates and normalizes in one step.
    pub fn normalize(raw: &Value) -> Result<NormalizedCurrency, CurrencyError> {
        Self::validate(raw).map(ValidCurrencies::normalize)
    }
}

impl ValidCurrencies {
    /// Missing denominations become zero.
    pub fn normalize(self) -> NormalizedCurrency {
        NormalizedCurrency {
            keys: self.keys.unwrap_or(UD64::ZERO),
            metal: self.metal.unwrap_or(UD64::ZERO),
        }
    }
}

fn amount(denomination: &'static str, value: &Value) -> Result<UD64, CurrencyError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_owned(),
        other => {
            return Err(CurrencyError::InvalidAmount {
                denomination,
                value: other.to_string(),
            });
        }
    };
    UD64::from_str(&text, Context::default()).map_err(|_| CurrencyError::InvalidAmount {
        denomination,
        value: text,
    })
}
