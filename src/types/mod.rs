mod currency;
mod event;

pub use currency::*;
pub use event::*;

/// Stable item identifier resolved from the item name,
/// used as the storage key for pricing data.
pub type Sku = String;

/// 64-bit Steam account ID in its decimal string form.
pub type SteamId = String;

/// Whether a listing is a buy or a sell offer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Buy,
    Sell,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Buy => f.write_str("buy"),
            Intent::Sell => f.write_str("sell"),
        }
    }
}
