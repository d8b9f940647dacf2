//! Listing store reporting forwarded listings to the log.

use autopricer_feed::{
    error::StoreError,
    pipeline::ListingStore,
    types::{Intent, Item, NormalizedCurrency, Sku, SteamId},
};
use tracing::info;

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingStore;

impl ListingStore for TracingStore {
    async fn insert_listing(
        &self,
        item: Item,
        sku: Sku,
        currencies: NormalizedCurrency,
        intent: Intent,
        steamid: SteamId,
    ) -> Result<(), StoreError> {
        info!(
            item = item.name.as_deref().unwrap_or_default(),
            %sku,
            %currencies,
            %intent,
            %steamid,
            "Insert listing"
        );
        Ok(())
    }

    async fn delete_removed_listing(
        &self,
        steamid: SteamId,
        item_name: String,
        intent: Intent,
    ) -> Result<(), StoreError> {
        info!(item = %item_name, %intent, %steamid, "Delete listing");
        Ok(())
    }
}
