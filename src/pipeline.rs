//! Dispatch of filtered listing events to storage.
//!
//! [`Pipeline`] expands an inbound payload with the
//! [`crate::normalizer::EventNormalizer`], evaluates each event with the
//! [`FilterChain`] and hands accepted listings to the [`ListingStore`].
//!
//! Storage calls are spawned and not awaited: the next event of a batch is
//! evaluated while previous inserts/deletes may still be in flight, so
//! ordering of effects is only as strong as the store itself guarantees.

use std::{future::Future, sync::Arc};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, StoreError},
    filter::{DeleteListing, DropReason, FilterChain, InsertListing, SkuResolver, Verdict},
    normalizer::{Batch, EventNormalizer},
    types::{Intent, Item, ListingEvent, NormalizedCurrency, Sku, SteamId},
};

/// Persistent storage of listings.
pub trait ListingStore: Send + Sync + 'static {
    fn insert_listing(
        &self,
        item: Item,
        sku: Sku,
        currencies: NormalizedCurrency,
        intent: Intent,
        steamid: SteamId,
    ) -> impl Future<Output = std::result::Result<(), StoreError>> + Send;

    fn delete_removed_listing(
        &self,
        steamid: SteamId,
        item_name: String,
        intent: Intent,
    ) -> impl Future<Output = std::result::Result<(), StoreError>> + Send;
}

/// Summary of a processed inbound payload.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Events in the payload.
    pub events: usize,

    /// Listings handed to the insert sink.
    pub inserted: usize,

    /// Listings handed to the delete sink.
    pub deleted: usize,

    /// Events rejected by the filter chain.
    pub dropped: usize,

    /// Elements that did not decode into a listing event.
    pub ignored: usize,

    in_flight: Vec<JoinHandle<()>>,
}

impl BatchReport {
    /// Waits for the spawned storage calls of this batch.
    ///
    /// Only needed when the caller cares about completion; dropping the
    /// report leaves the calls running.
    pub async fn settle(self) {
        for task in self.in_flight {
            if let Err(e) = task.await {
                warn!(%e, "Storage task did not complete");
            }
        }
    }
}

/// Filters inbound listing events and forwards accepted ones to storage.
#[derive(Debug)]
pub struct Pipeline<R, S> {
    chain: FilterChain<R>,
    store: Arc<S>,
}

impl<R: SkuResolver, S: ListingStore> Pipeline<R, S> {
    pub fn new(chain: FilterChain<R>, store: Arc<S>) -> Self {
        Self { chain, store }
    }

    pub fn chain(&self) -> &FilterChain<R> {
        &self.chain
    }

    /// Decodes and processes a raw socket message.
    ///
    /// Must be called within a tokio runtime.
    pub fn handle_message(&self, text: &str) -> Result<BatchReport> {
        Ok(self.handle_batch(EventNormalizer::decode(text)?))
    }

    /// Processes each event of the batch in order.
    ///
    /// Must be called within a tokio runtime.
    pub fn handle_batch(&self, batch: Batch) -> BatchReport {
        if batch.is_array() {
            info!(
                events = batch.len(),
                updates = batch.updates(),
                deletes = batch.deletes(),
                "Received batch"
            );
        } else {
            debug!("Received single event");
        }

        let mut report = BatchReport {
            events: batch.len(),
            ..Default::default()
        };
        for value in batch {
            let event = match ListingEvent::from_value(value) {
                Ok(event) => event,
                Err(e) => {
                    debug!(%e, "Ignored event");
                    report.ignored += 1;
                    continue;
                }
            };
            match self.chain.evaluate(&event) {
                Verdict::Insert(listing) => {
                    report.inserted += 1;
                    report.in_flight.push(self.insert(listing));
                }
                Verdict::Delete(listing) => {
                    report.deleted += 1;
                    report.in_flight.push(self.delete(listing));
                }
                Verdict::Drop(reason) => {
                    report.dropped += 1;
                    log_drop(&event, &reason);
                }
            }
        }
        report
    }

    fn insert(&self, listing: InsertListing) -> JoinHandle<()> {
        debug!(item = ?listing.item.name, sku = %listing.sku, intent = %listing.intent, "Listing update");
        let store = self.store.clone();
        tokio::spawn(async move {
            let InsertListing {
                item,
                sku,
                currencies,
                intent,
                steamid,
            } = listing;
            let name = item.name.clone();
            if let Err(e) = store
                .insert_listing(item, sku, currencies, intent, steamid)
                .await
            {
                error!(item = ?name, %e, "Failed to insert listing");
            }
        })
    }

    fn delete(&self, listing: DeleteListing) -> JoinHandle<()> {
        debug!(item = %listing.item_name, intent = %listing.intent, "Listing delete");
        let store = self.store.clone();
        tokio::spawn(async move {
            let DeleteListing {
                steamid,
                item_name,
                intent,
            } = listing;
            // A listing that can't be deleted is simply gone from the feed
            let _ = store
                .delete_removed_listing(steamid, item_name, intent)
                .await;
        })
    }
}

fn log_drop(event: &ListingEvent, reason: &DropReason) {
    if !reason.is_anomaly() {
        return;
    }
    let item = event.item_name().unwrap_or_default();
    match reason {
        DropReason::UnresolvedSku(e) => warn!(%item, %e, "Couldn't create a price"),
        DropReason::InvalidCurrencies(e) => debug!(%item, %e, "Dropped listing"),
        reason => debug!(%item, ?reason, "Dropped listing"),
    }
}
