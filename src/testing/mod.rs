//! Test doubles and fixtures for the feed pipeline.
//!
//! [`RecordingStore`] is an in-memory [`ListingStore`] that records every
//! call it receives, optionally rejecting them. [`update_event`] and
//! [`delete_event`] build wire events that pass every rule of a default
//! filter context once their item name is allowed.
//!

use std::sync::{Mutex, MutexGuard};

use serde_json::{Value, json};

use crate::{
    error::StoreError,
    filter::{DeleteListing, InsertListing},
    pipeline::ListingStore,
    types::{Intent, Item, NormalizedCurrency, Sku, SteamId},
};

/// Steam ID of the lister in [`update_event`] and [`delete_event`].
pub const LISTER: &str = "76561198000000001";

/// Call received by a [`RecordingStore`].
#[derive(Clone, Debug, PartialEq)]
pub enum StoreCall {
    Insert(InsertListing),
    Delete(DeleteListing),
}

#[derive(Debug, Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<StoreCall>>,
    failing: bool,
}

impl RecordingStore {
    /// Store that records calls and then rejects them.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().clone()
    }

    pub fn inserts(&self) -> Vec<InsertListing> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                StoreCall::Insert(listing) => Some(listing.clone()),
                StoreCall::Delete(_) => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<DeleteListing> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                StoreCall::Delete(listing) => Some(listing.clone()),
                StoreCall::Insert(_) => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoreCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        self.lock().push(call);
        if self.failing {
            Err(StoreError::Unavailable("recording store is failing".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl ListingStore for RecordingStore {
    async fn insert_listing(
        &self,
        item: Item,
        sku: Sku,
        currencies: NormalizedCurrency,
        intent: Intent,
        steamid: SteamId,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Insert(InsertListing {
            item,
            sku,
            currencies,
            intent,
            steamid,
        }))
    }

    async fn delete_removed_listing(
        &self,
        steamid: SteamId,
        item_name: String,
        intent: Intent,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(DeleteListing {
            steamid,
            item_name,
            intent,
        }))
    }
}

/// Sell-side `listing-update` for `name` priced at 1 key and 2.33 ref.
pub fn update_event(name: &str) -> Value {
    json!({
        "id": format!("440_{LISTER}_{}", name.len()),
        "event": "listing-update",
        "payload": {
            "steamid": LISTER,
            "intent": "sell",
            "item": {
                "name": name,
                "quality": { "id": 6, "name": "Unique" },
                "attributes": []
            },
            "currencies": { "keys": 1, "metal": 2.33 },
            "details": "Fast trades, send an offer",
            "userAgent": { "client": "autopricer", "lastPulse": 1700000000 }
        }
    })
}

/// Sell-side `listing-delete` for `name`.
pub fn delete_event(name: &str) -> Value {
    json!({
        "event": "listing-delete",
        "payload": {
            "steamid": LISTER,
            "intent": "sell",
            "item": { "name": name }
        }
    })
}
