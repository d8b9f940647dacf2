//! Listing acceptance rules.
//!
//! [`FilterChain::evaluate`] applies the rules below in order to one event
//! and stops at the first rejection:
//!
//! 1. the item name must be present and non-empty;
//! 2. the item name must be on the allow-list, read at evaluation time;
//! 3. updates need a truthy user agent;
//! 4. update currencies must pass shape validation;
//! 5. blocked attribute values reject the listing unless the item name
//!    contains one of the blocked attribute keys;
//! 6. listings by excluded Steam IDs are rejected;
//! 7. listings whose description matches an excluded pattern are rejected;
//! 8. the item name must resolve to a sku.
//!
//! Deletes only go through 1 and 2.
//!
//! Evaluation is pure, the resulting [`Verdict`] is dispatched to storage
//! by [`crate::pipeline::Pipeline`].

#[cfg(test)]
mod tests;

use std::{
    collections::{HashMap, HashSet},
    hash::BuildHasher,
    sync::Arc,
};

use dashmap::DashSet;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::{
    error::{Error, Result, SkuNotFound},
    types::{
        CurrencyError, CurrencyNormalizer, EventKind, Intent, Item, ListingEvent, ListingPayload,
        NormalizedCurrency, Sku, SteamId,
    },
};

/// Item schema lookup from human-readable item name to sku.
pub trait SkuResolver: Send + Sync {
    fn resolve(&self, item_name: &str) -> std::result::Result<Sku, SkuNotFound>;
}

impl<S: BuildHasher + Send + Sync> SkuResolver for HashMap<String, Sku, S> {
    fn resolve(&self, item_name: &str) -> std::result::Result<Sku, SkuNotFound> {
        self.get(item_name).cloned().ok_or_else(|| SkuNotFound {
            name: item_name.to_owned(),
        })
    }
}

impl<T: SkuResolver + ?Sized> SkuResolver for Arc<T> {
    fn resolve(&self, item_name: &str) -> std::result::Result<Sku, SkuNotFound> {
        (**self).resolve(item_name)
    }
}

/// Serialized filter configuration, as supplied by the host.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    pub allowed_item_names: Vec<String>,
    pub excluded_steam_ids: Vec<SteamId>,
    pub excluded_listing_descriptions: Vec<String>,

    /// Item-name substring to attribute value.
    pub blocked_attributes: HashMap<String, f64>,
}

/// Read-only filtering policy shared by all events.
#[derive(Clone, Debug)]
pub struct FilterContext {
    allowed_item_names: Arc<DashSet<String>>,
    excluded_steam_ids: HashSet<SteamId>,
    excluded_descriptions: Vec<Regex>,
    blocked_keys: Vec<String>,
    blocked_values: Vec<String>,
}

impl FilterContext {
    /// Creates a context with no exclusions over the given allow-list.
    ///
    /// The host may keep a clone of `allowed_item_names` and update it
    /// while the feed is running.
    pub fn new(allowed_item_names: Arc<DashSet<String>>) -> Self {
        Self {
            allowed_item_names,
            excluded_steam_ids: HashSet::new(),
            excluded_descriptions: Vec::new(),
            blocked_keys: Vec::new(),
            blocked_values: Vec::new(),
        }
    }

    pub fn from_config(config: FilterConfig) -> Result<Self> {
        let allowed = Arc::new(config.allowed_item_names.into_iter().collect::<DashSet<_>>());
        let mut context = Self::new(allowed)
            .with_excluded_steam_ids(config.excluded_steam_ids)
            .with_excluded_descriptions(config.excluded_listing_descriptions)?;
        for (key, value) in config.blocked_attributes {
            context = context.with_blocked_attribute(key, value);
        }
        Ok(context)
    }

    pub fn with_excluded_steam_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SteamId>,
    {
        self.excluded_steam_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Adds description patterns, each matched as a whole word, ignoring case.
    pub fn with_excluded_descriptions<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = RegexBuilder::new(&format!(r"\b{pattern}\b"))
                .case_insensitive(true)
                .build()
                .map_err(|source| Error::InvalidPattern {
                    pattern: pattern.to_owned(),
                    source,
                })?;
            self.excluded_descriptions.push(regex);
        }
        Ok(self)
    }

    /// Blocks attributes with `value` unless the item name contains `key`.
    pub fn with_blocked_attribute(mut self, key: impl Into<String>, value: f64) -> Self {
        self.blocked_keys.push(key.into());
        self.blocked_values.push(number_to_string(value));
        self
    }

    pub fn allowed_item_names(&self) -> &Arc<DashSet<String>> {
        &self.allowed_item_names
    }

    pub fn is_allowed(&self, item_name: &str) -> bool {
        self.allowed_item_names.contains(item_name)
    }

    pub fn is_excluded_steam_id(&self, steamid: &str) -> bool {
        self.excluded_steam_ids.contains(steamid)
    }

    /// Whether any attribute carries a blocked value, and the item name
    /// does not exempt the item by containing a blocked key.
    pub fn is_blocked(&self, item: &Item) -> bool {
        let Some(name) = item.name.as_deref() else {
            return false;
        };
        item.attributes().iter().any(|attribute| {
            attribute
                .as_object()
                .and_then(|attribute| attribute.get("float_value"))
                .filter(|value| is_truthy(value))
                .and_then(value_to_string)
                .is_some_and(|value| self.blocked_values.contains(&value))
                && !self.blocked_keys.iter().any(|key| name.contains(key.as_str()))
        })
    }

    pub fn is_excluded_description(&self, details: &str) -> bool {
        let normalized = normalize_description(details);
        self.excluded_descriptions
            .iter()
            .any(|pattern| pattern.is_match(&normalized))
    }
}

/// Listing accepted for insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertListing {
    pub item: Item,
    pub sku: Sku,
    pub currencies: NormalizedCurrency,
    pub intent: Intent,
    pub steamid: SteamId,
}

/// Listing accepted for deletion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteListing {
    pub steamid: SteamId,
    pub item_name: String,
    pub intent: Intent,
}

/// Why an event was not forwarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    MissingItem,
    NotAllowed,
    UnknownKind,
    MissingIntent,
    MissingSteamId,
    MissingUserAgent,
    InvalidCurrencies(CurrencyError),
    BlockedAttribute,
    ExcludedSteamId,
    ExcludedDescription,
    UnresolvedSku(SkuNotFound),
}

impl DropReason {
    /// Anomalies are worth a log line, the rest are ordinary policy
    /// rejections.
    pub fn is_anomaly(&self) -> bool {
        !matches!(
            self,
            DropReason::MissingUserAgent
                | DropReason::BlockedAttribute
                | DropReason::ExcludedSteamId
                | DropReason::ExcludedDescription
        )
    }
}

/// Outcome of [`FilterChain::evaluate`].
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Insert(InsertListing),
    Delete(DeleteListing),
    Drop(DropReason),
}

/// Ordered acceptance rules bound to a filter context and item schema.
#[derive(Clone, Debug)]
pub struct FilterChain<R> {
    context: Arc<FilterContext>,
    resolver: R,
}

impl<R: SkuResolver> FilterChain<R> {
    pub fn new(context: Arc<FilterContext>, resolver: R) -> Self {
        Self { context, resolver }
    }

    pub fn context(&self) -> &FilterContext {
        &self.context
    }

    /// Decides whether and where the event should be forwarded.
    ///
    /// Same event and context always yield the same verdict.
    pub fn evaluate(&self, event: &ListingEvent) -> Verdict {
        let Some(payload) = event.payload.as_ref() else {
            return Verdict::Drop(DropReason::MissingItem);
        };
        let Some((item, name)) = payload
            .item
            .as_ref()
            .and_then(|item| Some((item, item.name.as_deref().filter(|n| !n.is_empty())?)))
        else {
            return Verdict::Drop(DropReason::MissingItem);
        };
        if !self.context.is_allowed(name) {
            return Verdict::Drop(DropReason::NotAllowed);
        }

        match event.kind {
            EventKind::Update => self.evaluate_update(payload, item, name),
            EventKind::Delete => {
                let Some(intent) = payload.intent else {
                    return Verdict::Drop(DropReason::MissingIntent);
                };
                let Some(steamid) = lister(payload) else {
                    return Verdict::Drop(DropReason::MissingSteamId);
                };
                Verdict::Delete(DeleteListing {
                    steamid,
                    item_name: name.to_owned(),
                    intent,
                })
            }
            EventKind::Other => Verdict::Drop(DropReason::UnknownKind),
        }
    }

    fn evaluate_update(&self, payload: &ListingPayload, item: &Item, name: &str) -> Verdict {
        if !payload.user_agent.as_ref().is_some_and(is_truthy) {
            return Verdict::Drop(DropReason::MissingUserAgent);
        }

        let currencies = match CurrencyNormalizer::validate(
            payload.currencies.as_ref().unwrap_or(&Value::Null),
        ) {
            Ok(currencies) => currencies,
            Err(e) => return Verdict::Drop(DropReason::InvalidCurrencies(e)),
        };

        if self.context.is_blocked(item) {
            return Verdict::Drop(DropReason::BlockedAttribute);
        }

        let currencies = currencies.normalize();

        let Some(steamid) = lister(payload) else {
            return Verdict::Drop(DropReason::MissingSteamId);
        };
        if self.context.is_excluded_steam_id(&steamid) {
            return Verdict::Drop(DropReason::ExcludedSteamId);
        }

        if payload
            .details
            .as_deref()
            .is_some_and(|details| self.context.is_excluded_description(details))
        {
            return Verdict::Drop(DropReason::ExcludedDescription);
        }

        let Some(intent) = payload.intent else {
            return Verdict::Drop(DropReason::MissingIntent);
        };

        match self.resolver.resolve(name) {
            Ok(sku) => Verdict::Insert(InsertListing {
                item: item.clone(),
                sku,
                currencies,
                intent,
                steamid,
            }),
            Err(e) => Verdict::Drop(DropReason::UnresolvedSku(e)),
        }
    }
}

fn lister(payload: &ListingPayload) -> Option<SteamId> {
    payload.steamid.clone().filter(|id| !id.is_empty())
}

/// Decomposes accented forms, lowercases and trims.
pub fn normalize_description(details: &str) -> String {
    details.nfkd().collect::<String>().to_lowercase().trim().to_owned()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Attribute values are compared in their textual form, so that `5`,
/// `5.0` and `"5"` all match a blocked value of 5.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_f64().map(number_to_string),
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Shortest textual form of a number, integral values without a fraction.
fn number_to_string(value: f64) -> String {
    if value == 0.0 {
        "0".to_owned()
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
