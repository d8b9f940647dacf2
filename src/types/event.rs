use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Intent, SteamId};

/// Discriminator of the wire `event` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum EventKind {
    #[serde(rename = "listing-update")]
    Update,

    #[serde(rename = "listing-delete")]
    Delete,

    /// Any other event type the venue may push.
    #[default]
    #[serde(other)]
    Other,
}

/// Single listing event as pushed by the venue.
#[derive(Clone, Debug, Deserialize)]
pub struct ListingEvent {
    #[serde(rename = "event", default)]
    pub kind: EventKind,

    #[serde(default)]
    pub payload: Option<ListingPayload>,
}

/// Listing details carried by the event.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPayload {
    pub item: Option<Item>,
    pub steamid: Option<SteamId>,
    pub intent: Option<Intent>,

    /// Raw price, validated and normalized by [`super::CurrencyNormalizer`].
    pub currencies: Option<Value>,

    /// Free-form listing description written by the lister.
    pub details: Option<String>,

    /// Only its truthiness matters.
    pub user_agent: Option<Value>,
}

/// Listed item.
///
/// Fields other than `name` and `attributes` are kept as is,
/// so the storage sink receives the item object the venue sent.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ListingEvent {
    /// Decodes one element of an inbound batch.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn item(&self) -> Option<&Item> {
        self.payload.as_ref()?.item.as_ref()
    }

    /// Item name, if present and non-empty.
    pub fn item_name(&self) -> Option<&str> {
        self.item()?.name.as_deref().filter(|name| !name.is_empty())
    }
}

impl Item {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn attributes(&self) -> &[Value] {
        self.attributes.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_listing_update() {
        let event = ListingEvent::from_value(json!({
            "id": "440_76561198000000000_abc",
            "event": "listing-update",
            "payload": {
                "steamid": "76561198000000000",
                "intent": "sell",
                "item": {
                    "name": "Mann Co. Supply Crate Key",
                    "defindex": 5021,
                    "quality": { "id": 6, "name": "Unique" },
                    "attributes": [{ "defindex": 134, "float_value": 5 }]
                },
                "currencies": { "keys": 1, "metal": 2.33 },
                "details": "Selling fast",
                "userAgent": { "client": "-", "lastPulse": 1700000000 }
            }
        }))
        .unwrap();

        assert_eq!(event.kind, EventKind::Update);
        assert_eq!(event.item_name(), Some("Mann Co. Supply Crate Key"));

        let payload = event.payload.as_ref().unwrap();
        assert_eq!(payload.steamid.as_deref(), Some("76561198000000000"));
        assert_eq!(payload.intent, Some(Intent::Sell));
        assert_eq!(payload.details.as_deref(), Some("Selling fast"));
        assert!(payload.user_agent.is_some());

        let item = event.item().unwrap();
        assert_eq!(item.attributes().len(), 1);
        assert_eq!(item.extra.get("defindex"), Some(&json!(5021)));
    }

    #[test]
    fn test_unknown_event_kind() {
        let event = ListingEvent::from_value(json!({
            "event": "listing-bump",
            "payload": { "item": { "name": "Blue Hat" } }
        }))
        .unwrap();
        assert_eq!(event.kind, EventKind::Other);

        let event = ListingEvent::from_value(json!({ "payload": {} })).unwrap();
        assert_eq!(event.kind, EventKind::Other);
        assert_eq!(event.item_name(), None);
    }

    #[test]
    fn test_empty_item_name_is_absent() {
        let event = ListingEvent::from_value(json!({
            "event": "listing-delete",
            "payload": { "item": { "name": "" }, "steamid": "1", "intent": "buy" }
        }))
        .unwrap();
        assert_eq!(event.item_name(), None);
    }

    #[test]
    fn test_wrong_shape_fails_to_decode() {
        assert!(ListingEvent::from_value(json!(42)).is_err());
        assert!(
            ListingEvent::from_value(json!({
                "event": "listing-update",
                "payload": { "item": { "name": 5 } }
            }))
            .is_err()
        );
    }

    #[test]
    fn test_item_serializes_back_with_extra_fields() {
        let item: Item = serde_json::from_value(json!({
            "name": "Strange Rocket Launcher",
            "quality": 11
        }))
        .unwrap();
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({ "name": "Strange Rocket Launcher", "quality": 11 })
        );
    }
}
