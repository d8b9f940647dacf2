//! Tests for the listing acceptance rules.

use fastnum::udec64;
use serde_json::{Value, json};

use super::*;

// ============================================================================
// FIXTURES
// ============================================================================

const SELLER: &str = "76561198000000001";
const SCAMMER: &str = "76561198000000666";

fn context() -> FilterContext {
    let allowed: DashSet<String> = ["Blue Hat", "Blue Beanie", "Mann Co. Supply Crate Key"]
        .into_iter()
        .map(String::from)
        .collect();
    FilterContext::new(Arc::new(allowed))
        .with_excluded_steam_ids([SCAMMER])
        .with_excluded_descriptions(["scam", "fake key"])
        .unwrap()
        .with_blocked_attribute("Hat", 5.0)
}

fn schema() -> HashMap<String, Sku> {
    HashMap::from([
        ("Blue Hat".to_owned(), "100;6".to_owned()),
        ("Blue Beanie".to_owned(), "101;6".to_owned()),
        ("Mann Co. Supply Crate Key".to_owned(), "5021;6".to_owned()),
    ])
}

fn chain() -> FilterChain<HashMap<String, Sku>> {
    FilterChain::new(Arc::new(context()), schema())
}

fn update(name: &str) -> Value {
    json!({
        "event": "listing-update",
        "payload": {
            "steamid": SELLER,
            "intent": "sell",
            "item": { "name": name, "attributes": [] },
            "currencies": { "keys": 1, "metal": 5.33 },
            "details": "Fast trades, send an offer",
            "userAgent": { "client": "-", "lastPulse": 1_700_000_000 }
        }
    })
}

fn delete(name: &str) -> Value {
    json!({
        "event": "listing-delete",
        "payload": {
            "steamid": SELLER,
            "intent": "buy",
            "item": { "name": name }
        }
    })
}

fn with(mut event: Value, pointer: &str, value: Value) -> Value {
    *event.pointer_mut(pointer).expect("fixture field exists") = value;
    event
}

fn without(mut event: Value, field: &str) -> Value {
    event["payload"].as_object_mut().unwrap().remove(field);
    event
}

fn verdict(event: Value) -> Verdict {
    chain().evaluate(&ListingEvent::from_value(event).unwrap())
}

macro_rules! assert_dropped {
    ($event:expr, $reason:pat) => {
        let v = verdict($event);
        assert!(matches!(v, Verdict::Drop($reason)), "unexpected verdict {v:?}");
    };
}

// ============================================================================
// GATES
// ============================================================================

#[test]
fn test_update_is_forwarded_to_insert() {
    let Verdict::Insert(listing) = verdict(update("Blue Hat")) else {
        panic!("expected insert");
    };
    assert_eq!(listing.item.name.as_deref(), Some("Blue Hat"));
    assert_eq!(listing.sku, "100;6");
    assert_eq!(listing.currencies.keys, udec64!(1));
    assert_eq!(listing.currencies.metal, udec64!(5.33));
    assert_eq!(listing.intent, Intent::Sell);
    assert_eq!(listing.steamid, SELLER);
}

#[test]
fn test_delete_is_forwarded_to_delete() {
    assert_eq!(
        verdict(delete("Blue Beanie")),
        Verdict::Delete(DeleteListing {
            steamid: SELLER.to_owned(),
            item_name: "Blue Beanie".to_owned(),
            intent: Intent::Buy,
        })
    );
}

#[test]
fn test_missing_item_name() {
    assert_dropped!(without(update("Blue Hat"), "item"), DropReason::MissingItem);
    assert_dropped!(with(update("Blue Hat"), "/payload/item", json!({})), DropReason::MissingItem);
    assert_dropped!(with(delete("Blue Hat"), "/payload/item/name", json!("")), DropReason::MissingItem);
    assert_dropped!(json!({ "event": "listing-update" }), DropReason::MissingItem);
}

#[test]
fn test_not_allowed_item() {
    assert_dropped!(update("Team Captain"), DropReason::NotAllowed);
    assert_dropped!(delete("Team Captain"), DropReason::NotAllowed);
}

#[test]
fn test_allow_list_is_read_at_evaluation_time() {
    let chain = chain();
    let event = ListingEvent::from_value(update("Team Captain")).unwrap();
    assert_eq!(chain.evaluate(&event), Verdict::Drop(DropReason::NotAllowed));

    chain
        .context()
        .allowed_item_names()
        .insert("Team Captain".to_owned());
    // Allowed now, but the schema does not know the item
    assert!(matches!(
        chain.evaluate(&event),
        Verdict::Drop(DropReason::UnresolvedSku(SkuNotFound { ref name })) if name == "Team Captain"
    ));
}

#[test]
fn test_unknown_kind_passes_gates_and_is_dropped() {
    assert_dropped!(
        with(update("Blue Hat"), "/event", json!("listing-bump")),
        DropReason::UnknownKind
    );
}

#[test]
fn test_missing_intent() {
    assert_dropped!(without(update("Blue Hat"), "intent"), DropReason::MissingIntent);
    assert_dropped!(without(delete("Blue Hat"), "intent"), DropReason::MissingIntent);
}

#[test]
fn test_missing_steamid() {
    assert_dropped!(without(update("Blue Hat"), "steamid"), DropReason::MissingSteamId);
    assert_dropped!(without(delete("Blue Hat"), "steamid"), DropReason::MissingSteamId);
    assert_dropped!(
        with(update("Blue Hat"), "/payload/steamid", json!("")),
        DropReason::MissingSteamId
    );
    assert!(DropReason::MissingSteamId.is_anomaly());
}

// ============================================================================
// UPDATE RULES
// ============================================================================

#[test]
fn test_user_agent_required() {
    assert_dropped!(without(update("Blue Hat"), "userAgent"), DropReason::MissingUserAgent);
    assert_dropped!(
        with(update("Blue Hat"), "/payload/userAgent", json!("")),
        DropReason::MissingUserAgent
    );
    assert_dropped!(
        with(update("Blue Hat"), "/payload/userAgent", Value::Null),
        DropReason::MissingUserAgent
    );
    assert!(matches!(
        verdict(with(update("Blue Hat"), "/payload/userAgent", json!("bptf-client"))),
        Verdict::Insert(_)
    ));
}

#[test]
fn test_deletes_do_not_need_user_agent_or_currencies() {
    assert!(matches!(verdict(delete("Blue Hat")), Verdict::Delete(_)));
}

#[test]
fn test_invalid_currencies() {
    assert_dropped!(without(update("Blue Hat"), "currencies"), DropReason::InvalidCurrencies(_));
    assert_dropped!(
        with(update("Blue Hat"), "/payload/currencies", json!({ "usd": 10 })),
        DropReason::InvalidCurrencies(CurrencyError::NoDenomination)
    );
}

#[test]
fn test_blocked_attribute_exempt_by_item_name() {
    let attributes = json!([{ "defindex": 142, "float_value": 5 }]);

    assert!(matches!(
        verdict(with(update("Blue Hat"), "/payload/item/attributes", attributes.clone())),
        Verdict::Insert(_)
    ));
    assert_dropped!(
        with(update("Blue Beanie"), "/payload/item/attributes", attributes),
        DropReason::BlockedAttribute
    );
}

#[test]
fn test_blocked_attribute_value_forms() {
    for value in [json!(5), json!(5.0), json!("5")] {
        assert_dropped!(
            with(
                update("Blue Beanie"),
                "/payload/item/attributes",
                json!([{ "float_value": value }])
            ),
            DropReason::BlockedAttribute
        );
    }
}

#[test]
fn test_non_blocked_attributes_pass() {
    for attributes in [
        json!([{ "float_value": 5.5 }]),
        json!([{ "float_value": 0 }]),
        json!([{ "value": 5 }]),
        json!([5, "5"]),
        json!([]),
    ] {
        assert!(
            matches!(
                verdict(with(update("Blue Beanie"), "/payload/item/attributes", attributes.clone())),
                Verdict::Insert(_)
            ),
            "attributes {attributes} should pass"
        );
    }
}

#[test]
fn test_excluded_steam_id() {
    assert_dropped!(
        with(update("Blue Hat"), "/payload/steamid", json!(SCAMMER)),
        DropReason::ExcludedSteamId
    );
    // Deletes are not subject to exclusion
    assert!(matches!(
        verdict(with(delete("Blue Hat"), "/payload/steamid", json!(SCAMMER))),
        Verdict::Delete(_)
    ));
}

#[test]
fn test_excluded_description_whole_word() {
    assert_dropped!(
        with(update("Blue Hat"), "/payload/details", json!("This is a SCAM listing")),
        DropReason::ExcludedDescription
    );
    assert!(matches!(
        verdict(with(update("Blue Hat"), "/payload/details", json!("scammer-proof trades"))),
        Verdict::Insert(_)
    ));
}

#[test]
fn test_excluded_description_is_normalized() {
    assert_dropped!(
        with(update("Blue Hat"), "/payload/details", json!("   FAKE KEY   ")),
        DropReason::ExcludedDescription
    );
    // Full-width letters decompose to ASCII
    assert_dropped!(
        with(update("Blue Hat"), "/payload/details", json!("total ｓｃａｍ here")),
        DropReason::ExcludedDescription
    );
}

#[test]
fn test_missing_description_skips_check() {
    assert!(matches!(
        verdict(without(update("Blue Hat"), "details")),
        Verdict::Insert(_)
    ));
}

#[test]
fn test_unresolved_sku() {
    let context = Arc::new(context());
    context.allowed_item_names().insert("Unknown Item".to_owned());
    let chain = FilterChain::new(context, schema());

    let event = ListingEvent::from_value(update("Unknown Item")).unwrap();
    assert_eq!(
        chain.evaluate(&event),
        Verdict::Drop(DropReason::UnresolvedSku(SkuNotFound {
            name: "Unknown Item".to_owned()
        }))
    );
}

#[test]
fn test_rule_order() {
    // Missing user agent wins over invalid currencies and exclusions
    let event = with(
        without(update("Blue Beanie"), "userAgent"),
        "/payload/currencies",
        json!({}),
    );
    assert_dropped!(event, DropReason::MissingUserAgent);

    // Blocked attribute wins over steam id exclusion
    let event = with(
        with(
            update("Blue Beanie"),
            "/payload/item/attributes",
            json!([{ "float_value": 5 }]),
        ),
        "/payload/steamid",
        json!(SCAMMER),
    );
    assert_dropped!(event, DropReason::BlockedAttribute);

    // Steam id exclusion wins over description exclusion
    let event = with(
        with(update("Blue Hat"), "/payload/steamid", json!(SCAMMER)),
        "/payload/details",
        json!("scam"),
    );
    assert_dropped!(event, DropReason::ExcludedSteamId);
}

#[test]
fn test_evaluation_is_deterministic() {
    let chain = chain();
    let event = ListingEvent::from_value(update("Mann Co. Supply Crate Key")).unwrap();
    assert_eq!(chain.evaluate(&event), chain.evaluate(&event));
}

#[test]
fn test_drop_reason_anomalies() {
    assert!(DropReason::MissingItem.is_anomaly());
    assert!(DropReason::NotAllowed.is_anomaly());
    assert!(DropReason::InvalidCurrencies(CurrencyError::NotAnObject).is_anomaly());
    assert!(
        DropReason::UnresolvedSku(SkuNotFound {
            name: "x".to_owned()
        })
        .is_anomaly()
    );
    assert!(!DropReason::MissingUserAgent.is_anomaly());
    assert!(!DropReason::BlockedAttribute.is_anomaly());
    assert!(!DropReason::ExcludedSteamId.is_anomaly());
    assert!(!DropReason::ExcludedDescription.is_anomaly());
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn test_context_from_config() {
    let config: FilterConfig = serde_json::from_value(json!({
        "allowedItemNames": ["Blue Hat"],
        "excludedSteamIds": [SCAMMER],
        "excludedListingDescriptions": ["scam"],
        "blockedAttributes": { "Hat": 5 }
    }))
    .unwrap();
    let context = FilterContext::from_config(config).unwrap();

    assert!(context.is_allowed("Blue Hat"));
    assert!(!context.is_allowed("Blue Beanie"));
    assert!(context.is_excluded_steam_id(SCAMMER));
    assert!(context.is_excluded_description("a scam"));

    let mut item = Item::named("Blue Beanie");
    item.attributes = Some(vec![json!({ "float_value": 5 })]);
    assert!(context.is_blocked(&item));
}

#[test]
fn test_invalid_description_pattern() {
    let result = FilterContext::new(Arc::default()).with_excluded_descriptions(["(unclosed"]);
    assert!(matches!(
        result,
        Err(Error::InvalidPattern { ref pattern, .. }) if pattern == "(unclosed"
    ));
}

#[test]
fn test_number_to_string() {
    assert_eq!(number_to_string(5.0), "5");
    assert_eq!(number_to_string(-0.0), "0");
    assert_eq!(number_to_string(0.5), "0.5");
    assert_eq!(number_to_string(1e20), "100000000000000000000");
    assert_eq!(number_to_string(17.25), "17.25");
}
