use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// One concrete in-game item inside a catalog bundle.
///
/// Stored as a JSON array on `catalog_items.bundled_items` and frozen onto
/// `order_items.bundled_items` at order-creation time, so later catalog edits
/// never change what an already-paid order owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundledItem {
    /// Game-server item type id (`items.xml` id).
    pub item_id: i32,
    pub count: i32,
    pub name: String,
}

/// A selectable weapon option on a catalog item. When a catalog item carries
/// variants, the buyer must pick exactly one; the pick is appended to the
/// frozen bundle at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponVariant {
    pub item_id: i32,
    pub name: String,
}

/// JSON envelope persisted on `delivery_records.items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    pub order_id: Uuid,
    pub items: Vec<BundledItem>,
    pub delivered_at: DateTime<Utc>,
    pub player_id: i32,
}

/// Decode a JSON column into a typed bundle list.
///
/// Columns written by this crate always round-trip; a decode failure means the
/// row was edited out-of-band and is treated as an internal error, not a 4xx.
pub fn decode_bundle(value: &serde_json::Value) -> Result<Vec<BundledItem>, ServiceError> {
    serde_json::from_value(value.clone())
        .map_err(|e| ServiceError::SerializationError(format!("bundled items column: {}", e)))
}

pub fn encode_bundle(items: &[BundledItem]) -> serde_json::Value {
    serde_json::to_value(items).unwrap_or_else(|_| serde_json::Value::Array(vec![]))
}

pub fn decode_variants(
    value: Option<&serde_json::Value>,
) -> Result<Vec<WeaponVariant>, ServiceError> {
    match value {
        None => Ok(Vec::new()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| ServiceError::SerializationError(format!("weapon variants column: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_round_trips_through_json() {
        let bundle = vec![
            BundledItem {
                item_id: 2160,
                count: 100,
                name: "crystal coin".to_string(),
            },
            BundledItem {
                item_id: 2393,
                count: 1,
                name: "giant sword".to_string(),
            },
        ];

        let value = encode_bundle(&bundle);
        let decoded = decode_bundle(&value).expect("bundle should decode");
        assert_eq!(decoded, bundle);
    }

    #[test]
    fn decode_bundle_rejects_wrong_shape() {
        let value = serde_json::json!({"item_id": 2160});
        assert!(decode_bundle(&value).is_err());
    }

    #[test]
    fn missing_variants_column_decodes_to_empty() {
        let variants = decode_variants(None).expect("none should decode");
        assert!(variants.is_empty());
    }

    #[test]
    fn variants_decode_from_stored_json() {
        let value = serde_json::json!([
            {"item_id": 2400, "name": "magic sword"},
            {"item_id": 2431, "name": "stonecutter axe"}
        ]);
        let variants = decode_variants(Some(&value)).expect("variants should decode");
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].item_id, 2400);
    }

    #[test]
    fn delivery_envelope_serializes_expected_fields() {
        let envelope = DeliveryEnvelope {
            order_id: Uuid::new_v4(),
            items: vec![BundledItem {
                item_id: 2160,
                count: 5,
                name: "crystal coin".to_string(),
            }],
            delivered_at: Utc::now(),
            player_id: 42,
        };

        let value = serde_json::to_value(&envelope).expect("envelope should serialize");
        assert!(value.get("order_id").is_some());
        assert!(value.get("items").is_some());
        assert!(value.get("delivered_at").is_some());
        assert_eq!(value["player_id"], 42);
    }
}
