use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{decode_bundle, decode_variants, BundledItem, WeaponVariant};

/// Stock sentinel meaning "never runs out".
pub const UNLIMITED_STOCK: i32 = -1;

/// Sellable catalog bundle: one web-shop entry mapping to one or more
/// concrete in-game items.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "catalog_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    /// `-1` means unlimited, otherwise the remaining quantity (>= 0).
    pub stock: i32,
    pub category: String,
    pub is_active: bool,
    pub featured: bool,
    /// `Vec<BundledItem>` as JSON.
    #[sea_orm(column_type = "Json")]
    pub bundled_items: Json,
    /// `Vec<WeaponVariant>` as JSON; present only on weapon-choice items.
    #[sea_orm(column_type = "Json", nullable)]
    pub weapon_variants: Option<Json>,
    #[sea_orm(nullable)]
    pub boss_points_price: Option<i32>,
    pub boss_points_redeemable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn has_unlimited_stock(&self) -> bool {
        self.stock == UNLIMITED_STOCK
    }

    /// True when `quantity` units can still be sold.
    pub fn has_stock_for(&self, quantity: i32) -> bool {
        self.has_unlimited_stock() || self.stock >= quantity
    }

    pub fn bundle(&self) -> Result<Vec<BundledItem>, ServiceError> {
        decode_bundle(&self.bundled_items)
    }

    pub fn variants(&self) -> Result<Vec<WeaponVariant>, ServiceError> {
        decode_variants(self.weapon_variants.as_ref())
    }

    /// Weapon-choice items cannot be bought without picking a variant.
    pub fn requires_variant(&self) -> bool {
        self.weapon_variants
            .as_ref()
            .and_then(|v| v.as_array())
            .map(|a| !a.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(stock: i32, variants: Option<Json>) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "warrior pack".to_string(),
            description: "starter gear".to_string(),
            price: dec!(19.99),
            stock,
            category: "equipment".to_string(),
            is_active: true,
            featured: false,
            bundled_items: serde_json::json!([
                {"item_id": 2465, "count": 1, "name": "brass armor"}
            ]),
            weapon_variants: variants,
            boss_points_price: None,
            boss_points_redeemable: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unlimited_stock_always_has_stock() {
        let item = item(UNLIMITED_STOCK, None);
        assert!(item.has_unlimited_stock());
        assert!(item.has_stock_for(1));
        assert!(item.has_stock_for(1_000_000));
    }

    #[test]
    fn finite_stock_checks_requested_quantity() {
        let item = item(3, None);
        assert!(item.has_stock_for(3));
        assert!(!item.has_stock_for(4));
    }

    #[test]
    fn zero_stock_sells_nothing() {
        let item = item(0, None);
        assert!(!item.has_stock_for(1));
    }

    #[test]
    fn variant_requirement_follows_column() {
        assert!(!item(1, None).requires_variant());
        assert!(!item(1, Some(serde_json::json!([]))).requires_variant());

        let with = item(
            1,
            Some(serde_json::json!([{"item_id": 2400, "name": "magic sword"}])),
        );
        assert!(with.requires_variant());
        assert_eq!(with.variants().unwrap()[0].item_id, 2400);
    }

    #[test]
    fn bundle_decodes_to_typed_items() {
        let item = item(1, None);
        let bundle = item.bundle().expect("bundle should decode");
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle[0].item_id, 2465);
        assert_eq!(bundle[0].name, "brass armor");
    }
}
