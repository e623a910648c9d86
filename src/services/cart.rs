use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Serialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{cart_item, catalog_item, CartItem, CatalogItem, CatalogItemModel};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// One resolved cart line: the stored line joined against the live catalog
/// row, priced at read time.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: Uuid,
    pub catalog_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub chosen_variant: Option<i32>,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

#[derive(Clone)]
pub struct CartService {
    db: DbPool,
    event_sender: EventSender,
}

impl CartService {
    pub fn new(db: DbPool, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Add `quantity` units of an item, merging into an existing line for the
    /// same item. Stock is checked against the resulting line quantity, not
    /// just the increment.
    #[instrument(skip(self), fields(account_id, %catalog_item_id))]
    pub async fn add_item(
        &self,
        account_id: i32,
        catalog_item_id: Uuid,
        quantity: i32,
        chosen_variant: Option<i32>,
    ) -> Result<CartLine, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".into(),
            ));
        }

        let item = CatalogItem::find_by_id(catalog_item_id)
            .filter(catalog_item::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Catalog item {} not found", catalog_item_id))
            })?;

        Self::validate_variant(&item, chosen_variant)?;

        let existing = CartItem::find()
            .filter(cart_item::Column::AccountId.eq(account_id))
            .filter(cart_item::Column::CatalogItemId.eq(catalog_item_id))
            .one(&self.db)
            .await?;

        let resulting_quantity = existing.as_ref().map(|l| l.quantity).unwrap_or(0) + quantity;
        if !item.has_stock_for(resulting_quantity) {
            return Err(ServiceError::OutOfStock {
                item: item.name.clone(),
                available: item.stock,
            });
        }

        let now = Utc::now();
        let line = match existing {
            Some(line) => {
                let mut model: cart_item::ActiveModel = line.into();
                model.quantity = Set(resulting_quantity);
                model.chosen_variant = Set(chosen_variant);
                model.updated_at = Set(now);
                model.update(&self.db).await?
            }
            None => {
                let model = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    account_id: Set(account_id),
                    catalog_item_id: Set(catalog_item_id),
                    quantity: Set(quantity),
                    chosen_variant: Set(chosen_variant),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&self.db).await?
            }
        };

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                account_id,
                catalog_item_id,
            })
            .await;

        Ok(Self::resolve_line(&line, &item))
    }

    /// Set a line's quantity. Zero removes the line.
    #[instrument(skip(self), fields(account_id, %cart_item_id))]
    pub async fn update_item(
        &self,
        account_id: i32,
        cart_item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartLine>, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "quantity must not be negative".into(),
            ));
        }

        let line = self.owned_line(account_id, cart_item_id).await?;

        if quantity == 0 {
            CartItem::delete_by_id(line.id).exec(&self.db).await?;
            return Ok(None);
        }

        let item = CatalogItem::find_by_id(line.catalog_item_id)
            .filter(catalog_item::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("Catalog item is no longer available".to_string())
            })?;

        if !item.has_stock_for(quantity) {
            return Err(ServiceError::OutOfStock {
                item: item.name.clone(),
                available: item.stock,
            });
        }

        let mut model: cart_item::ActiveModel = line.into();
        model.quantity = Set(quantity);
        model.updated_at = Set(Utc::now());
        let line = model.update(&self.db).await?;

        Ok(Some(Self::resolve_line(&line, &item)))
    }

    /// Remove one line. Removing a line that is already gone is a no-op.
    #[instrument(skip(self), fields(account_id, %cart_item_id))]
    pub async fn remove_item(
        &self,
        account_id: i32,
        cart_item_id: Uuid,
    ) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::Id.eq(cart_item_id))
            .filter(cart_item::Column::AccountId.eq(account_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, account_id: i32) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::AccountId.eq(account_id))
            .exec(&self.db)
            .await?;
        self.event_sender.send_or_log(Event::CartCleared(account_id)).await;
        Ok(())
    }

    /// Resolve the cart against the live catalog. Lines whose catalog item
    /// was deactivated since they were added are skipped, not errored on.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, account_id: i32) -> Result<CartView, ServiceError> {
        let rows: Vec<(cart_item::Model, Option<CatalogItemModel>)> = CartItem::find()
            .filter(cart_item::Column::AccountId.eq(account_id))
            .find_also_related(CatalogItem)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        let mut total = Decimal::ZERO;
        for (line, item) in rows {
            let item = match item {
                Some(item) if item.is_active => item,
                _ => {
                    warn!(cart_item_id = %line.id, "skipping cart line for unavailable item");
                    continue;
                }
            };
            let resolved = Self::resolve_line(&line, &item);
            total += resolved.line_total;
            lines.push(resolved);
        }

        Ok(CartView { lines, total })
    }

    async fn owned_line(
        &self,
        account_id: i32,
        cart_item_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        let line = CartItem::find_by_id(cart_item_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;
        if line.account_id != account_id {
            // Do not leak the existence of other accounts' cart lines.
            return Err(ServiceError::NotFound("Cart item not found".to_string()));
        }
        Ok(line)
    }

    fn validate_variant(
        item: &CatalogItemModel,
        chosen_variant: Option<i32>,
    ) -> Result<(), ServiceError> {
        if item.requires_variant() {
            let chosen = chosen_variant.ok_or_else(|| {
                ServiceError::InvalidSelection(format!(
                    "item '{}' requires a weapon choice",
                    item.name
                ))
            })?;
            let variants = item.variants()?;
            if !variants.iter().any(|v| v.item_id == chosen) {
                return Err(ServiceError::InvalidSelection(format!(
                    "{} is not a valid weapon choice for '{}'",
                    chosen, item.name
                )));
            }
        } else if chosen_variant.is_some() {
            return Err(ServiceError::InvalidSelection(format!(
                "item '{}' does not offer weapon choices",
                item.name
            )));
        }
        Ok(())
    }

    fn resolve_line(line: &cart_item::Model, item: &CatalogItemModel) -> CartLine {
        CartLine {
            id: line.id,
            catalog_item_id: item.id,
            name: item.name.clone(),
            quantity: line.quantity,
            chosen_variant: line.chosen_variant,
            unit_price: item.price,
            line_total: item.price * Decimal::from(line.quantity),
            in_stock: item.has_stock_for(line.quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn catalog_item(variants: Option<serde_json::Value>) -> CatalogItemModel {
        CatalogItemModel {
            id: Uuid::new_v4(),
            name: "royal set".to_string(),
            description: String::new(),
            price: dec!(33.33),
            stock: 5,
            category: "equipment".to_string(),
            is_active: true,
            featured: false,
            bundled_items: serde_json::json!([
                {"item_id": 2487, "count": 1, "name": "crown armor"}
            ]),
            weapon_variants: variants,
            boss_points_price: None,
            boss_points_redeemable: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(item: &CatalogItemModel, quantity: i32) -> cart_item::Model {
        cart_item::Model {
            id: Uuid::new_v4(),
            account_id: 1,
            catalog_item_id: item.id,
            quantity,
            chosen_variant: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn variant_required_but_missing_is_invalid() {
        let item = catalog_item(Some(serde_json::json!([
            {"item_id": 2400, "name": "magic sword"}
        ])));
        assert!(matches!(
            CartService::validate_variant(&item, None),
            Err(ServiceError::InvalidSelection(_))
        ));
    }

    #[test]
    fn variant_outside_offered_set_is_invalid() {
        let item = catalog_item(Some(serde_json::json!([
            {"item_id": 2400, "name": "magic sword"}
        ])));
        assert!(CartService::validate_variant(&item, Some(9999)).is_err());
        assert!(CartService::validate_variant(&item, Some(2400)).is_ok());
    }

    #[test]
    fn variant_on_plain_item_is_invalid() {
        let item = catalog_item(None);
        assert!(CartService::validate_variant(&item, Some(2400)).is_err());
        assert!(CartService::validate_variant(&item, None).is_ok());
    }

    #[test]
    fn line_totals_use_exact_decimal_arithmetic() {
        let item = catalog_item(None);
        let resolved = CartService::resolve_line(&line(&item, 3), &item);
        assert_eq!(resolved.line_total, dec!(99.99));
    }
}
