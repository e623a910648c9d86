use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{catalog_item, CatalogItem, CatalogItemModel, OrderItem, UNLIMITED_STOCK};
use crate::errors::ServiceError;
use crate::models::{encode_bundle, BundledItem, WeaponVariant};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListItemsQuery {
    pub category: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCatalogItemInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// `-1` for unlimited.
    pub stock: i32,
    pub category: String,
    #[serde(default)]
    pub featured: bool,
    pub bundled_items: Vec<BundledItem>,
    #[serde(default)]
    pub weapon_variants: Option<Vec<WeaponVariant>>,
    #[serde(default)]
    pub boss_points_price: Option<i32>,
    #[serde(default)]
    pub boss_points_redeemable: bool,
}

impl CreateCatalogItemInput {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            return Err(ServiceError::ValidationError("name must not be empty".into()));
        }
        if self.price <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must be positive".into(),
            ));
        }
        if self.stock < UNLIMITED_STOCK {
            return Err(ServiceError::ValidationError(format!(
                "stock must be >= {} (-1 means unlimited)",
                UNLIMITED_STOCK
            )));
        }
        if self.bundled_items.is_empty() {
            return Err(ServiceError::ValidationError(
                "bundle must contain at least one item".into(),
            ));
        }
        if self.bundled_items.iter().any(|b| b.count <= 0) {
            return Err(ServiceError::ValidationError(
                "bundled item counts must be positive".into(),
            ));
        }
        if self.boss_points_redeemable && self.boss_points_price.unwrap_or(0) <= 0 {
            return Err(ServiceError::ValidationError(
                "redeemable items need a positive boss_points_price".into(),
            ));
        }
        Ok(())
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateCatalogItemInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub is_active: Option<bool>,
    pub bundled_items: Option<Vec<BundledItem>>,
    /// `Some(None)` clears variants, `Some(Some(v))` replaces them.
    pub weapon_variants: Option<Option<Vec<WeaponVariant>>>,
    pub boss_points_price: Option<Option<i32>>,
    pub boss_points_redeemable: Option<bool>,
}

/// Outcome of an admin delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Item is referenced by past order lines and was deactivated instead,
    /// keeping order snapshots resolvable.
    Deactivated,
}

#[derive(Clone)]
pub struct CatalogService {
    db: DbPool,
}

impl CatalogService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Storefront listing: active items that can still be bought.
    #[instrument(skip(self))]
    pub async fn list_active(
        &self,
        query: &ListItemsQuery,
    ) -> Result<Vec<CatalogItemModel>, ServiceError> {
        let mut condition = Condition::all()
            .add(catalog_item::Column::IsActive.eq(true))
            .add(
                Condition::any()
                    .add(catalog_item::Column::Stock.gt(0))
                    .add(catalog_item::Column::Stock.eq(UNLIMITED_STOCK)),
            );

        if let Some(category) = &query.category {
            condition = condition.add(catalog_item::Column::Category.eq(category.clone()));
        }
        if let Some(featured) = query.featured {
            condition = condition.add(catalog_item::Column::Featured.eq(featured));
        }

        let items = CatalogItem::find()
            .filter(condition)
            .order_by_desc(catalog_item::Column::Featured)
            .order_by_asc(catalog_item::Column::Name)
            .all(&self.db)
            .await?;
        Ok(items)
    }

    /// Fetch one storefront item. Inactive items are invisible here.
    pub async fn get_active(&self, id: Uuid) -> Result<CatalogItemModel, ServiceError> {
        CatalogItem::find_by_id(id)
            .filter(catalog_item::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Catalog item {} not found", id)))
    }

    /// Admin fetch, inactive rows included.
    pub async fn get(&self, id: Uuid) -> Result<CatalogItemModel, ServiceError> {
        CatalogItem::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Catalog item {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<CatalogItemModel>, ServiceError> {
        let items = CatalogItem::find()
            .order_by_asc(catalog_item::Column::Category)
            .order_by_asc(catalog_item::Column::Name)
            .all(&self.db)
            .await?;
        Ok(items)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(
        &self,
        input: CreateCatalogItemInput,
    ) -> Result<CatalogItemModel, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let model = catalog_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            category: Set(input.category),
            is_active: Set(true),
            featured: Set(input.featured),
            bundled_items: Set(encode_bundle(&input.bundled_items)),
            weapon_variants: Set(input
                .weapon_variants
                .as_ref()
                .map(|v| serde_json::to_value(v).unwrap_or_default())),
            boss_points_price: Set(input.boss_points_price),
            boss_points_redeemable: Set(input.boss_points_redeemable),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let item = model.insert(&self.db).await?;
        info!(item_id = %item.id, "catalog item created");
        Ok(item)
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        id: Uuid,
        input: UpdateCatalogItemInput,
    ) -> Result<CatalogItemModel, ServiceError> {
        let existing = self.get(id).await?;
        let mut model: catalog_item::ActiveModel = existing.into();

        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError("name must not be empty".into()));
            }
            model.name = Set(name);
        }
        if let Some(description) = input.description {
            model.description = Set(description);
        }
        if let Some(price) = input.price {
            if price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must be positive".into(),
                ));
            }
            model.price = Set(price);
        }
        if let Some(stock) = input.stock {
            if stock < UNLIMITED_STOCK {
                return Err(ServiceError::ValidationError(
                    "stock must be >= -1".into(),
                ));
            }
            model.stock = Set(stock);
        }
        if let Some(category) = input.category {
            model.category = Set(category);
        }
        if let Some(featured) = input.featured {
            model.featured = Set(featured);
        }
        if let Some(is_active) = input.is_active {
            model.is_active = Set(is_active);
        }
        if let Some(bundle) = input.bundled_items {
            if bundle.is_empty() {
                return Err(ServiceError::ValidationError(
                    "bundle must contain at least one item".into(),
                ));
            }
            model.bundled_items = Set(encode_bundle(&bundle));
        }
        if let Some(variants) = input.weapon_variants {
            model.weapon_variants = Set(variants
                .as_ref()
                .map(|v| serde_json::to_value(v).unwrap_or_default()));
        }
        if let Some(points) = input.boss_points_price {
            model.boss_points_price = Set(points);
        }
        if let Some(redeemable) = input.boss_points_redeemable {
            model.boss_points_redeemable = Set(redeemable);
        }
        model.updated_at = Set(Utc::now());

        let item = model.update(&self.db).await?;
        Ok(item)
    }

    /// Hard delete when nothing references the item; otherwise deactivate so
    /// historic order lines keep a resolvable foreign key.
    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: Uuid) -> Result<DeleteOutcome, ServiceError> {
        let item = self.get(id).await?;

        let referenced = OrderItem::find()
            .filter(crate::entities::order_item::Column::CatalogItemId.eq(id))
            .count(&self.db)
            .await?;

        if referenced > 0 {
            let mut model: catalog_item::ActiveModel = item.into();
            model.is_active = Set(false);
            model.updated_at = Set(Utc::now());
            model.update(&self.db).await?;
            info!(item_id = %id, references = referenced, "catalog item deactivated");
            return Ok(DeleteOutcome::Deactivated);
        }

        CatalogItem::delete_by_id(id).exec(&self.db).await?;
        info!(item_id = %id, "catalog item deleted");
        Ok(DeleteOutcome::Deleted)
    }
}
