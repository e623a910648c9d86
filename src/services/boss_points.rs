//! Boss-points exchange: the no-gateway purchase path. Points are an
//! in-game currency stored on the legacy `accounts` table; spending them,
//! recording the purchase, and creating the matching order all happen in one
//! transaction under a row lock on the account.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    account, boss_points_purchase, catalog_item, order, order_item, player, Account, CatalogItem,
    CatalogItemModel, OrderStatus, PaymentMethod, Player, PlayerModel, UNLIMITED_STOCK,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::encode_bundle;
use crate::services::delivery::DeliveryService;

#[derive(Debug, Clone, Serialize)]
pub struct BossPointsPurchaseResult {
    pub purchase_id: Uuid,
    pub order_id: Uuid,
    pub points_spent: i32,
    pub remaining_balance: i32,
    pub status: OrderStatus,
}

pub struct BossPointsService {
    db: DbPool,
    delivery: Arc<DeliveryService>,
    event_sender: EventSender,
}

impl BossPointsService {
    pub fn new(db: DbPool, delivery: Arc<DeliveryService>, event_sender: EventSender) -> Self {
        Self {
            db,
            delivery,
            event_sender,
        }
    }

    pub async fn balance(&self, account_id: i32) -> Result<i32, ServiceError> {
        let account = Account::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Account {} not found", account_id)))?;
        Ok(account.boss_points)
    }

    /// Redeemable storefront: active, in stock, and priced in points.
    #[instrument(skip(self))]
    pub async fn shop(&self) -> Result<Vec<CatalogItemModel>, ServiceError> {
        let items = CatalogItem::find()
            .filter(catalog_item::Column::IsActive.eq(true))
            .filter(catalog_item::Column::BossPointsRedeemable.eq(true))
            .filter(catalog_item::Column::BossPointsPrice.is_not_null())
            .filter(
                catalog_item::Column::Stock
                    .gt(0)
                    .or(catalog_item::Column::Stock.eq(UNLIMITED_STOCK)),
            )
            .order_by_asc(catalog_item::Column::Name)
            .all(&self.db)
            .await?;
        Ok(items)
    }

    pub async fn characters(&self, account_id: i32) -> Result<Vec<PlayerModel>, ServiceError> {
        let characters = Player::find()
            .filter(player::Column::AccountId.eq(account_id))
            .order_by_asc(player::Column::Name)
            .all(&self.db)
            .await?;
        Ok(characters)
    }

    /// Spend points on one catalog item and deliver it. The order walks
    /// pending -> approved synchronously inside the transaction; delivery and
    /// the delivered mark follow after commit, exactly like the money path.
    #[instrument(skip(self), fields(account_id, character_id, %catalog_item_id))]
    pub async fn purchase(
        &self,
        account_id: i32,
        character_id: i32,
        catalog_item_id: Uuid,
        chosen_variant: Option<i32>,
    ) -> Result<BossPointsPurchaseResult, ServiceError> {
        let txn = self.db.begin().await?;

        let item = CatalogItem::find_by_id(catalog_item_id)
            .filter(catalog_item::Column::IsActive.eq(true))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Catalog item {} not found", catalog_item_id))
            })?;

        let price = match (item.boss_points_redeemable, item.boss_points_price) {
            (true, Some(price)) if price > 0 => price,
            _ => {
                return Err(ServiceError::InvalidSelection(format!(
                    "item '{}' cannot be bought with boss points",
                    item.name
                )))
            }
        };
        if !item.has_stock_for(1) {
            return Err(ServiceError::OutOfStock {
                item: item.name.clone(),
                available: item.stock,
            });
        }

        let character = Player::find_by_id(character_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Character {} not found", character_id))
            })?;
        if character.account_id != account_id {
            return Err(ServiceError::Forbidden(format!(
                "character '{}' does not belong to this account",
                character.name
            )));
        }

        // Balance is checked only after the row lock; two concurrent
        // purchases serialize here and the second one sees the debit.
        let locked_account = Account::find_by_id(account_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Account {} not found", account_id)))?;
        if locked_account.boss_points < price {
            return Err(ServiceError::InsufficientBalance {
                required: price,
                balance: locked_account.boss_points,
            });
        }
        let remaining_balance = locked_account.boss_points - price;

        let mut account_model: account::ActiveModel = locked_account.into();
        account_model.boss_points = Set(remaining_balance);
        account_model.update(&txn).await?;

        if !item.has_unlimited_stock() {
            let remaining_stock = item.stock - 1;
            let mut item_model: catalog_item::ActiveModel = item.clone().into();
            item_model.stock = Set(remaining_stock);
            item_model.updated_at = Set(Utc::now());
            item_model.update(&txn).await?;
            if remaining_stock == 0 {
                self.event_sender.send_or_log(Event::StockDepleted(item.id)).await;
            }
        }

        let bundle =
            crate::services::checkout::CheckoutService::frozen_bundle(&item, chosen_variant)?;

        // Purchase row, order row, and order line share the purchase id.
        let purchase_id = Uuid::new_v4();
        let now = Utc::now();

        let purchase = boss_points_purchase::ActiveModel {
            id: Set(purchase_id),
            account_id: Set(account_id),
            character_id: Set(character_id),
            catalog_item_id: Set(item.id),
            points_spent: Set(price),
            created_at: Set(now),
        };
        purchase.insert(&txn).await?;

        // Monetary total is zero; the price paid lives on the purchase row.
        let order_model = order::ActiveModel {
            id: Set(purchase_id),
            account_id: Set(account_id),
            character_id: Set(character_id),
            total: Set(Decimal::ZERO),
            status: Set(OrderStatus::Approved),
            payment_method: Set(PaymentMethod::BossPoints),
            preference_id: Set(None),
            payment_id: Set(None),
            created_at: Set(now),
            delivered_at: Set(None),
        };
        let order = order_model.insert(&txn).await?;

        let line = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(purchase_id),
            catalog_item_id: Set(item.id),
            name: Set(item.name.clone()),
            quantity: Set(1),
            unit_price: Set(Decimal::ZERO),
            bundled_items: Set(encode_bundle(&bundle)),
        };
        line.insert(&txn).await?;

        txn.commit().await?;

        metrics::increment_counter!("otmarket.boss_points_purchases");
        info!(%purchase_id, points = price, "boss points purchase committed");
        self.event_sender
            .send_or_log(Event::BossPointsSpent {
                account_id,
                points: price,
            })
            .await;
        self.event_sender.send_or_log(Event::OrderApproved(purchase_id)).await;

        let status = match self
            .delivery
            .deliver(purchase_id, account_id, character_id, bundle)
            .await
        {
            Ok(_) => {
                let mut model: order::ActiveModel = order.into();
                model.status = Set(OrderStatus::Delivered);
                model.delivered_at = Set(Some(Utc::now()));
                model.update(&self.db).await?;
                OrderStatus::Delivered
            }
            Err(err) => {
                // Points are spent and the order is approved; an admin
                // redelivery will finish the job.
                error!(%purchase_id, error = %err, "boss points delivery failed");
                self.event_sender
                    .send_or_log(Event::DeliveryFailed {
                        order_id: purchase_id,
                        reason: err.to_string(),
                    })
                    .await;
                OrderStatus::Approved
            }
        };

        Ok(BossPointsPurchaseResult {
            purchase_id,
            order_id: purchase_id,
            points_spent: price,
            remaining_balance,
            status,
        })
    }
}
