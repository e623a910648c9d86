//! Item delivery engine: writes purchased items into a character's depot
//! storage. All writes for one order happen in a single transaction guarded
//! by the UNIQUE `delivery_records.order_id` index, so a replayed webhook or
//! an admin retry can never deliver twice.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    delivery_record, player_depot_item, DeliveryRecord, Player, PlayerDepotItem,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{BundledItem, DeliveryEnvelope};

/// What a delivery attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// A delivery record already existed for this order.
    AlreadyDelivered,
}

#[derive(Clone)]
pub struct DeliveryService {
    db: DbPool,
    event_sender: EventSender,
    /// Slot id of the depot root container in the legacy schema.
    depot_root: i32,
}

impl DeliveryService {
    pub fn new(db: DbPool, event_sender: EventSender, depot_root: i32) -> Self {
        Self {
            db,
            event_sender,
            depot_root,
        }
    }

    /// Deliver `items` for `order_id` into `character_id`'s depot.
    ///
    /// Item counts must already be multiplied out per line quantity. Either
    /// every row lands and a delivery record exists, or nothing changed.
    #[instrument(skip(self, items), fields(%order_id, character_id, item_count = items.len()))]
    pub async fn deliver(
        &self,
        order_id: Uuid,
        account_id: i32,
        character_id: i32,
        items: Vec<BundledItem>,
    ) -> Result<DeliveryOutcome, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::InternalError(format!(
                "order {} resolved to an empty item list",
                order_id
            )));
        }

        let txn = self.db.begin().await?;

        let existing = DeliveryRecord::find()
            .filter(delivery_record::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?;
        if existing.is_some() {
            txn.rollback().await?;
            info!(%order_id, "delivery skipped, record already exists");
            return Ok(DeliveryOutcome::AlreadyDelivered);
        }

        let character = Player::find_by_id(character_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Character {} not found", character_id))
            })?;
        if character.account_id != account_id {
            return Err(ServiceError::Forbidden(format!(
                "character {} does not belong to account {}",
                character_id, account_id
            )));
        }

        let (mut next_sid, pid) = self.resolve_depot_slots(&txn, character_id).await?;

        for item in &items {
            let row = player_depot_item::ActiveModel {
                player_id: Set(character_id),
                sid: Set(next_sid),
                pid: Set(pid),
                itemtype: Set(item.item_id),
                count: Set(item.count),
            };
            row.insert(&txn).await?;
            next_sid += 1;
        }

        let delivered_at = Utc::now();
        let envelope = DeliveryEnvelope {
            order_id,
            items,
            delivered_at,
            player_id: character_id,
        };
        let record = delivery_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            character_id: Set(character_id),
            account_id: Set(account_id),
            items: Set(serde_json::to_value(&envelope).map_err(|e| {
                ServiceError::SerializationError(format!("delivery envelope: {}", e))
            })?),
            delivered_at: Set(delivered_at),
            claimed: Set(true),
        };
        record.insert(&txn).await?;

        txn.commit().await?;

        info!(%order_id, character = %character.name, "order delivered to depot");
        self.event_sender.send_or_log(Event::OrderDelivered(order_id)).await;
        Ok(DeliveryOutcome::Delivered)
    }

    pub async fn record_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<delivery_record::Model>, ServiceError> {
        let record = DeliveryRecord::find()
            .filter(delivery_record::Column::OrderId.eq(order_id))
            .one(&self.db)
            .await?;
        Ok(record)
    }

    /// Depot rows for an account's delivered orders, newest first.
    pub async fn history_for_account(
        &self,
        account_id: i32,
    ) -> Result<Vec<delivery_record::Model>, ServiceError> {
        let records = DeliveryRecord::find()
            .filter(delivery_record::Column::AccountId.eq(account_id))
            .order_by_desc(delivery_record::Column::DeliveredAt)
            .all(&self.db)
            .await?;
        Ok(records)
    }

    /// Pick the next free slot id and the parent container for new rows.
    ///
    /// Slot ids are unique per player, so the next one is max(sid)+1. An
    /// empty depot starts right after the root container slot. New rows
    /// reuse the parent of the character's existing depot content so they
    /// appear alongside it.
    async fn resolve_depot_slots(
        &self,
        txn: &sea_orm::DatabaseTransaction,
        character_id: i32,
    ) -> Result<(i32, i32), ServiceError> {
        let existing: Vec<player_depot_item::Model> = PlayerDepotItem::find()
            .filter(player_depot_item::Column::PlayerId.eq(character_id))
            .order_by_asc(player_depot_item::Column::Sid)
            .lock_exclusive()
            .all(txn)
            .await?;

        let next_sid = existing
            .iter()
            .map(|r| r.sid)
            .max()
            .map(|max| max + 1)
            .unwrap_or(self.depot_root + 1);
        let pid = existing
            .first()
            .map(|r| r.pid)
            .unwrap_or(self.depot_root);

        Ok((next_sid, pid))
    }
}

/// Flatten frozen order lines into the concrete items to write, multiplying
/// per-unit bundle counts by the line quantity.
pub fn expand_order_items(
    lines: &[crate::entities::OrderItemModel],
) -> Result<Vec<BundledItem>, ServiceError> {
    let mut items = Vec::new();
    for line in lines {
        for entry in line.bundle()? {
            items.push(BundledItem {
                item_id: entry.item_id,
                count: entry.count * line.quantity,
                name: entry.name,
            });
        }
    }
    Ok(items)
}
