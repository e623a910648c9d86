use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    delivery_record, order, order_item, DeliveryRecord, Order, OrderItemModel, OrderModel,
    OrderStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// One order plus its frozen line snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<OrderModel>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone)]
pub struct OrderService {
    db: DbPool,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: DbPool, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_for_account(
        &self,
        account_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        let paginator = Order::find()
            .filter(order::Column::AccountId.eq(account_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Fetch one order the account owns. Asking for someone else's order is
    /// a 403, not a 404: the id was clearly valid, just not theirs.
    #[instrument(skip(self))]
    pub async fn get_for_account(
        &self,
        order_id: Uuid,
        account_id: i32,
    ) -> Result<OrderDetail, ServiceError> {
        let order = self.find(order_id).await?;
        if order.account_id != account_id {
            return Err(ServiceError::Forbidden(
                "order belongs to another account".into(),
            ));
        }
        self.with_items(order).await
    }

    #[instrument(skip(self))]
    pub async fn admin_list(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query.paginate(&self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            per_page,
        })
    }

    pub async fn admin_get(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = self.find(order_id).await?;
        self.with_items(order).await
    }

    /// Manual status override, still bound by the transition table. Used for
    /// support cases (refunds, cancelling a stuck pending order).
    #[instrument(skip(self))]
    pub async fn admin_update_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;
        let order = Order::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !order.status.can_transition_to(next) {
            txn.rollback().await?;
            return Err(ServiceError::Conflict(format!(
                "order {} cannot move from {} to {}",
                order_id, order.status, next
            )));
        }

        let mut model: order::ActiveModel = order.into();
        model.status = Set(next);
        if next == OrderStatus::Delivered {
            model.delivered_at = Set(Some(Utc::now()));
        }
        let order = model.update(&txn).await?;
        txn.commit().await?;

        let event = match next {
            OrderStatus::Approved => Event::OrderApproved(order_id),
            OrderStatus::Delivered => Event::OrderDelivered(order_id),
            OrderStatus::Cancelled => Event::OrderCancelled(order_id),
            OrderStatus::Refunded => Event::OrderRefunded(order_id),
            OrderStatus::Pending => Event::OrderCreated(order_id),
        };
        self.event_sender.send_or_log(event).await;

        info!(%order_id, status = %order.status, "order status updated by admin");
        Ok(order)
    }

    /// Approved orders with no delivery record: paid money, missing items.
    /// This is the admin's retry worklist.
    #[instrument(skip(self))]
    pub async fn undelivered_report(&self) -> Result<Vec<OrderModel>, ServiceError> {
        let approved = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Approved))
            .order_by_asc(order::Column::CreatedAt)
            .all(&self.db)
            .await?;
        if approved.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = approved.iter().map(|o| o.id).collect();
        let delivered: Vec<Uuid> = DeliveryRecord::find()
            .filter(delivery_record::Column::OrderId.is_in(ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|r| r.order_id)
            .collect();

        Ok(approved
            .into_iter()
            .filter(|o| !delivered.contains(&o.id))
            .collect())
    }

    /// Cancel pending orders older than `max_age_hours`. Abandoned gateway
    /// redirects end up here; the gateway session itself just expires.
    #[instrument(skip(self))]
    pub async fn expire_stale_pending_orders(
        &self,
        max_age_hours: i64,
    ) -> Result<u64, ServiceError> {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);

        let stale = Order::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .filter(order::Column::CreatedAt.lt(cutoff))
            .all(&self.db)
            .await?;

        let mut expired = 0u64;
        for order in stale {
            let order_id = order.id;

            // A webhook approval can land between the scan and this write;
            // re-read under lock so a paid order is never expired.
            let txn = self.db.begin().await?;
            let locked = Order::find_by_id(order_id).lock_exclusive().one(&txn).await?;
            match locked {
                Some(locked) if locked.status == OrderStatus::Pending => {
                    let mut model: order::ActiveModel = locked.into();
                    model.status = Set(OrderStatus::Cancelled);
                    model.update(&txn).await?;
                    txn.commit().await?;
                }
                _ => {
                    txn.rollback().await?;
                    continue;
                }
            }

            self.event_sender.send_or_log(Event::OrderExpired(order_id)).await;
            expired += 1;
        }

        if expired > 0 {
            info!(expired, "stale pending orders cancelled");
        }
        Ok(expired)
    }

    async fn find(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn with_items(&self, order: OrderModel) -> Result<OrderDetail, ServiceError> {
        let items = crate::entities::OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&self.db)
            .await?;
        Ok(OrderDetail { order, items })
    }
}
