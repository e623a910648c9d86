//! Payment reconciliation: turns gateway payment events into order-state
//! transitions and deliveries.
//!
//! Webhook payloads are treated as untrusted hints. Only the payment id is
//! taken from them; the authoritative status and amount are always re-fetched
//! from the gateway server-to-server before anything changes.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    cart_item, catalog_item, order, order_item, payment_log, CartItem, CatalogItem, Order,
    OrderItem, OrderStatus, UNLIMITED_STOCK,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::delivery::{expand_order_items, DeliveryService};
use crate::services::gateway::{GatewayPaymentStatus, PaymentDetail, PaymentGateway};

const PROVIDER: &str = "mercadopago";

pub struct ReconciliationService {
    db: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    delivery: Arc<DeliveryService>,
    event_sender: EventSender,
}

impl ReconciliationService {
    pub fn new(
        db: DbPool,
        gateway: Arc<dyn PaymentGateway>,
        delivery: Arc<DeliveryService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            gateway,
            delivery,
            event_sender,
        }
    }

    /// Entry point for webhook notifications: re-fetch the payment by id and
    /// apply whatever the gateway says it is now.
    #[instrument(skip(self))]
    pub async fn on_payment_event(&self, payment_id: &str) -> Result<(), ServiceError> {
        let detail = self.gateway.get_payment(payment_id).await?;

        let order_id = detail
            .external_reference
            .as_deref()
            .and_then(|r| Uuid::from_str(r).ok())
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "payment {} carries no usable order reference",
                    payment_id
                ))
            })?;

        self.apply_payment_detail(order_id, detail).await
    }

    /// Apply one authoritative payment detail to an order. Idempotent: a
    /// replayed event for a state the order already left is a logged no-op.
    #[instrument(skip(self, detail), fields(%order_id, payment_status = detail.status.as_str()))]
    pub async fn apply_payment_detail(
        &self,
        order_id: Uuid,
        detail: PaymentDetail,
    ) -> Result<(), ServiceError> {
        // Resolve the order before logging anything; the payment log has a
        // foreign key on it and an unknown reference is the caller's error.
        let order = Order::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "payment references unknown order {}",
                    order_id
                ))
            })?;

        self.append_payment_log(&order, &detail).await?;
        self.event_sender
            .send_or_log(Event::PaymentLogged {
                order_id,
                status: detail.status.as_str().to_string(),
            })
            .await;

        match detail.status {
            GatewayPaymentStatus::Approved => self.handle_approved(order, &detail).await,
            GatewayPaymentStatus::Rejected | GatewayPaymentStatus::Cancelled => {
                self.handle_declined(order).await
            }
            GatewayPaymentStatus::Pending
            | GatewayPaymentStatus::InProcess
            | GatewayPaymentStatus::Unknown => {
                info!(%order_id, "payment not settled yet, nothing to do");
                Ok(())
            }
        }
    }

    /// Cancel a pending order (declined card charges, expiry sweep retries).
    /// Cancelling an order that is no longer pending is a no-op.
    #[instrument(skip(self))]
    pub async fn cancel_pending(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        self.handle_declined(order).await
    }

    /// Re-run delivery for an approved order whose first delivery failed.
    /// The delivery record's unique index keeps this safe to call any time.
    #[instrument(skip(self))]
    pub async fn redeliver(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        match order.status {
            OrderStatus::Approved => self.deliver_and_mark(order).await,
            OrderStatus::Delivered => Ok(()),
            other => Err(ServiceError::Conflict(format!(
                "order {} is {} and cannot be delivered",
                order_id, other
            ))),
        }
    }

    async fn append_payment_log(
        &self,
        order: &order::Model,
        detail: &PaymentDetail,
    ) -> Result<(), ServiceError> {
        let log = payment_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            provider: Set(PROVIDER.to_string()),
            payment_id: Set(detail.payment_id.clone()),
            status: Set(detail.status.as_str().to_string()),
            status_detail: Set(detail.status_detail.clone()),
            amount: Set(detail.amount),
            payload: Set(detail.raw.clone()),
            created_at: Set(Utc::now()),
        };
        log.insert(&self.db).await?;
        Ok(())
    }

    async fn handle_approved(
        &self,
        order: order::Model,
        detail: &PaymentDetail,
    ) -> Result<(), ServiceError> {
        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Approved | OrderStatus::Delivered => {
                info!(order_id = %order.id, "approval replay ignored");
                return Ok(());
            }
            other => {
                warn!(order_id = %order.id, status = %other, "approval for a closed order ignored");
                return Ok(());
            }
        }

        // An approved payment that does not cover the order total is not an
        // approval of this order. Keep it pending and let a human look at
        // the payment log.
        if detail.amount < order.total {
            warn!(
                order_id = %order.id,
                paid = %detail.amount,
                owed = %order.total,
                "approved payment amount below order total, order left pending"
            );
            return Ok(());
        }

        let Some(order) = self.approve(order, &detail.payment_id).await? else {
            return Ok(());
        };
        metrics::increment_counter!("otmarket.orders_approved");
        self.event_sender.send_or_log(Event::OrderApproved(order.id)).await;

        self.deliver_and_mark(order).await
    }

    /// pending -> approved, plus stock decrement and cart cleanup, in one
    /// transaction. The order row is re-read under an exclusive lock so two
    /// concurrent webhook deliveries serialize here; a lost race returns
    /// `None` and the caller must not deliver.
    async fn approve(
        &self,
        order: order::Model,
        payment_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        let txn = self.db.begin().await?;

        let locked = Order::find_by_id(order.id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::InternalError("order vanished during approval".into()))?;
        if locked.status != OrderStatus::Pending {
            txn.rollback().await?;
            info!(order_id = %order.id, status = %locked.status, "lost approval race, already handled");
            return Ok(None);
        }

        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&txn)
            .await?;

        for line in &lines {
            let item = CatalogItem::find_by_id(line.catalog_item_id)
                .lock_exclusive()
                .one(&txn)
                .await?;
            let Some(item) = item else {
                // Snapshot still owes the buyer even if the catalog row was
                // hard-deleted since; there is just no stock to decrement.
                continue;
            };
            if item.stock == UNLIMITED_STOCK {
                continue;
            }

            // Clamped: an oversold race must not drive stock negative or
            // block the paid order.
            let remaining = (item.stock - line.quantity).max(0);
            let item_id = item.id;
            let mut model: catalog_item::ActiveModel = item.into();
            model.stock = Set(remaining);
            model.updated_at = Set(Utc::now());
            model.update(&txn).await?;

            if remaining == 0 {
                self.event_sender.send_or_log(Event::StockDepleted(item_id)).await;
            }
        }

        let mut model: order::ActiveModel = locked.into();
        model.status = Set(OrderStatus::Approved);
        model.payment_id = Set(Some(payment_id.to_string()));
        let order = model.update(&txn).await?;

        // Redirect checkout clears the cart up front, but a card order
        // approved later may have accumulated fresh lines; those stay.
        // Only the lines for items in this order are dropped.
        let item_ids: Vec<Uuid> = lines.iter().map(|l| l.catalog_item_id).collect();
        if !item_ids.is_empty() {
            CartItem::delete_many()
                .filter(cart_item::Column::AccountId.eq(order.account_id))
                .filter(cart_item::Column::CatalogItemId.is_in(item_ids))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        info!(order_id = %order.id, "order approved");
        Ok(Some(order))
    }

    /// Deliver an approved order's items, then close it as delivered. A
    /// delivery failure is recorded and leaves the order approved so an
    /// admin can retry; the money is already captured either way.
    async fn deliver_and_mark(&self, order: order::Model) -> Result<(), ServiceError> {
        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&self.db)
            .await?;
        let items = expand_order_items(&lines)?;

        if let Err(err) = self
            .delivery
            .deliver(order.id, order.account_id, order.character_id, items)
            .await
        {
            error!(order_id = %order.id, error = %err, "delivery failed, order stays approved");
            metrics::increment_counter!("otmarket.deliveries_failed");
            self.event_sender
                .send_or_log(Event::DeliveryFailed {
                    order_id: order.id,
                    reason: err.to_string(),
                })
                .await;
            return Ok(());
        }

        let order_id = order.id;
        if self.transition(order_id, OrderStatus::Delivered).await? {
            metrics::increment_counter!("otmarket.orders_delivered");
            info!(%order_id, "order delivered");
        }
        Ok(())
    }

    async fn handle_declined(&self, order: order::Model) -> Result<(), ServiceError> {
        if !self.transition(order.id, OrderStatus::Cancelled).await? {
            info!(order_id = %order.id, "decline for a settled order ignored");
            return Ok(());
        }

        metrics::increment_counter!("otmarket.orders_cancelled");
        info!(order_id = %order.id, "order cancelled");
        self.event_sender.send_or_log(Event::OrderCancelled(order.id)).await;
        Ok(())
    }

    /// One guarded write: re-read the order under an exclusive lock and apply
    /// `next` only if the transition table allows it from the current state.
    /// Returns whether the write happened.
    async fn transition(&self, order_id: Uuid, next: OrderStatus) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;

        let locked = Order::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if !locked.status.can_transition_to(next) {
            txn.rollback().await?;
            warn!(%order_id, from = %locked.status, to = %next, "transition refused");
            return Ok(false);
        }

        let mut model: order::ActiveModel = locked.into();
        model.status = Set(next);
        if next == OrderStatus::Delivered {
            model.delivered_at = Set(Some(Utc::now()));
        }
        model.update(&txn).await?;
        txn.commit().await?;
        Ok(true)
    }
}
