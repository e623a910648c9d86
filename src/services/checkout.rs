use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    cart_item, catalog_item, order, order_item, Account, CartItem, CatalogItem, OrderStatus,
    PaymentMethod, Player,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{encode_bundle, BundledItem};
use crate::services::gateway::{
    CardChargeRequest, CreateSessionRequest, GatewayPaymentStatus, PaymentGateway,
};
use crate::services::reconciliation::ReconciliationService;

/// Response to a hosted-checkout request: where to send the buyer.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutConfirmation {
    pub order_id: Uuid,
    pub total: Decimal,
    pub status: OrderStatus,
    pub session_id: String,
    pub redirect_url: String,
    pub sandbox_redirect_url: Option<String>,
}

/// Response to a synchronous card charge.
#[derive(Debug, Clone, Serialize)]
pub struct CardPaymentResult {
    pub order_id: Uuid,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: GatewayPaymentStatus,
    pub status_detail: Option<String>,
}

pub struct CheckoutService {
    db: DbPool,
    gateway: Arc<dyn PaymentGateway>,
    reconciliation: Arc<ReconciliationService>,
    event_sender: EventSender,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: DbPool,
        gateway: Arc<dyn PaymentGateway>,
        reconciliation: Arc<ReconciliationService>,
        event_sender: EventSender,
        currency: String,
    ) -> Self {
        Self {
            db,
            gateway,
            reconciliation,
            event_sender,
            currency,
        }
    }

    /// Hosted checkout: freeze the cart into a pending order, open a gateway
    /// session for it, and clear the cart. All in one transaction; a gateway
    /// failure leaves no order behind.
    #[instrument(skip(self), fields(account_id, character_id))]
    pub async fn checkout(
        &self,
        account_id: i32,
        character_id: i32,
    ) -> Result<CheckoutConfirmation, ServiceError> {
        let payer_email = self.payer_email(account_id).await?;
        let txn = self.db.begin().await?;

        let (order, _items, description) = self
            .create_order_from_cart(&txn, account_id, character_id, PaymentMethod::GatewayRedirect)
            .await?;

        let session = self
            .gateway
            .create_session(&CreateSessionRequest {
                order_id: order.id,
                total: order.total,
                payer_email,
                description,
                currency: self.currency.clone(),
            })
            .await?;

        let mut model: order::ActiveModel = order.clone().into();
        model.preference_id = Set(Some(session.session_id.clone()));
        let order = model.update(&txn).await?;

        txn.commit().await?;

        metrics::increment_counter!("otmarket.checkouts");
        info!(order_id = %order.id, total = %order.total, "checkout session opened");
        self.event_sender.send_or_log(Event::OrderCreated(order.id)).await;

        Ok(CheckoutConfirmation {
            order_id: order.id,
            total: order.total,
            status: order.status,
            session_id: session.session_id,
            redirect_url: session.redirect_url,
            sandbox_redirect_url: session.sandbox_redirect_url,
        })
    }

    /// Card checkout: freeze the cart into a pending order, then charge the
    /// card token synchronously and reconcile the result.
    ///
    /// The order is committed before the charge. A transport failure leaves
    /// it pending for the expiry sweep; a decline cancels it immediately.
    #[instrument(skip(self, card_token), fields(account_id, character_id))]
    pub async fn process_card_payment(
        &self,
        account_id: i32,
        character_id: i32,
        card_token: &str,
    ) -> Result<CardPaymentResult, ServiceError> {
        if card_token.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "card token must not be empty".into(),
            ));
        }

        let payer_email = self.payer_email(account_id).await?;
        let txn = self.db.begin().await?;
        let (order, _items, description) = self
            .create_order_from_cart(&txn, account_id, character_id, PaymentMethod::GatewayCard)
            .await?;
        txn.commit().await?;
        self.event_sender.send_or_log(Event::OrderCreated(order.id)).await;

        let detail = match self
            .gateway
            .charge_card(&CardChargeRequest {
                order_id: order.id,
                token: card_token.to_string(),
                amount: order.total,
                payer_email,
                description,
                currency: self.currency.clone(),
            })
            .await
        {
            Ok(detail) => detail,
            Err(ServiceError::GatewayRejected(reason)) => {
                self.reconciliation.cancel_pending(order.id).await?;
                return Err(ServiceError::GatewayRejected(reason));
            }
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "card charge did not complete");
                return Err(err);
            }
        };

        let payment_status = detail.status;
        let status_detail = detail.status_detail.clone();
        self.reconciliation
            .apply_payment_detail(order.id, detail)
            .await?;

        let order = crate::entities::Order::find_by_id(order.id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::InternalError("order vanished after charge".into()))?;

        Ok(CardPaymentResult {
            order_id: order.id,
            total: order.total,
            status: order.status,
            payment_status,
            status_detail,
        })
    }

    /// Payer email for gateway requests comes from the game account row,
    /// not from token claims.
    async fn payer_email(&self, account_id: i32) -> Result<String, ServiceError> {
        let account = Account::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Account {} not found", account_id)))?;
        Ok(account.email)
    }

    /// Shared core: validate the character, freeze the cart into an order
    /// with line snapshots, and clear the cart. Caller owns the transaction.
    async fn create_order_from_cart(
        &self,
        txn: &DatabaseTransaction,
        account_id: i32,
        character_id: i32,
        payment_method: PaymentMethod,
    ) -> Result<(order::Model, Vec<order_item::Model>, String), ServiceError> {
        let character = Player::find_by_id(character_id)
            .one(txn)
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

        let lines = CartItem::find()
            .filter(cart_item::Column::AccountId.eq(account_id))
            .find_also_related(CatalogItem)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(txn)
            .await?;

        let mut priced: Vec<(cart_item::Model, catalog_item::Model)> = Vec::new();
        for (line, item) in lines {
            match item {
                Some(item) if item.is_active => priced.push((line, item)),
                _ => {
                    // Same rule as the cart view: a line whose item went away
                    // is invisible, so it cannot block the rest of the cart.
                    warn!(line_id = %line.id, "skipping cart line for inactive item");
                }
            }
        }
        if priced.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut total = Decimal::ZERO;
        for (line, item) in &priced {
            if !item.has_stock_for(line.quantity) {
                return Err(ServiceError::OutOfStock {
                    item: item.name.clone(),
                    available: item.stock,
                });
            }
            total += item.price * Decimal::from(line.quantity);
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            account_id: Set(account_id),
            character_id: Set(character_id),
            total: Set(total),
            status: Set(OrderStatus::Pending),
            payment_method: Set(payment_method),
            preference_id: Set(None),
            payment_id: Set(None),
            created_at: Set(now),
            delivered_at: Set(None),
        };
        let order = order_model.insert(txn).await?;

        let mut items = Vec::with_capacity(priced.len());
        for (line, item) in &priced {
            let bundle = Self::frozen_bundle(item, line.chosen_variant)?;
            let model = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                catalog_item_id: Set(item.id),
                name: Set(item.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(item.price),
                bundled_items: Set(encode_bundle(&bundle)),
            };
            items.push(model.insert(txn).await?);
        }

        let purchased: Vec<Uuid> = priced.iter().map(|(line, _)| line.id).collect();
        CartItem::delete_many()
            .filter(cart_item::Column::Id.is_in(purchased))
            .exec(txn)
            .await?;

        let description = Self::describe(&items);
        Ok((order, items, description))
    }

    /// Per-unit bundle snapshot, with the chosen weapon variant appended as
    /// one extra unit item. Also used by the boss-points path.
    pub(crate) fn frozen_bundle(
        item: &catalog_item::Model,
        chosen_variant: Option<i32>,
    ) -> Result<Vec<BundledItem>, ServiceError> {
        let mut bundle = item.bundle()?;

        if item.requires_variant() {
            let chosen = chosen_variant.ok_or_else(|| {
                ServiceError::InvalidSelection(format!(
                    "item '{}' requires a weapon choice",
                    item.name
                ))
            })?;
            let variants = item.variants()?;
            let variant = variants
                .into_iter()
                .find(|v| v.item_id == chosen)
                .ok_or_else(|| {
                    ServiceError::InvalidSelection(format!(
                        "{} is not a valid weapon choice for '{}'",
                        chosen, item.name
                    ))
                })?;
            bundle.push(BundledItem {
                item_id: variant.item_id,
                count: 1,
                name: variant.name,
            });
        } else if chosen_variant.is_some() {
            return Err(ServiceError::InvalidSelection(format!(
                "item '{}' does not offer weapon choices",
                item.name
            )));
        }

        Ok(bundle)
    }

    fn describe(items: &[order_item::Model]) -> String {
        match items {
            [only] if only.quantity == 1 => only.name.clone(),
            [only] => format!("{} x{}", only.name, only.quantity),
            many => format!("{} and {} more", many[0].name, many.len() - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn item(variants: Option<serde_json::Value>) -> catalog_item::Model {
        catalog_item::Model {
            id: Uuid::new_v4(),
            name: "knight pack".to_string(),
            description: String::new(),
            price: dec!(25.00),
            stock: 10,
            category: "equipment".to_string(),
            is_active: true,
            featured: false,
            bundled_items: serde_json::json!([
                {"item_id": 2476, "count": 1, "name": "knight armor"},
                {"item_id": 2647, "count": 1, "name": "knight legs"}
            ]),
            weapon_variants: variants,
            boss_points_price: None,
            boss_points_redeemable: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn frozen_bundle_copies_catalog_bundle() {
        let bundle = CheckoutService::frozen_bundle(&item(None), None).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle[0].item_id, 2476);
    }

    #[test]
    fn frozen_bundle_appends_chosen_variant() {
        let with_variants = item(Some(serde_json::json!([
            {"item_id": 2400, "name": "magic sword"},
            {"item_id": 2431, "name": "stonecutter axe"}
        ])));

        let bundle = CheckoutService::frozen_bundle(&with_variants, Some(2431)).unwrap();
        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle[2].item_id, 2431);
        assert_eq!(bundle[2].count, 1);
        assert_eq!(bundle[2].name, "stonecutter axe");
    }

    #[test]
    fn frozen_bundle_rejects_missing_or_bogus_variant() {
        let with_variants = item(Some(serde_json::json!([
            {"item_id": 2400, "name": "magic sword"}
        ])));
        assert!(CheckoutService::frozen_bundle(&with_variants, None).is_err());
        assert!(CheckoutService::frozen_bundle(&with_variants, Some(1)).is_err());
    }

    #[test]
    fn description_summarizes_order_lines() {
        let line = |name: &str, quantity: i32| order_item::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            catalog_item_id: Uuid::new_v4(),
            name: name.to_string(),
            quantity,
            unit_price: dec!(1.00),
            bundled_items: serde_json::json!([]),
        };

        assert_eq!(CheckoutService::describe(&[line("demon set", 1)]), "demon set");
        assert_eq!(
            CheckoutService::describe(&[line("demon set", 2)]),
            "demon set x2"
        );
        assert_eq!(
            CheckoutService::describe(&[line("demon set", 1), line("crystal coins", 1)]),
            "demon set and 1 more"
        );
    }
}
