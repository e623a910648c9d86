use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durable financial record of one checkout attempt. Never deleted, only
/// transitioned per [`OrderStatus::can_transition_to`].
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub account_id: i32,
    /// Target character; must belong to `account_id` at checkout time.
    pub character_id: i32,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    /// Gateway hosted-checkout session id, once created.
    #[sea_orm(nullable)]
    pub preference_id: Option<String>,
    /// Gateway payment id, once a payment event arrived.
    #[sea_orm(nullable)]
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sea_orm(nullable)]
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::payment_log::Entity")]
    PaymentLogs,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::payment_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order lifecycle. Transitions are driven exclusively by payment
/// reconciliation (money orders), the boss-points exchange (which walks
/// pending→approved→delivered synchronously), the expiry sweep, and
/// explicit admin action.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl OrderStatus {
    /// The closed transition table. Everything not listed here is illegal
    /// and must be rejected, never silently overwritten.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Cancelled) | (Approved, Delivered) | (Approved, Refunded)
        )
    }

    /// No transition ever leaves these states.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled | OrderStatus::Delivered | OrderStatus::Refunded
        )
    }
}

/// Which channel the buyer paid through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Hosted checkout: buyer is redirected to the gateway.
    #[sea_orm(string_value = "gateway_redirect")]
    GatewayRedirect,
    /// Tokenized card charged synchronously from our card form.
    #[sea_orm(string_value = "gateway_card")]
    GatewayCard,
    /// In-game currency path; no gateway involved.
    #[sea_orm(string_value = "boss_points")]
    BossPoints,
}
