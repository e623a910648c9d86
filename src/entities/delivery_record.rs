use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proof that an order's items were written to depot storage exactly once.
/// `order_id` carries a UNIQUE index; its existence is the idempotency guard
/// against double delivery on webhook replay or admin retry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub character_id: i32,
    pub account_id: i32,
    /// `models::DeliveryEnvelope` as JSON.
    #[sea_orm(column_type = "Json")]
    pub items: Json,
    pub delivered_at: DateTime<Utc>,
    /// Depot delivery is synchronous and immediate, so records are born
    /// claimed; a mailbox model would flip this later instead.
    pub claimed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
