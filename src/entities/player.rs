use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Game-server character row (legacy OT schema). Read-only here; used to
/// verify ownership before an order targets a character.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "players")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub name: String,
    pub account_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
    #[sea_orm(has_many = "super::player_depot_item::Entity")]
    DepotItems,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::player_depot_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DepotItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
