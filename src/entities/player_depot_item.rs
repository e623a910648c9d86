use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One item row in a character's persistent depot storage
/// (legacy OT `player_depotitems` layout: keyed by player + slot id).
///
/// `sid` is unique per player; `pid` references the parent container's `sid`
/// within the same player's depot. The delivery engine only ever appends
/// rows with fresh `sid`s, so existing inventories are never rewritten.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "player_depot_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub player_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub sid: i32,
    pub pid: i32,
    pub itemtype: i32,
    pub count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::player::Entity",
        from = "Column::PlayerId",
        to = "super::player::Column::Id"
    )]
    Player,
}

impl Related<super::player::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Player.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
