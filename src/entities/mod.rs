//! Database entities.
//!
//! Marketplace-side tables use UUID keys; game-side tables (`accounts`,
//! `players`, `player_depot_items`) mirror the legacy OT server schema with
//! integer keys and are shared with the live game world.

pub mod account;
pub mod boss_points_purchase;
pub mod cart_item;
pub mod catalog_item;
pub mod delivery_record;
pub mod order;
pub mod order_item;
pub mod payment_log;
pub mod player;
pub mod player_depot_item;

pub use account::{Entity as Account, Model as AccountModel};
pub use boss_points_purchase::{Entity as BossPointsPurchase, Model as BossPointsPurchaseModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use catalog_item::{Entity as CatalogItem, Model as CatalogItemModel, UNLIMITED_STOCK};
pub use delivery_record::{Entity as DeliveryRecord, Model as DeliveryRecordModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment_log::{Entity as PaymentLog, Model as PaymentLogModel};
pub use player::{Entity as Player, Model as PlayerModel};
pub use player_depot_item::{Entity as PlayerDepotItem, Model as PlayerDepotItemModel};
