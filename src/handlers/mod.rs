pub mod admin;
pub mod boss_points;
pub mod common;
pub mod marketplace;
pub mod webhooks;
