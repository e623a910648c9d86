//! Business services. Handlers stay thin; every rule that matters lives
//! here, behind methods returning `Result<_, ServiceError>`.

pub mod boss_points;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod delivery;
pub mod gateway;
pub mod orders;
pub mod reconciliation;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;

use boss_points::BossPointsService;
use cart::CartService;
use catalog::CatalogService;
use checkout::CheckoutService;
use delivery::DeliveryService;
use gateway::PaymentGateway;
use orders::OrderService;
use reconciliation::ReconciliationService;

/// Wired service graph shared through application state.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub delivery: Arc<DeliveryService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub boss_points: Arc<BossPointsService>,
}

impl AppServices {
    pub fn new(
        db: DbPool,
        event_sender: EventSender,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let delivery = Arc::new(DeliveryService::new(
            db.clone(),
            event_sender.clone(),
            config.depot_root_container,
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            db.clone(),
            gateway.clone(),
            delivery.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            gateway,
            reconciliation.clone(),
            event_sender.clone(),
            config.marketplace_currency.clone(),
        ));

        Self {
            catalog: Arc::new(CatalogService::new(db.clone())),
            cart: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            checkout,
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            boss_points: Arc::new(BossPointsService::new(db, delivery.clone(), event_sender)),
            delivery,
            reconciliation,
        }
    }
}
