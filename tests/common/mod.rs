//! Shared harness for integration tests: an in-memory SQLite database with
//! the full schema, the wired service graph, and a scripted payment gateway.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

use otmarket_api::config::AppConfig;
use otmarket_api::db::DbPool;
use otmarket_api::entities::{account, cart_item, catalog_item, player};
use otmarket_api::errors::ServiceError;
use otmarket_api::events::{Event, EventSender};
use otmarket_api::migrator::Migrator;
use otmarket_api::models::{BundledItem, WeaponVariant};
use otmarket_api::services::gateway::{
    CardChargeRequest, CreateSessionRequest, GatewayPaymentStatus, GatewaySession, PaymentDetail,
    PaymentGateway,
};
use otmarket_api::services::AppServices;
use sea_orm_migration::MigratorTrait;

/// How the scripted gateway answers the next card charge.
#[derive(Debug, Clone)]
pub enum CardScript {
    Approve,
    Reject(String),
    Unavailable,
}

/// In-memory stand-in for the hosted gateway. Payment details are scripted
/// per payment id; session creation can be told to fail.
pub struct MockGateway {
    payments: Mutex<HashMap<String, PaymentDetail>>,
    card_script: Mutex<CardScript>,
    fail_sessions: Mutex<bool>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            payments: Mutex::new(HashMap::new()),
            card_script: Mutex::new(CardScript::Approve),
            fail_sessions: Mutex::new(false),
        }
    }

    pub fn script_payment(
        &self,
        payment_id: &str,
        order_id: Uuid,
        status: GatewayPaymentStatus,
        amount: Decimal,
    ) {
        let detail = PaymentDetail {
            payment_id: payment_id.to_string(),
            status,
            status_detail: Some(match status {
                GatewayPaymentStatus::Approved => "accredited".to_string(),
                GatewayPaymentStatus::Rejected => "cc_rejected_insufficient_amount".to_string(),
                _ => "pending".to_string(),
            }),
            amount,
            external_reference: Some(order_id.to_string()),
            raw: serde_json::json!({
                "id": payment_id,
                "status": status.as_str(),
                "transaction_amount": amount,
                "external_reference": order_id.to_string(),
            }),
        };
        self.payments
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), detail);
    }

    /// Script a payment whose external reference is not a known order.
    pub fn script_orphan_payment(&self, payment_id: &str, reference: Option<&str>) {
        let detail = PaymentDetail {
            payment_id: payment_id.to_string(),
            status: GatewayPaymentStatus::Approved,
            status_detail: None,
            amount: Decimal::ONE,
            external_reference: reference.map(str::to_string),
            raw: serde_json::json!({ "id": payment_id }),
        };
        self.payments
            .lock()
            .unwrap()
            .insert(payment_id.to_string(), detail);
    }

    pub fn set_card_script(&self, script: CardScript) {
        *self.card_script.lock().unwrap() = script;
    }

    pub fn fail_next_sessions(&self, fail: bool) {
        *self.fail_sessions.lock().unwrap() = fail;
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(
        &self,
        req: &CreateSessionRequest,
    ) -> Result<GatewaySession, ServiceError> {
        if *self.fail_sessions.lock().unwrap() {
            return Err(ServiceError::GatewayUnavailable(
                "scripted session failure".into(),
            ));
        }
        Ok(GatewaySession {
            session_id: format!("pref-{}", req.order_id),
            redirect_url: format!("https://gateway.test/checkout/{}", req.order_id),
            sandbox_redirect_url: None,
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetail, ServiceError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| ServiceError::GatewayRejected("Payment not found".into()))
    }

    async fn charge_card(&self, req: &CardChargeRequest) -> Result<PaymentDetail, ServiceError> {
        let script = self.card_script.lock().unwrap().clone();
        match script {
            CardScript::Approve => {
                let payment_id = format!("card-{}", req.order_id);
                self.script_payment(
                    &payment_id,
                    req.order_id,
                    GatewayPaymentStatus::Approved,
                    req.amount,
                );
                Ok(self.payments.lock().unwrap()[&payment_id].clone())
            }
            CardScript::Reject(reason) => Err(ServiceError::GatewayRejected(reason)),
            CardScript::Unavailable => {
                Err(ServiceError::GatewayUnavailable("scripted timeout".into()))
            }
        }
    }
}

pub struct TestApp {
    pub db: DbPool,
    pub services: AppServices,
    pub gateway: Arc<MockGateway>,
    pub config: AppConfig,
    // Kept alive so send() does not hit a closed channel.
    _events_rx: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
        // One connection keeps every session on the same in-memory database.
        opts.max_connections(1)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5));
        let db = Database::connect(opts)
            .await
            .expect("in-memory sqlite should connect");
        Migrator::up(&db, None).await.expect("migrations should run");

        let config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "integration_test_secret_0123456789abcdef".to_string(),
            0,
            "test".to_string(),
        );

        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);

        let gateway = Arc::new(MockGateway::new());
        let services = AppServices::new(db.clone(), event_sender, gateway.clone(), &config);

        Self {
            db,
            services,
            gateway,
            config,
            _events_rx: rx,
        }
    }

    pub async fn seed_account(&self, id: i32, boss_points: i32) {
        account::ActiveModel {
            id: Set(id),
            email: Set(format!("account{}@example.com", id)),
            boss_points: Set(boss_points),
        }
        .insert(&self.db)
        .await
        .expect("account insert");
    }

    pub async fn seed_character(&self, id: i32, account_id: i32, name: &str) {
        player::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            account_id: Set(account_id),
        }
        .insert(&self.db)
        .await
        .expect("player insert");
    }

    pub async fn seed_item(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        bundle: Vec<BundledItem>,
    ) -> catalog_item::Model {
        self.seed_item_full(name, price, stock, bundle, None, None)
            .await
    }

    pub async fn seed_item_full(
        &self,
        name: &str,
        price: Decimal,
        stock: i32,
        bundle: Vec<BundledItem>,
        variants: Option<Vec<WeaponVariant>>,
        boss_points_price: Option<i32>,
    ) -> catalog_item::Model {
        let now = Utc::now();
        catalog_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(format!("{} description", name)),
            price: Set(price),
            stock: Set(stock),
            category: Set("equipment".to_string()),
            is_active: Set(true),
            featured: Set(false),
            bundled_items: Set(serde_json::to_value(&bundle).unwrap()),
            weapon_variants: Set(variants.map(|v| serde_json::to_value(v).unwrap())),
            boss_points_price: Set(boss_points_price),
            boss_points_redeemable: Set(boss_points_price.is_some()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .expect("catalog item insert")
    }

    pub async fn cart_line_count(&self, account_id: i32) -> u64 {
        use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
        otmarket_api::entities::CartItem::find()
            .filter(cart_item::Column::AccountId.eq(account_id))
            .count(&self.db)
            .await
            .expect("cart count")
    }
}

pub fn coin_bundle() -> Vec<BundledItem> {
    vec![BundledItem {
        item_id: 2160,
        count: 25,
        name: "crystal coin".to_string(),
    }]
}

pub fn armor_bundle() -> Vec<BundledItem> {
    vec![
        BundledItem {
            item_id: 2487,
            count: 1,
            name: "crown armor".to_string(),
        },
        BundledItem {
            item_id: 2488,
            count: 1,
            name: "crown legs".to_string(),
        },
    ]
}
