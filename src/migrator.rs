use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250110_000001_create_marketplace_tables::Migration),
            Box::new(m20250110_000002_create_game_tables::Migration),
        ]
    }
}

mod m20250110_000001_create_marketplace_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250110_000001_create_marketplace_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CatalogItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CatalogItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogItems::Name).string().not_null())
                        .col(ColumnDef::new(CatalogItems::Description).text().not_null())
                        .col(
                            ColumnDef::new(CatalogItems::Price)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogItems::Stock).integer().not_null())
                        .col(ColumnDef::new(CatalogItems::Category).string().not_null())
                        .col(ColumnDef::new(CatalogItems::IsActive).boolean().not_null())
                        .col(ColumnDef::new(CatalogItems::Featured).boolean().not_null())
                        .col(
                            ColumnDef::new(CatalogItems::BundledItems)
                                .json()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogItems::WeaponVariants).json())
                        .col(ColumnDef::new(CatalogItems::BossPointsPrice).integer())
                        .col(
                            ColumnDef::new(CatalogItems::BossPointsRedeemable)
                                .boolean()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::AccountId).integer().not_null())
                        .col(ColumnDef::new(CartItems::CatalogItemId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(CartItems::ChosenVariant).integer())
                        .col(
                            ColumnDef::new(CartItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CartItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One line per (account, catalog item); adds merge instead.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_cart_items_account_item")
                        .table(CartItems::Table)
                        .col(CartItems::AccountId)
                        .col(CartItems::CatalogItemId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::AccountId).integer().not_null())
                        .col(ColumnDef::new(Orders::CharacterId).integer().not_null())
                        .col(ColumnDef::new(Orders::Total).decimal_len(10, 2).not_null())
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Orders::PaymentMethod)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::PreferenceId).string())
                        .col(ColumnDef::new(Orders::PaymentId).string())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::DeliveredAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_account_id")
                        .table(Orders::Table)
                        .col(Orders::AccountId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::CatalogItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::BundledItems).json().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentLogs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentLogs::OrderId).uuid().not_null())
                        .col(ColumnDef::new(PaymentLogs::Provider).string().not_null())
                        .col(ColumnDef::new(PaymentLogs::PaymentId).string().not_null())
                        .col(ColumnDef::new(PaymentLogs::Status).string().not_null())
                        .col(ColumnDef::new(PaymentLogs::StatusDetail).string())
                        .col(
                            ColumnDef::new(PaymentLogs::Amount)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PaymentLogs::Payload).json().not_null())
                        .col(
                            ColumnDef::new(PaymentLogs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRecords::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(DeliveryRecords::CharacterId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryRecords::AccountId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRecords::Items).json().not_null())
                        .col(
                            ColumnDef::new(DeliveryRecords::DeliveredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryRecords::Claimed).boolean().not_null())
                        .to_owned(),
                )
                .await?;

            // The idempotency guard: at most one delivery per order, ever.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_records_order_id")
                        .table(DeliveryRecords::Table)
                        .col(DeliveryRecords::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BossPointsPurchases::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BossPointsPurchases::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BossPointsPurchases::AccountId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BossPointsPurchases::CharacterId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BossPointsPurchases::CatalogItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BossPointsPurchases::PointsSpent)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BossPointsPurchases::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            for table in [
                "boss_points_purchases",
                "delivery_records",
                "payment_logs",
                "order_items",
                "orders",
                "cart_items",
                "catalog_items",
            ] {
                manager
                    .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                    .await?;
            }
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum CatalogItems {
        Table,
        Id,
        Name,
        Description,
        Price,
        Stock,
        Category,
        IsActive,
        Featured,
        BundledItems,
        WeaponVariants,
        BossPointsPrice,
        BossPointsRedeemable,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        AccountId,
        CatalogItemId,
        Quantity,
        ChosenVariant,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        AccountId,
        CharacterId,
        Total,
        Status,
        PaymentMethod,
        PreferenceId,
        PaymentId,
        CreatedAt,
        DeliveredAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        CatalogItemId,
        Name,
        Quantity,
        UnitPrice,
        BundledItems,
    }

    #[derive(DeriveIden)]
    enum PaymentLogs {
        Table,
        Id,
        OrderId,
        Provider,
        PaymentId,
        Status,
        StatusDetail,
        Amount,
        Payload,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryRecords {
        Table,
        Id,
        OrderId,
        CharacterId,
        AccountId,
        Items,
        DeliveredAt,
        Claimed,
    }

    #[derive(DeriveIden)]
    enum BossPointsPurchases {
        Table,
        Id,
        AccountId,
        CharacterId,
        CatalogItemId,
        PointsSpent,
        CreatedAt,
    }
}

mod m20250110_000002_create_game_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250110_000002_create_game_tables"
        }
    }

    /// Creates the subset of the legacy game schema this crate touches.
    /// On a live game database these already exist; `IF NOT EXISTS` makes
    /// the migration a no-op there. Local and test databases get them fresh.
    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Accounts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Accounts::Id)
                                .integer()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Accounts::Email).string().not_null())
                        .col(
                            ColumnDef::new(Accounts::BossPoints)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Players::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Players::Id)
                                .integer()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Players::Name).string().not_null())
                        .col(ColumnDef::new(Players::AccountId).integer().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PlayerDepotItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PlayerDepotItems::PlayerId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PlayerDepotItems::Sid).integer().not_null())
                        .col(ColumnDef::new(PlayerDepotItems::Pid).integer().not_null())
                        .col(
                            ColumnDef::new(PlayerDepotItems::Itemtype)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PlayerDepotItems::Count).integer().not_null())
                        .primary_key(
                            Index::create()
                                .col(PlayerDepotItems::PlayerId)
                                .col(PlayerDepotItems::Sid),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
            // Game tables are owned by the game server; never drop them.
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Accounts {
        Table,
        Id,
        Email,
        BossPoints,
    }

    #[derive(DeriveIden)]
    enum Players {
        Table,
        Id,
        Name,
        AccountId,
    }

    #[derive(DeriveIden)]
    enum PlayerDepotItems {
        Table,
        PlayerId,
        Sid,
        Pid,
        Itemtype,
        Count,
    }
}
