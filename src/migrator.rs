use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_customers_table::Migration),
            Box::new(m20250101_000002_create_orders_table::Migration),
            Box::new(m20250101_000003_create_crates_table::Migration),
            Box::new(m20250101_000004_create_pallets_table::Migration),
            Box::new(m20250101_000005_create_shelves_table::Migration),
            Box::new(m20250101_000006_create_boxes_table::Migration),
        ]
    }
}

mod m20250101_000001_create_customers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Customers::Name).string().not_null())
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(ColumnDef::new(Customers::City).string().not_null())
                        .col(
                            ColumnDef::new(Customers::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Customers::DeletedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Customers::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Customers::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_city")
                        .table(Customers::Table)
                        .col(Customers::City)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Customers {
        Table,
        Id,
        Name,
        Phone,
        City,
        IsDeleted,
        DeletedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(
                            ColumnDef::new(Orders::WeightKg)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::CrateCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeclaredPouchCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ActualPouchCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::DeclaredBoxCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ActualBoxCount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Orders::Notes).string().null())
                        .col(
                            ColumnDef::new(Orders::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Orders::DeletedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Orders::ReadyAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_customer_id")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
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
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_created_at")
                        .table(Orders::Table)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        CustomerId,
        Status,
        WeightKg,
        CrateCount,
        DeclaredPouchCount,
        ActualPouchCount,
        DeclaredBoxCount,
        ActualBoxCount,
        TotalAmount,
        Notes,
        IsDeleted,
        DeletedAt,
        ReadyAt,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20250101_000003_create_crates_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000003_create_crates_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Crates::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Crates::Id).string().primary_key().not_null())
                        .col(ColumnDef::new(Crates::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Crates::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Crates::Status).string().not_null())
                        .col(ColumnDef::new(Crates::Position).string().not_null())
                        .col(ColumnDef::new(Crates::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Crates::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_crates_order_id")
                        .table(Crates::Table)
                        .col(Crates::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Crates::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Crates {
        Table,
        Id,
        OrderId,
        CustomerId,
        Status,
        Position,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000004_create_pallets_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000004_create_pallets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Pallets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Pallets::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Pallets::Tag).string().not_null())
                        .col(ColumnDef::new(Pallets::Capacity).integer().not_null())
                        .col(
                            ColumnDef::new(Pallets::Holding)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Pallets::Location).string().not_null())
                        .col(ColumnDef::new(Pallets::Status).string().not_null())
                        .col(ColumnDef::new(Pallets::ShelfId).uuid().null())
                        .col(ColumnDef::new(Pallets::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Pallets::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_pallets_shelf_id")
                        .table(Pallets::Table)
                        .col(Pallets::ShelfId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Pallets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Pallets {
        Table,
        Id,
        Tag,
        Capacity,
        Holding,
        Location,
        Status,
        ShelfId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000005_create_shelves_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000005_create_shelves_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shelves::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Shelves::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Shelves::Tag).string().not_null())
                        .col(ColumnDef::new(Shelves::Capacity).integer().not_null())
                        .col(
                            ColumnDef::new(Shelves::Holding)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Shelves::Location).string().not_null())
                        .col(ColumnDef::new(Shelves::Status).string().not_null())
                        .col(ColumnDef::new(Shelves::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Shelves::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Shelves::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Shelves {
        Table,
        Id,
        Tag,
        Capacity,
        Holding,
        Location,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000006_create_boxes_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000006_create_boxes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Boxes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Boxes::Id).string().primary_key().not_null())
                        .col(ColumnDef::new(Boxes::OrderId).uuid().null())
                        .col(ColumnDef::new(Boxes::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Boxes::PalletId).uuid().null())
                        .col(ColumnDef::new(Boxes::ShelfId).uuid().null())
                        .col(ColumnDef::new(Boxes::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Boxes::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_boxes_order_id")
                        .table(Boxes::Table)
                        .col(Boxes::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_boxes_pallet_id")
                        .table(Boxes::Table)
                        .col(Boxes::PalletId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_boxes_shelf_id")
                        .table(Boxes::Table)
                        .col(Boxes::ShelfId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Boxes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Boxes {
        Table,
        Id,
        OrderId,
        CustomerId,
        PalletId,
        ShelfId,
        CreatedAt,
        UpdatedAt,
    }
}
