use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_donations_table::Migration)]
    }
}

// Migration implementations

mod m20240101_000001_create_donations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_donations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Create donations table aligned with entities::donation Model
            manager
                .create_table(
                    Table::create()
                        .table(Donations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Donations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Donations::Amount).big_integer().not_null())
                        .col(ColumnDef::new(Donations::Name).string().not_null())
                        .col(ColumnDef::new(Donations::Email).string().not_null())
                        .col(ColumnDef::new(Donations::Message).string().not_null())
                        .col(ColumnDef::new(Donations::Currency).string_len(3).not_null())
                        .col(
                            ColumnDef::new(Donations::PaymentIntentId)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Donations::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Donations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Donations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Unique index on payment_intent_id: the serialization point that
            // makes duplicate submissions of the same intent detectable.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_donations_payment_intent_id")
                        .table(Donations::Table)
                        .col(Donations::PaymentIntentId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Donations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Donations {
        Table,
        Id,
        Amount,
        Name,
        Email,
        Message,
        Currency,
        PaymentIntentId,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}
