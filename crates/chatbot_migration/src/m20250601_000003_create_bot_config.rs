use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // single row table, addressed by a fixed key
        manager
            .create_table(
                Table::create()
                    .table(BotConfig::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BotConfig::ConfigKey).string().not_null().primary_key())
                    .col(ColumnDef::new(BotConfig::Personality).text().not_null())
                    .col(
                        ColumnDef::new(BotConfig::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BotConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BotConfig {
    Table,
    ConfigKey,
    Personality,
    UpdatedAt,
}
