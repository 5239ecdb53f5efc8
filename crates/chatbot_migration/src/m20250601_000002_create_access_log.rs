use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TbClUserLogAcess::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TbClUserLogAcess::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(TbClUserLogAcess::ColData).string_len(10).not_null())
                    .col(ColumnDef::new(TbClUserLogAcess::ColHora).string_len(8).not_null())
                    .col(ColumnDef::new(TbClUserLogAcess::ColIp).string().not_null())
                    .col(ColumnDef::new(TbClUserLogAcess::ColAcao).string().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TbClUserLogAcess::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TbClUserLogAcess {
    Table,
    Id,
    ColData,
    ColHora,
    ColIp,
    ColAcao,
}
