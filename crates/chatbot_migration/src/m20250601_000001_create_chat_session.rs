use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SessoesChat::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SessoesChat::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SessoesChat::SessionId).string().not_null())
                    .col(
                        ColumnDef::new(SessoesChat::UserId)
                            .string()
                            .not_null()
                            .default("anonimo"),
                    )
                    .col(ColumnDef::new(SessoesChat::BotId).string().not_null())
                    .col(ColumnDef::new(SessoesChat::StartTime).timestamp().not_null())
                    .col(ColumnDef::new(SessoesChat::EndTime).timestamp())
                    .col(ColumnDef::new(SessoesChat::Messages).text().not_null())
                    .col(
                        ColumnDef::new(SessoesChat::LoggedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // upsert target: ON CONFLICT(session_id) needs a unique index
        manager
            .create_index(
                Index::create()
                    .name("idx_sessoes_chat_session_id")
                    .table(SessoesChat::Table)
                    .col(SessoesChat::SessionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // dashboard lists the most recent conversations
        manager
            .create_index(
                Index::create()
                    .name("idx_sessoes_chat_start_time")
                    .table(SessoesChat::Table)
                    .col(SessoesChat::StartTime)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SessoesChat::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SessoesChat {
    Table,
    Id,
    SessionId,
    UserId,
    BotId,
    StartTime,
    EndTime,
    Messages,
    LoggedAt,
}
