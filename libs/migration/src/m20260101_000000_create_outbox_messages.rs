use sea_orm_migration::sea_query::extension::postgres::Type;
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(OutboxStatus::Enum)
                    .values([
                        OutboxStatus::Pending,
                        OutboxStatus::Processed,
                        OutboxStatus::DeadLettered,
                    ])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OutboxMessages::Table)
                    .if_not_exists()
                    .col(pk_uuid(OutboxMessages::Id))
                    .col(string(OutboxMessages::MessageType))
                    .col(json_binary(OutboxMessages::Payload))
                    .col(
                        ColumnDef::new(OutboxMessages::Status)
                            .enumeration(
                                OutboxStatus::Enum,
                                [
                                    OutboxStatus::Pending,
                                    OutboxStatus::Processed,
                                    OutboxStatus::DeadLettered,
                                ],
                            )
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        timestamp_with_time_zone(OutboxMessages::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(OutboxMessages::ProcessedAt))
                    .col(timestamp_with_time_zone_null(OutboxMessages::NextRetryAt))
                    .col(integer(OutboxMessages::RetryCount).default(0))
                    .col(text_null(OutboxMessages::Error))
                    .to_owned(),
            )
            .await?;

        // Poll predicate is `status = 'pending' AND (next_retry_at IS NULL OR
        // next_retry_at <= now())`, ordered by created_at — this index serves it.
        manager
            .create_index(
                Index::create()
                    .name("idx_outbox_messages_status_created_at")
                    .table(OutboxMessages::Table)
                    .col(OutboxMessages::Status)
                    .col(OutboxMessages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_outbox_messages_processed_at")
                    .table(OutboxMessages::Table)
                    .col(OutboxMessages::ProcessedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OutboxMessages::Table).to_owned())
            .await?;

        manager
            .drop_type(Type::drop().name(OutboxStatus::Enum).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OutboxMessages {
    Table,
    Id,
    MessageType,
    Payload,
    Status,
    CreatedAt,
    ProcessedAt,
    NextRetryAt,
    RetryCount,
    Error,
}

#[derive(DeriveIden)]
enum OutboxStatus {
    #[sea_orm(iden = "outbox_status")]
    Enum,
    #[sea_orm(iden = "pending")]
    Pending,
    #[sea_orm(iden = "processed")]
    Processed,
    #[sea_orm(iden = "dead_lettered")]
    DeadLettered,
}
