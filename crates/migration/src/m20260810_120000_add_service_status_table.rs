use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Add service_status table holding the SEFAZ availability transition log
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServiceStatus::Table)
                    .if_not_exists()
                    .col(pk_auto(ServiceStatus::Id))
                    .col(boolean(ServiceStatus::Online).not_null())
                    .col(
                        timestamp_with_time_zone(ServiceStatus::RecordedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(text_null(ServiceStatus::Detail))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_service_status_recorded_at")
                    .table(ServiceStatus::Table)
                    .col(ServiceStatus::RecordedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_service_status_recorded_at")
                    .table(ServiceStatus::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ServiceStatus::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ServiceStatus {
    Table,
    Id,
    Online,
    RecordedAt,
    Detail,
}
