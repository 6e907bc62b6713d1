use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Add documents table caching upstream lookup results keyed by access key
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(pk_auto(Documents::Id))
                    .col(string_len_uniq(Documents::AccessKey, 44))
                    .col(string(Documents::Number).not_null())
                    .col(string(Documents::Series).not_null())
                    .col(timestamp_with_time_zone(Documents::IssueDate).not_null())
                    .col(decimal_len(Documents::TotalValue, 15, 2).not_null())
                    .col(string(Documents::IssuerTaxId).not_null())
                    .col(string(Documents::IssuerName).not_null())
                    .col(string(Documents::RecipientTaxId).not_null())
                    .col(string(Documents::RecipientName).not_null())
                    .col(string(Documents::Status).not_null())
                    .col(text_null(Documents::RejectionReason))
                    .col(string_null(Documents::RejectionCode))
                    .col(timestamp_with_time_zone_null(Documents::RejectionDate))
                    .col(text_null(Documents::RawXml))
                    .col(
                        timestamp_with_time_zone(Documents::QueriedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_documents_status")
                    .table(Documents::Table)
                    .col(Documents::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_documents_queried_at")
                    .table(Documents::Table)
                    .col(Documents::QueriedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_documents_queried_at")
                    .table(Documents::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_documents_status")
                    .table(Documents::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Documents {
    Table,
    Id,
    AccessKey,
    Number,
    Series,
    IssueDate,
    TotalValue,
    IssuerTaxId,
    IssuerName,
    RecipientTaxId,
    RecipientName,
    Status,
    RejectionReason,
    RejectionCode,
    RejectionDate,
    RawXml,
    QueriedAt,
}
