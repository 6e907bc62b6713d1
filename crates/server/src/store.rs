//! Persistence gateway for the two tables the service owns.
//!
//! Every method runs exactly one parameterized statement against the shared
//! `DatabaseConnection`; there are no multi-statement transactions. `DbErr`
//! is split into connectivity vs. query failures at this boundary.

use crate::entity::{document, service_status};
use crate::error::StoreError;
use crate::parser::{DocumentStatus, ParsedDocument};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Result of a rejected-document listing. `degraded` marks responses built
/// from a reduced column set after a schema read failure, so callers can
/// distinguish them from genuine emptiness.
#[derive(Debug)]
pub struct RejectedPage {
    pub documents: Vec<document::Model>,
    pub total: u64,
    pub degraded: bool,
}

#[derive(Clone)]
pub struct Store {
    db: Arc<DatabaseConnection>,
}

impl Store {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append one row to the status transition log.
    pub async fn record_transition(
        &self,
        online: bool,
        detail: Option<String>,
    ) -> Result<service_status::Model, StoreError> {
        let row = service_status::ActiveModel {
            online: Set(online),
            recorded_at: Set(OffsetDateTime::now_utc()),
            detail: Set(detail),
            ..Default::default()
        };
        Ok(row.insert(self.db.as_ref()).await?)
    }

    pub async fn latest_status(&self) -> Result<Option<service_status::Model>, StoreError> {
        Ok(service_status::Entity::find()
            .order_by_desc(service_status::Column::RecordedAt)
            .order_by_desc(service_status::Column::Id)
            .one(self.db.as_ref())
            .await?)
    }

    /// Up to `limit` most recent transitions, newest first.
    pub async fn status_history(
        &self,
        limit: u64,
    ) -> Result<Vec<service_status::Model>, StoreError> {
        Ok(service_status::Entity::find()
            .order_by_desc(service_status::Column::RecordedAt)
            .order_by_desc(service_status::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn find_document(
        &self,
        access_key: &str,
    ) -> Result<Option<document::Model>, StoreError> {
        Ok(document::Entity::find()
            .filter(document::Column::AccessKey.eq(access_key))
            .one(self.db.as_ref())
            .await?)
    }

    /// Insert or update keyed on `access_key`. An existing row has all
    /// mutable fields replaced and `queried_at` refreshed; rejection fields
    /// are left untouched on update.
    pub async fn upsert_document(
        &self,
        parsed: &ParsedDocument,
        raw_xml: Option<&str>,
    ) -> Result<document::Model, StoreError> {
        let row = document::ActiveModel {
            access_key: Set(parsed.access_key.clone()),
            number: Set(parsed.number.clone()),
            series: Set(parsed.series.clone()),
            issue_date: Set(parsed.issue_date),
            total_value: Set(parsed.total_value),
            issuer_tax_id: Set(parsed.issuer_tax_id.clone()),
            issuer_name: Set(parsed.issuer_name.clone()),
            recipient_tax_id: Set(parsed.recipient_tax_id.clone()),
            recipient_name: Set(parsed.recipient_name.clone()),
            status: Set(parsed.status.to_string()),
            raw_xml: Set(raw_xml.map(str::to_string)),
            queried_at: Set(OffsetDateTime::now_utc()),
            ..Default::default()
        };

        let model = document::Entity::insert(row)
            .on_conflict(
                OnConflict::column(document::Column::AccessKey)
                    .update_columns([
                        document::Column::Number,
                        document::Column::Series,
                        document::Column::IssueDate,
                        document::Column::TotalValue,
                        document::Column::IssuerTaxId,
                        document::Column::IssuerName,
                        document::Column::RecipientTaxId,
                        document::Column::RecipientName,
                        document::Column::Status,
                        document::Column::RawXml,
                        document::Column::QueriedAt,
                    ])
                    .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await?;
        Ok(model)
    }

    /// Paginated listing of all cached documents, newest query first.
    pub async fn list_documents(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<(Vec<document::Model>, u64), StoreError> {
        let total = document::Entity::find().count(self.db.as_ref()).await?;
        let rows = document::Entity::find()
            .order_by_desc(document::Column::QueriedAt)
            .order_by_desc(document::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await?;
        Ok((rows, total))
    }

    /// Paginated listing of rejected documents. If the full column set cannot
    /// be read (the rejection columns are a later schema addition), retries
    /// with the core columns only and substitutes null for the rest.
    pub async fn list_rejected(&self, limit: u64, offset: u64) -> Result<RejectedPage, StoreError> {
        let total = document::Entity::find()
            .filter(document::Column::Status.eq(DocumentStatus::REJECTED))
            .count(self.db.as_ref())
            .await?;

        let full = document::Entity::find()
            .filter(document::Column::Status.eq(DocumentStatus::REJECTED))
            .order_by_desc(document::Column::QueriedAt)
            .order_by_desc(document::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await;

        match full {
            Ok(documents) => Ok(RejectedPage {
                documents,
                total,
                degraded: false,
            }),
            Err(err) => {
                tracing::warn!(
                    name = "store.list_rejected.degraded",
                    error = %err,
                    "full rejected-document read failed, retrying with core columns"
                );
                let documents = self.list_rejected_core(limit, offset).await?;
                Ok(RejectedPage {
                    documents,
                    total,
                    degraded: true,
                })
            }
        }
    }

    async fn list_rejected_core(
        &self,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<document::Model>, StoreError> {
        #[derive(FromQueryResult)]
        struct CoreRow {
            id: i32,
            access_key: String,
            number: String,
            series: String,
            issue_date: OffsetDateTime,
            total_value: rust_decimal::Decimal,
            issuer_tax_id: String,
            issuer_name: String,
            recipient_tax_id: String,
            recipient_name: String,
            status: String,
            queried_at: OffsetDateTime,
        }

        let rows = document::Entity::find()
            .select_only()
            .columns([
                document::Column::Id,
                document::Column::AccessKey,
                document::Column::Number,
                document::Column::Series,
                document::Column::IssueDate,
                document::Column::TotalValue,
                document::Column::IssuerTaxId,
                document::Column::IssuerName,
                document::Column::RecipientTaxId,
                document::Column::RecipientName,
                document::Column::Status,
                document::Column::QueriedAt,
            ])
            .filter(document::Column::Status.eq(DocumentStatus::REJECTED))
            .order_by_desc(document::Column::QueriedAt)
            .order_by_desc(document::Column::Id)
            .limit(limit)
            .offset(offset)
            .into_model::<CoreRow>()
            .all(self.db.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| document::Model {
                id: r.id,
                access_key: r.access_key,
                number: r.number,
                series: r.series,
                issue_date: r.issue_date,
                total_value: r.total_value,
                issuer_tax_id: r.issuer_tax_id,
                issuer_name: r.issuer_name,
                recipient_tax_id: r.recipient_tax_id,
                recipient_name: r.recipient_name,
                status: r.status,
                rejection_reason: None,
                rejection_code: None,
                rejection_date: None,
                raw_xml: None,
                queried_at: r.queried_at,
            })
            .collect())
    }
}
