use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Cached fiscal document, keyed uniquely by the 44-digit access key.
/// `queried_at` is refreshed on every upsert; the raw upstream XML is kept
/// for replay/export but never serialized into API payloads.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, ToSchema)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub access_key: String,
    pub number: String,
    pub series: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issue_date: OffsetDateTime,
    pub total_value: Decimal,
    pub issuer_tax_id: String,
    pub issuer_name: String,
    pub recipient_tax_id: String,
    pub recipient_name: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub rejection_code: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub rejection_date: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_xml: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub queried_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
