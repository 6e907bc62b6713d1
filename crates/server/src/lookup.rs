//! Document lookup with the database as a write-through cache.
//!
//! Flow: validate key → cache read → on miss, query the upstream service
//! through the monitor's request multiplexer → normalize (XML or JSON) →
//! upsert → return. The cache is the source of truth for repeat lookups;
//! the upstream is only consulted when the cache has nothing usable.

use crate::entity::document;
use crate::error::LookupError;
use crate::monitor::StatusMonitor;
use crate::parser::{self, ParsedDocument};
use crate::store::Store;
use crate::validation::access_key::is_valid_access_key;
use bytes::Bytes;
use hyper::Method;
use serde_json::{Value, json};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// A lookup answer, tagged with whether it was served from the cache.
#[derive(Debug)]
pub struct LookupResult {
    pub document: document::Model,
    pub from_cache: bool,
}

/// One page of a document listing.
#[derive(Debug)]
pub struct DocumentPage {
    pub documents: Vec<document::Model>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
    pub degraded: bool,
}

pub struct DocumentService {
    store: Store,
    monitor: Arc<StatusMonitor>,
    export_dir: PathBuf,
}

fn page_to_offset(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit)
}

fn page_count(total: u64, limit: u64) -> u64 {
    if limit == 0 { 0 } else { total.div_ceil(limit) }
}

impl DocumentService {
    pub fn new(store: Store, monitor: Arc<StatusMonitor>, export_dir: PathBuf) -> Self {
        Self {
            store,
            monitor,
            export_dir,
        }
    }

    fn validate(access_key: &str) -> Result<(), LookupError> {
        if is_valid_access_key(access_key) {
            Ok(())
        } else {
            Err(LookupError::InvalidKey(
                "access key must be exactly 44 numeric digits".to_string(),
            ))
        }
    }

    /// Cache-first lookup by access key.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, access_key: &str) -> Result<LookupResult, LookupError> {
        Self::validate(access_key)?;

        if let Some(cached) = self.store.find_document(access_key).await? {
            tracing::debug!(name = "lookup.cache_hit", access_key, "served from cache");
            return Ok(LookupResult {
                document: cached,
                from_cache: true,
            });
        }

        self.fetch_from_upstream(access_key).await
    }

    async fn fetch_from_upstream(&self, access_key: &str) -> Result<LookupResult, LookupError> {
        let payload = Bytes::from(json!({ "chaveAcesso": access_key }).to_string());
        let response = self
            .monitor
            .request("protocol_query", Some(payload), Method::POST)
            .await
            .map_err(|err| LookupError::Upstream(err.to_string()))?;

        let (mut parsed, raw_xml) = normalize_response(&response.body)?;
        if parsed.access_key.is_empty() {
            parsed.access_key = access_key.to_string();
        }

        let document = self
            .store
            .upsert_document(&parsed, raw_xml.as_deref())
            .await?;
        tracing::info!(
            name = "lookup.upstream_cached",
            access_key,
            status = %parsed.status,
            "document fetched from upstream and cached"
        );
        Ok(LookupResult {
            document,
            from_cache: false,
        })
    }

    /// Cached document, if any. No upstream call.
    pub async fn get_document(
        &self,
        access_key: &str,
    ) -> Result<Option<document::Model>, LookupError> {
        Self::validate(access_key)?;
        Ok(self.store.find_document(access_key).await?)
    }

    /// The raw upstream XML for a document, fetching it if the cache has no
    /// usable payload.
    pub async fn raw_xml(&self, access_key: &str) -> Result<String, LookupError> {
        Self::validate(access_key)?;

        if let Some(cached) = self.store.find_document(access_key).await?
            && let Some(xml) = cached.raw_xml
            && !xml.is_empty()
        {
            return Ok(xml);
        }

        let fetched = self.fetch_from_upstream(access_key).await?;
        fetched
            .document
            .raw_xml
            .filter(|xml| !xml.is_empty())
            .ok_or_else(|| {
                LookupError::NotFound(format!("no XML payload available for {access_key}"))
            })
    }

    /// Write the document XML to disk, fetching it first when needed.
    /// Writes are confined to the configured export directory; the caller
    /// may only pick a relative subdirectory beneath it.
    pub async fn save_xml(
        &self,
        access_key: &str,
        subdirectory: Option<&str>,
    ) -> Result<PathBuf, LookupError> {
        let dir = resolve_export_dir(&self.export_dir, subdirectory)?;
        let xml = self.raw_xml(access_key).await?;
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("nfe-{access_key}.xml"));
        tokio::fs::write(&path, xml).await?;
        Ok(path)
    }

    pub async fn list_documents(&self, page: u64, limit: u64) -> Result<DocumentPage, LookupError> {
        let (documents, total) = self
            .store
            .list_documents(limit, page_to_offset(page, limit))
            .await?;
        Ok(DocumentPage {
            documents,
            page,
            limit,
            total,
            pages: page_count(total, limit),
            degraded: false,
        })
    }

    pub async fn list_rejected(&self, page: u64, limit: u64) -> Result<DocumentPage, LookupError> {
        let rejected = self
            .store
            .list_rejected(limit, page_to_offset(page, limit))
            .await?;
        Ok(DocumentPage {
            documents: rejected.documents,
            page,
            limit,
            total: rejected.total,
            pages: page_count(rejected.total, limit),
            degraded: rejected.degraded,
        })
    }
}

/// Resolve a requested export location against the configured base
/// directory. Absolute paths and any non-plain component (`..`, `.`,
/// prefixes) are rejected, so writes cannot escape the base.
fn resolve_export_dir(base: &Path, subdirectory: Option<&str>) -> Result<PathBuf, LookupError> {
    let Some(sub) = subdirectory else {
        return Ok(base.to_path_buf());
    };
    let sub_path = Path::new(sub);
    if sub_path.is_absolute()
        || sub_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(LookupError::InvalidPath(sub.to_string()));
    }
    Ok(base.join(sub_path))
}

/// Decide which extraction path an upstream body takes. A JSON body with an
/// `xml` field (or a bare XML body) goes through the XML extractor and keeps
/// the raw payload for replay; anything else is best-effort JSON.
fn normalize_response(body: &[u8]) -> Result<(ParsedDocument, Option<String>), LookupError> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(xml) = value.get("xml").and_then(Value::as_str)
            && !xml.is_empty()
        {
            let parsed = parser::parse_document_xml(xml)?;
            return Ok((parsed, Some(xml.to_string())));
        }
        return Ok((parser::extract_document_json(&value), None));
    }

    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim_start();
    if trimmed.starts_with('<') {
        let parsed = parser::parse_document_xml(trimmed)?;
        return Ok((parsed, Some(trimmed.to_string())));
    }

    Err(LookupError::Parse(
        "upstream payload is neither JSON nor XML".to_string(),
    ))
}
