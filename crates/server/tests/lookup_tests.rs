//! End-to-end lookup tests against a mocked upstream query service.

use nfe_monitor::client::HttpClient;
use nfe_monitor::config::{AppConfig, Environment, SefazConfig};
use nfe_monitor::error::LookupError;
use nfe_monitor::lookup::DocumentService;
use nfe_monitor::monitor::StatusMonitor;
use nfe_monitor::store::Store;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_store() -> Store {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE service_status (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            online INTEGER NOT NULL,
            recorded_at TEXT NOT NULL,
            detail TEXT NULL
        );"#,
    ))
    .await
    .expect("Failed to create service_status table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            access_key TEXT NOT NULL UNIQUE,
            number TEXT NOT NULL,
            series TEXT NOT NULL,
            issue_date TEXT NOT NULL,
            total_value REAL NOT NULL,
            issuer_tax_id TEXT NOT NULL,
            issuer_name TEXT NOT NULL,
            recipient_tax_id TEXT NOT NULL,
            recipient_name TEXT NOT NULL,
            status TEXT NOT NULL,
            rejection_reason TEXT NULL,
            rejection_code TEXT NULL,
            rejection_date TEXT NULL,
            raw_xml TEXT NULL,
            queried_at TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("Failed to create documents table");

    Store::new(Arc::new(db))
}

async fn setup_service(upstream: &MockServer) -> DocumentService {
    setup_service_with_export_dir(upstream, Path::new("xml_files")).await
}

async fn setup_service_with_export_dir(
    upstream: &MockServer,
    export_dir: &Path,
) -> DocumentService {
    let store = setup_store().await;
    let config = Arc::new(AppConfig {
        database_url: "sqlite::memory:".into(),
        environment: Environment::Production,
        listen_addr: "127.0.0.1:0".into(),
        sefaz: SefazConfig {
            status_url: "http://127.0.0.1:1/status".into(),
            query_url: format!("{}/query", upstream.uri()),
            api_token: None,
            check_interval_secs: 300,
            request_timeout_secs: 5,
            max_retries: 0,
            retry_base_delay_ms: 1,
        },
        monitor_autostart: false,
        xml_export_dir: export_dir.to_string_lossy().into_owned(),
    });
    let client = HttpClient::new(&config.sefaz);
    let monitor = Arc::new(StatusMonitor::new(store.clone(), client, config));
    DocumentService::new(store, monitor, export_dir.to_path_buf())
}

fn sample_xml(access_key: &str) -> String {
    format!(
        r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe>
    <infNFe Id="NFe{access_key}" versao="4.00">
      <ide>
        <nNF>12345</nNF>
        <serie>1</serie>
        <dhEmi>2026-01-15T10:30:00-03:00</dhEmi>
      </ide>
      <emit>
        <CNPJ>11222333000181</CNPJ>
        <xNome>Empresa Emitente LTDA</xNome>
      </emit>
      <dest>
        <CNPJ>99888777000166</CNPJ>
        <xNome>Empresa Destinataria SA</xNome>
      </dest>
      <total>
        <ICMSTot>
          <vNF>150.75</vNF>
        </ICMSTot>
      </total>
    </infNFe>
  </NFe>
</nfeProc>"#
    )
}

#[tokio::test]
async fn xml_lookup_hits_upstream_once_then_serves_from_cache() {
    let upstream = MockServer::start().await;
    let access_key = "4".repeat(44);

    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_json(serde_json::json!({ "chaveAcesso": access_key })))
        .respond_with(ResponseTemplate::new(200).set_body_string(sample_xml(&access_key)))
        .expect(1)
        .mount(&upstream)
        .await;

    let service = setup_service(&upstream).await;

    let first = service.lookup(&access_key).await.expect("first lookup");
    assert!(!first.from_cache);
    assert_eq!(first.document.access_key, access_key);
    assert_eq!(first.document.number, "12345");
    assert_eq!(
        first.document.total_value,
        Decimal::from_str("150.75").unwrap()
    );
    assert_eq!(first.document.issuer_tax_id, "11222333000181");
    assert_eq!(first.document.status, "PROCESSED");

    let second = service.lookup(&access_key).await.expect("second lookup");
    assert!(second.from_cache);
    assert_eq!(second.document.id, first.document.id);
}

#[tokio::test]
async fn malformed_access_keys_never_reach_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstream)
        .await;

    let service = setup_service(&upstream).await;

    let too_long = "1".repeat(45);
    let non_numeric = "a".repeat(44);
    for bad_key in ["", "123", too_long.as_str(), non_numeric.as_str()] {
        let err = service.lookup(bad_key).await.unwrap_err();
        assert!(matches!(err, LookupError::InvalidKey(_)), "key: {bad_key:?}");
    }
}

#[tokio::test]
async fn upstream_server_error_maps_to_upstream_failure() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&upstream)
        .await;

    let service = setup_service(&upstream).await;
    let err = service.lookup(&"5".repeat(44)).await.unwrap_err();
    assert!(matches!(err, LookupError::Upstream(_)));
}

#[tokio::test]
async fn json_payload_is_extracted_via_field_aliases() {
    let upstream = MockServer::start().await;
    let access_key = "6".repeat(44);

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "chave": access_key,
            "numero": "777",
            "serie": "3",
            "valorTotal": "88.20",
            "cnpjEmitente": "11222333000181",
            "nomeEmitente": "Emitente",
            "status": "REJEITADA"
        })))
        .mount(&upstream)
        .await;

    let service = setup_service(&upstream).await;
    let result = service.lookup(&access_key).await.expect("lookup");

    assert!(!result.from_cache);
    assert_eq!(result.document.access_key, access_key);
    assert_eq!(result.document.number, "777");
    assert_eq!(
        result.document.total_value,
        Decimal::from_str("88.20").unwrap()
    );
    assert_eq!(result.document.status, "REJECTED");
    assert!(result.document.raw_xml.is_none());
}

#[tokio::test]
async fn json_payload_without_key_falls_back_to_requested_key() {
    let upstream = MockServer::start().await;
    let access_key = "7".repeat(44);

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "numero": "1", "status": "AUTORIZADA" })),
        )
        .mount(&upstream)
        .await;

    let service = setup_service(&upstream).await;
    let result = service.lookup(&access_key).await.expect("lookup");
    assert_eq!(result.document.access_key, access_key);
    assert_eq!(result.document.status, "PROCESSED");
}

#[tokio::test]
async fn embedded_xml_in_json_is_kept_for_replay() {
    let upstream = MockServer::start().await;
    let access_key = "8".repeat(44);

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "xml": sample_xml(&access_key) })),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let service = setup_service(&upstream).await;
    let result = service.lookup(&access_key).await.expect("lookup");
    assert!(result.document.raw_xml.is_some());

    // Replay comes from the cache, not a second upstream call.
    let xml = service.raw_xml(&access_key).await.expect("raw xml");
    assert!(xml.contains(&format!("NFe{access_key}")));
}

#[tokio::test]
async fn raw_xml_without_payload_is_not_found() {
    let upstream = MockServer::start().await;
    let access_key = "9".repeat(44);

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "chaveAcesso": access_key })),
        )
        .mount(&upstream)
        .await;

    let service = setup_service(&upstream).await;
    let err = service.raw_xml(&access_key).await.unwrap_err();
    assert!(matches!(err, LookupError::NotFound(_)));
}

#[tokio::test]
async fn save_xml_writes_the_document_under_the_export_dir() {
    let upstream = MockServer::start().await;
    let access_key = "3".repeat(44);

    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sample_xml(&access_key)))
        .mount(&upstream)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let service = setup_service_with_export_dir(&upstream, dir.path()).await;

    let written = service.save_xml(&access_key, None).await.expect("save");
    assert_eq!(written.parent().unwrap(), dir.path());
    assert_eq!(
        written.file_name().unwrap().to_str().unwrap(),
        format!("nfe-{access_key}.xml")
    );
    let contents = tokio::fs::read_to_string(&written).await.expect("read back");
    assert!(contents.contains("<nfeProc"));

    let nested = service
        .save_xml(&access_key, Some("august"))
        .await
        .expect("nested save");
    assert!(nested.starts_with(dir.path().join("august")));
}

#[tokio::test]
async fn save_xml_rejects_directories_outside_the_export_dir() {
    let upstream = MockServer::start().await;
    let access_key = "3".repeat(44);

    let dir = tempfile::tempdir().expect("tempdir");
    let service = setup_service_with_export_dir(&upstream, dir.path()).await;

    for escape in ["../outside", "/etc", "a/../../b"] {
        let err = service.save_xml(&access_key, Some(escape)).await.unwrap_err();
        assert!(
            matches!(err, LookupError::InvalidPath(_)),
            "directory: {escape:?}"
        );
    }
    // Rejected before any upstream call: no mock was mounted.
}
