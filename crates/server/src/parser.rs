//! Best-effort field extraction from upstream SEFAZ payloads.
//!
//! The upstream query service answers either with the document XML
//! (`nfeProc`/`NFe` envelope) or with a JSON body whose field names have
//! drifted across schema revisions. Both paths normalize into
//! [`ParsedDocument`]; neither attempts to be a full NFe parser.

use crate::error::LookupError;
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Upstream processing status, normalized. Unknown upstream values are kept
/// verbatim rather than rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentStatus {
    Processed,
    Rejected,
    Other(String),
}

impl DocumentStatus {
    pub const PROCESSED: &'static str = "PROCESSED";
    pub const REJECTED: &'static str = "REJECTED";

    pub fn as_str(&self) -> &str {
        match self {
            DocumentStatus::Processed => Self::PROCESSED,
            DocumentStatus::Rejected => Self::REJECTED,
            DocumentStatus::Other(s) => s,
        }
    }

    /// Historically-seen spellings from both the legacy (Portuguese) and
    /// current upstream schemas.
    pub fn from_upstream(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PROCESSED" | "PROCESSADA" | "AUTORIZADA" => DocumentStatus::Processed,
            "REJECTED" | "REJEITADA" => DocumentStatus::Rejected,
            other if !other.is_empty() => DocumentStatus::Other(other.to_string()),
            _ => DocumentStatus::Processed,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical document record extracted from an upstream payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedDocument {
    pub access_key: String,
    pub number: String,
    pub series: String,
    pub issue_date: OffsetDateTime,
    pub total_value: Decimal,
    pub issuer_tax_id: String,
    pub issuer_name: String,
    pub recipient_tax_id: String,
    pub recipient_name: String,
    pub status: DocumentStatus,
}

impl ParsedDocument {
    fn empty() -> Self {
        ParsedDocument {
            access_key: String::new(),
            number: String::new(),
            series: String::new(),
            issue_date: OffsetDateTime::now_utc(),
            total_value: Decimal::ZERO,
            issuer_tax_id: String::new(),
            issuer_name: String::new(),
            recipient_tax_id: String::new(),
            recipient_name: String::new(),
            status: DocumentStatus::Processed,
        }
    }
}

fn parse_datetime(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn parse_decimal(raw: &str) -> Decimal {
    Decimal::from_str(raw.trim()).unwrap_or(Decimal::ZERO)
}

/// Extract the canonical fields from a document XML body.
///
/// Requires the `infNFe` element (under `nfeProc/NFe` or a bare `NFe`);
/// its absence is a structural failure. Individual fields are best-effort.
pub fn parse_document_xml(xml: &str) -> Result<ParsedDocument, LookupError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = ParsedDocument::empty();
    let mut found_inf_nfe = false;
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "infNFe" {
                    found_inf_nfe = true;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"Id" {
                            let id = String::from_utf8_lossy(&attr.value);
                            doc.access_key = id.trim_start_matches("NFe").to_string();
                        }
                    }
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| LookupError::Parse(format!("invalid XML text: {e}")))?
                    .into_owned();
                let parent = path.len().checked_sub(2).and_then(|i| path.get(i));
                let leaf = path.last();
                match (parent.map(String::as_str), leaf.map(String::as_str)) {
                    (Some("ide"), Some("nNF")) => doc.number = text,
                    (Some("ide"), Some("serie")) => doc.series = text,
                    (Some("ide"), Some("dhEmi")) => doc.issue_date = parse_datetime(&text),
                    (Some("ICMSTot"), Some("vNF")) => doc.total_value = parse_decimal(&text),
                    (Some("emit"), Some("CNPJ")) => doc.issuer_tax_id = text,
                    (Some("emit"), Some("xNome")) => doc.issuer_name = text,
                    (Some("dest"), Some("CNPJ")) | (Some("dest"), Some("CPF")) => {
                        doc.recipient_tax_id = text
                    }
                    (Some("dest"), Some("xNome")) => doc.recipient_name = text,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LookupError::Parse(format!("malformed XML: {e}"))),
            _ => {}
        }
    }

    if !found_inf_nfe {
        return Err(LookupError::Parse(
            "missing infNFe element in document XML".to_string(),
        ));
    }

    Ok(doc)
}

// Ordered field-name aliases, first match wins. Upstream payload shape is not
// under our control; these are the variants seen in the wild.
const ROOT_ALIASES: &[&str] = &["nfe", "dados"];
const KEY_ALIASES: &[&str] = &["chaveAcesso", "chave"];
const NUMBER_ALIASES: &[&str] = &["numero"];
const SERIES_ALIASES: &[&str] = &["serie"];
const ISSUE_DATE_ALIASES: &[&str] = &["dataEmissao"];
const TOTAL_ALIASES: &[&str] = &["valorTotal"];
const ISSUER_ID_ALIASES: &[&str] = &["emitenteCnpj", "cnpjEmitente"];
const ISSUER_NAME_ALIASES: &[&str] = &["emitenteNome", "nomeEmitente"];
const RECIPIENT_ID_ALIASES: &[&str] = &["destinatarioCnpj", "cnpjDestinatario"];
const RECIPIENT_NAME_ALIASES: &[&str] = &["destinatarioNome", "nomeDestinatario"];
const STATUS_ALIASES: &[&str] = &["status"];

fn first_value<'a>(data: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|alias| data.get(alias))
}

fn first_string(data: &Value, aliases: &[&str]) -> String {
    match first_value(data, aliases) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn first_decimal(data: &Value, aliases: &[&str]) -> Decimal {
    match first_value(data, aliases) {
        Some(Value::String(s)) => parse_decimal(s),
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        _ => Decimal::ZERO,
    }
}

/// Best-effort extraction from a JSON payload. Never fails: absent fields
/// come back empty/zero, matching the tolerance the upstream drift demands.
pub fn extract_document_json(body: &Value) -> ParsedDocument {
    let data = ROOT_ALIASES
        .iter()
        .find_map(|alias| body.get(alias))
        .unwrap_or(body);

    let issue_date_raw = first_string(data, ISSUE_DATE_ALIASES);
    let status_raw = first_string(data, STATUS_ALIASES);

    ParsedDocument {
        access_key: first_string(data, KEY_ALIASES),
        number: first_string(data, NUMBER_ALIASES),
        series: first_string(data, SERIES_ALIASES),
        issue_date: if issue_date_raw.is_empty() {
            OffsetDateTime::now_utc()
        } else {
            parse_datetime(&issue_date_raw)
        },
        total_value: first_decimal(data, TOTAL_ALIASES),
        issuer_tax_id: first_string(data, ISSUER_ID_ALIASES),
        issuer_name: first_string(data, ISSUER_NAME_ALIASES),
        recipient_tax_id: first_string(data, RECIPIENT_ID_ALIASES),
        recipient_name: first_string(data, RECIPIENT_NAME_ALIASES),
        status: if status_raw.is_empty() {
            DocumentStatus::Processed
        } else {
            DocumentStatus::from_upstream(&status_raw)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe">
  <NFe>
    <infNFe Id="NFe00000000000000000000000000000000000000000000" versao="4.00">
      <ide>
        <nNF>12345</nNF>
        <serie>1</serie>
        <dhEmi>2024-01-15T10:30:00-03:00</dhEmi>
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
</nfeProc>"#;

    #[test]
    fn parses_full_document_xml() {
        let doc = parse_document_xml(SAMPLE_XML).unwrap();
        assert_eq!(doc.access_key, "0".repeat(44));
        assert_eq!(doc.number, "12345");
        assert_eq!(doc.series, "1");
        assert_eq!(doc.total_value, Decimal::from_str("150.75").unwrap());
        assert_eq!(doc.issuer_tax_id, "11222333000181");
        assert_eq!(doc.issuer_name, "Empresa Emitente LTDA");
        assert_eq!(doc.recipient_tax_id, "99888777000166");
        assert_eq!(doc.recipient_name, "Empresa Destinataria SA");
        assert_eq!(doc.status, DocumentStatus::Processed);
        assert_eq!(doc.issue_date.year(), 2024);
    }

    #[test]
    fn bare_nfe_envelope_is_accepted() {
        let xml = r#"<NFe><infNFe Id="NFe123"><ide><nNF>7</nNF></ide></infNFe></NFe>"#;
        let doc = parse_document_xml(xml).unwrap();
        assert_eq!(doc.access_key, "123");
        assert_eq!(doc.number, "7");
    }

    #[test]
    fn missing_inf_nfe_is_a_parse_error() {
        let xml = "<nfeProc><NFe><other>1</other></NFe></nfeProc>";
        let err = parse_document_xml(xml).unwrap_err();
        assert!(matches!(err, LookupError::Parse(_)));
    }

    #[test]
    fn cpf_recipient_is_extracted() {
        let xml = r#"<NFe><infNFe Id="NFe1"><dest><CPF>12345678901</CPF></dest></infNFe></NFe>"#;
        let doc = parse_document_xml(xml).unwrap();
        assert_eq!(doc.recipient_tax_id, "12345678901");
    }

    #[test]
    fn json_extraction_prefers_first_alias() {
        let body = json!({
            "chaveAcesso": "1".repeat(44),
            "chave": "ignored",
            "numero": "99",
            "serie": "2",
            "valorTotal": 150.75,
            "emitenteCnpj": "11222333000181",
            "emitenteNome": "Emitente",
            "destinatarioCnpj": "99888777000166",
            "destinatarioNome": "Destinatario",
            "status": "PROCESSADA"
        });
        let doc = extract_document_json(&body);
        assert_eq!(doc.access_key, "1".repeat(44));
        assert_eq!(doc.number, "99");
        assert_eq!(doc.total_value, Decimal::from_str("150.75").unwrap());
        assert_eq!(doc.status, DocumentStatus::Processed);
    }

    #[test]
    fn json_extraction_falls_back_to_alias_variants() {
        let body = json!({
            "dados": {
                "chave": "2".repeat(44),
                "cnpjEmitente": "11222333000181",
                "nomeEmitente": "Emitente",
                "cnpjDestinatario": "99888777000166",
                "nomeDestinatario": "Destinatario",
                "valorTotal": "88.20",
                "status": "REJEITADA"
            }
        });
        let doc = extract_document_json(&body);
        assert_eq!(doc.access_key, "2".repeat(44));
        assert_eq!(doc.issuer_tax_id, "11222333000181");
        assert_eq!(doc.total_value, Decimal::from_str("88.20").unwrap());
        assert_eq!(doc.status, DocumentStatus::Rejected);
    }

    #[test]
    fn json_extraction_tolerates_missing_fields() {
        let doc = extract_document_json(&json!({}));
        assert!(doc.access_key.is_empty());
        assert_eq!(doc.total_value, Decimal::ZERO);
        assert_eq!(doc.status, DocumentStatus::Processed);
    }

    #[test]
    fn status_normalization_keeps_unknown_values() {
        assert_eq!(
            DocumentStatus::from_upstream("denegada"),
            DocumentStatus::Other("DENEGADA".to_string())
        );
        assert_eq!(DocumentStatus::from_upstream("rejected"), DocumentStatus::Rejected);
        assert_eq!(DocumentStatus::from_upstream("Autorizada"), DocumentStatus::Processed);
    }

    #[test]
    fn decimal_precision_is_preserved() {
        let doc = extract_document_json(&json!({"valorTotal": "1234.5678"}));
        assert_eq!(doc.total_value, Decimal::from_str("1234.5678").unwrap());
    }
}
