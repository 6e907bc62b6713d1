use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Deployment environment. Anything other than `production` substitutes the
/// in-process simulated status source for real SEFAZ probes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SefazConfig {
    /// Status service endpoint (NFeStatusServico).
    pub status_url: String,
    /// Document query endpoint (NFeConsultaProtocolo).
    pub query_url: String,
    /// Bearer token for the authenticated document-query call.
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl SefazConfig {
    /// Resolve a named endpoint to a URL. Unknown names are treated as
    /// literal URLs so callers can address endpoints not listed here.
    pub fn endpoint_url(&self, name: &str) -> String {
        match name {
            "status_service" => self.status_url.clone(),
            "protocol_query" => self.query_url.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_environment")]
    pub environment: Environment,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub sefaz: SefazConfig,
    /// When true the status monitor starts polling at process start.
    #[serde(default)]
    pub monitor_autostart: bool,
    /// Base directory for exported document XML files. Save requests may
    /// only pick subdirectories beneath it.
    #[serde(default = "default_xml_export_dir")]
    pub xml_export_dir: String,
}

impl AppConfig {
    pub fn simulated_probing(&self) -> bool {
        self.environment != Environment::Production
    }
}

fn default_environment() -> Environment {
    Environment::Production
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_check_interval_secs() -> u64 {
    300
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_xml_export_dir() -> String {
    "xml_files".to_string()
}

fn validate(app: &AppConfig) -> Result<(), ConfigError> {
    if app.database_url.is_empty() {
        return Err(ConfigError::Validation("database_url must be set".into()));
    }
    if app.sefaz.status_url.is_empty() {
        return Err(ConfigError::Validation("sefaz.status_url must be set".into()));
    }
    if app.sefaz.query_url.is_empty() {
        return Err(ConfigError::Validation("sefaz.query_url must be set".into()));
    }
    if app.sefaz.check_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "sefaz.check_interval_secs must be > 0".into(),
        ));
    }
    if app.sefaz.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "sefaz.request_timeout_secs must be > 0".into(),
        ));
    }
    if app.sefaz.max_retries > 10 {
        return Err(ConfigError::Validation(
            "sefaz.max_retries must be <= 10".into(),
        ));
    }
    Ok(())
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `SEFAZ__STATUS_URL`) overrides the file value.
///
/// Returns a `ConfigError` instead of panicking so the caller can decide how to fail.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(config::Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    validate(&app)?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
