use nfe_monitor::api::{ApiState, start_webserver};
use nfe_monitor::client::HttpClient;
use nfe_monitor::config::load_config_or_panic;
use nfe_monitor::lookup::DocumentService;
use nfe_monitor::monitor::StatusMonitor;
use nfe_monitor::store::Store;
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "nfe_monitor=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");
    dotenvy::dotenv().ok();
    initialize_tracing();

    let config = Arc::new(load_config_or_panic());

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider).expect("Failed to install crypto provider");

    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );

    let store = Store::new(db);
    let client = HttpClient::new(&config.sefaz);
    let monitor = Arc::new(StatusMonitor::new(store.clone(), client, config.clone()));
    let documents = Arc::new(DocumentService::new(
        store,
        monitor.clone(),
        PathBuf::from(&config.xml_export_dir),
    ));

    if config.monitor_autostart {
        monitor.start_monitoring().await;
    }

    let state = ApiState {
        monitor,
        documents,
        production: !config.simulated_probing(),
    };

    start_webserver(state, &config.listen_addr).await?;
    Ok(())
}
