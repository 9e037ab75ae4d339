use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use gateway_core::{FhirGateway, FileLedgerStore, GatewayConfig, PatientService, RequestLedger};

/// Default log levels for the gateway crates, including dropped-resource warnings from `fhir`.
const LOG_DIRECTIVES: &[&str] = &["gateway=info", "api_rest=info", "fhir=info"];

/// Main entry point for the EPR gateway
///
/// Starts the REST server and connects it to the configured FHIR server.
///
/// # Environment Variables
/// - `GATEWAY_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `FHIR_SERVER_BASE_URL` and the other `FHIR_*` variables: see `GatewayConfig::load_from_env`
/// - `LEDGER_DIR`: directory for the file-backed request ledger (in-memory when unset)
/// - `ENVIRONMENT`: `PRODUCTION` disables the development routes
/// - `ALLOW_DROP_DATA`: `true` enables `POST /v1/drop_data`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            LOG_DIRECTIVES
                .iter()
                .try_fold(tracing_subscriber::EnvFilter::from_default_env(), |filter, d| {
                    d.parse::<tracing_subscriber::filter::Directive>()
                        .map(|d| filter.add_directive(d))
                })?,
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::load_from_env()?;
    tracing::info!(
        base_url = config.base_url(),
        auth_method = config.auth_method().name(),
        "++ Using FHIR server"
    );

    let ledger = match std::env::var("LEDGER_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            tracing::info!("++ Recording FHIR exchanges under {}", dir);
            RequestLedger::new(Arc::new(FileLedgerStore::open(dir).await?))
        }
        _ => {
            tracing::warn!("LEDGER_DIR not set; FHIR exchanges are kept in memory only");
            RequestLedger::in_memory()
        }
    };

    let gateway = FhirGateway::new(&config, ledger)?;
    let dev_routes = !std::env::var("ENVIRONMENT")
        .map(|e| e.eq_ignore_ascii_case("PRODUCTION"))
        .unwrap_or(false);
    let allow_drop_data = std::env::var("ALLOW_DROP_DATA")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let app = router(
        AppState {
            patients: PatientService::new(Arc::new(gateway)),
            allow_drop_data,
        },
        dev_routes,
    );

    let rest_addr = std::env::var("GATEWAY_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    tracing::info!("++ Starting EPR gateway REST on {}", rest_addr);
    if dev_routes {
        tracing::info!("++ Development routes enabled");
    }

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("-- Shutting down");
}
