use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use alloy::providers::RootProvider;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use paychan::{ChannelAdmission, ChannelGate, ContractLedger, SqliteStateStore, CLAIM_HEADER};
use paychan_server::error::PAY_URI_HEADER;
use paychan_server::{routes, AppState, ServerConfig};

type ChainLedger = ContractLedger<RootProvider>;

fn build_cors(origins: &[String]) -> Cors {
    let cors = if origins.is_empty() {
        Cors::default().allowed_origin_fn(|origin, _| {
            origin
                .to_str()
                .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                .unwrap_or(false)
        })
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::HeaderName::from_static("x-signature"),
        ])
        .expose_headers(vec![PAY_URI_HEADER])
        .max_age(3600)
}

fn invalid_input(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,actix_web=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!(?config, "loaded configuration");

    let rpc_url = config.ledger.rpc_url.parse().map_err(invalid_input)?;
    let ledger: ChainLedger = ContractLedger::new(RootProvider::new_http(rpc_url), &config.ledger);

    let gate = ChannelGate::new(config.receiver_address)
        .require(&ledger, config.price.as_str())
        .map_err(invalid_input)?;

    let store = SqliteStateStore::open(&config.store_path).map_err(invalid_input)?;
    tracing::info!(path = %store.path().display(), "channel state store opened");

    let admission = ChannelAdmission::new(ledger, Arc::new(store));
    admission.start_lock_cleanup();

    let state = web::Data::new(
        AppState::new(admission, gate)
            .with_admin_token(config.admin_token.clone())
            .with_metrics_token(config.metrics_token.clone()),
    );

    let port = config.port;
    let cors_origins = config.allowed_origins.clone();

    tracing::info!("paychan server listening at http://localhost:{port}");
    tracing::info!(
        "Channel contract {:#x} via {}",
        config.ledger.contract_address,
        config.ledger.rpc_url
    );
    tracing::info!("GET /pay costs {} (pay URI {})", config.price, state.gate);
    tracing::info!("Claims are read from the {CLAIM_HEADER} header");
    tracing::info!("Endpoints: GET /pay, GET /health, GET /metrics, GET|DELETE /channels/{{id}}");
    tracing::info!("Rate limit: {} req/min per IP", config.rate_limit_rpm);

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm)
        .finish()
        .ok_or_else(|| invalid_input("failed to build rate limiter config"))?;

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .route("/health", web::get().to(routes::health::<RootProvider>))
            .route(
                "/metrics",
                web::get().to(routes::metrics_endpoint::<ChainLedger>),
            )
            .configure(routes::configure::<ChainLedger>)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
