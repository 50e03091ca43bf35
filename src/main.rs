//! VowDay billing service entrypoint.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use vowday_billing::adapters::gateway::{
    CardGateway, CardGatewayConfig, RedirectGateway, RedirectGatewayConfig,
};
use vowday_billing::adapters::http::{billing_router, BillingAppState};
use vowday_billing::adapters::postgres::{
    PostgresInvoiceRepository, PostgresInvoiceSequence, PostgresPaymentRepository,
    PostgresSubscriptionRepository,
};
use vowday_billing::config::AppConfig;
use vowday_billing::domain::payment::GatewayKind;
use vowday_billing::ports::{GatewayRouter, PaymentGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.server.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        environment = ?config.server.environment,
        default_gateway = %config.gateway.default_provider,
        "starting vowday-billing"
    );

    // Database
    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    // Gateways
    let gateway_timeout = Duration::from_secs(config.gateway.request_timeout_secs);
    let card_gateway = Arc::new(CardGateway::new(
        CardGatewayConfig::new(
            config.gateway.card.api_key.clone(),
            config.gateway.card.webhook_secret.clone(),
            config.gateway.card.api_base_url.clone(),
        )
        .with_timeout(gateway_timeout),
    ));
    let redirect_gateway = Arc::new(RedirectGateway::new(
        RedirectGatewayConfig::new(
            config.gateway.redirect.client_id.clone(),
            config.gateway.redirect.client_secret.clone(),
            config.gateway.redirect.merchant_id.clone(),
            config.gateway.redirect.api_base_url.clone(),
            config.gateway.redirect.notification_url.clone(),
        )
        .with_timeout(gateway_timeout),
    ));

    let default_kind = GatewayKind::from_str(&config.gateway.default_provider)?;
    let router = GatewayRouter::new(
        vec![
            card_gateway.clone() as Arc<dyn PaymentGateway>,
            redirect_gateway as Arc<dyn PaymentGateway>,
        ],
        default_kind,
    );

    // Application state
    let state = BillingAppState {
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        invoices: Arc::new(PostgresInvoiceRepository::new(pool.clone())),
        sequence: Arc::new(PostgresInvoiceSequence::new(pool)),
        router,
        card_gateway,
        supplier: config.billing.supplier(),
        tax_rate_percent: config.billing.tax_rate_percent,
        due_days: config.billing.due_days as i64,
    };

    let mut app = Router::new()
        .merge(billing_router())
        .route("/health", axum::routing::get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .with_state(state);

    let cors_origins = config.server.cors_origins_list();
    if !cors_origins.is_empty() {
        let origins = cors_origins
            .iter()
            .map(|origin| origin.parse())
            .collect::<Result<Vec<axum::http::HeaderValue>, _>>()?;
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = config.server.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}
