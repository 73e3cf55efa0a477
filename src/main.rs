use payment_intents::config::{AppConfig, ProviderMode};
use payment_intents::events::broker::{BrokerConnection, BrokerSettings};
use payment_intents::gateways::mercadopago::MercadoPagoGateway;
use payment_intents::gateways::mock::MockGateway;
use payment_intents::gateways::{BackUrls, PaymentProviderGateway};
use payment_intents::http::router::router;
use payment_intents::repo::PgPaymentStore;
use payment_intents::service::preference_service::CheckoutSettings;
use payment_intents::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env()?;
    if cfg.webhook_secret.is_none() {
        tracing::warn!("MP_WEBHOOK_SECRET is not set; webhook signatures will not be checked");
    }

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let gateway: Arc<dyn PaymentProviderGateway> = match &cfg.provider {
        ProviderMode::MercadoPago => Arc::new(MercadoPagoGateway {
            base_url: cfg.mp_base_url.clone(),
            access_token: cfg.mp_access_token.clone(),
            timeout_ms: cfg.mp_timeout_ms,
            client: reqwest::Client::new(),
        }),
        ProviderMode::Mock(behavior) => {
            tracing::warn!("using mock payment provider ({})", behavior);
            Arc::new(MockGateway::new(behavior.clone()))
        }
    };

    let broker = BrokerConnection::new(BrokerSettings {
        url: cfg.amqp_url.clone(),
        exchange: cfg.events_exchange.clone(),
        reconnect_delay: cfg.broker_reconnect_delay,
        health_check_interval: Duration::from_secs(1),
    });
    broker.connect();

    let state = AppState::new(
        Arc::new(PgPaymentStore::new(pool.clone())),
        gateway,
        Arc::new(broker.clone()),
        CheckoutSettings {
            notification_url: cfg.notification_url(),
            back_urls: BackUrls {
                success: cfg.checkout_success_url.clone(),
                pending: cfg.checkout_pending_url.clone(),
                failure: cfg.checkout_failure_url.clone(),
            },
        },
        cfg.webhook_secret.clone(),
    );

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("http server stopped; closing broker connection");
    broker.shutdown().await;
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
