//! Evoque commerce service: catalog, coupons, carts and checkout.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use evoque_commerce::api::{router, AppState};
use evoque_commerce::config::Config;
use evoque_commerce::services::EventPublisher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will not be published");
                None
            }
        },
        None => None,
    };
    let publisher = EventPublisher::new(nats, config.nats_subject_prefix.clone());

    let state = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            AppState::postgres(db, publisher)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping all data in memory");
            AppState::in_memory(publisher)
        }
    };

    tracing::info!("Evoque commerce listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, router(state)).await?;
    Ok(())
}
