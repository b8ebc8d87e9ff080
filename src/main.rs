use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, warn};

use investor_insights::app;
use investor_insights::config::{FmpConfig, InsightConfig, ServerConfig};
use investor_insights::db::pg_store::PgFundamentalsStore;
use investor_insights::external::fmp::FmpClient;
use investor_insights::external::fundamentals_source::MarketDataProvider;
use investor_insights::logging::{init_logging, LoggingConfig};
use investor_insights::services::insight_coordinator::InsightCoordinator;
use investor_insights::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let server = ServerConfig::from_env()?;
    let insight_config = InsightConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(server.max_connections)
        .connect(&server.database_url)
        .await?;

    let market: Option<Arc<dyn MarketDataProvider>> = match FmpClient::new(&FmpConfig::from_env()) {
        Ok(client) => {
            info!("📊 Market data provider: Financial Modeling Prep");
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("⚠️ Market data provider disabled: {}", e);
            None
        }
    };

    let store = Arc::new(PgFundamentalsStore::new(pool));
    let coordinator = InsightCoordinator::new(store, market, insight_config);
    let app = app::create_app(AppState::new(coordinator));

    let listener = TcpListener::bind(server.bind_addr).await?;
    info!("🚀 Investor insights backend running at http://{}/", server.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
