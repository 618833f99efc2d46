use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod validation;

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
    jwt::{JwtConfig, JwtService},
};
use tokio::net::TcpListener;

use crate::{
    config::ServerConfig,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::UserRepository,
    session::SessionManager,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub user_repository: UserRepository,
    pub sessions: SessionManager,
    pub rate_limiter: RateLimiter,
    pub config: ServerConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let config = ServerConfig::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
    let redis_pool = RedisPool::new(&RedisConfig::from_env())?;

    let app_state = AppState {
        user_repository: UserRepository::new(pool),
        sessions: SessionManager::new(redis_pool.clone()),
        redis_pool,
        jwt_service,
        rate_limiter: RateLimiter::new(RateLimiterConfig::default()),
        config: config.clone(),
    };

    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Authentication service listening on {}", config.bind_address());

    axum::serve(listener, app).await?;

    Ok(())
}
