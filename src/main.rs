use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use taskhub::{
    auth::AuthService,
    config::Config,
    routes::{self, health::HealthState},
    security::{self, RateLimiter},
    store::{MemoryStore, PgStore, Store},
};

fn startup_error(context: &str, error: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, error))
}

async fn open_store(config: &Config) -> io::Result<Arc<dyn Store>> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await
                .map_err(|e| startup_error("Failed to connect to database", e))?;
            store
                .migrate()
                .await
                .map_err(|e| startup_error("Failed to run migrations", e))?;
            log::info!("Connected to PostgreSQL, migrations applied");
            Ok(Arc::new(store))
        }
        None => {
            log::warn!("DATABASE_URL is not set; using the in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    log::info!(
        "environment={} rate_limit={}/{}s origins={:?}",
        config.environment,
        config.rate_limit_max,
        config.rate_limit_window.as_secs(),
        config.allowed_origins
    );

    let store = open_store(&config).await?;
    let store_data: web::Data<dyn Store> = web::Data::from(store);
    let auth = web::Data::new(AuthService::from_config(&config));
    let health = web::Data::new(HealthState::new(&config.environment));
    let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);

    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_limiter.window().max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup_old_entries();
            log::debug!("Background cleanup: cleaned rate limiter entries");
        }
    });

    let limiter = web::Data::new(rate_limiter);
    let json_body_limit = config.json_body_limit;
    let allowed_origins = config.allowed_origins.clone();

    log::info!("Starting taskhub server at {}", config.server_url());

    HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .app_data(auth.clone())
            .app_data(health.clone())
            .app_data(limiter.clone())
            .app_data(routes::json_config(json_body_limit))
            .app_data(routes::query_config())
            .app_data(routes::path_config())
            .wrap(security::cors(&allowed_origins))
            .wrap(security::security_headers())
            .wrap(Logger::default())
            .configure(routes::config)
            .default_service(web::route().to(routes::not_found))
    })
    .bind(config.bind_address())?
    .run()
    .await
}
