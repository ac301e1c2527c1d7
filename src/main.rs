use actix_web::{middleware, web, App, HttpServer};
use furniture_shop::cache::CartCountCache;
use furniture_shop::config::Settings;
use furniture_shop::controllers;
use furniture_shop::initialize_db_pool;
use furniture_shop::payments::PaymentGateway;
use std::io;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,furniture_shop=debug")),
        )
        .init();

    let settings = Settings::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let db_pool = initialize_db_pool(&settings.database_url)
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;
    let cart_counts = initialize_cart_counts(settings.redis_url.as_deref());
    let gateway = PaymentGateway::from_config(settings.gateway.clone())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    if !gateway.is_configured() {
        tracing::warn!("payment gateway credentials missing, online payments are disabled");
    }

    tracing::info!(host = %settings.host, port = settings.port, "starting storefront");
    let db_pool = web::Data::new(db_pool);
    let cart_counts = web::Data::new(cart_counts);
    let gateway = web::Data::new(gateway);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(db_pool.clone())
            .app_data(cart_counts.clone())
            .app_data(gateway.clone())
            .configure(controllers::configure)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await
}

fn initialize_cart_counts(redis_url: Option<&str>) -> CartCountCache {
    let Some(url) = redis_url else {
        tracing::info!("REDIS_URL not set, cart count cache disabled");
        return CartCountCache::disabled();
    };
    match CartCountCache::connect(url) {
        Ok(cache) => cache,
        Err(err) => {
            tracing::warn!(error = %err, "redis unavailable, cart count cache disabled");
            CartCountCache::disabled()
        }
    }
}
