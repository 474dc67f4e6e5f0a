use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use dropout_api::artifacts;
use dropout_api::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;
    let store = web::Data::new(artifacts::on_startup(&config.artifacts));

    let app_store = store.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(app_store.clone())
            .wrap(dropout_api::cors())
            .wrap(Logger::default())
            .configure(dropout_api::configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    let server = server
        .bind(config.bind.as_str())
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Server running at http://{}", config.bind);

    let served = server.run().await;
    artifacts::release(store);
    served.context("server exited with an error")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
