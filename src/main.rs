mod classes;
mod classifier;
mod config;
mod decode;
mod error;
mod explain;
mod handlers;
mod logging;
mod models;
mod preprocess;
mod state;
mod validation;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use crate::config::Config;
use crate::state::AppState;

fn cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default().allow_any_method().allow_any_header();

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return cors.allow_any_origin();
    }
    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init_logger(env!("CARGO_PKG_NAME"));

    // Loaded once here and shared read-only by every worker.
    let state = web::Data::new(AppState::from_config(&config));

    let (host, port) = config.bind_addr();
    let allowed_origins = config.allowed_origins.clone();

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&allowed_origins))
            .app_data(state.clone())
            .configure(handlers::configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    log::info!("Server running at http://{}:{}", host, port);

    server.bind((host.as_str(), port))?.run().await?;

    log::info!("Server stopped");
    Ok(())
}
