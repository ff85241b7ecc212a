// src/main.rs
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use fleetstate::config::Config;
use fleetstate::handlers;
use fleetstate::rcon::RconClient;
use fleetstate::state::{StatePoller, StateUsecase};
use fleetstate::storage::memory::StateStore;
use fleetstate::storage::provider::JsonFileProvider;
use fleetstate::utils::KeyedRateLimiter;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logger only once at the start
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env();
    let bind = config.bind();

    let store = Arc::new(StateStore::new());
    let usecase = StateUsecase::new(store, Arc::new(RconClient::new()), config.exec_timeout());
    let provider = Arc::new(JsonFileProvider::new(&config.servers_file));
    let poller = Arc::new(StatePoller::new(usecase.clone(), provider, config.poller_settings()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut poller_task = tokio::spawn(poller.run(shutdown_rx));

    let usecase = web::Data::new(usecase);
    let state_update_rate_limiter = web::Data::new(KeyedRateLimiter::keyed(config.state_update_quota()));

    info!("Starting server on {}", bind);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(usecase.clone())
            .app_data(state_update_rate_limiter.clone())
            .configure(handlers::routes)
    })
        .bind(&bind)?
        .run();

    // actix handles SIGINT/SIGTERM itself and resolves `server` afterwards
    let result = server.await;

    info!("Shutting down state poller");
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(config.shutdown_grace(), &mut poller_task).await {
        Ok(_) => info!("State poller stopped"),
        Err(_) => {
            warn!("State poller did not stop within {:?}, aborting", config.shutdown_grace());
            poller_task.abort();
        }
    }

    result
}
