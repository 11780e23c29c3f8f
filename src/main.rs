use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ride_dispatch::api;
use ride_dispatch::config::Config;
use ride_dispatch::engine::dispatch::{DispatchCoordinator, DispatchSettings};
use ride_dispatch::engine::lifecycle::RideLifecycle;
use ride_dispatch::engine::router::TrafficAdjustedRouter;
use ride_dispatch::error::AppError;
use ride_dispatch::external::directory::DriverDirectoryClient;
use ride_dispatch::external::google_maps::GoogleMapsClient;
use ride_dispatch::external::http_client;
use ride_dispatch::external::open_weather::OpenWeatherClient;
use ride_dispatch::external::traffic_model::LinearTrafficModel;
use ride_dispatch::observability::metrics::Metrics;
use ride_dispatch::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let http = http_client(config.upstream_timeout)?;
    let maps = Arc::new(GoogleMapsClient::new(
        http.clone(),
        config.google_maps_api_base.clone(),
        config.google_maps_api_key.clone(),
    ));
    let weather = Arc::new(OpenWeatherClient::new(
        http.clone(),
        config.weather_api_base.clone(),
        config.weather_api_key.clone(),
    ));
    let directory = Arc::new(DriverDirectoryClient::new(
        http,
        config.driver_directory_url.clone(),
    ));
    let model = Arc::new(LinearTrafficModel::new(
        config.traffic_model_intercept,
        config.traffic_model_slope,
    ));

    let offer_ttl = chrono::Duration::from_std(config.offer_ttl)
        .map_err(|err| AppError::Internal(format!("invalid OFFER_TTL_SECS: {err}")))?;
    let accepted_retention = chrono::Duration::from_std(config.accepted_retention)
        .map_err(|err| AppError::Internal(format!("invalid ACCEPTED_RETENTION_SECS: {err}")))?;

    let lifecycle = Arc::new(
        RideLifecycle::new(config.event_buffer_size).with_accepted_retention(accepted_retention),
    );
    let coordinator = DispatchCoordinator::new(
        maps.clone(),
        directory,
        TrafficAdjustedRouter::new(maps, weather, model),
        lifecycle.clone(),
        DispatchSettings {
            sample_stride: config.weather_sample_stride,
            offer_ttl,
        },
    );

    let shared_state = Arc::new(AppState::new(coordinator, Metrics::new()?));
    let app = api::rest::router(shared_state.clone());

    tokio::spawn(sweep_expired_offers(lifecycle, config.offer_sweep_interval));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn sweep_expired_offers(lifecycle: Arc<RideLifecycle>, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every.max(std::time::Duration::from_secs(1)));

    loop {
        ticker.tick().await;
        let now = Utc::now();
        let evicted = lifecycle.evict_expired(now);
        if evicted > 0 {
            info!(evicted, "expired pending offers evicted");
        }
        let settled = lifecycle.evict_settled(now);
        if settled > 0 {
            info!(settled, "accepted rides past retention dropped");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
