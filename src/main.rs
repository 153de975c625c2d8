//! Pulse Runtime - periodic aggregation, prediction, and broadcast loop
//!
//! Usage:
//!   cargo run --release --bin pulse_runtime
//!
//! Environment variables:
//!   TOMTOM_API_KEY       - TomTom traffic API key (required)
//!   UPDATE_INTERVAL_SECS - Rest interval between cycles (default: 30)
//!   FETCH_TIMEOUT_SECS   - Per-source fetch timeout (default: 10)
//!   SUBSCRIBER_BUFFER    - Subscriber channel buffer (default: 32)

use citypulse::config::Config;
use citypulse::driver::CycleDriver;
use citypulse::pipeline::Pipeline;
use citypulse::sources::{
    energy::EnergySource, flights::FlightSource, traffic::TrafficSource,
    transit::TransitSource, weather::WeatherSource, DataSource,
};
use dotenv::dotenv;
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 Pulse Runtime starting");

    let config = Config::from_env()?;
    info!("✅ Configuration loaded");
    info!("   ├─ Update interval: {}s", config.update_interval.as_secs());
    info!("   ├─ Fetch timeout: {}s", config.fetch_timeout.as_secs());
    info!("   └─ Subscriber buffer: {}", config.subscriber_buffer);

    let sources: Vec<Arc<dyn DataSource>> = vec![
        Arc::new(WeatherSource::new(config.fetch_timeout)),
        Arc::new(TrafficSource::new(
            config.tomtom_api_key.clone(),
            config.fetch_timeout,
        )),
        Arc::new(EnergySource::new(config.fetch_timeout)),
        Arc::new(FlightSource::new(config.fetch_timeout)),
        Arc::new(TransitSource::new(config.fetch_timeout)),
    ];

    let pipeline = Arc::new(Pipeline::new(
        sources,
        config.fetch_timeout,
        config.subscriber_buffer,
    ));
    info!("✅ Pipeline created ({} sources)", pipeline.source_names().len());

    // Console subscriber: logs a one-line summary of every cycle, the same
    // role the dashboard websocket plays in production deployments.
    let (console_id, mut rx) = pipeline.subscribe();
    let console_pipeline = pipeline.clone();
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let weather = payload.snapshot.score_of("weather").unwrap_or(0.0);
            let traffic = payload
                .snapshot
                .score_of("princes_st_traffic")
                .unwrap_or(0.0);
            info!(
                "📊 [{}] weather {:.1} | traffic {:.1} | {} active prediction(s) | accuracy {:.1}% | clients: {}",
                payload.snapshot.timestamp.format("%H:%M:%S"),
                weather,
                traffic,
                payload.predictions.len(),
                payload.stats.accuracy_percent,
                console_pipeline.subscriber_count(),
            );
        }
    });

    let driver = CycleDriver::new(pipeline.clone(), config.update_interval);
    let stop = driver.stop_handle();
    let driver_handle = tokio::spawn(driver.run());

    tokio::signal::ctrl_c().await?;
    info!("👋 Shutdown requested");
    stop.stop();
    pipeline.unsubscribe(console_id);

    if let Err(e) = driver_handle.await {
        error!("❌ Driver task failed during shutdown: {}", e);
    }
    Ok(())
}
