use std::sync::Arc;

use chrono::Datelike;
use tracing::info;

use portalsim::engine::{EngineConfig, SimulationEngine};
use portalsim::model::{BucketKey, MonthKey};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("PORTALSIM_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    portalsim::observability::init(metrics_port);

    let seed: Option<u64> = std::env::var("PORTALSIM_SEED")
        .ok()
        .and_then(|s| s.parse().ok());
    let heavy_load = std::env::var("PORTALSIM_HEAVY_LOAD")
        .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let churn_enabled = std::env::var("PORTALSIM_CHURN")
        .map(|s| s != "0" && !s.eq_ignore_ascii_case("false"))
        .unwrap_or(true);
    let seed_file = std::env::var("PORTALSIM_SEED_FILE").ok();

    let engine = Arc::new(SimulationEngine::new(EngineConfig {
        seed,
        ..EngineConfig::default()
    }));
    engine.set_heavy_load(heavy_load);

    match seed_file {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            let loaded = engine.store().load_seed(&json)?;
            info!("loaded {loaded} day records from {path}");
        }
        None => {
            // Demo data: current month plus the next six, so every behavior
            // profile has a month to land on.
            let today = chrono::Utc::now().date_naive();
            let mut month = MonthKey::new(today.year(), today.month());
            for _ in 0..7 {
                for (center, category) in [("DXB", "Tourist"), ("DXB", "Business"), ("AUH", "Tourist")] {
                    let key = BucketKey::new(month, center, category);
                    engine.store().seed_month(&key, 0.35, engine.rng());
                }
                month = month.succ();
            }
            info!("seeded demo availability for 7 months x 3 buckets");
        }
    }

    info!("portalsim engine up");
    info!("  seed: {}", seed.map_or("entropy".to_string(), |s| s.to_string()));
    info!("  heavy_load: {heavy_load}");
    info!("  churn: {churn_enabled}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let churn_handle = if churn_enabled {
        let churn_engine = engine.clone();
        Some(tokio::spawn(async move {
            portalsim::churn::run_churn(churn_engine).await;
        }))
    } else {
        None
    };

    // Run until SIGTERM/ctrl-c, then stop the churn loop and drop sessions.
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    shutdown.await;

    info!("shutdown signal received");
    if let Some(handle) = churn_handle {
        handle.abort();
    }
    engine.shutdown();
    info!("portalsim stopped");
    Ok(())
}
