use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::SimulationEngine;

/// First mutation lands 15–30s after startup.
const INITIAL_DELAY_MS: (u64, u64) = (15_000, 30_000);
/// Then one every 30–60s.
const RECURRING_DELAY_MS: (u64, u64) = (30_000, 60_000);

/// Background task that periodically perturbs the availability store,
/// independent of any client request.
pub async fn run_churn(engine: Arc<SimulationEngine>) {
    let initial = engine.rng().range_u64(INITIAL_DELAY_MS.0..INITIAL_DELAY_MS.1);
    tokio::time::sleep(Duration::from_millis(initial)).await;

    loop {
        let event = engine.run_auto_mutation().await;
        match &event.target {
            Some((bucket, date)) => info!(
                "auto-mutation {}: {bucket} {date}, {} slots changed",
                event.kind.label(),
                event.slots_changed
            ),
            None => info!("auto-mutation {}: no eligible day", event.kind.label()),
        }

        let pause = engine
            .rng()
            .range_u64(RECURRING_DELAY_MS.0..RECURRING_DELAY_MS.1);
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }
}
