mod error;
mod mutation;
mod overlay;
mod profiles;
mod queries;

pub use error::EngineError;
pub use overlay::OverlayConfig;
pub use profiles::{
    delayed_extra_ms, month_diff, profile_for, randomized_draw, BehaviorProfile, RandomizedDraw,
};

use std::sync::Arc;

use chrono::Datelike;

use crate::faults::{FaultConfig, FaultPipeline};
use crate::model::{MonthKey, MutationEvent};
use crate::rng::RandomSource;
use crate::session::{SessionConfig, SessionRegistry};
use crate::store::AvailabilityStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Fix the RNG for replayable runs; None draws from entropy.
    pub seed: Option<u64>,
    pub session: SessionConfig,
    pub faults: FaultConfig,
    pub overlay: OverlayConfig,
    /// Pin the profile selector's "now"; None re-reads the wall clock on
    /// every query.
    pub reference_month: Option<MonthKey>,
}

impl EngineConfig {
    /// No faults, no overlay, no random session drops. The base for tests
    /// that assert exact outputs.
    pub fn quiet() -> Self {
        Self {
            seed: None,
            session: SessionConfig::reliable(),
            faults: FaultConfig::disabled(),
            overlay: OverlayConfig::transparent(),
            reference_month: None,
        }
    }
}

/// The portal simulation engine: session registry, fault pipeline, profile
/// selector, overlay, and auto-mutation over one shared availability store.
/// Everything is instance state — tests run isolated engines in parallel.
pub struct SimulationEngine {
    store: Arc<AvailabilityStore>,
    sessions: SessionRegistry,
    faults: FaultPipeline,
    rng: Arc<RandomSource>,
    overlay: OverlayConfig,
    reference_month: Option<MonthKey>,
    /// Most recent auto-mutation event, pollable by observers.
    last_mutation: std::sync::RwLock<Option<MutationEvent>>,
    /// Serializes mutation runs; reads proceed concurrently.
    mutation_gate: tokio::sync::Mutex<()>,
}

impl SimulationEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        let rng = Arc::new(match cfg.seed {
            Some(seed) => RandomSource::seeded(seed),
            None => RandomSource::from_entropy(),
        });
        Self {
            store: Arc::new(AvailabilityStore::new()),
            sessions: SessionRegistry::new(cfg.session, rng.clone()),
            faults: FaultPipeline::new(cfg.faults, rng.clone()),
            overlay: cfg.overlay,
            reference_month: cfg.reference_month,
            rng,
            last_mutation: std::sync::RwLock::new(None),
            mutation_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &AvailabilityStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rng(&self) -> &RandomSource {
        &self.rng
    }

    pub(crate) fn faults(&self) -> &FaultPipeline {
        &self.faults
    }

    pub(crate) fn overlay(&self) -> &OverlayConfig {
        &self.overlay
    }

    /// The profile selector's reference point, recomputed from the wall
    /// clock per query unless pinned by config.
    pub fn reference_month(&self) -> MonthKey {
        self.reference_month.unwrap_or_else(|| {
            let today = chrono::Utc::now().date_naive();
            MonthKey::new(today.year(), today.month())
        })
    }

    pub fn last_mutation(&self) -> Option<MutationEvent> {
        self.last_mutation
            .read()
            .expect("last_mutation lock poisoned")
            .clone()
    }

    pub(crate) fn record_mutation(&self, event: MutationEvent) {
        *self
            .last_mutation
            .write()
            .expect("last_mutation lock poisoned") = Some(event);
    }

    /// Explicit end-of-life: drop all sessions. The store stays readable so
    /// late observers can drain.
    pub fn shutdown(&self) {
        self.sessions.shutdown();
    }
}
