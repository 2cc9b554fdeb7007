use std::sync::Arc;
use std::time::Duration;

use crate::engine::EngineError;
use crate::observability;
use crate::rng::RandomSource;

/// Logical route families. The pipeline is one policy object; only the
/// numbers differ per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Generic,
    DayDetail,
    Calendar,
    Login,
}

impl RouteClass {
    pub fn label(&self) -> &'static str {
        match self {
            RouteClass::Generic => "generic",
            RouteClass::DayDetail => "day_detail",
            RouteClass::Calendar => "calendar",
            RouteClass::Login => "login",
        }
    }
}

/// Base-delay range plus total error budget for one route class.
#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub delay_ms: (u64, u64),
    /// Total short-circuit probability, split evenly between 429 and 503.
    pub error_budget: f64,
}

impl RoutePolicy {
    pub const fn new(lo: u64, hi: u64, error_budget: f64) -> Self {
        Self {
            delay_ms: (lo, hi),
            error_budget,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FaultConfig {
    pub generic: RoutePolicy,
    pub day_detail: RoutePolicy,
    pub calendar: RoutePolicy,
    pub login: RoutePolicy,
    /// Applied to every route while the heavy-load flag is set.
    pub heavy: RoutePolicy,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            generic: RoutePolicy::new(300, 1500, 0.08),
            day_detail: RoutePolicy::new(600, 1400, 0.04),
            calendar: RoutePolicy::new(800, 2000, 0.04),
            login: RoutePolicy::new(1000, 2000, 0.04),
            heavy: RoutePolicy::new(2000, 3000, 0.25),
        }
    }
}

impl FaultConfig {
    /// Zero delays, zero errors — for tests exercising the happy path.
    pub fn disabled() -> Self {
        let quiet = RoutePolicy::new(0, 0, 0.0);
        Self {
            generic: quiet,
            day_detail: quiet,
            calendar: quiet,
            login: quiet,
            heavy: quiet,
        }
    }

    pub fn policy(&self, route: RouteClass, heavy_load: bool) -> RoutePolicy {
        if heavy_load {
            return self.heavy;
        }
        match route {
            RouteClass::Generic => self.generic,
            RouteClass::DayDetail => self.day_detail,
            RouteClass::Calendar => self.calendar,
            RouteClass::Login => self.login,
        }
    }
}

/// Admission decision for one request. The delay is always honored before
/// the outcome is delivered — short-circuits are not instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultOutcome {
    Proceed { delay: Duration },
    ShortCircuit { error: EngineError, delay: Duration },
}

impl FaultOutcome {
    pub fn delay(&self) -> Duration {
        match self {
            FaultOutcome::Proceed { delay } => *delay,
            FaultOutcome::ShortCircuit { delay, .. } => *delay,
        }
    }

    pub fn is_short_circuit(&self) -> bool {
        matches!(self, FaultOutcome::ShortCircuit { .. })
    }

    /// Sleep the base delay, then either pass or surface the injected error.
    pub async fn settle(self) -> Result<(), EngineError> {
        tokio::time::sleep(self.delay()).await;
        match self {
            FaultOutcome::Proceed { .. } => Ok(()),
            FaultOutcome::ShortCircuit { error, .. } => Err(error),
        }
    }
}

/// The layered request-admission policy: base latency plus probabilistic
/// short-circuit into 429 or 503. One instance serves every route.
pub struct FaultPipeline {
    cfg: FaultConfig,
    rng: Arc<RandomSource>,
}

impl FaultPipeline {
    pub fn new(cfg: FaultConfig, rng: Arc<RandomSource>) -> Self {
        Self { cfg, rng }
    }

    /// Decide the fate of one request. Pure draw — no sleeping here, so
    /// callers (and statistical tests) can sample outcomes cheaply.
    /// `heavy_load` is read fresh by the caller on every request.
    pub fn admit(&self, route: RouteClass, heavy_load: bool) -> FaultOutcome {
        let policy = self.cfg.policy(route, heavy_load);
        let (lo, hi) = policy.delay_ms;
        let delay = Duration::from_millis(self.rng.range_u64(lo..hi.max(lo + 1)));

        let r = self.rng.ratio();
        if r < policy.error_budget / 2.0 {
            metrics::counter!(observability::FAULTS_INJECTED_TOTAL,
                "route" => route.label(), "status" => "429")
            .increment(1);
            FaultOutcome::ShortCircuit {
                error: EngineError::TooManyRequests,
                delay,
            }
        } else if r < policy.error_budget {
            metrics::counter!(observability::FAULTS_INJECTED_TOTAL,
                "route" => route.label(), "status" => "503")
            .increment(1);
            FaultOutcome::ShortCircuit {
                error: EngineError::ServiceUnavailable,
                delay,
            }
        } else {
            FaultOutcome::Proceed { delay }
        }
    }
}
