use crate::rng::RandomSource;

/// Presentation-time randomization knobs. The overlay shapes responses; it
/// never writes the store, so two identical queries may disagree while the
/// stored truth stays put.
#[derive(Debug, Clone, Copy)]
pub struct OverlayConfig {
    /// Per-query month-level suppression probability is itself drawn
    /// uniformly from this band.
    pub month_suppression: (f64, f64),
    /// Fixed per-day-query probability of reporting zero slots.
    pub day_suppression: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            month_suppression: (0.15, 0.25),
            day_suppression: 0.10,
        }
    }
}

impl OverlayConfig {
    /// No suppression at all — for tests asserting stored truth.
    pub fn transparent() -> Self {
        Self {
            month_suppression: (0.0, 0.0),
            day_suppression: 0.0,
        }
    }

    /// Roll the month-level suppression for one calendar query. The odds are
    /// re-drawn every call (15–25%), then rolled — deliberately not sticky
    /// per session or per month.
    pub fn suppress_month(&self, rng: &RandomSource) -> bool {
        let (lo, hi) = self.month_suppression;
        let p = if lo >= hi { lo } else { rng.range_f64(lo..hi) };
        rng.chance(p)
    }

    /// Roll the day-level slot wipe for one day query.
    pub fn suppress_day(&self, rng: &RandomSource) -> bool {
        rng.chance(self.day_suppression)
    }
}
