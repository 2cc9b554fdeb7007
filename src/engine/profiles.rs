use crate::model::MonthKey;
use crate::rng::RandomSource;

/// Response personality assigned to a calendar month by its offset from the
/// reference month. Derived per query, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorProfile {
    /// Normal day/slot data with the availability overlay applied.
    Standard,
    /// Condensed available-dates list only — the narrow read API some
    /// portals switch to.
    JsonOnly,
    /// Standard data after an extra 1–3s wait, with a 20% slow tail.
    Delayed,
    /// Every day reported unavailable regardless of the store.
    AllUnavailable,
    /// Every day reported full (closed for a different displayed reason).
    AllFull,
    /// A fresh draw per query: lockouts, outages, forced logout, ghost
    /// dates, or oddly-labeled Standard output.
    Randomized,
}

/// Months from `reference` to `target`: `12*(ty-ry) + (tm-rm)`.
pub fn month_diff(target: MonthKey, reference: MonthKey) -> i32 {
    12 * (target.year - reference.year) + (target.month as i32 - reference.month as i32)
}

/// The month-offset personality map. Pure: same `(target, reference)` in,
/// same profile out. Current and past months always behave normally;
/// future months cycle through the six personalities.
pub fn profile_for(target: MonthKey, reference: MonthKey) -> BehaviorProfile {
    let diff = month_diff(target, reference);
    if diff <= 0 {
        return BehaviorProfile::Standard;
    }
    match diff % 6 {
        0 => BehaviorProfile::Standard,
        1 => BehaviorProfile::JsonOnly,
        2 => BehaviorProfile::Delayed,
        3 => BehaviorProfile::AllUnavailable,
        4 => BehaviorProfile::AllFull,
        _ => BehaviorProfile::Randomized,
    }
}

/// The Randomized profile's per-call draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomizedDraw {
    /// 10%: 403 lockout.
    Forbidden,
    /// 10%: 503 outage.
    Outage,
    /// 20%: destroy the caller's session, respond 401.
    InvalidateSession,
    /// 20%: Standard output with extraneous ghost dates injected.
    GhostDates,
    /// 20%: Standard output, labeled hybrid.
    Hybrid,
    /// 20%: Standard output with alternate rendering hints.
    AltHints,
}

pub fn randomized_draw(rng: &RandomSource) -> RandomizedDraw {
    let r = rng.ratio();
    if r < 0.10 {
        RandomizedDraw::Forbidden
    } else if r < 0.20 {
        RandomizedDraw::Outage
    } else if r < 0.40 {
        RandomizedDraw::InvalidateSession
    } else if r < 0.60 {
        RandomizedDraw::GhostDates
    } else if r < 0.80 {
        RandomizedDraw::Hybrid
    } else {
        RandomizedDraw::AltHints
    }
}

/// Extra latency for the Delayed profile: 1–3s, plus a 3–5s slow tail on
/// 20% of queries.
pub fn delayed_extra_ms(rng: &RandomSource) -> u64 {
    let mut extra = rng.range_u64(1000..3000);
    if rng.chance(0.20) {
        extra += rng.range_u64(3000..5000);
    }
    extra
}
