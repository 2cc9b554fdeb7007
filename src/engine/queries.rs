use std::time::Duration;

use crate::faults::RouteClass;
use crate::model::*;
use crate::observability;

use super::profiles::{delayed_extra_ms, profile_for, randomized_draw, RandomizedDraw};
use super::{BehaviorProfile, EngineError, SimulationEngine};

/// Ghost entries injected per GhostDates draw.
const GHOST_DATES: (u64, u64) = (1, 3);

impl SimulationEngine {
    /// Any well-formed credentials succeed — the portal does not really
    /// verify anyone. Login latency comes from the pipeline, not the
    /// registry.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginGrant, EngineError> {
        self.admit(RouteClass::Login).await?;
        if username.is_empty() || password.is_empty() {
            self.count("login", 401);
            return Err(EngineError::InvalidCredentials);
        }
        self.count("login", 200);
        Ok(self.sessions().create(username))
    }

    /// Invalid tokens answer `valid: false`, not an error.
    pub async fn validate_session(&self, token: &str) -> Result<SessionStatus, EngineError> {
        self.admit(RouteClass::Generic).await?;
        if self.sessions().is_valid(token) {
            let time_remaining = self.sessions().remaining_seconds(token).unwrap_or(0);
            self.count("validate_session", 200);
            Ok(SessionStatus {
                valid: true,
                time_remaining,
            })
        } else {
            self.count("validate_session", 200);
            Ok(SessionStatus {
                valid: false,
                time_remaining: 0,
            })
        }
    }

    pub async fn logout(&self, token: &str) -> Result<(), EngineError> {
        self.admit(RouteClass::Generic).await?;
        self.sessions().destroy(token);
        self.count("logout", 200);
        Ok(())
    }

    /// The month query. Parameter validation is immediate (400, never
    /// delayed or faulted); only then does the request enter the fault
    /// pipeline, the session gate, and the profile selector.
    pub async fn calendar(
        &self,
        token: &str,
        month: &str,
        center: &str,
        category: &str,
    ) -> Result<CalendarReply, EngineError> {
        let month = parse_month(month)?;

        self.admit(RouteClass::Calendar).await?;
        self.require_session(token, "calendar")?;

        let key = BucketKey::new(month, center, category);
        let profile = profile_for(month, self.reference_month());

        let reply = match profile {
            BehaviorProfile::Standard => CalendarReply::Grid(self.standard_grid(&key, None, false).await),
            BehaviorProfile::JsonOnly => CalendarReply::Condensed(self.condensed(&key).await),
            BehaviorProfile::Delayed => {
                let extra = delayed_extra_ms(self.rng());
                tokio::time::sleep(Duration::from_millis(extra)).await;
                CalendarReply::Grid(self.standard_grid(&key, None, false).await)
            }
            BehaviorProfile::AllUnavailable => {
                CalendarReply::Grid(synthetic_month(&key, DayStatus::Na, true))
            }
            BehaviorProfile::AllFull => {
                CalendarReply::Grid(synthetic_month(&key, DayStatus::Full, false))
            }
            BehaviorProfile::Randomized => match randomized_draw(self.rng()) {
                RandomizedDraw::Forbidden => {
                    self.count("calendar", 403);
                    return Err(EngineError::Forbidden);
                }
                RandomizedDraw::Outage => {
                    self.count("calendar", 503);
                    return Err(EngineError::ServiceUnavailable);
                }
                RandomizedDraw::InvalidateSession => {
                    self.sessions().destroy(token);
                    self.count("calendar", 401);
                    return Err(EngineError::SessionExpired);
                }
                RandomizedDraw::GhostDates => {
                    CalendarReply::Grid(self.standard_grid(&key, None, true).await)
                }
                RandomizedDraw::Hybrid => {
                    CalendarReply::Grid(self.standard_grid(&key, Some(Variant::Hybrid), false).await)
                }
                RandomizedDraw::AltHints => {
                    CalendarReply::Grid(self.standard_grid(&key, Some(Variant::Alt), false).await)
                }
            },
        };

        self.count("calendar", 200);
        Ok(reply)
    }

    /// Per-slot detail for one date. Absent days answer an empty detail,
    /// not an error.
    pub async fn time_slots(
        &self,
        token: &str,
        date: &str,
        center: &str,
        category: &str,
    ) -> Result<DayDetail, EngineError> {
        let date = parse_date(date)?;

        self.admit(RouteClass::DayDetail).await?;
        self.require_session(token, "time_slots")?;

        let key = BucketKey::new(date.month_key(), center, category);
        let detail = match self.store().snapshot_day(&key, date).await {
            None => DayDetail::empty(date),
            Some(record) => {
                if self.overlay().suppress_day(self.rng()) {
                    // The portal shrugs: day looked open, zero slots offered.
                    DayDetail {
                        date,
                        status: DayStatus::Na,
                        slots: Vec::new(),
                        total_slots: 0,
                        available_slots: 0,
                        no_availability: true,
                    }
                } else {
                    let slots: Vec<SlotEntry> = record
                        .slots
                        .iter()
                        .map(|(time, status)| SlotEntry {
                            time: time.clone(),
                            status: *status,
                            available: *status == SlotStatus::Available,
                        })
                        .collect();
                    let available_slots = slots.iter().filter(|s| s.available).count();
                    DayDetail {
                        date,
                        status: record.status,
                        total_slots: slots.len(),
                        available_slots,
                        slots,
                        no_availability: false,
                    }
                }
            }
        };

        self.count("time_slots", 200);
        Ok(detail)
    }

    // ── Administrative surface (transport lives elsewhere; these are the
    //    live inputs the engine re-reads per decision) ──────────────────

    pub async fn set_day_status(
        &self,
        date: &str,
        center: &str,
        category: &str,
        status: &str,
    ) -> Result<(), EngineError> {
        let date = parse_date(date)?;
        let status = parse_day_status(status)?;
        let key = BucketKey::new(date.month_key(), center, category);
        self.store().set_day_status(&key, date, status).await;
        Ok(())
    }

    pub async fn set_slot_status(
        &self,
        date: &str,
        center: &str,
        category: &str,
        slot: &str,
        status: &str,
    ) -> Result<(), EngineError> {
        let date = parse_date(date)?;
        let status = match status {
            "available" => SlotStatus::Available,
            "booked" => SlotStatus::Booked,
            other => return Err(EngineError::InvalidStatus(other.to_string())),
        };
        if slot.is_empty() {
            return Err(EngineError::MissingParam("slot"));
        }
        let key = BucketKey::new(date.month_key(), center, category);
        self.store().set_slot_status(&key, date, slot, status).await;
        Ok(())
    }

    /// Promote one random closed day to available, opening ~60% of its
    /// slots — the admin's "drop" button.
    pub async fn simulate_drop(
        &self,
        month: &str,
        center: &str,
        category: &str,
    ) -> Result<Option<DateKey>, EngineError> {
        let month = parse_month(month)?;
        let key = BucketKey::new(month, center, category);

        let candidates: Vec<DateKey> = {
            let mut out = Vec::new();
            for (date, rec) in self.store().snapshot_days(&key).await {
                if rec.status == DayStatus::Na {
                    out.push(date);
                }
            }
            out
        };
        let Some(idx) = self.rng().pick_index(candidates.len()) else {
            return Ok(None);
        };
        let date = candidates[idx];

        let rec = self.store().ensure_day(&key, date);
        let mut guard = rec.write().await;
        let mut next = guard.clone();
        next.status = DayStatus::Available;
        if next.slots.is_empty() {
            next.slots = default_slot_grid(SlotStatus::Available);
        } else {
            for status in next.slots.values_mut() {
                if self.rng().chance(0.6) {
                    *status = SlotStatus::Available;
                }
            }
        }
        *guard = next;
        Ok(Some(date))
    }

    pub fn set_heavy_load(&self, enabled: bool) {
        self.store().set_heavy_load(enabled);
    }

    pub async fn raw_preview(
        &self,
        month: &str,
        center: &str,
        category: &str,
    ) -> Result<serde_json::Value, EngineError> {
        let month = parse_month(month)?;
        let key = BucketKey::new(month, center, category);
        Ok(self.store().raw_preview(&key).await)
    }

    // ── Shared plumbing ─────────────────────────────────────────

    async fn admit(&self, route: RouteClass) -> Result<(), EngineError> {
        self.faults()
            .admit(route, self.store().heavy_load())
            .settle()
            .await
    }

    fn require_session(&self, token: &str, op: &'static str) -> Result<(), EngineError> {
        if self.sessions().is_valid(token) {
            Ok(())
        } else {
            self.count(op, 401);
            Err(EngineError::SessionExpired)
        }
    }

    fn count(&self, op: &'static str, status: u16) {
        metrics::counter!(observability::REQUESTS_TOTAL,
            "op" => op, "status" => status.to_string())
        .increment(1);
    }

    /// Stored days shaped for the grid, with the overlay rolled on top.
    async fn standard_grid(
        &self,
        key: &BucketKey,
        variant: Option<Variant>,
        ghosts: bool,
    ) -> CalendarResponse {
        let stored = self.store().snapshot_days(key).await;
        let suppressed = self.overlay().suppress_month(self.rng());

        let mut days: Vec<DaySummary> = stored
            .into_iter()
            .map(|(date, rec)| {
                let status = if suppressed { DayStatus::Na } else { rec.status };
                DaySummary::from_status(date, status)
            })
            .collect();

        if ghosts {
            let count = self.rng().range_u64(GHOST_DATES.0..GHOST_DATES.1 + 1);
            let month_dates = key.month.dates();
            for _ in 0..count {
                // ghosts stay within day 1..=28 so every month can host them
                let idx = self
                    .rng()
                    .pick_index(month_dates.len().min(28))
                    .unwrap_or(0);
                let mut ghost = DaySummary::from_status(month_dates[idx], DayStatus::Na);
                ghost.ghost = true;
                days.push(ghost);
            }
        }

        CalendarResponse {
            month: key.month,
            center: key.center.clone(),
            category: key.category.clone(),
            days,
            no_availability: suppressed,
            variant,
            generated_at: now_ms(),
        }
    }

    /// The narrow read shape: available dates only. Month suppression still
    /// applies — the portal can claim a whole month is gone.
    async fn condensed(&self, key: &BucketKey) -> CondensedCalendar {
        let suppressed = self.overlay().suppress_month(self.rng());
        let available_dates: Vec<CondensedDate> = if suppressed {
            Vec::new()
        } else {
            self.store()
                .snapshot_days(key)
                .await
                .into_iter()
                .filter(|(_, rec)| rec.status == DayStatus::Available)
                .map(|(date, rec)| CondensedDate {
                    date,
                    day_of_week: date.day_of_week().to_string(),
                    slots_available: rec.available_slots(),
                })
                .collect()
        };

        let total_available = available_dates.len();
        let message = if total_available == 0 {
            "No appointments available".to_string()
        } else {
            "Appointments found".to_string()
        };
        CondensedCalendar {
            month: key.month,
            center: key.center.clone(),
            category: key.category.clone(),
            available_dates,
            total_available,
            message,
            no_availability: suppressed,
        }
    }
}

/// Every calendar day of the month forced to one status, store ignored.
fn synthetic_month(key: &BucketKey, status: DayStatus, no_availability: bool) -> CalendarResponse {
    let days = key
        .month
        .dates()
        .into_iter()
        .map(|date| DaySummary::from_status(date, status))
        .collect();
    CalendarResponse {
        month: key.month,
        center: key.center.clone(),
        category: key.category.clone(),
        days,
        no_availability,
        variant: None,
        generated_at: now_ms(),
    }
}

fn parse_month(raw: &str) -> Result<MonthKey, EngineError> {
    if raw.is_empty() {
        return Err(EngineError::MissingParam("month"));
    }
    raw.parse()
        .map_err(|_| EngineError::InvalidMonth(raw.to_string()))
}

fn parse_date(raw: &str) -> Result<DateKey, EngineError> {
    if raw.is_empty() {
        return Err(EngineError::MissingParam("date"));
    }
    raw.parse()
        .map_err(|_| EngineError::InvalidDate(raw.to_string()))
}

fn parse_day_status(raw: &str) -> Result<DayStatus, EngineError> {
    match raw {
        "available" => Ok(DayStatus::Available),
        "na" => Ok(DayStatus::Na),
        "full" => Ok(DayStatus::Full),
        "holiday" => Ok(DayStatus::Holiday),
        other => Err(EngineError::InvalidStatus(other.to_string())),
    }
}
