use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::*;
use crate::rng::RandomSource;

pub type SharedDayRecord = Arc<RwLock<DayRecord>>;

/// In-memory availability store: month → location → category → day.
/// Persistence is somebody else's problem; this owns concurrency semantics
/// only. Day records sit behind their own lock so a mutation and a
/// concurrent read of the same day never interleave field-by-field.
pub struct AvailabilityStore {
    buckets: DashMap<BucketKey, Arc<DashMap<DateKey, SharedDayRecord>>>,
    /// Administrative toggle. Lives with the data, read fresh on every
    /// fault decision — never cached by callers.
    heavy_load: AtomicBool,
}

impl Default for AvailabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AvailabilityStore {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
            heavy_load: AtomicBool::new(false),
        }
    }

    pub fn heavy_load(&self) -> bool {
        self.heavy_load.load(Ordering::Relaxed)
    }

    pub fn set_heavy_load(&self, enabled: bool) {
        self.heavy_load.store(enabled, Ordering::Relaxed);
        tracing::info!("heavy load flag set to {enabled}");
    }

    pub fn bucket_keys(&self) -> Vec<BucketKey> {
        self.buckets.iter().map(|e| e.key().clone()).collect()
    }

    /// Uniform pick among buckets that actually hold at least one day.
    pub fn random_populated_bucket(&self, rng: &RandomSource) -> Option<BucketKey> {
        let populated: Vec<BucketKey> = self
            .buckets
            .iter()
            .filter(|e| !e.value().is_empty())
            .map(|e| e.key().clone())
            .collect();
        rng.pick_index(populated.len()).map(|i| populated[i].clone())
    }

    fn bucket(&self, key: &BucketKey) -> Option<Arc<DashMap<DateKey, SharedDayRecord>>> {
        self.buckets.get(key).map(|e| e.value().clone())
    }

    fn bucket_or_create(&self, key: &BucketKey) -> Arc<DashMap<DateKey, SharedDayRecord>> {
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(DashMap::new()))
            .value()
            .clone()
    }

    pub fn day(&self, key: &BucketKey, date: DateKey) -> Option<SharedDayRecord> {
        self.bucket(key)
            .and_then(|b| b.get(&date).map(|e| e.value().clone()))
    }

    /// Get the day, creating it closed with the default slot grid when absent
    /// (how the portal lazily materializes dates the admin touches).
    pub fn ensure_day(&self, key: &BucketKey, date: DateKey) -> SharedDayRecord {
        let bucket = self.bucket_or_create(key);
        bucket
            .entry(date)
            .or_insert_with(|| {
                Arc::new(RwLock::new(DayRecord::with_default_slots(
                    DayStatus::Na,
                    SlotStatus::Booked,
                )))
            })
            .value()
            .clone()
    }

    pub fn insert_day(&self, key: &BucketKey, date: DateKey, record: DayRecord) {
        let bucket = self.bucket_or_create(key);
        bucket.insert(date, Arc::new(RwLock::new(record)));
    }

    pub fn dates(&self, key: &BucketKey) -> Vec<DateKey> {
        let mut dates: Vec<DateKey> = match self.bucket(key) {
            Some(b) => b.iter().map(|e| *e.key()).collect(),
            None => return Vec::new(),
        };
        dates.sort();
        dates
    }

    /// Per-day consistent snapshots of a whole bucket, date-ordered. Each
    /// record is cloned under its read lock; consistency holds per day
    /// record, not across the month.
    pub async fn snapshot_days(&self, key: &BucketKey) -> Vec<(DateKey, DayRecord)> {
        let bucket = match self.bucket(key) {
            Some(b) => b,
            None => return Vec::new(),
        };
        let handles: Vec<(DateKey, SharedDayRecord)> = bucket
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        let mut days = Vec::with_capacity(handles.len());
        for (date, rec) in handles {
            let snapshot = rec.read().await.clone();
            days.push((date, snapshot));
        }
        days.sort_by_key(|(d, _)| *d);
        days
    }

    pub async fn snapshot_day(&self, key: &BucketKey, date: DateKey) -> Option<DayRecord> {
        let rec = self.day(key, date)?;
        let snapshot = rec.read().await.clone();
        Some(snapshot)
    }

    // ── Administrative edits (live inputs, applied directly) ─────

    pub async fn set_day_status(&self, key: &BucketKey, date: DateKey, status: DayStatus) {
        let rec = self.ensure_day(key, date);
        let mut guard = rec.write().await;
        guard.status = status;
        if guard.slots.is_empty() {
            guard.slots = default_slot_grid(SlotStatus::Booked);
        }
    }

    pub async fn set_slot_status(
        &self,
        key: &BucketKey,
        date: DateKey,
        slot: &str,
        status: SlotStatus,
    ) {
        let rec = self.ensure_day(key, date);
        let mut guard = rec.write().await;
        if guard.slots.is_empty() {
            guard.slots = default_slot_grid(SlotStatus::Booked);
        }
        guard.slots.insert(slot.to_string(), status);
    }

    // ── Seeding ──────────────────────────────────────────────────

    /// Populate one month: every calendar day closed with the default grid,
    /// then roughly `open_ratio` of days opened with all slots free.
    pub fn seed_month(
        &self,
        key: &BucketKey,
        open_ratio: f64,
        rng: &RandomSource,
    ) {
        for date in key.month.dates() {
            let record = if rng.chance(open_ratio) {
                DayRecord::with_default_slots(DayStatus::Available, SlotStatus::Available)
            } else {
                DayRecord::with_default_slots(DayStatus::Na, SlotStatus::Booked)
            };
            self.insert_day(key, date, record);
        }
    }

    /// Load a seed file: `{ settings: { heavyLoad }, slots: { "YYYY-MM":
    /// { center: { category: { days: { "YYYY-MM-DD": DayRecord } } } } } }`.
    pub fn load_seed(&self, json: &str) -> Result<usize, serde_json::Error> {
        let seed: SeedFile = serde_json::from_str(json)?;
        if let Some(settings) = seed.settings {
            self.set_heavy_load(settings.heavy_load);
        }
        let mut loaded = 0;
        for (month, centers) in seed.slots {
            for (center, categories) in centers {
                for (category, leaf) in categories {
                    let key = BucketKey::new(month, center.clone(), category);
                    for (date, record) in leaf.days {
                        self.insert_day(&key, date, record);
                        loaded += 1;
                    }
                }
            }
        }
        Ok(loaded)
    }

    /// The raw-preview admin shape: the bucket's days as a JSON object.
    pub async fn raw_preview(&self, key: &BucketKey) -> serde_json::Value {
        let days = self.snapshot_days(key).await;
        let map: serde_json::Map<String, serde_json::Value> = days
            .into_iter()
            .map(|(date, rec)| {
                (
                    date.to_string(),
                    serde_json::to_value(rec).expect("DayRecord serializes"),
                )
            })
            .collect();
        serde_json::json!({ "days": map })
    }
}

#[derive(Deserialize)]
struct SeedFile {
    settings: Option<SeedSettings>,
    #[serde(default)]
    slots: HashMap<MonthKey, HashMap<String, HashMap<String, SeedLeaf>>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedSettings {
    heavy_load: bool,
}

#[derive(Deserialize)]
struct SeedLeaf {
    #[serde(default)]
    days: HashMap<DateKey, DayRecord>,
}
