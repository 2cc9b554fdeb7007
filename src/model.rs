use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Unix milliseconds — the only time type.
pub type Ms = i64;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as Ms
}

/// Slot-of-day key, `HH:MM`. BTreeMap ordering on these strings is
/// chronological, which is what "original key order" means everywhere below.
pub type SlotTime = String;

/// A calendar month, keyed `YYYY-MM` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    /// 1-based.
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range");
        Self { year, month }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("MonthKey holds a valid year/month")
    }

    pub fn days_in_month(&self) -> u32 {
        let first = self.first_day();
        let next = self.succ().first_day();
        (next - first).num_days() as u32
    }

    /// Every calendar date of the month, in order.
    pub fn dates(&self) -> Vec<DateKey> {
        (1..=self.days_in_month())
            .map(|d| {
                DateKey(
                    NaiveDate::from_ymd_opt(self.year, self.month, d)
                        .expect("day within days_in_month"),
                )
            })
            .collect()
    }

    pub fn succ(&self) -> MonthKey {
        if self.month == 12 {
            MonthKey::new(self.year + 1, 1)
        } else {
            MonthKey::new(self.year, self.month + 1)
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = ();

    /// Strict `YYYY-MM` parse; anything else is a caller-facing 400.
    fn from_str(s: &str) -> Result<Self, ()> {
        let (y, m) = s.split_once('-').ok_or(())?;
        if y.len() != 4 || m.len() != 2 {
            return Err(());
        }
        let year: i32 = y.parse().map_err(|_| ())?;
        let month: u32 = m.parse().map_err(|_| ())?;
        if !(1..=12).contains(&month) {
            return Err(());
        }
        Ok(MonthKey { year, month })
    }
}

impl Serialize for MonthKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom("expected YYYY-MM"))
    }
}

/// A calendar date, keyed `YYYY-MM-DD` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey(pub NaiveDate);

impl DateKey {
    pub fn month_key(&self) -> MonthKey {
        MonthKey::new(self.0.year(), self.0.month())
    }

    /// Short weekday label ("Mon".."Sun").
    pub fn day_of_week(&self) -> &'static str {
        match self.0.weekday() {
            chrono::Weekday::Mon => "Mon",
            chrono::Weekday::Tue => "Tue",
            chrono::Weekday::Wed => "Wed",
            chrono::Weekday::Thu => "Thu",
            chrono::Weekday::Fri => "Fri",
            chrono::Weekday::Sat => "Sat",
            chrono::Weekday::Sun => "Sun",
        }
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DateKey)
            .map_err(|_| ())
    }
}

impl Serialize for DateKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| serde::de::Error::custom("expected YYYY-MM-DD"))
    }
}

/// Stored status of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Available,
    Na,
    Full,
    Holiday,
}

impl DayStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, DayStatus::Available)
    }

    /// Calendar-cell class vocabulary the portals expose.
    pub fn class_name(&self) -> &'static str {
        if self.is_open() { "open-date" } else { "closed-date" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

/// The stored truth for one (month, center, category, date) leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub status: DayStatus,
    pub slots: BTreeMap<SlotTime, SlotStatus>,
}

impl DayRecord {
    pub fn new(status: DayStatus) -> Self {
        Self {
            status,
            slots: BTreeMap::new(),
        }
    }

    /// A fresh day carrying the standard appointment grid.
    pub fn with_default_slots(status: DayStatus, slot_status: SlotStatus) -> Self {
        Self {
            status,
            slots: default_slot_grid(slot_status),
        }
    }

    pub fn available_slots(&self) -> usize {
        self.slots
            .values()
            .filter(|s| **s == SlotStatus::Available)
            .count()
    }
}

/// 15-minute grid from 08:00 through 17:45.
pub fn default_slot_grid(status: SlotStatus) -> BTreeMap<SlotTime, SlotStatus> {
    let mut slots = BTreeMap::new();
    for h in 8..=17 {
        for m in [0, 15, 30, 45] {
            slots.insert(format!("{h:02}:{m:02}"), status);
        }
    }
    slots
}

/// One (month, location, category) leaf of the availability store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub month: MonthKey,
    pub center: String,
    pub category: String,
}

impl BucketKey {
    pub fn new(month: MonthKey, center: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            month,
            center: center.into(),
            category: category.into(),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.month, self.center, self.category)
    }
}

// ── Auto-mutation reporting ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Activate,
    Suppress,
    Wipe,
    Restore,
}

impl MutationKind {
    pub fn label(&self) -> &'static str {
        match self {
            MutationKind::Activate => "activate",
            MutationKind::Suppress => "suppress",
            MutationKind::Wipe => "wipe",
            MutationKind::Restore => "restore",
        }
    }
}

/// What one auto-mutation run did. `target: None` means the chosen kind had
/// no eligible day and the run was a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationEvent {
    pub at: Ms,
    pub kind: MutationKind,
    pub target: Option<(BucketKey, DateKey)>,
    pub slots_changed: usize,
}

impl MutationEvent {
    pub fn noop(at: Ms, kind: MutationKind) -> Self {
        Self {
            at,
            kind,
            target: None,
            slots_changed: 0,
        }
    }
}

// ── Response shapes ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
    pub session_token: String,
    /// Seconds — always 420.
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub valid: bool,
    /// Whole seconds left; 0 when invalid.
    pub time_remaining: i64,
}

/// Rendering hint attached by the Randomized profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Hybrid,
    Alt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub date: DateKey,
    pub status: DayStatus,
    pub is_open: bool,
    pub class_name: String,
    /// Injected filler date that does not exist in the store.
    #[serde(default)]
    pub ghost: bool,
}

impl DaySummary {
    pub fn from_status(date: DateKey, status: DayStatus) -> Self {
        Self {
            date,
            status,
            is_open: status.is_open(),
            class_name: status.class_name().to_string(),
            ghost: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResponse {
    pub month: MonthKey,
    pub center: String,
    pub category: String,
    pub days: Vec<DaySummary>,
    pub no_availability: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<Variant>,
    pub generated_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CondensedDate {
    pub date: DateKey,
    pub day_of_week: String,
    pub slots_available: usize,
}

/// Narrow read shape: only currently-available dates, no closed-day entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CondensedCalendar {
    pub month: MonthKey,
    pub center: String,
    pub category: String,
    pub available_dates: Vec<CondensedDate>,
    pub total_available: usize,
    pub message: String,
    pub no_availability: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalendarReply {
    Grid(CalendarResponse),
    Condensed(CondensedCalendar),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotEntry {
    pub time: SlotTime,
    pub status: SlotStatus,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayDetail {
    pub date: DateKey,
    pub status: DayStatus,
    pub slots: Vec<SlotEntry>,
    pub total_slots: usize,
    pub available_slots: usize,
    pub no_availability: bool,
}

impl DayDetail {
    /// The "nothing stored for this date" response — not an error.
    pub fn empty(date: DateKey) -> Self {
        Self {
            date,
            status: DayStatus::Na,
            slots: Vec::new(),
            total_slots: 0,
            available_slots: 0,
            no_availability: false,
        }
    }
}
