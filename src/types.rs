use std::collections::BTreeMap;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scheduled jobs (backend-reported, replaced wholesale on every poll)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    #[serde(alias = "success")]
    Completed,
    #[serde(alias = "error")]
    Failed,
    Cancelled,
    /// Any status string this build does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: String,
    /// Join key against `PresetSchedule::name`. Compared byte-for-byte.
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: JobStatus,
    /// Raw instant string as sent by the backend. Parsed lazily so that an
    /// unparsable value only drops the job from the timeline.
    pub next_run: Option<String>,
    pub last_run: Option<String>,
    pub last_duration_seconds: Option<f64>,
    #[serde(alias = "run_count_today")]
    pub today_run_count: Option<u32>,
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Session buckets
// ---------------------------------------------------------------------------

/// Coarse position of an instant within the trading day/week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionBucket {
    PreMarket,
    MarketHours,
    AfterHours,
    Overnight,
    Weekend,
}

impl SessionBucket {
    /// Hex colour used for timeline markers.
    pub fn color(self) -> &'static str {
        match self {
            SessionBucket::PreMarket => "#f59e0b",
            SessionBucket::MarketHours => "#10b981",
            SessionBucket::AfterHours => "#8b5cf6",
            SessionBucket::Overnight => "#3b82f6",
            SessionBucket::Weekend => "#ec4899",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionBucket::PreMarket => "Pre-Market",
            SessionBucket::MarketHours => "Market Hours",
            SessionBucket::AfterHours => "After-Hours",
            SessionBucket::Overnight => "Overnight",
            SessionBucket::Weekend => "Weekend",
        }
    }
}

impl std::fmt::Display for SessionBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionBucket::PreMarket => "pre-market",
            SessionBucket::MarketHours => "market-hours",
            SessionBucket::AfterHours => "after-hours",
            SessionBucket::Overnight => "overnight",
            SessionBucket::Weekend => "weekend",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Preset schedules (authored, immutable after load)
// ---------------------------------------------------------------------------

/// Day-of-week mask. Bit 0 is Monday, bit 6 is Sunday.
///
/// Serialized as a list of three-letter day names (`["mon", "tue"]`) so that
/// catalog files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Weekdays(u8);

const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

impl Weekdays {
    pub const WEEKDAYS: Weekdays = Weekdays(0b0001_1111);
    pub const SATURDAY: Weekdays = Weekdays(0b0010_0000);

    pub fn from_days(days: &[Weekday]) -> Self {
        Self(
            days.iter()
                .fold(0u8, |mask, d| mask | (1 << d.num_days_from_monday())),
        )
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 & 0b0111_1111 == 0
    }

    pub fn days(self) -> impl Iterator<Item = Weekday> {
        (0..7u8)
            .filter(move |i| self.0 & (1 << i) != 0)
            .map(|i| weekday_from_monday(i as u32))
    }

    /// Rotate every day by `shift` days (positive = later in the week).
    pub fn shifted(self, shift: i64) -> Self {
        Self::from_days(
            &self
                .days()
                .map(|d| weekday_from_monday((d.num_days_from_monday() as i64 + shift).rem_euclid(7) as u32))
                .collect::<Vec<_>>(),
        )
    }
}

fn weekday_from_monday(n: u32) -> Weekday {
    match n % 7 {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

impl TryFrom<Vec<String>> for Weekdays {
    type Error = String;

    fn try_from(names: Vec<String>) -> std::result::Result<Self, Self::Error> {
        let mut days = Vec::with_capacity(names.len());
        for name in &names {
            let lower = name.to_ascii_lowercase();
            let idx = DAY_NAMES
                .iter()
                .position(|d| lower.starts_with(d))
                .ok_or_else(|| format!("unknown weekday: {name}"))?;
            days.push(weekday_from_monday(idx as u32));
        }
        Ok(Self::from_days(&days))
    }
}

impl From<Weekdays> for Vec<String> {
    fn from(w: Weekdays) -> Self {
        w.days()
            .map(|d| DAY_NAMES[d.num_days_from_monday() as usize].to_string())
            .collect()
    }
}

impl Serialize for Weekdays {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        Vec::<String>::from(*self).serialize(s)
    }
}

impl<'de> Deserialize<'de> for Weekdays {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(d)?;
        Weekdays::try_from(names).map_err(serde::de::Error::custom)
    }
}

/// Recurrence expressed in the reference (exchange-local) zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTimeSpec {
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    pub days: Weekdays,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetSchedule {
    pub id: String,
    /// Must equal the backend job's name exactly for the two to be matched.
    pub name: String,
    pub reference_time: ReferenceTimeSpec,
    /// 5-field cron in UTC, as configured on the backend.
    pub cron_utc: String,
    pub session: SessionBucket,
    pub description: String,
    #[serde(default)]
    pub rationale: String,
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub job_id: String,
    pub job_name: String,
    pub scheduled_at: DateTime<Utc>,
    pub session: SessionBucket,
    /// Human-readable form of `session`.
    pub session_label: &'static str,
    pub color: &'static str,
}

// ---------------------------------------------------------------------------
// Market status (consumed for formatting only)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub is_open: bool,
    pub current_period: Option<String>,
    pub next_open: Option<String>,
    pub next_close: Option<String>,
}

// ---------------------------------------------------------------------------
// Collectors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorHealth {
    pub name: String,
    pub status: String,
    pub items_collected: Option<u64>,
    pub last_run: Option<String>,
    pub error: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorStatus {
    Success,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Articles,
    Posts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorHealthRecord {
    pub name: String,
    pub status: CollectorStatus,
    pub items_collected: u64,
    pub item_kind: ItemKind,
    pub last_run_display: String,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Run history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub status: JobStatus,
    pub started_at: Option<String>,
    #[serde(alias = "duration")]
    pub duration_seconds: Option<f64>,
    pub error: Option<String>,
}

/// `date (YYYY-MM-DD) → job name → runs`.
pub type HistoryMap = BTreeMap<String, BTreeMap<String, Vec<RunRecord>>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunHistory {
    #[serde(default)]
    pub history: HistoryMap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub job_count: usize,
    pub successful_runs: usize,
    pub total_runs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunHistorySummary {
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    /// Mean over runs that reported a duration; `None` when none did.
    pub avg_duration_seconds: Option<f64>,
    pub per_day: Vec<DaySummary>,
}

// ---------------------------------------------------------------------------
// Job event notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: String,
    #[serde(default)]
    pub job_name: String,
    /// started / completed / failed, passed through verbatim.
    #[serde(alias = "type")]
    pub event: String,
    pub timestamp: Option<String>,
    pub message: Option<String>,
}
