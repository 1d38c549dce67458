use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::calendar;

/// Week/month/year triple used to group entries into time windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bucket {
    pub week: u32,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub intakes: u32,
    pub interviews: u32,
    pub placements: u32,
    pub prospects: u32,
}

impl Counters {
    pub fn set(&mut self, metric: Metric, value: u32) {
        match metric {
            Metric::Intakes => self.intakes = value,
            Metric::Interviews => self.interviews = value,
            Metric::Placements => self.placements = value,
            Metric::Prospects => self.prospects = value,
        }
    }
}

/// Turns raw form or CSV input into a counter value. Anything that is not a
/// non-negative number becomes zero; fractions are truncated.
pub fn coerce_count(raw: &str) -> u32 {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<u32>() {
        return value;
    }

    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value.min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Intakes,
    Interviews,
    Placements,
    Prospects,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Intakes,
        Metric::Interviews,
        Metric::Placements,
        Metric::Prospects,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Intakes => "Intakes",
            Metric::Interviews => "Interviews",
            Metric::Placements => "Placements",
            Metric::Prospects => "Prospects",
        }
    }
}

/// An entry as submitted, before the store has assigned an id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub name: String,
    pub date: NaiveDate,
    pub bucket: Bucket,
    pub counters: Counters,
}

impl NewEntry {
    /// Bucket fields are fixed here, at write time.
    pub fn new(name: impl Into<String>, date: NaiveDate, counters: Counters) -> Self {
        Self {
            name: name.into(),
            date,
            bucket: calendar::bucket(date),
            counters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: Uuid,
    pub name: String,
    pub date: NaiveDate,
    pub bucket: Bucket,
    pub counters: Counters,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn from_new(id: Uuid, entry: NewEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: entry.name,
            date: entry.date,
            bucket: entry.bucket,
            counters: entry.counters,
            created_at,
        }
    }
}

/// Running sums for one member, or for the whole roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub intakes: u64,
    pub interviews: u64,
    pub placements: u64,
    pub prospects: u64,
}

impl Tally {
    pub fn add(&mut self, counters: &Counters) {
        self.intakes += u64::from(counters.intakes);
        self.interviews += u64::from(counters.interviews);
        self.placements += u64::from(counters.placements);
        self.prospects += u64::from(counters.prospects);
    }

    pub fn merge(&mut self, other: &Tally) {
        self.intakes += other.intakes;
        self.interviews += other.interviews;
        self.placements += other.placements;
        self.prospects += other.prospects;
    }

    pub fn get(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Intakes => self.intakes,
            Metric::Interviews => self.interviews,
            Metric::Placements => self.placements,
            Metric::Prospects => self.prospects,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberTotals {
    pub name: String,
    pub tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedMember {
    pub position: usize,
    pub name: String,
    pub tally: Tally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Week,
    Month,
    Year,
    All,
}

impl FilterMode {
    /// Any label other than week/month/year selects everything.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "week" => FilterMode::Week,
            "month" => FilterMode::Month,
            "year" => FilterMode::Year,
            _ => FilterMode::All,
        }
    }

    pub fn matches(self, bucket: &Bucket, reference: &Bucket) -> bool {
        match self {
            FilterMode::Week => bucket.week == reference.week && bucket.year == reference.year,
            FilterMode::Month => {
                bucket.month == reference.month && bucket.year == reference.year
            }
            FilterMode::Year => bucket.year == reference.year,
            FilterMode::All => true,
        }
    }

    pub fn window_label(self, reference: &Bucket) -> String {
        match self {
            FilterMode::Week => format!("week {} of {}", reference.week, reference.year),
            FilterMode::Month => format!(
                "{} {}",
                calendar::month_name(reference.month),
                reference.year
            ),
            FilterMode::Year => reference.year.to_string(),
            FilterMode::All => "all time".to_string(),
        }
    }
}
