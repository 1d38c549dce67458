use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use futures::StreamExt;
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::Roster;
use crate::models::{coerce_count, Bucket, Counters, Entry, NewEntry};
use crate::store::{ChangeStream, EntryStore, StoreError};

const CHANGE_CHANNEL: &str = "kpi_entries";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgEntryStore {
    pool: PgPool,
}

impl PgEntryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntryStore for PgEntryStore {
    async fn append(&self, entry: NewEntry) -> Result<Entry, StoreError> {
        let id = Uuid::new_v4();
        let created_at = sqlx::query(
            r#"
            INSERT INTO kpi_dashboard.entries
            (id, name, entry_date, week, month, year,
             intakes, interviews, placements, prospects)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(&entry.name)
        .bind(entry.date)
        .bind(entry.bucket.week as i32)
        .bind(entry.bucket.month as i32)
        .bind(entry.bucket.year)
        .bind(i64::from(entry.counters.intakes))
        .bind(i64::from(entry.counters.interviews))
        .bind(i64::from(entry.counters.placements))
        .bind(i64::from(entry.counters.prospects))
        .fetch_one(&self.pool)
        .await?
        .get("created_at");

        tracing::info!(%id, name = %entry.name, date = %entry.date, "Appended entry");
        Ok(Entry::from_new(id, entry, created_at))
    }

    async fn list(&self) -> Result<Vec<Entry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, name, entry_date, week, month, year, \
             intakes, interviews, placements, prospects, created_at \
             FROM kpi_dashboard.entries \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn changes(&self) -> Result<ChangeStream, StoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let stream = listener.into_stream().filter_map(|notification| async move {
            match notification {
                Ok(_) => Some(()),
                Err(err) => {
                    tracing::warn!("Change listener error: {}", err);
                    None
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

fn entry_from_row(row: &PgRow) -> Entry {
    Entry {
        id: row.get("id"),
        name: row.get("name"),
        date: row.get("entry_date"),
        bucket: Bucket {
            week: non_negative(row.get::<i32, _>("week")),
            month: non_negative(row.get::<i32, _>("month")),
            year: row.get("year"),
        },
        counters: Counters {
            intakes: count(row.get::<i64, _>("intakes")),
            interviews: count(row.get::<i64, _>("interviews")),
            placements: count(row.get::<i64, _>("placements")),
            prospects: count(row.get::<i64, _>("prospects")),
        },
        created_at: row.get("created_at"),
    }
}

fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Inserts unless an entry with the same source key already exists.
async fn insert_keyed(
    pool: &PgPool,
    entry: &NewEntry,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO kpi_dashboard.entries
        (id, name, entry_date, week, month, year,
         intakes, interviews, placements, prospects, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&entry.name)
    .bind(entry.date)
    .bind(entry.bucket.week as i32)
    .bind(entry.bucket.month as i32)
    .bind(entry.bucket.year)
    .bind(i64::from(entry.counters.intakes))
    .bind(i64::from(entry.counters.interviews))
    .bind(i64::from(entry.counters.placements))
    .bind(i64::from(entry.counters.prospects))
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Demo entries for the last three weeks, keyed so re-running is a no-op
/// for the same day.
pub async fn seed(pool: &PgPool, roster: &Roster) -> anyhow::Result<usize> {
    let today = Utc::now().date_naive();
    let mut inserted = 0usize;

    for (index, name) in roster.members().iter().enumerate() {
        let index = index as u32;
        for days_ago in [0i64, 3, 9, 17] {
            let date = today - Duration::days(days_ago);
            let spread = (days_ago as u32 + index) % 5;
            let counters = Counters {
                intakes: 2 + spread,
                interviews: 1 + (spread + index) % 4,
                placements: u32::from(spread % 3 == 0),
                prospects: 1 + index % 3,
            };
            let entry = NewEntry::new(name.clone(), date, counters);
            let source_key = format!("seed-{}-{}", name.to_lowercase(), date);

            if insert_keyed(pool, &entry, &source_key).await? {
                inserted += 1;
            }
        }
    }

    Ok(inserted)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        date: NaiveDate,
        #[serde(default)]
        intakes: String,
        #[serde(default)]
        interviews: String,
        #[serde(default)]
        placements: String,
        #[serde(default)]
        prospects: String,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let counters = Counters {
            intakes: coerce_count(&row.intakes),
            interviews: coerce_count(&row.interviews),
            placements: coerce_count(&row.placements),
            prospects: coerce_count(&row.prospects),
        };
        let entry = NewEntry::new(row.name.trim(), row.date, counters);
        let source_key = row
            .source_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_keyed(pool, &entry, &source_key).await? {
            inserted += 1;
        }
    }

    tracing::info!(inserted, path = %csv_path.display(), "Imported entries");
    Ok(inserted)
}
