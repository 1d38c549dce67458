use std::sync::Arc;

use chrono::NaiveDate;

use crate::calendar;
use crate::config::Roster;
use crate::feed::Snapshot;
use crate::models::{
    coerce_count, Bucket, Counters, Entry, FilterMode, MemberTotals, Metric, NewEntry,
    RankedMember, Tally,
};
use crate::stats;
use crate::store::{EntryStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Locked,
    Unlocked,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Enter the PIN before submitting")]
    Locked,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
#[error("{0} is not on the roster")]
pub struct UnknownMember(pub String);

#[derive(Debug, Clone)]
pub struct Submitted {
    pub entry: Entry,
    pub celebrate: bool,
}

/// Everything the dashboard displays, derived from the entry snapshot and the
/// current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub filter: FilterMode,
    pub selected_date: NaiveDate,
    pub bucket: Bucket,
    pub totals: Vec<MemberTotals>,
    pub ranking: Vec<RankedMember>,
    pub grand_total: Tally,
    pub loading: bool,
}

impl DashboardView {
    pub fn window_label(&self) -> String {
        self.filter.window_label(&self.bucket)
    }
}

/// Transient state owned by one dashboard session. Nothing here is persisted.
pub struct Dashboard {
    roster: Roster,
    pin: String,
    gate: Gate,
    filter: FilterMode,
    selected_date: NaiveDate,
    active: String,
    form: Counters,
    snapshot: Snapshot,
}

impl Dashboard {
    pub fn new(roster: Roster, pin: impl Into<String>, today: NaiveDate) -> Self {
        let active = roster.members()[0].clone();
        Self {
            roster,
            pin: pin.into(),
            gate: Gate::Locked,
            filter: FilterMode::default(),
            selected_date: today,
            active,
            form: Counters::default(),
            snapshot: Snapshot::default(),
        }
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    /// Exact comparison against the configured PIN. Any number of attempts
    /// is allowed and the gate never locks again.
    pub fn unlock(&mut self, attempt: &str) -> bool {
        if attempt == self.pin {
            self.gate = Gate::Unlocked;
        }
        self.gate == Gate::Unlocked
    }

    pub fn select_member(&mut self, name: &str) -> Result<(), UnknownMember> {
        if !self.roster.contains(name) {
            return Err(UnknownMember(name.to_string()));
        }
        self.active = name.to_string();
        Ok(())
    }

    pub fn active_member(&self) -> &str {
        &self.active
    }

    pub fn set_filter(&mut self, filter: FilterMode) {
        self.filter = filter;
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
    }

    pub fn set_field(&mut self, metric: Metric, raw: &str) {
        self.form.set(metric, coerce_count(raw));
    }

    pub fn form(&self) -> Counters {
        self.form
    }

    pub fn reset_form(&mut self) {
        self.form = Counters::default();
    }

    pub fn entries(&self) -> Arc<[Entry]> {
        self.snapshot.entries.clone()
    }

    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
    }

    pub fn view(&self) -> DashboardView {
        let bucket = calendar::bucket(self.selected_date);
        let totals = stats::aggregate(&self.snapshot.entries, &self.roster, self.filter, &bucket);
        let ranking = stats::rank(&totals);
        let grand_total = stats::grand_total(&totals);

        DashboardView {
            filter: self.filter,
            selected_date: self.selected_date,
            bucket,
            totals,
            ranking,
            grand_total,
            loading: !self.snapshot.loaded,
        }
    }

    /// Appends the form as a new entry for the active member on the selected
    /// date. The form is only cleared once the store has accepted the entry.
    pub async fn submit(&mut self, store: &dyn EntryStore) -> Result<Submitted, SubmitError> {
        if self.gate == Gate::Locked {
            return Err(SubmitError::Locked);
        }

        let entry = NewEntry::new(self.active.clone(), self.selected_date, self.form);
        let entry = match store.append(entry).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!(name = %self.active, "Submission failed: {}", err);
                return Err(err.into());
            }
        };

        self.reset_form();
        let celebrate = entry.counters.placements > 0;
        Ok(Submitted { entry, celebrate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ROSTER;
    use crate::store::{MemoryStore, UnavailableStore};

    const PIN: &str = "2580";

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn dashboard() -> Dashboard {
        let roster = Roster::new(DEFAULT_ROSTER.iter().map(|name| name.to_string()).collect())
            .unwrap();
        Dashboard::new(roster, PIN, date(2024, 3, 13))
    }

    async fn refresh(dashboard: &mut Dashboard, store: &MemoryStore) {
        dashboard.apply_snapshot(Snapshot {
            entries: store.list().await.unwrap().into(),
            loaded: true,
        });
    }

    #[test]
    fn wrong_pins_keep_the_gate_locked() {
        let mut dashboard = dashboard();
        assert_eq!(dashboard.gate(), Gate::Locked);
        assert!(!dashboard.unlock("0000"));
        assert!(!dashboard.unlock("2580 "));
        assert!(!dashboard.unlock(""));
        assert_eq!(dashboard.gate(), Gate::Locked);

        assert!(dashboard.unlock(PIN));
        assert!(dashboard.unlock("wrong"));
        assert_eq!(dashboard.gate(), Gate::Unlocked);
    }

    #[test]
    fn form_fields_are_coerced() {
        let mut dashboard = dashboard();
        dashboard.set_field(Metric::Intakes, "4");
        dashboard.set_field(Metric::Interviews, "lots");
        dashboard.set_field(Metric::Placements, "");
        dashboard.set_field(Metric::Prospects, "2.5");

        let form = dashboard.form();
        assert_eq!(form.intakes, 4);
        assert_eq!(form.interviews, 0);
        assert_eq!(form.placements, 0);
        assert_eq!(form.prospects, 2);

        dashboard.reset_form();
        assert_eq!(dashboard.form(), Counters::default());
    }

    #[test]
    fn only_roster_members_can_be_selected() {
        let mut dashboard = dashboard();
        assert_eq!(dashboard.active_member(), "Marcus");
        assert!(dashboard.select_member("Sofia").is_ok());
        assert_eq!(dashboard.active_member(), "Sofia");
        assert!(dashboard.select_member("Zed").is_err());
        assert_eq!(dashboard.active_member(), "Sofia");
    }

    #[test]
    fn view_is_loading_until_the_first_snapshot() {
        let mut dashboard = dashboard();
        assert!(dashboard.view().loading);

        dashboard.apply_snapshot(Snapshot {
            entries: Vec::new().into(),
            loaded: true,
        });
        let view = dashboard.view();
        assert!(!view.loading);
        assert_eq!(view.totals.len(), 7);
        assert_eq!(view.grand_total, Tally::default());
        assert_eq!(view.window_label(), "week 11 of 2024");
    }

    #[tokio::test]
    async fn locked_dashboard_refuses_to_submit() {
        let store = MemoryStore::new();
        let mut dashboard = dashboard();
        dashboard.set_field(Metric::Placements, "1");

        let result = dashboard.submit(&store).await;
        assert!(matches!(result, Err(SubmitError::Locked)));
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(dashboard.form().placements, 1);
    }

    #[tokio::test]
    async fn submitted_placements_show_up_in_the_week_view() {
        let store = MemoryStore::new();
        let mut dashboard = dashboard();
        dashboard.unlock(PIN);

        dashboard.select_member("Sofia").unwrap();
        dashboard.set_field(Metric::Placements, "2");
        dashboard.submit(&store).await.unwrap();
        refresh(&mut dashboard, &store).await;
        let before = dashboard.view();

        dashboard.select_member("Marcus").unwrap();
        dashboard.set_field(Metric::Placements, "3");
        let submitted = dashboard.submit(&store).await.unwrap();
        assert!(submitted.celebrate);
        assert_eq!(submitted.entry.bucket, calendar::bucket(date(2024, 3, 13)));
        assert_eq!(dashboard.form(), Counters::default());

        refresh(&mut dashboard, &store).await;
        let after = dashboard.view();

        for (old, new) in before.totals.iter().zip(after.totals.iter()) {
            if new.name == "Marcus" {
                assert_eq!(new.tally.placements, old.tally.placements + 3);
            } else {
                assert_eq!(new, old);
            }
        }
        assert_eq!(after.ranking[0].name, "Marcus");
        assert_eq!(after.grand_total.placements, 5);
    }

    #[tokio::test]
    async fn entries_without_placements_do_not_celebrate() {
        let store = MemoryStore::new();
        let mut dashboard = dashboard();
        dashboard.unlock(PIN);
        dashboard.set_field(Metric::Intakes, "6");

        let submitted = dashboard.submit(&store).await.unwrap();
        assert!(!submitted.celebrate);
        assert_eq!(submitted.entry.counters.intakes, 6);
    }

    #[tokio::test]
    async fn double_submit_stores_two_entries() {
        let store = MemoryStore::new();
        let mut dashboard = dashboard();
        dashboard.unlock(PIN);

        dashboard.set_field(Metric::Intakes, "1");
        dashboard.submit(&store).await.unwrap();
        dashboard.set_field(Metric::Intakes, "1");
        dashboard.submit(&store).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_submission_keeps_the_form() {
        let mut dashboard = dashboard();
        dashboard.unlock(PIN);
        dashboard.set_field(Metric::Interviews, "4");

        let result = dashboard.submit(&UnavailableStore).await;
        assert!(matches!(
            result,
            Err(SubmitError::Store(StoreError::Unavailable))
        ));
        assert_eq!(dashboard.form().interviews, 4);
    }

    #[tokio::test]
    async fn changing_the_window_recomputes_from_the_same_snapshot() {
        let store = MemoryStore::new();
        let mut dashboard = dashboard();
        dashboard.unlock(PIN);

        dashboard.set_date(date(2024, 3, 4));
        dashboard.set_field(Metric::Prospects, "5");
        dashboard.submit(&store).await.unwrap();
        dashboard.set_date(date(2024, 3, 13));
        dashboard.set_field(Metric::Prospects, "7");
        dashboard.submit(&store).await.unwrap();
        refresh(&mut dashboard, &store).await;

        assert_eq!(dashboard.view().grand_total.prospects, 7);
        dashboard.set_filter(FilterMode::Month);
        assert_eq!(dashboard.view().grand_total.prospects, 12);
        assert_eq!(dashboard.entries().len(), 2);
    }
}
