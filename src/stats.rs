use crate::config::Roster;
use crate::models::{Bucket, Entry, FilterMode, MemberTotals, RankedMember, Tally};

/// Sums the entries inside the selected window, one record per roster member
/// in roster order. Entries for names outside the roster are skipped.
pub fn aggregate(
    entries: &[Entry],
    roster: &Roster,
    filter: FilterMode,
    reference: &Bucket,
) -> Vec<MemberTotals> {
    let mut totals: Vec<MemberTotals> = roster
        .members()
        .iter()
        .map(|name| MemberTotals {
            name: name.clone(),
            tally: Tally::default(),
        })
        .collect();

    for entry in entries.iter() {
        if !filter.matches(&entry.bucket, reference) {
            continue;
        }

        if let Some(index) = roster.position(&entry.name) {
            totals[index].tally.add(&entry.counters);
        }
    }

    totals
}

pub fn grand_total(totals: &[MemberTotals]) -> Tally {
    let mut sum = Tally::default();
    for member in totals.iter() {
        sum.merge(&member.tally);
    }
    sum
}

/// Orders by placements, then intakes, then interviews, all descending.
/// Full ties keep their incoming order.
pub fn rank(totals: &[MemberTotals]) -> Vec<RankedMember> {
    let mut ordered: Vec<&MemberTotals> = totals.iter().collect();
    ordered.sort_by(|a, b| {
        b.tally
            .placements
            .cmp(&a.tally.placements)
            .then_with(|| b.tally.intakes.cmp(&a.tally.intakes))
            .then_with(|| b.tally.interviews.cmp(&a.tally.interviews))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, member)| RankedMember {
            position: index + 1,
            name: member.name.clone(),
            tally: member.tally,
        })
        .collect()
}
