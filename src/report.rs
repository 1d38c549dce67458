use std::fmt::Write;

use crate::dashboard::DashboardView;
use crate::models::{Entry, MemberTotals, Metric};

const BAR_WIDTH: usize = 24;

pub fn decoration(position: usize) -> &'static str {
    match position {
        1 => "🥇",
        2 => "🥈",
        3 => "🥉",
        _ => "🏁",
    }
}

/// Horizontal bar scaled so the largest value fills `width` cells.
pub fn bar(value: u64, max: u64, width: usize) -> String {
    if max == 0 || value == 0 {
        return String::new();
    }
    let cells = ((value as f64 / max as f64) * width as f64).round() as usize;
    "█".repeat(cells.clamp(1, width))
}

pub fn chart_lines(totals: &[MemberTotals], metric: Metric) -> Vec<String> {
    let max = totals
        .iter()
        .map(|member| member.tally.get(metric))
        .max()
        .unwrap_or(0);
    let name_width = totals
        .iter()
        .map(|member| member.name.chars().count())
        .max()
        .unwrap_or(0);

    totals
        .iter()
        .map(|member| {
            let value = member.tally.get(metric);
            format!(
                "{:<name_width$} {:<bar_width$} {}",
                member.name,
                bar(value, max, BAR_WIDTH),
                value,
                name_width = name_width,
                bar_width = BAR_WIDTH,
            )
        })
        .collect()
}

pub fn build_report(view: &DashboardView, recent: &[Entry]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Consultant KPI Dashboard");
    let _ = writeln!(
        output,
        "Showing {} (selected date {})",
        view.window_label(),
        view.selected_date
    );
    let _ = writeln!(output);

    if view.loading {
        let _ = writeln!(output, "Loading entries...");
        return output;
    }

    let _ = writeln!(output, "## Totals");
    for metric in Metric::ALL {
        let _ = writeln!(output, "- {}: {}", metric.label(), view.grand_total.get(metric));
    }

    for metric in Metric::ALL {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", metric.label());
        let _ = writeln!(output, "```");
        for line in chart_lines(&view.totals, metric) {
            let _ = writeln!(output, "{}", line.trim_end());
        }
        let _ = writeln!(output, "```");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Ranking");
    for member in view.ranking.iter() {
        let _ = writeln!(
            output,
            "{} {}. {}: {} placements, {} intakes, {} interviews",
            decoration(member.position),
            member.position,
            member.name,
            member.tally.placements,
            member.tally.intakes,
            member.tally.interviews
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Latest Entries");

    if recent.is_empty() {
        let _ = writeln!(output, "No entries recorded yet.");
    } else {
        for entry in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} on {} (week {}): {} intakes, {} interviews, {} placements, {} prospects",
                entry.name,
                entry.date,
                entry.bucket.week,
                entry.counters.intakes,
                entry.counters.interviews,
                entry.counters.placements,
                entry.counters.prospects
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::calendar;
    use crate::models::{FilterMode, Tally};
    use crate::stats;

    fn member(name: &str, placements: u64, intakes: u64) -> MemberTotals {
        MemberTotals {
            name: name.to_string(),
            tally: Tally {
                placements,
                intakes,
                ..Tally::default()
            },
        }
    }

    fn view(totals: Vec<MemberTotals>, loading: bool) -> DashboardView {
        let selected_date = NaiveDate::from_ymd_opt(2024, 3, 13).unwrap();
        DashboardView {
            filter: FilterMode::Week,
            selected_date,
            bucket: calendar::bucket(selected_date),
            ranking: stats::rank(&totals),
            grand_total: stats::grand_total(&totals),
            totals,
            loading,
        }
    }

    #[test]
    fn top_three_get_medals() {
        assert_eq!(decoration(1), "🥇");
        assert_eq!(decoration(2), "🥈");
        assert_eq!(decoration(3), "🥉");
        assert_eq!(decoration(4), "🏁");
    }

    #[test]
    fn bars_scale_to_the_largest_value() {
        assert_eq!(bar(0, 10, 20), "");
        assert_eq!(bar(5, 0, 20), "");
        assert_eq!(bar(10, 10, 20).chars().count(), 20);
        assert_eq!(bar(5, 10, 20).chars().count(), 10);
        assert_eq!(bar(1, 1000, 20).chars().count(), 1);
    }

    #[test]
    fn chart_has_one_line_per_member() {
        let totals = vec![member("Marcus", 4, 0), member("Sofia", 2, 0)];
        let lines = chart_lines(&totals, Metric::Placements);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Marcus"));
        assert!(lines[0].ends_with(" 4"));
        assert!(lines[1].ends_with(" 2"));
    }

    #[test]
    fn report_includes_totals_and_ranking() {
        let report = build_report(
            &view(vec![member("Marcus", 1, 3), member("Sofia", 2, 1)], false),
            &[],
        );

        assert!(report.contains("Showing week 11 of 2024"));
        assert!(report.contains("- Placements: 3"));
        assert!(report.contains("- Intakes: 4"));
        assert!(report.contains("🥇 1. Sofia: 2 placements"));
        assert!(report.contains("🥈 2. Marcus: 1 placements"));
        assert!(report.contains("No entries recorded yet."));
    }

    #[test]
    fn loading_report_skips_the_figures() {
        let report = build_report(&view(vec![member("Marcus", 0, 0)], true), &[]);
        assert!(report.contains("Loading entries..."));
        assert!(!report.contains("## Ranking"));
    }
}
