use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use nutrilog_core::goals::GoalProgress;

const BAR_WIDTH: usize = 20;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// `12.5g`, or `-` when the macro was never recorded.
pub(crate) fn fmt_grams(v: Option<f64>) -> String {
    v.map_or("-".into(), |g| format!("{g:.1}g"))
}

/// A fixed-width bar filled to `bar_percent` (already clamped to 0..=100).
pub(crate) fn progress_bar(bar_percent: i64) -> String {
    let pct = usize::try_from(bar_percent.clamp(0, 100)).unwrap_or(0);
    let filled = pct * BAR_WIDTH / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

/// One line of goal progress, e.g. `1800 / 2000 kcal [####--] 90% on target`.
pub(crate) fn format_progress(label: &str, total: f64, unit: &str, progress: &GoalProgress) -> String {
    let total = no_neg_zero(total);
    match progress.evaluation() {
        None => format!("{label:<9} {total:.0} {unit} (no goal)"),
        Some(eval) => {
            let goal = eval.goal;
            let bar = progress_bar(eval.bar_percent);
            let pct = eval.percent;
            let status = eval.status.label();
            let tail = match eval.over_by {
                Some(over) => format!(", {over:.0} {unit} over"),
                None => format!(", {:.0} {unit} left", eval.remaining),
            };
            format!("{label:<9} {total:.0} / {goal:.0} {unit} {bar} {pct}% {status}{tail}")
        }
    }
}
