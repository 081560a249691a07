use anyhow::Result;
use chrono::Local;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::aggregate::DateOrder;
use nutrilog_core::service::{DaySummary, NutrilogService, Session};

use super::helpers::{fmt_grams, format_progress, no_neg_zero, parse_date, truncate};

pub(super) fn print_day_summary(summary: &DaySummary) {
    let date = &summary.date;
    println!("=== {date} ===\n");

    if !summary.foods.is_empty() {
        println!("  FOOD");
        for f in &summary.foods {
            let id = f.id.unwrap_or_default();
            let name = truncate(&f.name, 40);
            let cal = f.calories;
            let p = fmt_grams(f.protein);
            let c = fmt_grams(f.carbs);
            let fat = fmt_grams(f.fat);
            println!("    [{id}] {name}: {cal:.0} kcal | P:{p} C:{c} F:{fat}");
        }
        println!();
    }

    if !summary.exercises.is_empty() {
        println!("  EXERCISE");
        for e in &summary.exercises {
            let id = e.id.unwrap_or_default();
            let name = truncate(&e.exercise, 40);
            let burned = e.calories_burned;
            println!("    [{id}] {name}: {burned:.0} kcal");
        }
        println!();
    }

    let t = &summary.totals;
    let eaten = no_neg_zero(t.eaten);
    let burned = no_neg_zero(t.burned);
    let net = no_neg_zero(t.net);
    println!("  EATEN {eaten:.0} kcal - BURNED {burned:.0} kcal = NET {net:.0} kcal\n");

    let g = &summary.goals;
    println!("  {}", format_progress("Calories", t.net, "kcal", &g.calories));
    println!("  {}", format_progress("Protein", t.protein, "g", &g.protein));
    println!("  {}", format_progress("Carbs", t.carbs, "g", &g.carbs));
    println!("  {}", format_progress("Fat", t.fat, "g", &g.fat));
}

pub(crate) fn cmd_summary(
    svc: &NutrilogService,
    session: &Session,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.day_summary(session, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.foods.is_empty() && summary.exercises.is_empty() {
        let date = &summary.date;
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    print_day_summary(&summary);
    Ok(())
}

/// Full food and exercise log grouped by day.
pub(crate) fn cmd_log(
    svc: &NutrilogService,
    session: &Session,
    oldest_first: bool,
    json: bool,
) -> Result<()> {
    let order = if oldest_first {
        DateOrder::Ascending
    } else {
        DateOrder::Descending
    };
    let foods = svc.food_log(session, order)?;
    let exercises = svc.exercise_log(session, order)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "foods": foods,
                "exercises": exercises,
            }))?
        );
        return Ok(());
    }

    if foods.is_empty() && exercises.is_empty() {
        eprintln!("Nothing logged yet. Use `nutrilog food log` to add an entry.");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct LogRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Kind")]
        kind: &'static str,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
    }

    let mut rows: Vec<LogRow> = Vec::new();
    for bucket in &foods {
        for f in &bucket.entries {
            rows.push(LogRow {
                date: bucket.date.clone(),
                id: f.id.unwrap_or_default(),
                kind: "food",
                name: truncate(&f.name, 35),
                calories: format!("{:.0}", f.calories),
            });
        }
    }
    for bucket in &exercises {
        for e in &bucket.entries {
            rows.push(LogRow {
                date: bucket.date.clone(),
                id: e.id.unwrap_or_default(),
                kind: "exercise",
                name: truncate(&e.exercise, 35),
                calories: format!("-{:.0}", e.calories_burned),
            });
        }
    }
    // Stable sort keeps foods ahead of exercises within a day
    if oldest_first {
        rows.sort_by(|a, b| a.date.cmp(&b.date));
    } else {
        rows.sort_by(|a, b| b.date.cmp(&a.date));
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_history(
    svc: &NutrilogService,
    session: &Session,
    days: u32,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Eaten")]
        eaten: String,
        #[tabled(rename = "Burned")]
        burned: String,
        #[tabled(rename = "Net")]
        net: String,
    }

    let report = svc.recent_history(session, days, Local::now().date_naive())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.points.is_empty() {
        eprintln!("No entries in the last {days} days");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = report
        .points
        .iter()
        .map(|p| HistoryRow {
            date: p.date.clone(),
            eaten: format!("{:.0}", no_neg_zero(p.eaten)),
            burned: format!("{:.0}", no_neg_zero(p.burned)),
            net: format!("{:.0}", no_neg_zero(p.net)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    if let Some(avg) = report.average_net {
        println!("Average net: {:.0} kcal/day", no_neg_zero(avg));
    }
    let streak = report.streak;
    println!("Logging streak: {streak} day{}", if streak == 1 { "" } else { "s" });

    Ok(())
}
