use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::service::{CalorieEstimator, NutrilogService, Session};

use super::helpers::{fmt_grams, format_progress, parse_date, truncate};

/// Estimate a free-text meal, show how the day would look, and optionally
/// log the items.
///
/// `estimator` may block; async callers wrap this in `block_in_place`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_estimate(
    svc: &NutrilogService,
    session: &Session,
    estimator: &dyn CalorieEstimator,
    description: &str,
    date: Option<String>,
    log: bool,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let preview = svc.preview_estimate(estimator, session, description, date)?;

    let logged = if log {
        svc.log_estimate(session, &preview.items, date)?
    } else {
        Vec::new()
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "preview": preview,
                "logged": logged,
            }))?
        );
        return Ok(());
    }

    if preview.items.is_empty() {
        eprintln!("The estimator found nothing to log in '{description}'");
        return Ok(());
    }

    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<ItemRow> = preview
        .items
        .iter()
        .map(|i| ItemRow {
            name: truncate(&i.name, 35),
            calories: format!("{:.0}", i.calories),
            protein: fmt_grams(i.protein),
            carbs: fmt_grams(i.carbs),
            fat: fmt_grams(i.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let total = preview.estimated_calories;
    println!("Estimated: {total:.0} kcal");
    println!(
        "{}",
        format_progress(
            "With this",
            preview.projected.net,
            "kcal",
            &preview.goals.calories
        )
    );

    if log {
        println!("Logged {} item(s) for {}", logged.len(), preview.date);
    } else {
        println!("Preview only. Re-run with --log to save these items.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use chrono::NaiveDate;
    use nutrilog_core::estimate::EstimatedItem;

    struct FixedEstimator(Vec<EstimatedItem>);

    impl CalorieEstimator for FixedEstimator {
        fn estimate(&self, _description: &str) -> Result<Vec<EstimatedItem>> {
            Ok(self.0.clone())
        }
    }

    struct DownEstimator;

    impl CalorieEstimator for DownEstimator {
        fn estimate(&self, _description: &str) -> Result<Vec<EstimatedItem>> {
            bail!("Estimation service returned 503 Service Unavailable")
        }
    }

    fn pizza() -> EstimatedItem {
        EstimatedItem {
            name: "Pizza slice".to_string(),
            calories: 285.0,
            protein: Some(12.0),
            carbs: Some(36.0),
            fat: Some(10.0),
        }
    }

    #[test]
    fn test_estimate_preview_does_not_log() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        let estimator = FixedEstimator(vec![pizza()]);

        cmd_estimate(&svc, &session, &estimator, "a slice of pizza", Some("2024-04-01".into()), false, false)
            .unwrap();
        let day = svc
            .day_summary(&session, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
            .unwrap();
        assert!(day.foods.is_empty());
    }

    #[test]
    fn test_estimate_with_log_writes_items() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        let estimator = FixedEstimator(vec![pizza(), pizza()]);

        cmd_estimate(&svc, &session, &estimator, "two slices", Some("2024-04-01".into()), true, true)
            .unwrap();
        let day = svc
            .day_summary(&session, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
            .unwrap();
        assert_eq!(day.foods.len(), 2);
        assert!((day.totals.eaten - 570.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_estimate_errors_propagate() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        assert!(cmd_estimate(&svc, &session, &DownEstimator, "soup", None, true, true).is_err());
        let estimator = FixedEstimator(vec![pizza()]);
        assert!(cmd_estimate(&svc, &session, &estimator, "  ", None, false, true).is_err());
    }
}
