use std::collections::BTreeSet;
use std::io::Read;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::db::Database;
use crate::models::{FoodEntry, FoodRow, NewFoodEntry, date_key_of, validate_new_food};

/// A food row read from a CSV export, ready to insert.
#[derive(Debug, Clone)]
pub struct CsvFood {
    pub line: usize,
    pub food: NewFoodEntry,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCsv {
    pub foods: Vec<CsvFood>,
    pub skipped_blank: usize,
    pub skipped_bad_date: usize,
    pub skipped_invalid: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CsvImportSummary {
    pub rows_parsed: usize,
    pub imported: usize,
    pub skipped_blank: usize,
    pub skipped_bad_date: usize,
    pub skipped_invalid: usize,
    pub dates_spanned: usize,
    pub total_calories: f64,
    pub dry_run: bool,
}

/// Accepts `YYYY-MM-DD` (optionally followed by a time), `M/D/YYYY` and
/// `D/M/YYYY`, tried in that order.
fn parse_csv_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(date_key_of(raw), "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Some(d);
    }
    NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok()
}

/// Parse a food log CSV from any reader.
///
/// Required columns: `date` (or `eaten_at`), `name` (or `food`) and
/// `calories`. `protein`, `carbs` and `fat` are optional. Header matching is
/// case-insensitive. Numeric cells are read leniently: blank or junk
/// calories count as 0, blank or junk macros are left unset.
pub fn parse_foods_csv<R: Read>(reader: R) -> Result<ParsedCsv> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let col = |names: &[&str]| -> Option<usize> {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };

    let Some(idx_date) = col(&["date", "eaten_at"]) else {
        bail!("Missing required column: date");
    };
    let Some(idx_name) = col(&["name", "food", "food name"]) else {
        bail!("Missing required column: name");
    };
    let Some(idx_cal) = col(&["calories"]) else {
        bail!("Missing required column: calories");
    };
    let idx_protein = col(&["protein", "protein (g)"]);
    let idx_carbs = col(&["carbs", "carbohydrates", "carbohydrates (g)"]);
    let idx_fat = col(&["fat", "fat (g)"]);

    let mut parsed = ParsedCsv::default();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let cell = |idx: Option<usize>| -> Value {
            idx.and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map_or(Value::Null, |v| Value::String(v.to_string()))
        };

        let name = record.get(idx_name).unwrap_or("").to_string();
        let raw_date = record.get(idx_date).unwrap_or("");
        if name.is_empty() && raw_date.is_empty() {
            parsed.skipped_blank += 1;
            continue;
        }

        let Some(eaten_at) = parse_csv_date(raw_date) else {
            parsed.skipped_bad_date += 1;
            continue;
        };

        let entry = FoodEntry::from(FoodRow {
            name: Some(name),
            calories: cell(Some(idx_cal)),
            protein: cell(idx_protein),
            carbs: cell(idx_carbs),
            fat: cell(idx_fat),
            ..FoodRow::default()
        });

        let food = NewFoodEntry {
            name: entry.name,
            calories: entry.calories,
            protein: entry.protein,
            carbs: entry.carbs,
            fat: entry.fat,
            eaten_at,
        };
        if validate_new_food(&food).is_err() {
            parsed.skipped_invalid += 1;
            continue;
        }

        parsed.foods.push(CsvFood { line, food });
    }

    Ok(parsed)
}

/// Insert parsed rows for one user. When `dry_run` is true, nothing is
/// written and the summary reports what would have been imported.
pub fn import_foods(
    db: &Database,
    user_id: &str,
    parsed: &ParsedCsv,
    dry_run: bool,
) -> Result<CsvImportSummary> {
    let mut dates = BTreeSet::new();
    let mut total_calories = 0.0;

    for row in &parsed.foods {
        dates.insert(row.food.eaten_at);
        total_calories += row.food.calories;
        if !dry_run {
            db.insert_food(user_id, &row.food)
                .with_context(|| format!("Failed to import CSV row {}", row.line))?;
        }
    }

    Ok(CsvImportSummary {
        rows_parsed: parsed.foods.len()
            + parsed.skipped_blank
            + parsed.skipped_bad_date
            + parsed.skipped_invalid,
        imported: parsed.foods.len(),
        skipped_blank: parsed.skipped_blank,
        skipped_bad_date: parsed.skipped_bad_date,
        skipped_invalid: parsed.skipped_invalid,
        dates_spanned: dates.len(),
        total_calories,
        dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Date,Name,Calories,Protein,Carbs,Fat
2024-01-01,Oatmeal,300,10,54,5
2024-01-01,Coffee,,,,
01/02/2024,Salad,abc,3,,2
not-a-date,Ghost,100,,,
,,,,,
2024-01-03,Broken,-50,,,
";

    #[test]
    fn test_parse_foods_csv() {
        let parsed = parse_foods_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(parsed.foods.len(), 3);
        assert_eq!(parsed.skipped_bad_date, 1);
        assert_eq!(parsed.skipped_blank, 1);
        assert_eq!(parsed.skipped_invalid, 1);

        let oatmeal = &parsed.foods[0].food;
        assert_eq!(oatmeal.name, "Oatmeal");
        assert!((oatmeal.calories - 300.0).abs() < f64::EPSILON);
        assert_eq!(oatmeal.protein, Some(10.0));
        assert_eq!(parsed.foods[0].line, 2);

        // Blank calories coerce to zero, blank macros stay unset
        let coffee = &parsed.foods[1].food;
        assert_eq!(coffee.calories, 0.0);
        assert_eq!(coffee.protein, None);

        // M/D/YYYY and junk calories
        let salad = &parsed.foods[2].food;
        assert_eq!(salad.eaten_at, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(salad.calories, 0.0);
        assert_eq!(salad.fat, Some(2.0));
    }

    #[test]
    fn test_parse_accepts_alternate_headers() {
        let csv = "eaten_at,Food,CALORIES,Carbohydrates (g)\n2024-02-01T12:00:00Z,Pasta,650,90\n";
        let parsed = parse_foods_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.foods.len(), 1);
        assert_eq!(parsed.foods[0].food.carbs, Some(90.0));
        assert_eq!(
            parsed.foods[0].food.eaten_at,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_missing_required_column() {
        let err = parse_foods_csv("Date,Name\n2024-01-01,Apple\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("calories"));
    }

    #[test]
    fn test_import_dry_run_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let parsed = parse_foods_csv(SAMPLE.as_bytes()).unwrap();
        let summary = import_foods(&db, "u1", &parsed, true).unwrap();
        assert!(summary.dry_run);
        assert_eq!(summary.imported, 3);
        assert_eq!(summary.rows_parsed, 6);
        assert_eq!(summary.dates_spanned, 2);
        assert!((summary.total_calories - 300.0).abs() < f64::EPSILON);
        assert!(db.all_foods("u1").unwrap().is_empty());
    }

    #[test]
    fn test_import_writes_rows() {
        let db = Database::open_in_memory().unwrap();
        let parsed = parse_foods_csv(SAMPLE.as_bytes()).unwrap();
        let summary = import_foods(&db, "u1", &parsed, false).unwrap();
        assert!(!summary.dry_run);
        assert_eq!(db.all_foods("u1").unwrap().len(), 3);
        let jan1 = db
            .foods_for_date("u1", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
        assert_eq!(jan1.len(), 2);
    }
}
