use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{ExerciseEntry, FoodEntry};

/// A logged row that belongs to one calendar day and carries a calorie value.
pub trait LoggedRow {
    fn date_key(&self) -> &str;
    fn calories(&self) -> f64;
}

impl LoggedRow for FoodEntry {
    fn date_key(&self) -> &str {
        &self.eaten_at
    }

    fn calories(&self) -> f64 {
        self.calories
    }
}

impl LoggedRow for ExerciseEntry {
    fn date_key(&self) -> &str {
        &self.completed_at
    }

    fn calories(&self) -> f64 {
        self.calories_burned
    }
}

/// Derived, never stored. `net` is always `eaten - burned`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayTotals {
    pub date: Option<String>,
    pub eaten: f64,
    pub burned: f64,
    pub net: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    /// Oldest day first.
    Ascending,
    /// Most recent day first.
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket<T> {
    pub date: String,
    pub entries: Vec<T>,
    pub total_calories: f64,
}

/// Sum one day's rows. The caller has already filtered by user and date;
/// nothing is filtered here.
#[must_use]
pub fn aggregate_day(foods: &[FoodEntry], exercises: &[ExerciseEntry]) -> DayTotals {
    let eaten: f64 = foods.iter().map(|f| f.calories).sum();
    let burned: f64 = exercises.iter().map(|e| e.calories_burned).sum();
    let protein: f64 = foods.iter().map(|f| f.protein.unwrap_or(0.0)).sum();
    let carbs: f64 = foods.iter().map(|f| f.carbs.unwrap_or(0.0)).sum();
    let fat: f64 = foods.iter().map(|f| f.fat.unwrap_or(0.0)).sum();

    let date = foods
        .first()
        .map(LoggedRow::date_key)
        .or_else(|| exercises.first().map(LoggedRow::date_key))
        .map(str::to_string);

    DayTotals {
        date,
        eaten,
        burned,
        net: eaten - burned,
        protein,
        carbs,
        fat,
    }
}

/// One bucket per distinct date key. Entries keep their input order inside
/// a bucket.
#[must_use]
pub fn group_by_date<T: LoggedRow + Clone>(rows: &[T], order: DateOrder) -> Vec<DayBucket<T>> {
    let mut by_date: BTreeMap<&str, Vec<T>> = BTreeMap::new();
    for row in rows {
        by_date.entry(row.date_key()).or_default().push(row.clone());
    }

    let into_bucket = |(date, entries): (&str, Vec<T>)| {
        let total_calories = entries.iter().map(LoggedRow::calories).sum();
        DayBucket {
            date: date.to_string(),
            entries,
            total_calories,
        }
    };

    match order {
        DateOrder::Ascending => by_date.into_iter().map(into_bucket).collect(),
        DateOrder::Descending => by_date.into_iter().rev().map(into_bucket).collect(),
    }
}
