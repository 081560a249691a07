use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::aggregate::LoggedRow;
use crate::models::{ExerciseEntry, FoodEntry, date_key};

/// Longest range a recent-history request may cover.
pub const MAX_HISTORY_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: String,
    pub eaten: f64,
    pub burned: f64,
    pub net: f64,
}

/// Merge foods and exercises into one point per date, oldest first.
///
/// A date appears once it is referenced by either set; missing sides stay 0.
/// Days with no rows at all are not filled in.
#[must_use]
pub fn build_history(foods: &[FoodEntry], exercises: &[ExerciseEntry]) -> Vec<HistoryPoint> {
    let mut by_date: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

    for food in foods {
        by_date.entry(food.date_key()).or_default().0 += food.calories();
    }
    for exercise in exercises {
        by_date.entry(exercise.date_key()).or_default().1 += exercise.calories();
    }

    by_date
        .into_iter()
        .map(|(date, (eaten, burned))| HistoryPoint {
            date: date.to_string(),
            eaten,
            burned,
            net: eaten - burned,
        })
        .collect()
}

/// Mean net calories across logged days.
#[must_use]
pub fn average_net(points: &[HistoryPoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    let total: f64 = points.iter().map(|p| p.net).sum();
    #[allow(clippy::cast_precision_loss)]
    let days = points.len() as f64;
    Some(total / days)
}

/// Consecutive logged days ending today, or ending yesterday when nothing
/// has been logged yet today.
#[must_use]
pub fn logging_streak<'a, I>(dates: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let logged: HashSet<&str> = dates.into_iter().collect();

    let mut day = today;
    if !logged.contains(date_key(day).as_str()) {
        day -= Duration::days(1);
    }

    let mut streak = 0;
    while logged.contains(date_key(day).as_str()) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn food(date: &str, calories: f64) -> FoodEntry {
        FoodEntry {
            id: None,
            user_id: "u1".to_string(),
            name: "Food".to_string(),
            calories,
            protein: None,
            carbs: None,
            fat: None,
            eaten_at: date.to_string(),
        }
    }

    fn exercise(date: &str, burned: f64) -> ExerciseEntry {
        ExerciseEntry {
            id: None,
            user_id: "u1".to_string(),
            exercise: "Walk".to_string(),
            calories_burned: burned,
            category: Some("cardio".to_string()),
            completed_at: date.to_string(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_history_merge_with_disjoint_dates() {
        let history = build_history(&[food("2024-02-01", 300.0)], &[exercise("2024-02-02", 100.0)]);
        assert_eq!(
            history,
            vec![
                HistoryPoint {
                    date: "2024-02-01".to_string(),
                    eaten: 300.0,
                    burned: 0.0,
                    net: 300.0,
                },
                HistoryPoint {
                    date: "2024-02-02".to_string(),
                    eaten: 0.0,
                    burned: 100.0,
                    net: -100.0,
                },
            ]
        );
    }

    #[test]
    fn test_history_accumulates_same_day() {
        let foods = vec![food("2024-02-01", 300.0), food("2024-02-01", 450.0)];
        let exercises = vec![exercise("2024-02-01", 200.0), exercise("2024-02-01", 50.0)];
        let history = build_history(&foods, &exercises);
        assert_eq!(history.len(), 1);
        assert!((history[0].eaten - 750.0).abs() < f64::EPSILON);
        assert!((history[0].burned - 250.0).abs() < f64::EPSILON);
        assert!((history[0].net - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_history_is_ascending_regardless_of_input_order() {
        let foods = vec![
            food("2024-02-03", 1.0),
            food("2024-01-15", 1.0),
            food("2024-02-01", 1.0),
        ];
        let dates: Vec<String> = build_history(&foods, &[]).into_iter().map(|p| p.date).collect();
        assert_eq!(dates, vec!["2024-01-15", "2024-02-01", "2024-02-03"]);
    }

    #[test]
    fn test_history_does_not_fill_gaps() {
        let history = build_history(&[food("2024-02-01", 1.0), food("2024-02-05", 1.0)], &[]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_history_empty() {
        assert!(build_history(&[], &[]).is_empty());
    }

    #[test]
    fn test_average_net() {
        assert_eq!(average_net(&[]), None);
        let history = build_history(
            &[food("2024-02-01", 2000.0), food("2024-02-02", 1500.0)],
            &[exercise("2024-02-02", 500.0)],
        );
        assert!((average_net(&history).unwrap() - 1500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_logging_streak_counts_back_from_today() {
        let dates = ["2024-03-10", "2024-03-09", "2024-03-08", "2024-03-05"];
        assert_eq!(logging_streak(dates, day("2024-03-10")), 3);
    }

    #[test]
    fn test_logging_streak_allows_today_unlogged() {
        let dates = ["2024-03-09", "2024-03-08"];
        assert_eq!(logging_streak(dates, day("2024-03-10")), 2);
    }

    #[test]
    fn test_logging_streak_broken() {
        let dates = ["2024-03-07", "2024-03-06"];
        assert_eq!(logging_streak(dates, day("2024-03-10")), 0);
        assert_eq!(logging_streak(std::iter::empty(), day("2024-03-10")), 0);
    }

    #[test]
    fn test_logging_streak_ignores_duplicates() {
        let dates = ["2024-03-10", "2024-03-10", "2024-03-09"];
        assert_eq!(logging_streak(dates, day("2024-03-10")), 2);
    }
}
