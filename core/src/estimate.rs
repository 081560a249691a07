use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{FoodEntry, FoodRow, NewFoodEntry, date_key};

/// Name given to estimated items the upstream returned without one.
pub const UNNAMED_ITEM: &str = "Estimated item";

#[derive(Debug, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub description: String,
}

/// The estimation service answers with either a bare array of items or an
/// object wrapping them under `items`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EstimateResponse {
    Items(Vec<FoodRow>),
    Wrapped { items: Vec<FoodRow> },
}

impl EstimateResponse {
    #[must_use]
    pub fn into_items(self) -> Vec<EstimatedItem> {
        let rows = match self {
            Self::Items(items) | Self::Wrapped { items } => items,
        };
        rows.into_iter()
            .map(|row| EstimatedItem::from(FoodEntry::from(row)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedItem {
    pub name: String,
    pub calories: f64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl From<FoodEntry> for EstimatedItem {
    fn from(entry: FoodEntry) -> Self {
        let name = entry.name.trim();
        Self {
            name: if name.is_empty() {
                UNNAMED_ITEM.to_string()
            } else {
                name.to_string()
            },
            calories: entry.calories.max(0.0),
            protein: entry.protein.map(non_negative),
            carbs: entry.carbs.map(non_negative),
            fat: entry.fat.map(non_negative),
        }
    }
}

// Upstream guesses below zero are read as zero.
fn non_negative(v: f64) -> f64 {
    v.max(0.0)
}

impl EstimatedItem {
    /// An unsaved row, used to project a day's totals before logging.
    #[must_use]
    pub fn to_food_entry(&self, user_id: &str, date: NaiveDate) -> FoodEntry {
        FoodEntry {
            id: None,
            user_id: user_id.to_string(),
            name: self.name.clone(),
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            eaten_at: date_key(date),
        }
    }

    #[must_use]
    pub fn to_new_food(&self, date: NaiveDate) -> NewFoodEntry {
        NewFoodEntry {
            name: self.name.clone(),
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            eaten_at: date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let json = r#"[
            {"name": "Banana", "calories": 105, "protein": 1.3, "carbs": 27, "fat": 0.4},
            {"name": "Coffee", "calories": "5"}
        ]"#;
        let items = serde_json::from_str::<EstimateResponse>(json)
            .unwrap()
            .into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Banana");
        assert!((items[0].calories - 105.0).abs() < f64::EPSILON);
        assert_eq!(items[0].protein, Some(1.3));
        assert!((items[1].calories - 5.0).abs() < f64::EPSILON);
        assert_eq!(items[1].protein, None);
    }

    #[test]
    fn test_parse_wrapped_items() {
        let json = r#"{"items": [{"name": "Toast", "calories": 80}]}"#;
        let items = serde_json::from_str::<EstimateResponse>(json)
            .unwrap()
            .into_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Toast");
    }

    #[test]
    fn test_junk_calories_become_zero() {
        let json = r#"[{"name": "Soup", "calories": "a bowl", "fat": null}]"#;
        let items = serde_json::from_str::<EstimateResponse>(json)
            .unwrap()
            .into_items();
        assert_eq!(items[0].calories, 0.0);
        assert_eq!(items[0].fat, None);
    }

    #[test]
    fn test_negative_guesses_clamp_to_zero() {
        let json = r#"[{"name": "Refund", "calories": -50, "protein": -2, "fat": 3}]"#;
        let items = serde_json::from_str::<EstimateResponse>(json)
            .unwrap()
            .into_items();
        assert_eq!(items[0].calories, 0.0);
        assert_eq!(items[0].protein, Some(0.0));
        assert_eq!(items[0].fat, Some(3.0));
        assert_eq!(items[0].carbs, None);
    }

    #[test]
    fn test_missing_name_is_labelled() {
        let json = r#"[{"calories": 200}]"#;
        let items = serde_json::from_str::<EstimateResponse>(json)
            .unwrap()
            .into_items();
        assert_eq!(items[0].name, UNNAMED_ITEM);
    }

    #[test]
    fn test_unexpected_shape_is_an_error() {
        assert!(serde_json::from_str::<EstimateResponse>(r#"{"foods": []}"#).is_err());
        assert!(serde_json::from_str::<EstimateResponse>(r#""nope""#).is_err());
    }

    #[test]
    fn test_to_food_entry_uses_date_key() {
        let item = EstimatedItem {
            name: "Rice".to_string(),
            calories: 200.0,
            protein: Some(4.0),
            carbs: Some(45.0),
            fat: None,
        };
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let entry = item.to_food_entry("u1", date);
        assert_eq!(entry.eaten_at, "2024-03-09");
        assert_eq!(entry.id, None);
        assert_eq!(entry.user_id, "u1");

        let new = item.to_new_food(date);
        assert_eq!(new.name, "Rice");
        assert_eq!(new.eaten_at, date);
    }
}
