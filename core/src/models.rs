use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::units::UnitPreference;

/// Format shared by every write path. Rows are grouped by exact string
/// equality on this key, so nothing else may format dates for storage.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[must_use]
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date_key(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD"))
}

/// Calendar-date component of a stored date or timestamp string.
///
/// The text before the first `T` or space is returned untouched: no
/// zero-padding or timezone repair happens here, the stored string is
/// authoritative.
#[must_use]
pub fn date_key_of(raw: &str) -> &str {
    let raw = raw.trim();
    raw.split(['T', ' ']).next().unwrap_or(raw)
}

/// Lenient numeric read used at the row boundary.
///
/// Numbers and numeric strings that are finite become `Some`; anything else
/// (null, booleans, arrays, objects, junk text) becomes `None`.
#[must_use]
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn positive(value: &Value) -> Option<f64> {
    coerce_number(value).filter(|v| *v > 0.0)
}

// --- Raw rows as they arrive from the store, CSV files or the estimator ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoodRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub calories: Value,
    #[serde(default)]
    pub protein: Value,
    #[serde(default)]
    pub carbs: Value,
    #[serde(default)]
    pub fat: Value,
    #[serde(default)]
    pub eaten_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExerciseRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub exercise: Option<String>,
    #[serde(default)]
    pub calories_burned: Value,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightRow {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub weight_kg: Value,
    #[serde(default)]
    pub logged_at: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "calorieGoal", default)]
    pub calorie_goal: Value,
    #[serde(rename = "proteingoal", default)]
    pub protein_goal: Value,
    #[serde(rename = "carbgoal", default)]
    pub carb_goal: Value,
    #[serde(rename = "fatgoal", default)]
    pub fat_goal: Value,
    #[serde(default)]
    pub unit_preference: Option<String>,
    #[serde(default)]
    pub coach_id: Option<String>,
}

// --- Typed records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: Option<i64>,
    pub user_id: String,
    pub name: String,
    pub calories: f64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub eaten_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseEntry {
    pub id: Option<i64>,
    pub user_id: String,
    pub exercise: String,
    pub calories_burned: f64,
    pub category: Option<String>,
    pub completed_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: Option<i64>,
    pub user_id: String,
    pub weight_kg: f64,
    pub logged_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Per-user targets. `None` means unset; unset goals hide progress display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: Option<String>,
    pub goals: Goals,
    pub unit_preference: UnitPreference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coach_id: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: None,
            goals: Goals::default(),
            unit_preference: UnitPreference::Metric,
            coach_id: None,
        }
    }
}

// --- Normalization: the one place where raw rows become typed records ---

impl From<FoodRow> for FoodEntry {
    fn from(row: FoodRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id.unwrap_or_default(),
            name: row.name.unwrap_or_default(),
            calories: coerce_number(&row.calories).unwrap_or(0.0),
            protein: coerce_number(&row.protein),
            carbs: coerce_number(&row.carbs),
            fat: coerce_number(&row.fat),
            eaten_at: date_key_of(row.eaten_at.as_deref().unwrap_or_default()).to_string(),
        }
    }
}

impl From<ExerciseRow> for ExerciseEntry {
    fn from(row: ExerciseRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id.unwrap_or_default(),
            exercise: row.exercise.unwrap_or_default(),
            calories_burned: coerce_number(&row.calories_burned).unwrap_or(0.0),
            category: row.category.filter(|c| !c.is_empty()),
            completed_at: date_key_of(row.completed_at.as_deref().unwrap_or_default())
                .to_string(),
        }
    }
}

impl From<WeightRow> for WeightEntry {
    fn from(row: WeightRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id.unwrap_or_default(),
            weight_kg: coerce_number(&row.weight_kg).unwrap_or(0.0),
            logged_at: date_key_of(row.logged_at.as_deref().unwrap_or_default()).to_string(),
            notes: row.notes,
        }
    }
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            goals: Goals {
                calories: positive(&row.calorie_goal),
                protein: positive(&row.protein_goal),
                carbs: positive(&row.carb_goal),
                fat: positive(&row.fat_goal),
            },
            unit_preference: UnitPreference::parse_lenient(
                row.unit_preference.as_deref().unwrap_or_default(),
            ),
            display_name: row.display_name,
            coach_id: row.coach_id.filter(|c| !c.is_empty()),
            id: row.id,
        }
    }
}

// --- Write-side inputs ---

#[derive(Debug, Clone)]
pub struct NewFoodEntry {
    pub name: String,
    pub calories: f64,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub eaten_at: NaiveDate,
}

impl NewFoodEntry {
    /// Write-side view of an entry that has not been stored yet.
    pub fn from_entry(entry: &FoodEntry) -> Result<Self> {
        Ok(Self {
            name: entry.name.clone(),
            calories: entry.calories,
            protein: entry.protein,
            carbs: entry.carbs,
            fat: entry.fat,
            eaten_at: parse_date_key(&entry.eaten_at)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewExerciseEntry {
    pub exercise: String,
    pub calories_burned: f64,
    pub category: Option<String>,
    pub completed_at: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewWeightEntry {
    pub weight_kg: f64,
    pub logged_at: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateFoodEntry {
    pub name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub eaten_at: Option<NaiveDate>,
}

impl UpdateFoodEntry {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.eaten_at.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateExerciseEntry {
    pub exercise: Option<String>,
    pub calories_burned: Option<f64>,
    pub category: Option<String>,
    pub completed_at: Option<NaiveDate>,
}

impl UpdateExerciseEntry {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exercise.is_none()
            && self.calories_burned.is_none()
            && self.category.is_none()
            && self.completed_at.is_none()
    }
}

/// The quick-adjust buttons on a logged row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalorieBump {
    #[serde(rename = "-100")]
    Minus100,
    #[serde(rename = "-10")]
    Minus10,
    #[serde(rename = "+10")]
    Plus10,
    #[serde(rename = "+100")]
    Plus100,
}

impl CalorieBump {
    #[must_use]
    pub fn delta(self) -> f64 {
        match self {
            Self::Minus100 => -100.0,
            Self::Minus10 => -10.0,
            Self::Plus10 => 10.0,
            Self::Plus100 => 100.0,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "-100" => Ok(Self::Minus100),
            "-10" => Ok(Self::Minus10),
            "+10" | "10" => Ok(Self::Plus10),
            "+100" | "100" => Ok(Self::Plus100),
            other => bail!("Invalid bump '{other}'. Use one of: -100, -10, +10, +100"),
        }
    }

    /// Apply to a stored calorie value. Results never drop below zero.
    #[must_use]
    pub fn apply(self, calories: f64) -> f64 {
        (calories + self.delta()).max(0.0)
    }
}

// --- Write-side validation ---

fn validate_non_negative(label: &str, value: Option<f64>) -> Result<()> {
    if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
            bail!("{label} must be a non-negative number");
        }
    }
    Ok(())
}

pub fn validate_new_food(food: &NewFoodEntry) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    validate_non_negative("calories", Some(food.calories))?;
    validate_non_negative("protein", food.protein)?;
    validate_non_negative("carbs", food.carbs)?;
    validate_non_negative("fat", food.fat)?;
    Ok(())
}

pub fn validate_food_update(update: &UpdateFoodEntry) -> Result<()> {
    if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        bail!("Food name must not be empty");
    }
    validate_non_negative("calories", update.calories)?;
    validate_non_negative("protein", update.protein)?;
    validate_non_negative("carbs", update.carbs)?;
    validate_non_negative("fat", update.fat)?;
    Ok(())
}

pub fn validate_new_exercise(exercise: &NewExerciseEntry) -> Result<()> {
    if exercise.exercise.trim().is_empty() {
        bail!("Exercise name must not be empty");
    }
    validate_non_negative("calories_burned", Some(exercise.calories_burned))
}

pub fn validate_exercise_update(update: &UpdateExerciseEntry) -> Result<()> {
    if update
        .exercise
        .as_deref()
        .is_some_and(|n| n.trim().is_empty())
    {
        bail!("Exercise name must not be empty");
    }
    validate_non_negative("calories_burned", update.calories_burned)
}

pub fn validate_weight_kg(weight_kg: f64) -> Result<()> {
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        bail!("Weight must be greater than 0");
    }
    Ok(())
}

/// Goals are either unset or strictly positive.
pub fn validate_goals(goals: &Goals) -> Result<()> {
    for (label, value) in [
        ("calorie goal", goals.calories),
        ("protein goal", goals.protein),
        ("carb goal", goals.carbs),
        ("fat goal", goals.fat),
    ] {
        if value.is_some_and(|v| !v.is_finite() || v <= 0.0) {
            bail!("{label} must be greater than 0 (omit it to leave it unset)");
        }
    }
    Ok(())
}
