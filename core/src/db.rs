use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use uuid::Uuid;

use crate::error::NutrilogError;
use crate::models::{
    CalorieBump, ExerciseEntry, ExerciseRow, FoodEntry, FoodRow, Goals, NewExerciseEntry,
    NewFoodEntry, NewWeightEntry, Profile, ProfileRow, UpdateExerciseEntry, UpdateFoodEntry,
    WeightEntry, WeightRow, date_key,
};
use crate::units::UnitPreference;

const FOOD_COLUMNS: &str = "id, user_id, name, calories, protein, carbs, fat, eaten_at";
const EXERCISE_COLUMNS: &str =
    "id, user_id, exercise, calories_burned, category, completed_at";
const WEIGHT_COLUMNS: &str = "id, user_id, weight_kg, logged_at, notes";
const PROFILE_COLUMNS: &str = "id, display_name, calorieGoal, proteingoal, carbgoal, fatgoal, unit_preference, coach_id";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            // Numeric columns are declared REAL but SQLite keeps whatever was
            // written; reads go through the lenient row mapping below.
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS config (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    display_name TEXT,
                    calorieGoal REAL,
                    proteingoal REAL,
                    carbgoal REAL,
                    fatgoal REAL,
                    unit_preference TEXT NOT NULL DEFAULT 'metric',
                    coach_id TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    calories REAL,
                    protein REAL,
                    carbs REAL,
                    fat REAL,
                    eaten_at TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS exercises (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    exercise TEXT NOT NULL,
                    calories_burned REAL,
                    category TEXT,
                    completed_at TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS weights (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    weight_kg REAL NOT NULL,
                    logged_at TEXT NOT NULL,
                    notes TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, logged_at)
                );

                CREATE INDEX IF NOT EXISTS idx_foods_user_date ON foods(user_id, eaten_at);
                CREATE INDEX IF NOT EXISTS idx_exercises_user_date ON exercises(user_id, completed_at);
                CREATE INDEX IF NOT EXISTS idx_profiles_coach ON profiles(coach_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---
    //
    // Columns are read as loosely typed values, collected into the raw row
    // shapes and normalized exactly once on the way out.

    fn json_at(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Value> {
        Ok(match row.get_ref(idx)? {
            ValueRef::Null | ValueRef::Blob(_) => Value::Null,
            ValueRef::Integer(i) => Value::from(i),
            ValueRef::Real(f) => Value::from(f),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        })
    }

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodEntry> {
        Ok(FoodRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            calories: Self::json_at(row, 3)?,
            protein: Self::json_at(row, 4)?,
            carbs: Self::json_at(row, 5)?,
            fat: Self::json_at(row, 6)?,
            eaten_at: row.get(7)?,
        }
        .into())
    }

    fn exercise_from_row(row: &rusqlite::Row) -> rusqlite::Result<ExerciseEntry> {
        Ok(ExerciseRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            exercise: row.get(2)?,
            calories_burned: Self::json_at(row, 3)?,
            category: row.get(4)?,
            completed_at: row.get(5)?,
        }
        .into())
    }

    fn weight_from_row(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
        Ok(WeightRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            weight_kg: Self::json_at(row, 2)?,
            logged_at: row.get(3)?,
            notes: row.get(4)?,
        }
        .into())
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(ProfileRow {
            id: row.get(0)?,
            display_name: row.get(1)?,
            calorie_goal: Self::json_at(row, 2)?,
            protein_goal: Self::json_at(row, 3)?,
            carb_goal: Self::json_at(row, 4)?,
            fat_goal: Self::json_at(row, 5)?,
            unit_preference: row.get(6)?,
            coach_id: row.get(7)?,
        }
        .into())
    }

    // --- Local identity ---

    /// The user id this install logs under, created on first use.
    pub fn get_or_create_user_id(&self) -> Result<String> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM config WHERE key = 'user_id'")?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(row.get(0)?);
        }
        drop(rows);
        drop(stmt);

        let user_id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES ('user_id', ?1)",
            params![user_id],
        )?;
        Ok(user_id)
    }

    // --- Foods ---

    pub fn insert_food(&self, user_id: &str, food: &NewFoodEntry) -> Result<FoodEntry> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO foods (user_id, name, calories, protein, carbs, fat, eaten_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user_id,
                food.name.trim(),
                food.calories,
                food.protein,
                food.carbs,
                food.fat,
                date_key(food.eaten_at),
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food(user_id, id)
    }

    /// Insert several foods at once. Either every row is written or none is.
    pub fn insert_foods(&self, user_id: &str, foods: &[NewFoodEntry]) -> Result<Vec<FoodEntry>> {
        let tx = self.conn.unchecked_transaction()?;
        let entries = foods
            .iter()
            .map(|food| self.insert_food(user_id, food))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(entries)
    }

    pub fn get_food(&self, user_id: &str, id: i64) -> Result<FoodEntry> {
        self.conn
            .query_row(
                &format!("SELECT {FOOD_COLUMNS} FROM foods WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                Self::food_from_row,
            )
            .optional()?
            .ok_or_else(|| NutrilogError::NotFound("Food entry").into())
    }

    pub fn foods_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<FoodEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM foods
             WHERE user_id = ?1 AND eaten_at = ?2
             ORDER BY id"
        ))?;
        let foods = stmt
            .query_map(params![user_id, date_key(date)], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Inclusive on both ends, oldest first.
    pub fn foods_between(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FoodEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM foods
             WHERE user_id = ?1 AND eaten_at >= ?2 AND eaten_at <= ?3
             ORDER BY eaten_at, id"
        ))?;
        let foods = stmt
            .query_map(
                params![user_id, date_key(start), date_key(end)],
                Self::food_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    /// Every food row for the user, most recent first.
    pub fn all_foods(&self, user_id: &str) -> Result<Vec<FoodEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_COLUMNS} FROM foods
             WHERE user_id = ?1
             ORDER BY eaten_at DESC, id"
        ))?;
        let foods = stmt
            .query_map(params![user_id], Self::food_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn update_food(&self, user_id: &str, id: i64, update: &UpdateFoodEntry) -> Result<FoodEntry> {
        // Verify existence and ownership
        self.get_food(user_id, id)?;

        let now = Local::now().to_rfc3339();
        if let Some(ref name) = update.name {
            self.conn.execute(
                "UPDATE foods SET name = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![name.trim(), now, id, user_id],
            )?;
        }
        if let Some(calories) = update.calories {
            self.conn.execute(
                "UPDATE foods SET calories = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![calories, now, id, user_id],
            )?;
        }
        if let Some(protein) = update.protein {
            self.conn.execute(
                "UPDATE foods SET protein = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![protein, now, id, user_id],
            )?;
        }
        if let Some(carbs) = update.carbs {
            self.conn.execute(
                "UPDATE foods SET carbs = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![carbs, now, id, user_id],
            )?;
        }
        if let Some(fat) = update.fat {
            self.conn.execute(
                "UPDATE foods SET fat = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![fat, now, id, user_id],
            )?;
        }
        if let Some(date) = update.eaten_at {
            self.conn.execute(
                "UPDATE foods SET eaten_at = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![date_key(date), now, id, user_id],
            )?;
        }

        self.get_food(user_id, id)
    }

    pub fn bump_food_calories(&self, user_id: &str, id: i64, bump: CalorieBump) -> Result<FoodEntry> {
        let entry = self.get_food(user_id, id)?;
        self.conn.execute(
            "UPDATE foods SET calories = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![bump.apply(entry.calories), Local::now().to_rfc3339(), id, user_id],
        )?;
        self.get_food(user_id, id)
    }

    pub fn delete_food(&self, user_id: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM foods WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // --- Exercises ---

    pub fn insert_exercise(&self, user_id: &str, exercise: &NewExerciseEntry) -> Result<ExerciseEntry> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO exercises (user_id, exercise, calories_burned, category, completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                exercise.exercise.trim(),
                exercise.calories_burned,
                exercise.category,
                date_key(exercise.completed_at),
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_exercise(user_id, id)
    }

    pub fn get_exercise(&self, user_id: &str, id: i64) -> Result<ExerciseEntry> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = ?1 AND user_id = ?2"
                ),
                params![id, user_id],
                Self::exercise_from_row,
            )
            .optional()?
            .ok_or_else(|| NutrilogError::NotFound("Exercise entry").into())
    }

    pub fn exercises_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<ExerciseEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises
             WHERE user_id = ?1 AND completed_at = ?2
             ORDER BY id"
        ))?;
        let exercises = stmt
            .query_map(params![user_id, date_key(date)], Self::exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    pub fn exercises_between(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ExerciseEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises
             WHERE user_id = ?1 AND completed_at >= ?2 AND completed_at <= ?3
             ORDER BY completed_at, id"
        ))?;
        let exercises = stmt
            .query_map(
                params![user_id, date_key(start), date_key(end)],
                Self::exercise_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    pub fn all_exercises(&self, user_id: &str) -> Result<Vec<ExerciseEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises
             WHERE user_id = ?1
             ORDER BY completed_at DESC, id"
        ))?;
        let exercises = stmt
            .query_map(params![user_id], Self::exercise_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(exercises)
    }

    pub fn update_exercise(
        &self,
        user_id: &str,
        id: i64,
        update: &UpdateExerciseEntry,
    ) -> Result<ExerciseEntry> {
        self.get_exercise(user_id, id)?;

        let now = Local::now().to_rfc3339();
        if let Some(ref exercise) = update.exercise {
            self.conn.execute(
                "UPDATE exercises SET exercise = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![exercise.trim(), now, id, user_id],
            )?;
        }
        if let Some(burned) = update.calories_burned {
            self.conn.execute(
                "UPDATE exercises SET calories_burned = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![burned, now, id, user_id],
            )?;
        }
        if let Some(ref category) = update.category {
            self.conn.execute(
                "UPDATE exercises SET category = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![category, now, id, user_id],
            )?;
        }
        if let Some(date) = update.completed_at {
            self.conn.execute(
                "UPDATE exercises SET completed_at = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![date_key(date), now, id, user_id],
            )?;
        }

        self.get_exercise(user_id, id)
    }

    pub fn bump_exercise_calories(
        &self,
        user_id: &str,
        id: i64,
        bump: CalorieBump,
    ) -> Result<ExerciseEntry> {
        let entry = self.get_exercise(user_id, id)?;
        self.conn.execute(
            "UPDATE exercises SET calories_burned = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![bump.apply(entry.calories_burned), Local::now().to_rfc3339(), id, user_id],
        )?;
        self.get_exercise(user_id, id)
    }

    pub fn delete_exercise(&self, user_id: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM exercises WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // --- Weights ---

    /// One weight per user per day; logging again replaces that day's value.
    pub fn upsert_weight(&self, user_id: &str, entry: &NewWeightEntry) -> Result<WeightEntry> {
        let now = Local::now().to_rfc3339();
        let logged_at = date_key(entry.logged_at);
        self.conn.execute(
            "INSERT INTO weights (user_id, weight_kg, logged_at, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, logged_at) DO UPDATE SET
                weight_kg = excluded.weight_kg,
                notes = excluded.notes,
                updated_at = excluded.updated_at",
            params![user_id, entry.weight_kg, logged_at, entry.notes, now, now],
        )?;
        self.conn
            .query_row(
                &format!(
                    "SELECT {WEIGHT_COLUMNS} FROM weights WHERE user_id = ?1 AND logged_at = ?2"
                ),
                params![user_id, logged_at],
                Self::weight_from_row,
            )
            .context("Weight entry not found after upsert")
    }

    pub fn get_weight(&self, user_id: &str, id: i64) -> Result<WeightEntry> {
        self.conn
            .query_row(
                &format!("SELECT {WEIGHT_COLUMNS} FROM weights WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                Self::weight_from_row,
            )
            .optional()?
            .ok_or_else(|| NutrilogError::NotFound("Weight entry").into())
    }

    /// Most recent first.
    pub fn weights_for_user(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<WeightEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {WEIGHT_COLUMNS} FROM weights
             WHERE user_id = ?1
             ORDER BY logged_at DESC
             LIMIT ?2"
        ))?;
        // SQLite treats a negative LIMIT as no limit
        let entries = stmt
            .query_map(params![user_id, limit.unwrap_or(-1)], Self::weight_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn update_weight(
        &self,
        user_id: &str,
        id: i64,
        weight_kg: Option<f64>,
        notes: Option<&str>,
    ) -> Result<WeightEntry> {
        self.get_weight(user_id, id)?;

        let now = Local::now().to_rfc3339();
        if let Some(weight_kg) = weight_kg {
            self.conn.execute(
                "UPDATE weights SET weight_kg = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![weight_kg, now, id, user_id],
            )?;
        }
        if let Some(notes) = notes {
            self.conn.execute(
                "UPDATE weights SET notes = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
                params![notes, now, id, user_id],
            )?;
        }

        self.get_weight(user_id, id)
    }

    pub fn delete_weight(&self, user_id: &str, id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM weights WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // --- Profiles ---

    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"))?;
        let mut rows = stmt.query(params![user_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::profile_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Create the profile row if it is missing. Existing values are kept.
    pub fn ensure_profile(&self, user_id: &str) -> Result<Profile> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO profiles (id, unit_preference, created_at, updated_at)
             VALUES (?1, 'metric', ?2, ?3)
             ON CONFLICT(id) DO NOTHING",
            params![user_id, now, now],
        )?;
        self.get_profile(user_id)?
            .context("Profile not found after insert")
    }

    pub fn upsert_profile(&self, profile: &Profile) -> Result<Profile> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO profiles (id, display_name, calorieGoal, proteingoal, carbgoal, fatgoal, unit_preference, coach_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                calorieGoal = excluded.calorieGoal,
                proteingoal = excluded.proteingoal,
                carbgoal = excluded.carbgoal,
                fatgoal = excluded.fatgoal,
                unit_preference = excluded.unit_preference,
                coach_id = excluded.coach_id,
                updated_at = excluded.updated_at",
            params![
                profile.id,
                profile.display_name,
                profile.goals.calories,
                profile.goals.protein,
                profile.goals.carbs,
                profile.goals.fat,
                profile.unit_preference.as_str(),
                profile.coach_id,
                now,
                now,
            ],
        )?;
        self.get_profile(&profile.id)?
            .context("Profile not found after upsert")
    }

    /// Replace all four goals. `None` clears a goal.
    pub fn set_goals(&self, user_id: &str, goals: &Goals) -> Result<Profile> {
        self.ensure_profile(user_id)?;
        self.conn.execute(
            "UPDATE profiles SET calorieGoal = ?1, proteingoal = ?2, carbgoal = ?3, fatgoal = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                goals.calories,
                goals.protein,
                goals.carbs,
                goals.fat,
                Local::now().to_rfc3339(),
                user_id,
            ],
        )?;
        self.get_profile(user_id)?.context("Profile not found")
    }

    pub fn set_unit_preference(&self, user_id: &str, preference: UnitPreference) -> Result<Profile> {
        self.ensure_profile(user_id)?;
        self.conn.execute(
            "UPDATE profiles SET unit_preference = ?1, updated_at = ?2 WHERE id = ?3",
            params![preference.as_str(), Local::now().to_rfc3339(), user_id],
        )?;
        self.get_profile(user_id)?.context("Profile not found")
    }

    pub fn set_coach(&self, user_id: &str, coach_id: Option<&str>) -> Result<Profile> {
        if coach_id == Some(user_id) {
            bail!("A user cannot coach themselves");
        }
        self.ensure_profile(user_id)?;
        self.conn.execute(
            "UPDATE profiles SET coach_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![coach_id, Local::now().to_rfc3339(), user_id],
        )?;
        self.get_profile(user_id)?.context("Profile not found")
    }

    pub fn clients_of(&self, coach_id: &str) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles
             WHERE coach_id = ?1
             ORDER BY display_name, id"
        ))?;
        let profiles = stmt
            .query_map(params![coach_id], Self::profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_food(on: &str) -> NewFoodEntry {
        NewFoodEntry {
            name: "Oatmeal".to_string(),
            calories: 300.0,
            protein: Some(10.0),
            carbs: Some(54.0),
            fat: Some(5.0),
            eaten_at: date(on),
        }
    }

    fn sample_exercise(on: &str) -> NewExerciseEntry {
        NewExerciseEntry {
            exercise: "Cycling".to_string(),
            calories_burned: 250.0,
            category: Some("cardio".to_string()),
            completed_at: date(on),
        }
    }

    #[test]
    fn test_insert_and_get_food() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food("u1", &sample_food("2024-01-02")).unwrap();
        assert!(food.id.is_some());
        assert_eq!(food.user_id, "u1");
        assert_eq!(food.name, "Oatmeal");
        assert!((food.calories - 300.0).abs() < f64::EPSILON);
        assert_eq!(food.eaten_at, "2024-01-02");

        let fetched = db.get_food("u1", food.id.unwrap()).unwrap();
        assert_eq!(fetched, food);
    }

    #[test]
    fn test_get_food_is_user_scoped() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food("u1", &sample_food("2024-01-02")).unwrap();
        assert!(db.get_food("u2", food.id.unwrap()).is_err());
        assert!(!db.delete_food("u2", food.id.unwrap()).unwrap());
        assert!(db.get_food("u1", food.id.unwrap()).is_ok());
    }

    #[test]
    fn test_foods_for_date() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food("u1", &sample_food("2024-01-02")).unwrap();
        db.insert_food("u1", &sample_food("2024-01-02")).unwrap();
        db.insert_food("u1", &sample_food("2024-01-03")).unwrap();
        db.insert_food("u2", &sample_food("2024-01-02")).unwrap();

        let foods = db.foods_for_date("u1", date("2024-01-02")).unwrap();
        assert_eq!(foods.len(), 2);
        assert!(foods.iter().all(|f| f.user_id == "u1"));
        assert!(foods.iter().all(|f| f.eaten_at == "2024-01-02"));
    }

    #[test]
    fn test_foods_between_is_inclusive() {
        let db = Database::open_in_memory().unwrap();
        for day in ["2024-01-01", "2024-01-05", "2024-01-10", "2024-01-11"] {
            db.insert_food("u1", &sample_food(day)).unwrap();
        }
        let foods = db
            .foods_between("u1", date("2024-01-01"), date("2024-01-10"))
            .unwrap();
        let dates: Vec<&str> = foods.iter().map(|f| f.eaten_at.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-05", "2024-01-10"]);
    }

    #[test]
    fn test_all_foods_most_recent_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food("u1", &sample_food("2024-01-01")).unwrap();
        db.insert_food("u1", &sample_food("2024-01-03")).unwrap();
        let foods = db.all_foods("u1").unwrap();
        assert_eq!(foods[0].eaten_at, "2024-01-03");
        assert!(db.all_foods("nobody").unwrap().is_empty());
    }

    #[test]
    fn test_sloppy_stored_values_are_coerced() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO foods (user_id, name, calories, protein, carbs, fat, eaten_at, created_at, updated_at)
                 VALUES ('u1', 'Mystery', 'lots', '12', NULL, 'x', '2024-01-02T09:15:00Z', 'now', 'now')",
                [],
            )
            .unwrap();
        let foods = db.all_foods("u1").unwrap();
        assert_eq!(foods.len(), 1);
        assert_eq!(foods[0].calories, 0.0);
        assert_eq!(foods[0].protein, Some(12.0));
        assert_eq!(foods[0].carbs, None);
        assert_eq!(foods[0].fat, None);
        assert_eq!(foods[0].eaten_at, "2024-01-02");
    }

    #[test]
    fn test_update_food_partial() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food("u1", &sample_food("2024-01-02")).unwrap();
        let id = food.id.unwrap();

        let updated = db
            .update_food(
                "u1",
                id,
                &UpdateFoodEntry {
                    calories: Some(350.0),
                    eaten_at: Some(date("2024-01-03")),
                    ..UpdateFoodEntry::default()
                },
            )
            .unwrap();
        assert!((updated.calories - 350.0).abs() < f64::EPSILON);
        assert_eq!(updated.eaten_at, "2024-01-03");
        assert_eq!(updated.name, "Oatmeal");
        assert_eq!(updated.protein, Some(10.0));
    }

    #[test]
    fn test_update_food_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .update_food("u1", 999, &UpdateFoodEntry::default())
            .unwrap_err();
        assert!(NutrilogError::is_not_found(&err));
        assert!(NutrilogError::is_not_found(&db.get_exercise("u1", 999).unwrap_err()));
        assert!(NutrilogError::is_not_found(&db.get_weight("u1", 999).unwrap_err()));
    }

    #[test]
    fn test_sql_failures_are_not_reported_as_missing() {
        let db = Database::open_in_memory().unwrap();
        db.conn.execute_batch("DROP TABLE foods").unwrap();
        let err = db.get_food("u1", 1).unwrap_err();
        assert!(!NutrilogError::is_not_found(&err));
    }

    #[test]
    fn test_insert_foods_writes_all_rows() {
        let db = Database::open_in_memory().unwrap();
        let saved = db
            .insert_foods("u1", &[sample_food("2024-01-02"), sample_food("2024-01-02")])
            .unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(db.foods_for_date("u1", date("2024-01-02")).unwrap().len(), 2);
    }

    #[test]
    fn test_insert_foods_rolls_back_on_failure() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_refund BEFORE INSERT ON foods
                 WHEN NEW.name = 'Refund'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let mut refund = sample_food("2024-01-02");
        refund.name = "Refund".to_string();
        let result = db.insert_foods("u1", &[sample_food("2024-01-02"), refund]);
        assert!(result.is_err());
        assert!(db.all_foods("u1").unwrap().is_empty());
    }

    #[test]
    fn test_bump_food_calories_floors_at_zero() {
        let db = Database::open_in_memory().unwrap();
        let mut new = sample_food("2024-01-02");
        new.calories = 60.0;
        let food = db.insert_food("u1", &new).unwrap();
        let id = food.id.unwrap();

        let bumped = db.bump_food_calories("u1", id, CalorieBump::Plus10).unwrap();
        assert!((bumped.calories - 70.0).abs() < f64::EPSILON);
        let bumped = db.bump_food_calories("u1", id, CalorieBump::Minus100).unwrap();
        assert_eq!(bumped.calories, 0.0);
    }

    #[test]
    fn test_delete_food() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food("u1", &sample_food("2024-01-02")).unwrap();
        assert!(db.delete_food("u1", food.id.unwrap()).unwrap());
        assert!(!db.delete_food("u1", food.id.unwrap()).unwrap());
        assert!(db.all_foods("u1").unwrap().is_empty());
    }

    #[test]
    fn test_exercise_crud() {
        let db = Database::open_in_memory().unwrap();
        let ex = db.insert_exercise("u1", &sample_exercise("2024-01-02")).unwrap();
        let id = ex.id.unwrap();
        assert_eq!(ex.category.as_deref(), Some("cardio"));

        let updated = db
            .update_exercise(
                "u1",
                id,
                &UpdateExerciseEntry {
                    calories_burned: Some(300.0),
                    ..UpdateExerciseEntry::default()
                },
            )
            .unwrap();
        assert!((updated.calories_burned - 300.0).abs() < f64::EPSILON);

        let bumped = db.bump_exercise_calories("u1", id, CalorieBump::Minus10).unwrap();
        assert!((bumped.calories_burned - 290.0).abs() < f64::EPSILON);

        assert_eq!(db.exercises_for_date("u1", date("2024-01-02")).unwrap().len(), 1);
        assert_eq!(
            db.exercises_between("u1", date("2024-01-01"), date("2024-01-31"))
                .unwrap()
                .len(),
            1
        );
        assert!(db.delete_exercise("u1", id).unwrap());
        assert!(db.all_exercises("u1").unwrap().is_empty());
    }

    #[test]
    fn test_upsert_weight_one_per_day() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .upsert_weight(
                "u1",
                &NewWeightEntry {
                    weight_kg: 80.0,
                    logged_at: date("2024-01-02"),
                    notes: None,
                },
            )
            .unwrap();
        let second = db
            .upsert_weight(
                "u1",
                &NewWeightEntry {
                    weight_kg: 79.5,
                    logged_at: date("2024-01-02"),
                    notes: Some("after run".to_string()),
                },
            )
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!((second.weight_kg - 79.5).abs() < f64::EPSILON);
        assert_eq!(second.notes.as_deref(), Some("after run"));
        assert_eq!(db.weights_for_user("u1", None).unwrap().len(), 1);

        // Other users log independently on the same day
        db.upsert_weight(
            "u2",
            &NewWeightEntry {
                weight_kg: 60.0,
                logged_at: date("2024-01-02"),
                notes: None,
            },
        )
        .unwrap();
        assert_eq!(db.weights_for_user("u1", None).unwrap().len(), 1);
    }

    #[test]
    fn test_weights_for_user_limit_and_order() {
        let db = Database::open_in_memory().unwrap();
        for (day, kg) in [("2024-01-01", 81.0), ("2024-01-03", 80.0), ("2024-01-02", 80.5)] {
            db.upsert_weight(
                "u1",
                &NewWeightEntry {
                    weight_kg: kg,
                    logged_at: date(day),
                    notes: None,
                },
            )
            .unwrap();
        }
        let all = db.weights_for_user("u1", None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].logged_at, "2024-01-03");

        let limited = db.weights_for_user("u1", Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_update_and_delete_weight() {
        let db = Database::open_in_memory().unwrap();
        let entry = db
            .upsert_weight(
                "u1",
                &NewWeightEntry {
                    weight_kg: 80.0,
                    logged_at: date("2024-01-02"),
                    notes: None,
                },
            )
            .unwrap();
        let id = entry.id.unwrap();
        let updated = db.update_weight("u1", id, Some(78.0), Some("morning")).unwrap();
        assert!((updated.weight_kg - 78.0).abs() < f64::EPSILON);
        assert_eq!(updated.notes.as_deref(), Some("morning"));

        assert!(db.update_weight("u2", id, Some(1.0), None).is_err());
        assert!(db.delete_weight("u1", id).unwrap());
        assert!(!db.delete_weight("u1", id).unwrap());
    }

    #[test]
    fn test_profile_defaults() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_profile("u1").unwrap().is_none());
        let profile = db.ensure_profile("u1").unwrap();
        assert_eq!(profile, Profile::new("u1"));
    }

    #[test]
    fn test_ensure_profile_keeps_existing_values() {
        let db = Database::open_in_memory().unwrap();
        db.set_unit_preference("u1", UnitPreference::Imperial).unwrap();
        let profile = db.ensure_profile("u1").unwrap();
        assert_eq!(profile.unit_preference, UnitPreference::Imperial);
    }

    #[test]
    fn test_set_goals_and_clear() {
        let db = Database::open_in_memory().unwrap();
        let goals = Goals {
            calories: Some(2000.0),
            protein: Some(150.0),
            carbs: None,
            fat: Some(70.0),
        };
        let profile = db.set_goals("u1", &goals).unwrap();
        assert_eq!(profile.goals, goals);

        let profile = db.set_goals("u1", &Goals::default()).unwrap();
        assert_eq!(profile.goals, Goals::default());
    }

    #[test]
    fn test_zero_goal_in_store_reads_as_unset() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_profile("u1").unwrap();
        db.conn
            .execute(
                "UPDATE profiles SET calorieGoal = 0, proteingoal = '120' WHERE id = 'u1'",
                [],
            )
            .unwrap();
        let profile = db.get_profile("u1").unwrap().unwrap();
        assert_eq!(profile.goals.calories, None);
        assert_eq!(profile.goals.protein, Some(120.0));
    }

    #[test]
    fn test_upsert_profile() {
        let db = Database::open_in_memory().unwrap();
        let mut profile = Profile::new("u1");
        profile.display_name = Some("Sam".to_string());
        profile.goals.calories = Some(1800.0);
        let saved = db.upsert_profile(&profile).unwrap();
        assert_eq!(saved, profile);

        profile.display_name = Some("Samira".to_string());
        let saved = db.upsert_profile(&profile).unwrap();
        assert_eq!(saved.display_name.as_deref(), Some("Samira"));
    }

    #[test]
    fn test_coach_links() {
        let db = Database::open_in_memory().unwrap();
        db.set_coach("client-a", Some("coach")).unwrap();
        db.set_coach("client-b", Some("coach")).unwrap();
        db.ensure_profile("loner").unwrap();

        let clients = db.clients_of("coach").unwrap();
        let ids: Vec<&str> = clients.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["client-a", "client-b"]);

        db.set_coach("client-a", None).unwrap();
        assert_eq!(db.clients_of("coach").unwrap().len(), 1);
    }

    #[test]
    fn test_cannot_coach_self() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.set_coach("u1", Some("u1")).is_err());
    }

    #[test]
    fn test_user_id_persistence() {
        let db = Database::open_in_memory().unwrap();
        let first = db.get_or_create_user_id().unwrap();
        let second = db.get_or_create_user_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn test_open_on_disk_runs_migrations_once() {
        let dir = std::env::temp_dir().join(format!("nutrilog-db-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_food("u1", &sample_food("2024-01-02")).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.all_foods("u1").unwrap().len(), 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
