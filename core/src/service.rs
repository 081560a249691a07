use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::aggregate::{DateOrder, DayBucket, DayTotals, aggregate_day, group_by_date};
use crate::csv_import::{self, CsvImportSummary};
use crate::db::Database;
use crate::error::NutrilogError;
use crate::estimate::EstimatedItem;
use crate::goals::{DayGoalReport, evaluate_day};
use crate::history::{
    HistoryPoint, MAX_HISTORY_DAYS, average_net, build_history, logging_streak,
};
use crate::models::{
    CalorieBump, ExerciseEntry, FoodEntry, Goals, NewExerciseEntry, NewFoodEntry,
    NewWeightEntry, Profile, UpdateExerciseEntry, UpdateFoodEntry, WeightEntry, date_key,
    validate_exercise_update, validate_food_update, validate_goals, validate_new_exercise,
    validate_new_food, validate_weight_kg,
};
use crate::units::{UnitPreference, format_weight_for};

/// Remote calorie estimation from a free-text meal description.
///
/// The CLI implements this with reqwest. Called synchronously; async callers
/// should talk to their client directly instead.
pub trait CalorieEstimator: Send + Sync {
    fn estimate(&self, description: &str) -> Result<Vec<EstimatedItem>>;
}

/// The authenticated caller. Every read and write is scoped to this user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub foods: Vec<FoodEntry>,
    pub exercises: Vec<ExerciseEntry>,
    pub totals: DayTotals,
    pub goals: DayGoalReport,
    pub unit_preference: UnitPreference,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub start: String,
    pub end: String,
    pub points: Vec<HistoryPoint>,
    pub average_net: Option<f64>,
    /// Consecutive logged days ending at `end`.
    pub streak: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightView {
    pub id: Option<i64>,
    pub logged_at: String,
    pub weight_kg: f64,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimatePreview {
    pub date: String,
    pub items: Vec<EstimatedItem>,
    pub estimated_calories: f64,
    /// The day as it would look with the estimated items logged.
    pub projected: DayTotals,
    pub goals: DayGoalReport,
}

pub struct NutrilogService {
    db: Database,
}

impl NutrilogService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    /// Session for the user this install logs under.
    pub fn local_session(&self) -> Result<Session> {
        let user_id = self.db.get_or_create_user_id()?;
        self.db.ensure_profile(&user_id)?;
        Ok(Session::new(user_id))
    }

    /// Session for a named user sharing this database, e.g. a household
    /// member or a coach's client. The profile is created on first use.
    pub fn session_for(&self, user_id: &str) -> Result<Session> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            bail!("User id must not be empty");
        }
        self.db.ensure_profile(user_id)?;
        Ok(Session::new(user_id))
    }

    fn profile_or_default(&self, user_id: &str) -> Result<Profile> {
        Ok(self
            .db
            .get_profile(user_id)?
            .unwrap_or_else(|| Profile::new(user_id)))
    }

    // --- Read pipelines: fetch everything first, then compute once ---

    pub fn day_summary(&self, session: &Session, date: NaiveDate) -> Result<DaySummary> {
        let profile = self.profile_or_default(&session.user_id)?;
        let foods = self.db.foods_for_date(&session.user_id, date)?;
        let exercises = self.db.exercises_for_date(&session.user_id, date)?;

        let totals = aggregate_day(&foods, &exercises);
        let goals = evaluate_day(&totals, &profile.goals);
        tracing::debug!(
            user_id = %session.user_id,
            date = %date,
            foods = foods.len(),
            exercises = exercises.len(),
            "built day summary"
        );

        Ok(DaySummary {
            date: date_key(date),
            foods,
            exercises,
            totals,
            goals,
            unit_preference: profile.unit_preference,
        })
    }

    pub fn food_log(&self, session: &Session, order: DateOrder) -> Result<Vec<DayBucket<FoodEntry>>> {
        let foods = self.db.all_foods(&session.user_id)?;
        Ok(group_by_date(&foods, order))
    }

    pub fn exercise_log(
        &self,
        session: &Session,
        order: DateOrder,
    ) -> Result<Vec<DayBucket<ExerciseEntry>>> {
        let exercises = self.db.all_exercises(&session.user_id)?;
        Ok(group_by_date(&exercises, order))
    }

    pub fn history(&self, session: &Session, start: NaiveDate, end: NaiveDate) -> Result<HistoryReport> {
        if start > end {
            bail!("History start {start} is after end {end}");
        }
        let foods = self.db.foods_between(&session.user_id, start, end)?;
        let exercises = self.db.exercises_between(&session.user_id, start, end)?;

        let points = build_history(&foods, &exercises);
        let streak = logging_streak(points.iter().map(|p| p.date.as_str()), end);

        Ok(HistoryReport {
            start: date_key(start),
            end: date_key(end),
            average_net: average_net(&points),
            streak,
            points,
        })
    }

    /// The last `days` days, ending with `today`.
    pub fn recent_history(&self, session: &Session, days: u32, today: NaiveDate) -> Result<HistoryReport> {
        if days == 0 || days > MAX_HISTORY_DAYS {
            bail!("Days must be between 1 and {MAX_HISTORY_DAYS}");
        }
        let start = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .context("History range starts before the earliest supported date")?;
        self.history(session, start, today)
    }

    pub fn weight_history(&self, session: &Session, limit: Option<i64>) -> Result<Vec<WeightView>> {
        let profile = self.profile_or_default(&session.user_id)?;
        let entries = self.db.weights_for_user(&session.user_id, limit)?;
        Ok(entries
            .into_iter()
            .map(|e| WeightView {
                display: format_weight_for(e.weight_kg, profile.unit_preference),
                id: e.id,
                logged_at: e.logged_at,
                weight_kg: e.weight_kg,
                notes: e.notes,
            })
            .collect())
    }

    // --- Foods ---

    pub fn log_food(&self, session: &Session, food: &NewFoodEntry) -> Result<FoodEntry> {
        validate_new_food(food)?;
        let entry = self.db.insert_food(&session.user_id, food)?;
        tracing::info!(user_id = %session.user_id, id = ?entry.id, calories = entry.calories, "logged food");
        Ok(entry)
    }

    pub fn edit_food(&self, session: &Session, id: i64, update: &UpdateFoodEntry) -> Result<FoodEntry> {
        if update.is_empty() {
            bail!("Nothing to update");
        }
        validate_food_update(update)?;
        self.db.update_food(&session.user_id, id, update)
    }

    pub fn bump_food(&self, session: &Session, id: i64, bump: CalorieBump) -> Result<FoodEntry> {
        self.db.bump_food_calories(&session.user_id, id, bump)
    }

    pub fn delete_food(&self, session: &Session, id: i64) -> Result<()> {
        if !self.db.delete_food(&session.user_id, id)? {
            return Err(NutrilogError::NotFound("Food entry").into());
        }
        tracing::info!(user_id = %session.user_id, id, "deleted food");
        Ok(())
    }

    // --- Exercises ---

    pub fn log_exercise(&self, session: &Session, exercise: &NewExerciseEntry) -> Result<ExerciseEntry> {
        validate_new_exercise(exercise)?;
        let entry = self.db.insert_exercise(&session.user_id, exercise)?;
        tracing::info!(user_id = %session.user_id, id = ?entry.id, burned = entry.calories_burned, "logged exercise");
        Ok(entry)
    }

    pub fn edit_exercise(
        &self,
        session: &Session,
        id: i64,
        update: &UpdateExerciseEntry,
    ) -> Result<ExerciseEntry> {
        if update.is_empty() {
            bail!("Nothing to update");
        }
        validate_exercise_update(update)?;
        self.db.update_exercise(&session.user_id, id, update)
    }

    pub fn bump_exercise(&self, session: &Session, id: i64, bump: CalorieBump) -> Result<ExerciseEntry> {
        self.db.bump_exercise_calories(&session.user_id, id, bump)
    }

    pub fn delete_exercise(&self, session: &Session, id: i64) -> Result<()> {
        if !self.db.delete_exercise(&session.user_id, id)? {
            return Err(NutrilogError::NotFound("Exercise entry").into());
        }
        tracing::info!(user_id = %session.user_id, id, "deleted exercise");
        Ok(())
    }

    // --- Weights ---

    pub fn log_weight(&self, session: &Session, entry: &NewWeightEntry) -> Result<WeightEntry> {
        validate_weight_kg(entry.weight_kg)?;
        let saved = self.db.upsert_weight(&session.user_id, entry)?;
        tracing::info!(user_id = %session.user_id, date = %saved.logged_at, "logged weight");
        Ok(saved)
    }

    pub fn edit_weight(
        &self,
        session: &Session,
        id: i64,
        weight_kg: Option<f64>,
        notes: Option<&str>,
    ) -> Result<WeightEntry> {
        if weight_kg.is_none() && notes.is_none() {
            bail!("Nothing to update");
        }
        if let Some(kg) = weight_kg {
            validate_weight_kg(kg)?;
        }
        self.db.update_weight(&session.user_id, id, weight_kg, notes)
    }

    pub fn delete_weight(&self, session: &Session, id: i64) -> Result<()> {
        if !self.db.delete_weight(&session.user_id, id)? {
            return Err(NutrilogError::NotFound("Weight entry").into());
        }
        Ok(())
    }

    // --- Profile ---

    pub fn ensure_profile(&self, session: &Session) -> Result<Profile> {
        self.db.ensure_profile(&session.user_id)
    }

    pub fn set_goals(&self, session: &Session, goals: &Goals) -> Result<Profile> {
        validate_goals(goals)?;
        let profile = self.db.set_goals(&session.user_id, goals)?;
        tracing::info!(user_id = %session.user_id, "updated goals");
        Ok(profile)
    }

    pub fn set_unit_preference(&self, session: &Session, preference: UnitPreference) -> Result<Profile> {
        self.db.set_unit_preference(&session.user_id, preference)
    }

    pub fn set_display_name(&self, session: &Session, name: Option<&str>) -> Result<Profile> {
        let mut profile = self.db.ensure_profile(&session.user_id)?;
        profile.display_name = name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
        self.db.upsert_profile(&profile)
    }

    // --- Coach / client ---

    pub fn link_coach(&self, session: &Session, coach_id: &str) -> Result<Profile> {
        let coach_id = coach_id.trim();
        if coach_id.is_empty() {
            bail!("Coach id must not be empty");
        }
        let profile = self.db.set_coach(&session.user_id, Some(coach_id))?;
        tracing::info!(user_id = %session.user_id, coach_id, "linked coach");
        Ok(profile)
    }

    pub fn unlink_coach(&self, session: &Session) -> Result<Profile> {
        self.db.set_coach(&session.user_id, None)
    }

    pub fn clients(&self, session: &Session) -> Result<Vec<Profile>> {
        self.db.clients_of(&session.user_id)
    }

    /// A client's day, visible only to the coach the client linked.
    pub fn client_day_summary(
        &self,
        session: &Session,
        client_id: &str,
        date: NaiveDate,
    ) -> Result<DaySummary> {
        let client = self
            .db
            .get_profile(client_id)?
            .ok_or(NutrilogError::NotFound("Client"))?;
        if client.coach_id.as_deref() != Some(session.user_id.as_str()) {
            tracing::warn!(user_id = %session.user_id, client_id, "client summary refused");
            return Err(NutrilogError::NotAuthorized.into());
        }
        self.day_summary(&Session::new(client_id), date)
    }

    // --- Estimation ---

    /// Estimate a description and project the day's totals as if the items
    /// were logged. Nothing is written.
    pub fn preview_estimate(
        &self,
        estimator: &dyn CalorieEstimator,
        session: &Session,
        description: &str,
        date: NaiveDate,
    ) -> Result<EstimatePreview> {
        let description = description.trim();
        if description.is_empty() {
            bail!("Description must not be empty");
        }
        let items = estimator.estimate(description)?;
        self.project_items(session, items, date)
    }

    /// Project already-estimated items onto a day. Nothing is written.
    pub fn project_items(
        &self,
        session: &Session,
        items: Vec<EstimatedItem>,
        date: NaiveDate,
    ) -> Result<EstimatePreview> {
        let profile = self.profile_or_default(&session.user_id)?;
        let mut foods = self.db.foods_for_date(&session.user_id, date)?;
        let exercises = self.db.exercises_for_date(&session.user_id, date)?;
        foods.extend(items.iter().map(|i| i.to_food_entry(&session.user_id, date)));

        let projected = aggregate_day(&foods, &exercises);
        let goals = evaluate_day(&projected, &profile.goals);
        let estimated_calories = items.iter().map(|i| i.calories).sum();
        tracing::debug!(user_id = %session.user_id, items = items.len(), "projected estimate");

        Ok(EstimatePreview {
            date: date_key(date),
            items,
            estimated_calories,
            projected,
            goals,
        })
    }

    pub fn log_estimate(
        &self,
        session: &Session,
        items: &[EstimatedItem],
        date: NaiveDate,
    ) -> Result<Vec<FoodEntry>> {
        let foods: Vec<NewFoodEntry> = items.iter().map(|item| item.to_new_food(date)).collect();
        // All or nothing: check every item before the first insert
        for (idx, food) in foods.iter().enumerate() {
            validate_new_food(food).map_err(|e| NutrilogError::UnusableEstimate {
                index: idx + 1,
                reason: e.to_string(),
            })?;
        }
        let entries = self.db.insert_foods(&session.user_id, &foods)?;
        tracing::info!(user_id = %session.user_id, items = entries.len(), "logged estimate");
        Ok(entries)
    }

    // --- CSV import ---

    pub fn import_foods_csv<R: Read>(
        &self,
        session: &Session,
        reader: R,
        dry_run: bool,
    ) -> Result<CsvImportSummary> {
        let parsed = csv_import::parse_foods_csv(reader)?;
        let summary = csv_import::import_foods(&self.db, &session.user_id, &parsed, dry_run)?;
        tracing::info!(
            user_id = %session.user_id,
            imported = summary.imported,
            skipped_bad_date = summary.skipped_bad_date,
            dry_run,
            "imported food CSV"
        );
        Ok(summary)
    }
}
