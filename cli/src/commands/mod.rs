mod coach;
mod estimate;
mod exercise;
mod food;
mod goals;
mod helpers;
mod import;
mod summary;
mod weight;

pub(crate) use coach::{cmd_coach_clients, cmd_coach_link, cmd_coach_unlink, cmd_coach_view};
pub(crate) use estimate::cmd_estimate;
pub(crate) use exercise::{
    cmd_exercise_bump, cmd_exercise_delete, cmd_exercise_edit, cmd_exercise_log,
};
pub(crate) use food::{cmd_food_bump, cmd_food_delete, cmd_food_edit, cmd_food_log};
pub(crate) use goals::{cmd_goals_clear, cmd_goals_set, cmd_goals_show, cmd_units};
pub(crate) use import::cmd_import_foods;
pub(crate) use summary::{cmd_history, cmd_log, cmd_summary};
pub(crate) use weight::{cmd_weight_delete, cmd_weight_edit, cmd_weight_history, cmd_weight_log};
