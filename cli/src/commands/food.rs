use anyhow::Result;

use nutrilog_core::models::{CalorieBump, FoodEntry, NewFoodEntry, UpdateFoodEntry};
use nutrilog_core::service::{NutrilogService, Session};

use super::helpers::{fmt_grams, parse_date};

fn print_food_line(prefix: &str, food: &FoodEntry) {
    let id = food.id.unwrap_or_default();
    let name = &food.name;
    let cal = food.calories;
    let p = fmt_grams(food.protein);
    let c = fmt_grams(food.carbs);
    let f = fmt_grams(food.fat);
    let date = &food.eaten_at;
    println!("{prefix} [{id}] {name}: {cal:.0} kcal | P:{p} C:{c} F:{f} on {date}");
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_food_log(
    svc: &NutrilogService,
    session: &Session,
    name: &str,
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let eaten_at = parse_date(date)?;
    let entry = svc.log_food(
        session,
        &NewFoodEntry {
            name: name.to_string(),
            calories,
            protein,
            carbs,
            fat,
            eaten_at,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_food_line("Logged", &entry);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_food_edit(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    name: Option<String>,
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let eaten_at = date.map(|d| parse_date(Some(d))).transpose()?;
    let entry = svc.edit_food(
        session,
        id,
        &UpdateFoodEntry {
            name,
            calories,
            protein,
            carbs,
            fat,
            eaten_at,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_food_line("Updated", &entry);
    }
    Ok(())
}

pub(crate) fn cmd_food_bump(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    amount: &str,
    json: bool,
) -> Result<()> {
    let bump = CalorieBump::parse(amount)?;
    let entry = svc.bump_food(session, id, bump)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_food_line("Adjusted", &entry);
    }
    Ok(())
}

pub(crate) fn cmd_food_delete(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    json: bool,
) -> Result<()> {
    svc.delete_food(session, id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted food entry {id}");
    }
    Ok(())
}
