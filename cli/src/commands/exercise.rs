use anyhow::Result;

use nutrilog_core::models::{CalorieBump, ExerciseEntry, NewExerciseEntry, UpdateExerciseEntry};
use nutrilog_core::service::{NutrilogService, Session};

use super::helpers::parse_date;

fn print_exercise_line(prefix: &str, entry: &ExerciseEntry) {
    let id = entry.id.unwrap_or_default();
    let name = &entry.exercise;
    let burned = entry.calories_burned;
    let category = entry
        .category
        .as_ref()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default();
    let date = &entry.completed_at;
    println!("{prefix} [{id}] {name}{category}: {burned:.0} kcal burned on {date}");
}

pub(crate) fn cmd_exercise_log(
    svc: &NutrilogService,
    session: &Session,
    name: &str,
    calories: f64,
    category: Option<String>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let completed_at = parse_date(date)?;
    let entry = svc.log_exercise(
        session,
        &NewExerciseEntry {
            exercise: name.to_string(),
            calories_burned: calories,
            category,
            completed_at,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_exercise_line("Logged", &entry);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_exercise_edit(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    name: Option<String>,
    calories: Option<f64>,
    category: Option<String>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let completed_at = date.map(|d| parse_date(Some(d))).transpose()?;
    let entry = svc.edit_exercise(
        session,
        id,
        &UpdateExerciseEntry {
            exercise: name,
            calories_burned: calories,
            category,
            completed_at,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_exercise_line("Updated", &entry);
    }
    Ok(())
}

pub(crate) fn cmd_exercise_bump(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    amount: &str,
    json: bool,
) -> Result<()> {
    let bump = CalorieBump::parse(amount)?;
    let entry = svc.bump_exercise(session, id, bump)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_exercise_line("Adjusted", &entry);
    }
    Ok(())
}

pub(crate) fn cmd_exercise_delete(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    json: bool,
) -> Result<()> {
    svc.delete_exercise(session, id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted exercise entry {id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_exercise_commands() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        cmd_exercise_log(
            &svc,
            &session,
            "Run",
            250.0,
            Some("cardio".into()),
            Some("2024-05-01".into()),
            false,
        )
        .unwrap();
        let id = svc.day_summary(&session, date).unwrap().exercises[0]
            .id
            .unwrap();

        cmd_exercise_bump(&svc, &session, id, "-100", true).unwrap();
        cmd_exercise_bump(&svc, &session, id, "-100", true).unwrap();
        cmd_exercise_bump(&svc, &session, id, "-100", true).unwrap();
        let day = svc.day_summary(&session, date).unwrap();
        assert_eq!(day.exercises[0].calories_burned, 0.0);

        cmd_exercise_edit(&svc, &session, id, None, Some(180.0), None, None, true).unwrap();
        let day = svc.day_summary(&session, date).unwrap();
        assert!((day.totals.burned - 180.0).abs() < f64::EPSILON);

        cmd_exercise_delete(&svc, &session, id, false).unwrap();
        assert!(cmd_exercise_delete(&svc, &session, id, false).is_err());
    }
}
