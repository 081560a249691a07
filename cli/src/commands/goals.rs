use anyhow::{Result, bail};

use nutrilog_core::models::{Goals, Profile};
use nutrilog_core::service::{NutrilogService, Session};
use nutrilog_core::units::UnitPreference;

fn print_goals(profile: &Profile) {
    let goals = &profile.goals;
    let show = |v: Option<f64>, unit: &str| v.map_or("not set".to_string(), |g| format!("{g:.0} {unit}"));
    println!("Calories: {}", show(goals.calories, "kcal"));
    println!("Protein:  {}", show(goals.protein, "g"));
    println!("Carbs:    {}", show(goals.carbs, "g"));
    println!("Fat:      {}", show(goals.fat, "g"));
}

/// `0` clears a goal; leaving the flag out keeps the current value.
fn merge_goal(new: Option<f64>, current: Option<f64>) -> Option<f64> {
    match new {
        Some(g) if g.abs() < f64::EPSILON => None,
        Some(g) => Some(g),
        None => current,
    }
}

/// Update the given goals and keep the rest as they were.
pub(crate) fn cmd_goals_set(
    svc: &NutrilogService,
    session: &Session,
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    json: bool,
) -> Result<()> {
    if calories.is_none() && protein.is_none() && carbs.is_none() && fat.is_none() {
        bail!("Nothing to set. Pass at least one of --calories, --protein, --carbs, --fat");
    }

    let current = svc.ensure_profile(session)?.goals;
    let goals = Goals {
        calories: merge_goal(calories, current.calories),
        protein: merge_goal(protein, current.protein),
        carbs: merge_goal(carbs, current.carbs),
        fat: merge_goal(fat, current.fat),
    };
    let profile = svc.set_goals(session, &goals)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile.goals)?);
    } else {
        print_goals(&profile);
    }
    Ok(())
}

pub(crate) fn cmd_goals_show(svc: &NutrilogService, session: &Session, json: bool) -> Result<()> {
    let profile = svc.ensure_profile(session)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile.goals)?);
    } else {
        print_goals(&profile);
    }
    Ok(())
}

pub(crate) fn cmd_goals_clear(svc: &NutrilogService, session: &Session, json: bool) -> Result<()> {
    let profile = svc.set_goals(session, &Goals::default())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile.goals)?);
    } else {
        println!("Cleared all goals");
    }
    Ok(())
}

pub(crate) fn cmd_units(
    svc: &NutrilogService,
    session: &Session,
    system: Option<&str>,
    json: bool,
) -> Result<()> {
    let profile = match system {
        None => svc.ensure_profile(session)?,
        Some(s) => {
            let preference = match s.trim().to_lowercase().as_str() {
                "metric" => UnitPreference::Metric,
                "imperial" => UnitPreference::Imperial,
                _ => bail!("Invalid unit system '{s}'. Use 'metric' or 'imperial'"),
            };
            svc.set_unit_preference(session, preference)?
        }
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "unit_preference": profile.unit_preference })
        );
    } else {
        println!("Units: {}", profile.unit_preference.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goals_set_merges_with_existing() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();

        cmd_goals_set(&svc, &session, Some(2000.0), Some(150.0), None, None, true).unwrap();
        cmd_goals_set(&svc, &session, None, None, Some(250.0), None, false).unwrap();

        let goals = svc.ensure_profile(&session).unwrap().goals;
        assert_eq!(goals.calories, Some(2000.0));
        assert_eq!(goals.protein, Some(150.0));
        assert_eq!(goals.carbs, Some(250.0));
        assert_eq!(goals.fat, None);
    }

    #[test]
    fn test_goals_set_rejects_empty_and_invalid() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        assert!(cmd_goals_set(&svc, &session, None, None, None, None, true).is_err());
        assert!(cmd_goals_set(&svc, &session, Some(-5.0), None, None, None, true).is_err());
    }

    #[test]
    fn test_goals_set_zero_clears_one_goal() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        cmd_goals_set(&svc, &session, Some(2000.0), Some(150.0), None, None, true).unwrap();
        cmd_goals_set(&svc, &session, Some(0.0), None, None, None, true).unwrap();

        let goals = svc.ensure_profile(&session).unwrap().goals;
        assert_eq!(goals.calories, None);
        assert_eq!(goals.protein, Some(150.0));
    }

    #[test]
    fn test_goals_clear() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        cmd_goals_set(&svc, &session, Some(1800.0), None, None, None, true).unwrap();
        cmd_goals_clear(&svc, &session, true).unwrap();
        assert_eq!(svc.ensure_profile(&session).unwrap().goals, Goals::default());
    }

    #[test]
    fn test_units() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        cmd_units(&svc, &session, Some("Imperial"), true).unwrap();
        assert_eq!(
            svc.ensure_profile(&session).unwrap().unit_preference,
            UnitPreference::Imperial
        );
        assert!(cmd_units(&svc, &session, Some("furlongs"), true).is_err());
        cmd_units(&svc, &session, None, false).unwrap();
    }
}
