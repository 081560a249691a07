use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrilog_core::models::NewWeightEntry;
use nutrilog_core::service::{NutrilogService, Session};
use nutrilog_core::units::{UnitPreference, format_weight_for, weight_from_unit};

use super::helpers::parse_date;

/// Convert an entered weight to kilograms. Without an explicit unit the
/// profile's display preference decides.
fn to_kg(svc: &NutrilogService, session: &Session, value: f64, unit: Option<&str>) -> Result<(f64, UnitPreference)> {
    let preference = svc.ensure_profile(session)?.unit_preference;
    let unit = unit.unwrap_or(match preference {
        UnitPreference::Metric => "kg",
        UnitPreference::Imperial => "lb",
    });
    Ok((weight_from_unit(value, unit)?, preference))
}

pub(crate) fn cmd_weight_log(
    svc: &NutrilogService,
    session: &Session,
    value: f64,
    unit: Option<&str>,
    date: Option<String>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let (weight_kg, preference) = to_kg(svc, session, value, unit)?;
    let logged_at = parse_date(date)?;
    let entry = svc.log_weight(
        session,
        &NewWeightEntry {
            weight_kg,
            logged_at,
            notes,
        },
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Logged {} for {}",
            format_weight_for(entry.weight_kg, preference),
            entry.logged_at
        );
        if let Some(ref n) = entry.notes {
            println!("  Notes: {n}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_weight_history(
    svc: &NutrilogService,
    session: &Session,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let entries = svc.weight_history(session, limit.map(i64::from))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No weight entries found. Use `nutrilog weight log` to record your weight.");
    } else {
        #[derive(Tabled)]
        struct WeightRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Date")]
            date: String,
            #[tabled(rename = "Weight")]
            weight: String,
            #[tabled(rename = "Notes")]
            notes: String,
        }

        let rows: Vec<WeightRow> = entries
            .iter()
            .map(|e| WeightRow {
                id: e.id.unwrap_or_default(),
                date: e.logged_at.clone(),
                weight: e.display.clone(),
                notes: e.notes.clone().unwrap_or_default(),
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_weight_edit(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    value: Option<f64>,
    unit: Option<&str>,
    notes: Option<&str>,
    json: bool,
) -> Result<()> {
    let (weight_kg, preference) = match value {
        Some(v) => {
            let (kg, pref) = to_kg(svc, session, v, unit)?;
            (Some(kg), pref)
        }
        None => (None, svc.ensure_profile(session)?.unit_preference),
    };
    let entry = svc.edit_weight(session, id, weight_kg, notes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        println!(
            "Updated [{id}] {}: {}",
            entry.logged_at,
            format_weight_for(entry.weight_kg, preference)
        );
    }
    Ok(())
}

pub(crate) fn cmd_weight_delete(
    svc: &NutrilogService,
    session: &Session,
    id: i64,
    json: bool,
) -> Result<()> {
    svc.delete_weight(session, id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted weight entry {id}");
    }
    Ok(())
}
