use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use nutrilog_core::service::{NutrilogService, Session};

use super::helpers::parse_date;
use super::summary::print_day_summary;

pub(crate) fn cmd_coach_link(
    svc: &NutrilogService,
    session: &Session,
    coach_id: &str,
    json: bool,
) -> Result<()> {
    let profile = svc.link_coach(session, coach_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Linked to coach {}", coach_id.trim());
    }
    Ok(())
}

pub(crate) fn cmd_coach_unlink(svc: &NutrilogService, session: &Session, json: bool) -> Result<()> {
    let profile = svc.unlink_coach(session)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Coach unlinked");
    }
    Ok(())
}

pub(crate) fn cmd_coach_clients(svc: &NutrilogService, session: &Session, json: bool) -> Result<()> {
    let clients = svc.clients(session)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&clients)?);
        return Ok(());
    }

    if clients.is_empty() {
        eprintln!("No clients have linked you as their coach. Your id is {}", session.user_id);
        eprintln!("A client links you with: nutrilog --user <their id> coach link {}", session.user_id);
        return Ok(());
    }

    #[derive(Tabled)]
    struct ClientRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calorie goal")]
        calorie_goal: String,
    }

    let rows: Vec<ClientRow> = clients
        .iter()
        .map(|c| ClientRow {
            id: c.id.clone(),
            name: c.display_name.clone().unwrap_or_default(),
            calorie_goal: c
                .goals
                .calories
                .map_or("-".into(), |g| format!("{g:.0}")),
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_coach_view(
    svc: &NutrilogService,
    session: &Session,
    client_id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let summary = svc.client_day_summary(session, client_id, date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Client {client_id}");
        print_day_summary(&summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coach_flow() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let coach = svc.local_session().unwrap();
        let client = Session::new("client-1");
        svc.ensure_profile(&client).unwrap();

        // Not linked yet
        assert!(cmd_coach_view(&svc, &coach, "client-1", None, true).is_err());

        cmd_coach_link(&svc, &client, &coach.user_id, true).unwrap();
        cmd_coach_clients(&svc, &coach, false).unwrap();
        assert_eq!(svc.clients(&coach).unwrap().len(), 1);
        cmd_coach_view(&svc, &coach, "client-1", Some("2024-01-01".into()), false).unwrap();

        cmd_coach_unlink(&svc, &client, false).unwrap();
        assert!(svc.clients(&coach).unwrap().is_empty());
    }

    #[test]
    fn test_coach_flow_across_invocations() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nutrilog.db");

        // The install owner acts as coach
        let coach_id = {
            let svc = NutrilogService::new(&db_path).unwrap();
            svc.local_session().unwrap().user_id
        };

        // `nutrilog --user alice ...`
        {
            let svc = NutrilogService::new(&db_path).unwrap();
            let alice = svc.session_for("alice").unwrap();
            svc.log_food(
                &alice,
                &nutrilog_core::models::NewFoodEntry {
                    name: "Porridge".into(),
                    calories: 320.0,
                    protein: None,
                    carbs: None,
                    fat: None,
                    eaten_at: chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                },
            )
            .unwrap();
            cmd_coach_link(&svc, &alice, &coach_id, true).unwrap();
        }

        let svc = NutrilogService::new(&db_path).unwrap();
        let coach = svc.local_session().unwrap();
        assert_eq!(coach.user_id, coach_id);
        let clients = svc.clients(&coach).unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].id, "alice");

        cmd_coach_view(&svc, &coach, "alice", Some("2024-05-01".into()), true).unwrap();
        let summary = svc
            .client_day_summary(&coach, "alice", chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
            .unwrap();
        assert!((summary.totals.eaten - 320.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_coach_cannot_link_self() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        assert!(cmd_coach_link(&svc, &session, &session.user_id.clone(), true).is_err());
    }
}
