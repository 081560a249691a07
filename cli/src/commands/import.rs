use std::path::Path;

use anyhow::{Context, Result};

use nutrilog_core::service::{NutrilogService, Session};

use super::helpers::json_error;

pub(crate) fn cmd_import_foods(
    svc: &NutrilogService,
    session: &Session,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let summary = svc.import_foods_csv(session, file, dry_run)?;

    if summary.rows_parsed == 0 {
        if json {
            println!("{}", json_error("No rows found in CSV file"));
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Foods to log:  {}", summary.imported);
    } else {
        println!("Import complete.\n");
        println!("  Foods logged:  {}", summary.imported);
    }
    println!("  Rows parsed:   {}", summary.rows_parsed);
    println!("  Dates spanned: {}", summary.dates_spanned);
    println!("  Calories:      {:.0} kcal", summary.total_calories);
    let skipped = summary.skipped_blank + summary.skipped_bad_date + summary.skipped_invalid;
    if skipped > 0 {
        println!(
            "  Skipped:       {skipped} (blank {}, bad date {}, invalid {})",
            summary.skipped_blank, summary.skipped_bad_date, summary.skipped_invalid
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_import_foods_from_file() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Date,Food,Calories,Protein").unwrap();
        writeln!(file, "2024-06-01,Yogurt,150,12").unwrap();
        writeln!(file, "2024-06-02,Granola,\"210\",5").unwrap();
        writeln!(file, "someday,Ghost,100,").unwrap();
        file.flush().unwrap();

        cmd_import_foods(&svc, &session, file.path(), true, true).unwrap();
        assert!(
            svc.food_log(&session, nutrilog_core::aggregate::DateOrder::Ascending)
                .unwrap()
                .is_empty()
        );

        cmd_import_foods(&svc, &session, file.path(), false, false).unwrap();
        let log = svc
            .food_log(&session, nutrilog_core::aggregate::DateOrder::Ascending)
            .unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].date, "2024-06-01");
    }

    #[test]
    fn test_import_missing_file() {
        let svc = NutrilogService::new_in_memory().unwrap();
        let session = svc.local_session().unwrap();
        let err = cmd_import_foods(&svc, &session, Path::new("/nonexistent/foods.csv"), false, true)
            .unwrap_err();
        assert!(err.to_string().contains("Failed to open file"));
    }
}
