mod commands;
mod config;
mod estimator;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_coach_clients, cmd_coach_link, cmd_coach_unlink, cmd_coach_view, cmd_estimate,
    cmd_exercise_bump, cmd_exercise_delete, cmd_exercise_edit, cmd_exercise_log, cmd_food_bump,
    cmd_food_delete, cmd_food_edit, cmd_food_log, cmd_goals_clear, cmd_goals_set, cmd_goals_show,
    cmd_history, cmd_import_foods, cmd_log, cmd_summary, cmd_units, cmd_weight_delete,
    cmd_weight_edit, cmd_weight_history, cmd_weight_log,
};
use crate::config::{Config, EstimatorConfig};
use crate::estimator::EstimatorClient;
use nutrilog_core::service::NutrilogService;

#[derive(Parser)]
#[command(
    name = "nutrilog",
    version,
    about = "A local-first calorie, exercise and weight tracker",
    long_about = "Log what you eat and burn, track it against your goals, and \
                  estimate meals from a plain-text description."
)]
struct Cli {
    /// Act as this user instead of the install's own identity. Lets a
    /// household or a coach and their clients share one database.
    #[arg(long, global = true, value_name = "USER_ID")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log, edit and delete food entries
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log, edit and delete exercise entries
    Exercise {
        #[command(subcommand)]
        command: ExerciseCommands,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Manage daily calorie and macro goals
    Goals {
        #[command(subcommand)]
        command: GoalsCommands,
    },
    /// Show or set the display unit system
    Units {
        /// metric or imperial (omit to show the current setting)
        system: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a day's entries, totals and goal progress (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show every logged entry grouped by day, newest first
    Log {
        /// List oldest days first
        #[arg(long)]
        oldest_first: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show eaten, burned and net calories per day
    History {
        /// Number of days to cover, ending today
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Estimate calories for a free-text meal description
    Estimate {
        /// What you ate, e.g. "two eggs and a slice of toast"
        description: String,
        /// Date to project onto and log for (default: today)
        #[arg(long)]
        date: Option<String>,
        /// Log the estimated items instead of only previewing them
        #[arg(long)]
        log: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import data from files
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Link to a coach or view the clients who linked you
    Coach {
        #[command(subcommand)]
        command: CoachCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Log a food entry
    Log {
        /// Food name
        name: String,
        /// Calories (kcal)
        calories: f64,
        /// Protein in grams
        #[arg(long)]
        protein: Option<f64>,
        /// Carbs in grams
        #[arg(long)]
        carbs: Option<f64>,
        /// Fat in grams
        #[arg(long)]
        fat: Option<f64>,
        /// Date eaten (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit fields of a food entry
    Edit {
        /// Food entry ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New calories
        #[arg(long)]
        calories: Option<f64>,
        /// New protein in grams
        #[arg(long)]
        protein: Option<f64>,
        /// New carbs in grams
        #[arg(long)]
        carbs: Option<f64>,
        /// New fat in grams
        #[arg(long)]
        fat: Option<f64>,
        /// Move to another date
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Adjust calories by -100, -10, +10 or +100
    Bump {
        /// Food entry ID
        id: i64,
        /// One of -100, -10, +10, +100
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food entry
    Delete {
        /// Food entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ExerciseCommands {
    /// Log an exercise entry
    Log {
        /// Exercise name
        name: String,
        /// Calories burned (kcal)
        calories: f64,
        /// Category, e.g. cardio or strength
        #[arg(long)]
        category: Option<String>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit fields of an exercise entry
    Edit {
        /// Exercise entry ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New calories burned
        #[arg(long)]
        calories: Option<f64>,
        /// New category
        #[arg(long)]
        category: Option<String>,
        /// Move to another date
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Adjust calories burned by -100, -10, +10 or +100
    Bump {
        /// Exercise entry ID
        id: i64,
        /// One of -100, -10, +10, +100
        #[arg(allow_hyphen_values = true)]
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an exercise entry
    Delete {
        /// Exercise entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry (one per day; logging again replaces it)
    Log {
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: your unit preference)
        #[arg(short, long)]
        unit: Option<String>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history, newest first
    History {
        /// Number of entries to show (default: all)
        #[arg(short, long)]
        limit: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a weight entry
    Edit {
        /// Weight entry ID
        id: i64,
        /// New weight value
        #[arg(long)]
        value: Option<f64>,
        /// Unit for --value: kg or lbs (default: your unit preference)
        #[arg(short, long)]
        unit: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a weight entry by ID
    Delete {
        /// Weight entry ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalsCommands {
    /// Set one or more goals (0 clears one); the others keep their values
    Set {
        /// Daily net calorie goal (kcal, 0 clears it)
        #[arg(long)]
        calories: Option<f64>,
        /// Daily protein goal (g)
        #[arg(long)]
        protein: Option<f64>,
        /// Daily carb goal (g)
        #[arg(long)]
        carbs: Option<f64>,
        /// Daily fat goal (g)
        #[arg(long)]
        fat: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show current goals
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove all goals
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Import food entries from a CSV file (date, name, calories, protein, carbs, fat)
    Foods {
        /// Path to the CSV file
        file: std::path::PathBuf,
        /// Parse and report without writing anything
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CoachCommands {
    /// Let a coach view your log
    Link {
        /// The coach's user id
        coach_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove your coach
    Unlink {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the clients who linked you as their coach
    Clients {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a client's day
    View {
        /// Client user id
        client_id: String,
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
/// `RUST_LOG` overrides the default filter.
fn init_tracing(serving: bool) {
    let default = if serving {
        "nutrilog=info,nutrilog_core=info"
    } else {
        "warn"
    };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Commands::Serve { .. }));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = NutrilogService::new(&config.db_path)?;
    let session = match cli.user.as_deref() {
        Some(user_id) => svc.session_for(user_id)?,
        None => svc.local_session()?,
    };

    match cli.command {
        Commands::Food { command } => match command {
            FoodCommands::Log {
                name,
                calories,
                protein,
                carbs,
                fat,
                date,
                json,
            } => cmd_food_log(&svc, &session, &name, calories, protein, carbs, fat, date, json),
            FoodCommands::Edit {
                id,
                name,
                calories,
                protein,
                carbs,
                fat,
                date,
                json,
            } => cmd_food_edit(
                &svc, &session, id, name, calories, protein, carbs, fat, date, json,
            ),
            FoodCommands::Bump { id, amount, json } => {
                cmd_food_bump(&svc, &session, id, &amount, json)
            }
            FoodCommands::Delete { id, json } => cmd_food_delete(&svc, &session, id, json),
        },
        Commands::Exercise { command } => match command {
            ExerciseCommands::Log {
                name,
                calories,
                category,
                date,
                json,
            } => cmd_exercise_log(&svc, &session, &name, calories, category, date, json),
            ExerciseCommands::Edit {
                id,
                name,
                calories,
                category,
                date,
                json,
            } => cmd_exercise_edit(&svc, &session, id, name, calories, category, date, json),
            ExerciseCommands::Bump { id, amount, json } => {
                cmd_exercise_bump(&svc, &session, id, &amount, json)
            }
            ExerciseCommands::Delete { id, json } => cmd_exercise_delete(&svc, &session, id, json),
        },
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                value,
                unit,
                date,
                notes,
                json,
            } => cmd_weight_log(&svc, &session, value, unit.as_deref(), date, notes, json),
            WeightCommands::History { limit, json } => {
                cmd_weight_history(&svc, &session, limit, json)
            }
            WeightCommands::Edit {
                id,
                value,
                unit,
                notes,
                json,
            } => cmd_weight_edit(
                &svc,
                &session,
                id,
                value,
                unit.as_deref(),
                notes.as_deref(),
                json,
            ),
            WeightCommands::Delete { id, json } => cmd_weight_delete(&svc, &session, id, json),
        },
        Commands::Goals { command } => match command {
            GoalsCommands::Set {
                calories,
                protein,
                carbs,
                fat,
                json,
            } => cmd_goals_set(&svc, &session, calories, protein, carbs, fat, json),
            GoalsCommands::Show { json } => cmd_goals_show(&svc, &session, json),
            GoalsCommands::Clear { json } => cmd_goals_clear(&svc, &session, json),
        },
        Commands::Units { system, json } => cmd_units(&svc, &session, system.as_deref(), json),
        Commands::Summary { date, json } => cmd_summary(&svc, &session, date, json),
        Commands::Log { oldest_first, json } => cmd_log(&svc, &session, oldest_first, json),
        Commands::History { days, json } => cmd_history(&svc, &session, days, json),
        Commands::Estimate {
            description,
            date,
            log,
            json,
        } => {
            let estimator = EstimatorClient::from_config(&EstimatorConfig::from_env()?)?;
            // The client blocks on the runtime handle, which needs a worker
            // thread that is allowed to block.
            tokio::task::block_in_place(|| {
                cmd_estimate(&svc, &session, &estimator, &description, date, log, json)
            })
        }
        Commands::Import { command } => match command {
            ImportCommands::Foods {
                file,
                dry_run,
                json,
            } => cmd_import_foods(&svc, &session, &file, dry_run, json),
        },
        Commands::Coach { command } => match command {
            CoachCommands::Link { coach_id, json } => {
                cmd_coach_link(&svc, &session, &coach_id, json)
            }
            CoachCommands::Unlink { json } => cmd_coach_unlink(&svc, &session, json),
            CoachCommands::Clients { json } => cmd_coach_clients(&svc, &session, json),
            CoachCommands::View {
                client_id,
                date,
                json,
            } => cmd_coach_view(&svc, &session, &client_id, date, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?.0)
            };
            let estimate_config = EstimatorConfig::from_env()?;
            let estimator = if estimate_config.url.is_some() {
                Some(EstimatorClient::from_config(&estimate_config)?)
            } else {
                None
            };
            server::start_server(svc, session, estimator, port, &bind, api_key).await
        }
    }
}
