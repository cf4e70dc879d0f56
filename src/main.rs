//! liftlog - Personal workout tracker

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};

use liftlog::backup::{BackupManager, ExportOutcome, LocalFileHost, export_store, restore_store};
use liftlog::db::{Database, NewPlan, PlanExercise, SetEntry};
use liftlog::metrics::{Metric, ProgressTrend, best_set, exercise_series, unique_exercise_names};
use liftlog::session::{Session, complete_session};
use liftlog::tui::App;

#[derive(Parser)]
#[command(name = "liftlog")]
#[command(author, version, about = "Personal workout tracker")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "LIFTLOG_DB", default_value = "liftlog.db", global = true)]
    db: PathBuf,

    /// Backup file overwritten in place after every session
    #[arg(long, env = "LIFTLOG_BACKUP_FILE", global = true)]
    backup_file: Option<PathBuf>,

    /// Where backups are saved when no backup file is set
    #[arg(long, env = "LIFTLOG_DOWNLOAD_DIR", default_value = ".", global = true)]
    download_dir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI dashboard
    Tui,

    /// Manage custom exercise names
    Exercise {
        #[command(subcommand)]
        action: ExerciseAction,
    },

    /// Manage workout plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },

    /// Log a finished session and back up the store
    Log {
        /// Plan title (case-insensitive)
        plan: String,

        /// Performed set as "name:weight:reps", repeatable
        #[arg(short, long = "set", value_parser = parse_set)]
        sets: Vec<(String, SetEntry)>,

        /// Skip the backup after logging
        #[arg(long)]
        no_backup: bool,
    },

    /// List recent sessions
    History {
        /// Number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the progress series of one exercise
    Progress {
        /// Exercise name (exact, case-sensitive)
        exercise: String,

        /// "weight" or "one-rep-max"
        #[arg(short, long, default_value = "weight")]
        metric: Metric,
    },

    /// List exercise names found in logs
    Names {
        /// Read plans instead of logs
        #[arg(long)]
        plans: bool,
    },

    /// Write a JSON backup of everything
    Export,

    /// Replace everything with a JSON backup
    Import {
        file: PathBuf,
    },

    /// Delete all exercises, plans and logs
    Reset {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ExerciseAction {
    /// Add a custom exercise name
    Add { name: String },
    /// List custom exercise names
    List,
    /// Delete all custom exercise names
    Clear,
    /// Add names used in plans and logs
    Sync,
}

#[derive(Subcommand)]
enum PlanAction {
    /// Create a plan
    Add {
        title: String,

        /// Exercise as "name:sets:reps", repeatable
        #[arg(short, long = "exercise", value_parser = parse_plan_exercise)]
        exercises: Vec<PlanExercise>,
    },
    /// List plans
    List,
    /// Delete a plan by id
    Delete { id: i64 },
    /// Delete all plans
    Clear,
}

/// "Bench Press:3:8-12"; the name may itself contain colons
fn parse_plan_exercise(s: &str) -> Result<PlanExercise, String> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(reps), Some(sets), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected name:sets:reps, got {:?}", s));
    };
    let sets = sets
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid set count {:?}: {}", sets, e))?;
    Ok(PlanExercise::new(name.trim(), sets, reps.trim()))
}

/// "Bench Press:135:8"
fn parse_set(s: &str) -> Result<(String, SetEntry), String> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(reps), Some(weight), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected name:weight:reps, got {:?}", s));
    };
    Ok((name.trim().to_string(), SetEntry::new(weight.trim(), reps.trim())))
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = Database::open(&cli.db)
        .with_context(|| format!("Failed to open database: {}", cli.db.display()))?;
    let host = LocalFileHost::new(cli.backup_file.clone(), cli.download_dir.clone());

    match cli.command {
        Some(Commands::Tui) | None => {
            let mut app = App::new(db)?;
            app.run()?;
        }

        Some(Commands::Exercise { action }) => match action {
            ExerciseAction::Add { name } => {
                let exercise = db.create_exercise(&name)?;
                println!("Added exercise: {} (id: {})", exercise.name, exercise.id.unwrap_or_default());
            }
            ExerciseAction::List => {
                for exercise in db.list_exercises()? {
                    println!("{:>4} | {}", exercise.id.unwrap_or_default(), exercise.name);
                }
            }
            ExerciseAction::Clear => {
                db.clear_exercises()?;
                println!("Exercises cleared");
            }
            ExerciseAction::Sync => {
                let added = db.sync_exercises()?;
                println!("Added {} exercise names", added);
            }
        },

        Some(Commands::Plan { action }) => match action {
            PlanAction::Add { title, exercises } => {
                let plan = db.create_plan(NewPlan { title, exercises })?;
                println!("Created plan: {} (id: {})", plan.title, plan.id.unwrap_or_default());
            }
            PlanAction::List => {
                for plan in db.list_plans()? {
                    println!("{:>4} | {}", plan.id.unwrap_or_default(), plan.title);
                    for e in &plan.exercises {
                        println!("     |   {:24} {} x {}", e.name, e.goal_sets, e.goal_reps);
                    }
                }
            }
            PlanAction::Delete { id } => {
                db.delete_plan(id)?;
                println!("Plan {} deleted", id);
            }
            PlanAction::Clear => {
                db.clear_plans()?;
                println!("Plans cleared");
            }
        },

        Some(Commands::Log { plan, sets, no_backup }) => {
            let Some(plan) = db.find_plan_by_title(&plan)? else {
                bail!("No plan titled {:?}", plan);
            };

            let mut session = Session::from_plan(&plan);
            // Fill the plan's goal sets first, then append extra sets
            let mut filled = vec![0usize; session.exercises().len()];
            for (name, set) in sets {
                let index = match session.exercises().iter().position(|e| e.name == name) {
                    Some(i) => i,
                    None => {
                        filled.push(0);
                        session.add_exercise(&name)
                    }
                };
                let slot = if filled[index] < session.exercises()[index].sets.len() {
                    filled[index]
                } else {
                    session.add_set(index)?
                };
                session.record_set(index, slot, &set.weight, &set.reps)?;
                filled[index] += 1;
            }

            let now = Utc::now();
            if no_backup {
                let log = db.append_log(session.finish(now))?;
                println!("Logged: {} (id: {})", log.plan_title, log.id.unwrap_or_default());
            } else {
                let mut backup = BackupManager::new(host);
                let (log, outcome) = complete_session(&db, &mut backup, session, now)?;
                println!("Logged: {} (id: {})", log.plan_title, log.id.unwrap_or_default());
                print_export_outcome(&outcome, &backup);
            }
        }

        Some(Commands::History { limit }) => {
            println!("Recent sessions:");
            println!("{:-<60}", "");
            for log in db.recent_logs(limit)? {
                println!("{} | {}", log.date.format("%Y-%m-%d %H:%M"), log.plan_title);
                for e in &log.exercises {
                    let best = best_set(&log, &e.name);
                    println!(
                        "    {:24} {} sets, best {}x{} (1RM {})",
                        e.name,
                        e.sets.len(),
                        best.weight,
                        best.reps,
                        best.one_rep_max
                    );
                }
            }
        }

        Some(Commands::Progress { exercise, metric }) => {
            let logs = db.list_logs()?;
            let mut series = exercise_series(&logs, &exercise, metric);
            series.sort_by_key(|p| p.date);

            println!("{}: {}", exercise, metric.label());
            println!("{:-<40}", "");
            if series.is_empty() {
                println!("No sessions with {:?}", exercise);
            }
            for point in &series {
                println!("{} | {:>8.1}", point.date.format("%Y-%m-%d"), point.value);
            }
            if let Some(trend) = ProgressTrend::fit(&series) {
                println!("{}", trend.summary("kg"));
            }
        }

        Some(Commands::Names { plans }) => {
            let names = if plans {
                unique_exercise_names(&db.list_plans()?)
            } else {
                unique_exercise_names(&db.list_logs()?)
            };
            for name in names {
                println!("{}", name);
            }
        }

        Some(Commands::Export) => {
            let mut backup = BackupManager::new(host);
            let outcome = export_store(&db, &mut backup)?;
            print_export_outcome(&outcome, &backup);
        }

        Some(Commands::Import { file }) => {
            let mut backup = BackupManager::new(host.with_open_file(&file));
            let snapshot = restore_store(&db, &mut backup)
                .with_context(|| format!("Import of {} failed, nothing was changed", file.display()))?;
            println!(
                "Imported {} logs, {} plans, {} exercises",
                snapshot.logs.len(),
                snapshot.plans.len(),
                snapshot.exercises.len()
            );
        }

        Some(Commands::Reset { yes }) => {
            if !yes {
                bail!("Refusing to delete everything without --yes");
            }
            db.reset_all()?;
            println!("All data deleted");
        }
    }

    Ok(())
}

fn print_export_outcome(outcome: &ExportOutcome, backup: &BackupManager<LocalFileHost>) {
    match outcome {
        ExportOutcome::Written(path) => println!("Backup written to {}", path.display()),
        ExportOutcome::Offered => println!("Backup saved in {}", backup.host().download_dir().display()),
    }
}
