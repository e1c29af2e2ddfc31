use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use qbank::api::{self, AppState};
use qbank::config::{self, QbankConfig};
use qbank::db::Database;
use qbank::filter::{compile_selection, LegacyFilters};
use qbank::ingest;
use qbank::output::{json as json_out, table};

#[derive(Parser)]
#[command(
    name = "qbank",
    version,
    about = "Question bank manager — filterable question store with QA workflow and assignment API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to database file (default: ~/.qbank/qbank.db)
    #[arg(long, global = true, env = "QBANK_DB")]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },

    /// List questions
    List {
        /// Filter by subject (comma-separated for multiple)
        #[arg(long)]
        subject: Option<String>,

        /// Filter by topic (partial match)
        #[arg(long)]
        topic: Option<String>,

        /// Filter by grade
        #[arg(long)]
        grade: Option<String>,

        /// Filter by board (comma-separated; matches array containment)
        #[arg(long)]
        boards: Option<String>,

        /// Exact difficulty (1-10)
        #[arg(long)]
        difficulty: Option<String>,

        /// Difficulty range lower bound
        #[arg(long)]
        difficulty_min: Option<String>,

        /// Difficulty range upper bound
        #[arg(long)]
        difficulty_max: Option<String>,

        /// Filter by QA status
        #[arg(long)]
        qa_status: Option<String>,

        /// Free-text search (UUID and readable IDs match exactly)
        #[arg(long)]
        search: Option<String>,

        /// Maximum results
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show question details
    Show {
        /// Question ID
        id: String,
    },

    /// Import questions from JSON files
    Import {
        /// File, directory, or glob paths to import
        paths: Vec<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show database statistics
    Stats,

    /// Deactivate a question (soft delete)
    Delete {
        /// Question ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (tokens redacted)
    Config,

    /// Create a default config file at ~/.qbank/config.toml
    InitConfig,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;
    let config = QbankConfig::load()?;

    // Config-only commands run before the database is touched.
    match &cli.command {
        Commands::Config => {
            println!("{}", config.display_redacted());
            return Ok(());
        }
        Commands::InitConfig => {
            if config::init_config()? {
                println!("Created {}", config::config_path()?.display());
            } else {
                println!("Config already exists at {}", config::config_path()?.display());
            }
            return Ok(());
        }
        _ => {}
    }

    let db_path = cli
        .db
        .or(config.database.clone())
        .map(Ok)
        .unwrap_or_else(Database::default_db_path)?;
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let state = AppState::new(db, &config.server);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(api::serve(state, &bind))?;
        }

        Commands::List {
            subject,
            topic,
            grade,
            boards,
            difficulty,
            difficulty_min,
            difficulty_max,
            qa_status,
            search,
            limit,
        } => {
            let filters = LegacyFilters {
                subject,
                topic,
                grade,
                boards,
                difficulty,
                difficulty_min,
                difficulty_max,
                qa_status,
                search,
                ..Default::default()
            };
            let predicates = compile_selection(Some(&filters), None)?;
            let total = db.count_questions(&predicates)?;
            let questions = db.list_questions(&predicates, limit, 0)?;
            if json_output {
                json_out::print_json(&serde_json::json!({
                    "questions": questions,
                    "total": total,
                }))?;
            } else {
                table::print_question_list(&questions, total);
            }
        }

        Commands::Show { id } => {
            let question = db
                .get_question(&id)?
                .with_context(|| format!("Question not found: {id}"))?;
            let qa = db.get_qa(&id)?;
            if json_output {
                json_out::print_json(&serde_json::json!({
                    "question": question,
                    "qa": qa,
                }))?;
            } else {
                table::print_question_detail(&question, qa.as_ref());
            }
        }

        Commands::Import { paths, dry_run } => {
            if paths.is_empty() {
                anyhow::bail!("No paths given. Usage: qbank import <files...>");
            }
            let count = ingest::import_paths(&db, &paths, dry_run)?;
            if dry_run {
                println!("[dry-run] Would import {count} question(s)");
            } else {
                println!("Imported {count} question(s)");
            }
        }

        Commands::Stats => {
            let stats = db.stats()?;
            if json_output {
                json_out::print_json(&stats)?;
            } else {
                table::print_stats(&stats);
            }
        }

        Commands::Delete { id, force } => {
            let question = db
                .get_question(&id)?
                .with_context(|| format!("Question not found: {id}"))?;
            if !force {
                let text: String = question.question_text.chars().take(60).collect();
                print!("Deactivate \"{text}\"? [y/N] ");
                use std::io::Write;
                std::io::stdout().flush()?;
                let mut answer = String::new();
                std::io::stdin().read_line(&mut answer)?;
                if !answer.trim().eq_ignore_ascii_case("y") {
                    println!("Aborted");
                    return Ok(());
                }
            }
            db.soft_delete_question(&id)?;
            println!("Deactivated {id}");
        }

        Commands::Config | Commands::InitConfig => unreachable!(),
    }

    Ok(())
}
