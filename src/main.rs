use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod cohort;
mod db;
mod error;
mod export;
mod models;
mod report;
mod stats;

use cohort::CohortCriteria;
use models::{NewEvaluation, NewVolunteer, Ratings, VolunteerStatus, VolunteerUpdate};

#[derive(Parser)]
#[command(name = "volunteer-evaluations")]
#[command(about = "Volunteer performance evaluations and dashboards", long_about = None)]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[arg(long, env = "VOLUNTEER_EVAL_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CohortArgs {
    /// Only classify volunteers with this status
    #[arg(long, value_enum)]
    status: Option<VolunteerStatus>,
    #[arg(long, default_value_t = 8.0)]
    top_threshold: f64,
    #[arg(long, default_value_t = 6.0)]
    attention_threshold: f64,
    #[arg(long, default_value_t = 3)]
    top_min_evaluations: usize,
    #[arg(long, default_value_t = 2)]
    attention_min_evaluations: usize,
    #[arg(long, default_value_t = 10)]
    top_limit: usize,
    /// Cap the needs-attention list (unlimited by default)
    #[arg(long)]
    attention_limit: Option<usize>,
}

impl CohortArgs {
    fn criteria(&self) -> CohortCriteria {
        CohortCriteria {
            top_threshold: self.top_threshold,
            attention_threshold: self.attention_threshold,
            top_min_evaluations: self.top_min_evaluations,
            attention_min_evaluations: self.attention_min_evaluations,
            top_limit: Some(self.top_limit),
            attention_limit: self.attention_limit,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample volunteers and evaluations
    Seed,
    /// Import evaluations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Register a volunteer
    AddVolunteer {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long, value_enum, default_value_t = VolunteerStatus::Active)]
        status: VolunteerStatus,
        #[arg(long)]
        since: Option<NaiveDate>,
    },
    /// Mark a volunteer active or inactive
    SetStatus {
        #[arg(long)]
        volunteer: Uuid,
        #[arg(long, value_enum)]
        status: VolunteerStatus,
    },
    /// Correct a volunteer's name or status
    #[command(group(
        ArgGroup::new("changes")
            .args(["first_name", "last_name", "status"])
            .required(true)
            .multiple(true)
    ))]
    EditVolunteer {
        #[arg(long)]
        volunteer: Uuid,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long, value_enum)]
        status: Option<VolunteerStatus>,
    },
    /// Delete a volunteer and all of their evaluations
    DeleteVolunteer {
        #[arg(long)]
        volunteer: Uuid,
    },
    /// List volunteers
    Volunteers {
        #[arg(long, value_enum)]
        status: Option<VolunteerStatus>,
        /// Match against first or last name
        #[arg(long)]
        search: Option<String>,
    },
    /// Record an evaluation for a volunteer
    #[command(group(
        ArgGroup::new("target")
            .args(["volunteer", "email"])
            .required(true)
            .multiple(false)
    ))]
    Submit {
        #[arg(long)]
        volunteer: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        evaluator_name: String,
        #[arg(long)]
        evaluator_email: Option<String>,
        #[arg(long)]
        evaluator_role: Option<String>,
        #[arg(long)]
        event_name: Option<String>,
        #[arg(long)]
        role_performed: Option<String>,
        /// Service date, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_parser = clap::value_parser!(i16).range(1..=10))]
        reliability: i16,
        #[arg(long, value_parser = clap::value_parser!(i16).range(1..=10))]
        quality_of_work: i16,
        #[arg(long, value_parser = clap::value_parser!(i16).range(1..=10))]
        initiative: i16,
        #[arg(long, value_parser = clap::value_parser!(i16).range(1..=10))]
        teamwork: i16,
        #[arg(long, value_parser = clap::value_parser!(i16).range(1..=10))]
        communication: i16,
        #[arg(long)]
        strengths: Option<String>,
        #[arg(long)]
        areas_for_improvement: Option<String>,
        #[arg(long)]
        comments: Option<String>,
    },
    /// Show one evaluation in full
    ShowEvaluation {
        #[arg(long)]
        code: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete an evaluation by its EVAL-NNNNN code
    DeleteEvaluation {
        #[arg(long)]
        code: String,
    },
    /// Show performance statistics for one volunteer
    #[command(group(
        ArgGroup::new("target")
            .args(["volunteer", "email"])
            .required(true)
            .multiple(false)
    ))]
    Stats {
        #[arg(long)]
        volunteer: Option<Uuid>,
        #[arg(long)]
        email: Option<String>,
        /// Months of monthly trend to include (30-day months)
        #[arg(long, default_value_t = 6)]
        months: u32,
        #[arg(long)]
        json: bool,
    },
    /// List top performers and volunteers needing attention
    Cohorts {
        #[command(flatten)]
        filters: CohortArgs,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown dashboard report
    Report {
        #[command(flatten)]
        filters: CohortArgs,
        /// Number of recent evaluations to list
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(i64).range(1..))]
        recent: i64,
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
    },
    /// Export every evaluation as CSV
    Export {
        /// Output file, stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info,sqlx=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;
    debug!(max_connections = cli.max_connections, "connected to Postgres");

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            info!(inserted, path = %csv.display(), "import finished");
            println!("Inserted {inserted} evaluations from {}.", csv.display());
        }
        Commands::AddVolunteer {
            first_name,
            last_name,
            email,
            phone,
            status,
            since,
        } => {
            if first_name.trim().is_empty() || last_name.trim().is_empty() {
                anyhow::bail!("first and last name are required");
            }
            let volunteer = NewVolunteer {
                first_name,
                last_name,
                email,
                phone,
                status,
                first_volunteered_on: since,
            };
            let id = db::add_volunteer(&pool, &volunteer).await?;
            println!(
                "Added {} {} ({id}).",
                volunteer.first_name.trim(),
                volunteer.last_name.trim()
            );
        }
        Commands::SetStatus { volunteer, status } => {
            let update = VolunteerUpdate {
                status: Some(status),
                ..VolunteerUpdate::default()
            };
            if db::update_volunteer(&pool, volunteer, &update).await? {
                println!("Volunteer {volunteer} is now {status}.");
            } else {
                anyhow::bail!("no volunteer with id {volunteer}");
            }
        }
        Commands::EditVolunteer {
            volunteer,
            first_name,
            last_name,
            status,
        } => {
            if [&first_name, &last_name]
                .into_iter()
                .flatten()
                .any(|name| name.trim().is_empty())
            {
                anyhow::bail!("names cannot be blank");
            }
            let update = VolunteerUpdate {
                first_name,
                last_name,
                status,
            };
            if !db::update_volunteer(&pool, volunteer, &update).await? {
                anyhow::bail!("no volunteer with id {volunteer}");
            }
            println!("Volunteer {volunteer} updated.");
        }
        Commands::DeleteVolunteer { volunteer } => {
            match db::delete_volunteer(&pool, volunteer).await? {
                Some(evaluations) => {
                    println!("Deleted volunteer {volunteer} and {evaluations} evaluations.");
                }
                None => anyhow::bail!("no volunteer with id {volunteer}"),
            }
        }
        Commands::Volunteers { status, search } => {
            let volunteers = db::list_volunteers(&pool, status, search.as_deref()).await?;
            if volunteers.is_empty() {
                println!("No volunteers found.");
                return Ok(());
            }
            for volunteer in &volunteers {
                println!(
                    "- {} ({}, {}) {}",
                    volunteer.full_name(),
                    volunteer.email.as_deref().unwrap_or("no email"),
                    volunteer.status,
                    volunteer.id
                );
            }
            println!("Total: {} volunteers", volunteers.len());
        }
        Commands::Submit {
            volunteer,
            email,
            evaluator_name,
            evaluator_email,
            evaluator_role,
            event_name,
            role_performed,
            date,
            reliability,
            quality_of_work,
            initiative,
            teamwork,
            communication,
            strengths,
            areas_for_improvement,
            comments,
        } => {
            let target = db::fetch_volunteer(&pool, volunteer, email.as_deref())
                .await?
                .context("no matching volunteer")?;
            if !target.status.accepts_evaluations() {
                anyhow::bail!(
                    "{} is {} and cannot be evaluated",
                    target.full_name(),
                    target.status
                );
            }
            let evaluation = NewEvaluation {
                volunteer_id: target.id,
                event_name,
                role_performed,
                evaluation_date: date.unwrap_or_else(|| Utc::now().date_naive()),
                ratings: Ratings {
                    reliability: Some(reliability),
                    quality_of_work: Some(quality_of_work),
                    initiative: Some(initiative),
                    teamwork: Some(teamwork),
                    communication: Some(communication),
                },
                strengths,
                areas_for_improvement,
                additional_comments: comments,
                evaluator_name,
                evaluator_email,
                evaluator_role,
                submitted_at: None,
                source_key: None,
            };

            match db::submit_evaluation(&pool, &evaluation).await? {
                db::SubmitOutcome::Recorded { evaluation_code } => {
                    println!("Recorded {evaluation_code} for {}.", target.full_name());
                }
                db::SubmitOutcome::Duplicate { evaluation_code } => {
                    println!(
                        "{evaluation_code} already covers this volunteer, evaluator, event and date; \
                         contact an administrator to change it."
                    );
                }
                db::SubmitOutcome::VolunteerInactive => {
                    anyhow::bail!(
                        "{} was marked inactive before the evaluation was saved",
                        target.full_name()
                    );
                }
            }
        }
        Commands::ShowEvaluation { code, json } => {
            let row = db::fetch_evaluation(&pool, &code)
                .await?
                .with_context(|| format!("no evaluation with code {code}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                print!("{}", report::build_evaluation_detail(&row));
            }
        }
        Commands::DeleteEvaluation { code } => {
            if db::delete_evaluation(&pool, &code).await? {
                info!(evaluation_code = %code, "evaluation deleted");
                println!("Deleted {code}.");
            } else {
                anyhow::bail!("no evaluation with code {code}");
            }
        }
        Commands::Stats {
            volunteer,
            email,
            months,
            json,
        } => {
            let target = db::fetch_volunteer(&pool, volunteer, email.as_deref())
                .await?
                .context("no matching volunteer")?;
            let history = db::fetch_history(&pool, target).await?;

            let summary = stats::compute_volunteer_stats(&history.evaluations)?;
            let monthly = stats::monthly_trend(&history.evaluations, months)?;
            let correlations = stats::category_correlations(&history.evaluations)?;

            if json {
                let body = serde_json::json!({
                    "volunteer": history.volunteer,
                    "stats": summary,
                    "monthly_trend": monthly,
                    "category_correlations": correlations,
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                print!(
                    "{}",
                    report::build_profile(&history, &summary, &monthly, correlations.as_ref())
                );
            }
        }
        Commands::Cohorts { filters, json } => {
            let histories = db::fetch_histories(&pool, filters.status).await?;
            let cohorts = cohort::classify_population(&histories, &filters.criteria())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cohorts)?);
                return Ok(());
            }

            println!("Top performers:");
            if cohorts.top_performers.is_empty() {
                println!("  none");
            }
            for entry in &cohorts.top_performers {
                println!(
                    "- {} overall {:.1} across {} evaluations",
                    entry.volunteer_name, entry.average_overall, entry.evaluation_count
                );
            }
            println!("Needs attention:");
            if cohorts.needs_attention.is_empty() {
                println!("  none");
            }
            for entry in &cohorts.needs_attention {
                println!(
                    "- {} overall {:.1} across {} evaluations",
                    entry.volunteer_name, entry.average_overall, entry.evaluation_count
                );
            }
        }
        Commands::Report {
            filters,
            recent,
            out,
        } => {
            let counts = db::dashboard_counts(&pool).await?;
            let histories = db::fetch_histories(&pool, filters.status).await?;
            let cohorts = cohort::classify_population(&histories, &filters.criteria())?;
            let recent = db::fetch_volunteer_evaluations(&pool, Some(recent)).await?;

            let markdown = report::build_dashboard(Utc::now(), &counts, &cohorts, &recent);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out } => {
            let rows = db::fetch_volunteer_evaluations(&pool, None).await?;
            let written = match &out {
                Some(path) => {
                    let file = std::fs::File::create(path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    export::write_evaluations_csv(file, &rows)?
                }
                None => export::write_evaluations_csv(std::io::stdout().lock(), &rows)?,
            };
            info!(written, "evaluations exported");
            if let Some(path) = out {
                println!("Exported {written} evaluations to {}.", path.display());
            }
        }
    }

    Ok(())
}
