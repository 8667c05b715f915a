use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use takeoff::db::Database;
use takeoff::engine::{run_estimation, selector, RunOptions};
use takeoff::models::{CreateProjectInput, ParameterSet, Project, RunStatus};
use takeoff::render;

#[derive(Parser)]
#[command(name = "tko")]
#[command(about = "Quantity takeoff and cost estimation for construction projects")]
struct Cli {
    /// Path to the database file (defaults to the user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Compute and store the estimate for a project
    Run {
        /// Project UUID or name
        project: String,

        /// Building parameter, repeatable.
        /// Enumerated choices accept symbolic values (soil_type=weak).
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// JSON file of building parameters ({"width": 12, ...})
        #[arg(long, value_name = "FILE")]
        params: Option<PathBuf>,

        /// Store per-resource detail under each task
        #[arg(long)]
        resources: bool,
    },
    /// Print a project's stored estimate
    Show {
        /// Project UUID or name
        project: String,

        /// Include task costs
        #[arg(long)]
        costs: bool,
    },
    /// List the template catalog
    Templates,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project
    Add {
        name: String,

        /// Site address or plot reference
        #[arg(long)]
        site: Option<String>,
    },
    /// List all projects
    List,
    /// Delete a project and its estimate
    Remove {
        /// Project UUID or name
        project: String,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "takeoff=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let db = match &cli.db {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;

    match cli.command {
        Commands::Project { command } => match command {
            ProjectCommands::Add { name, site } => {
                let project = db.create_project(CreateProjectInput {
                    name,
                    site_address: site,
                })?;
                println!("{}  {}", project.id, project.name);
            }
            ProjectCommands::List => {
                for project in db.get_all_projects()? {
                    let site = project.site_address.as_deref().unwrap_or("-");
                    println!("{}  {}  {}", project.id, project.name, site);
                }
            }
            ProjectCommands::Remove { project } => {
                let project = resolve_project(&db, &project)?;
                db.delete_project(project.id)?;
                println!("Removed {}", project.name);
            }
        },
        Commands::Run {
            project,
            set,
            params,
            resources,
        } => {
            let project = resolve_project(&db, &project)?;
            let params = build_parameters(params.as_deref(), &set)?;
            let options = RunOptions {
                include_resources: resources,
            };

            let report = run_estimation(&db, project.id, &params, &options)?;

            for skip in &report.skipped {
                println!("warning: skipped '{}': {}", skip.task, skip.reason);
            }
            let status = match report.status() {
                RunStatus::Complete => "complete",
                RunStatus::Partial => "partial",
            };
            println!(
                "Estimate for '{}' ({status}): {} tasks, total {:.2}",
                project.name, report.tasks_created, report.total_cost
            );
            println!();
            println!("Resource totals:");
            for total in &report.resource_totals {
                println!(
                    "  {:<12} {}: {:.3} {} = {:.2}",
                    total.resource.code,
                    total.resource.name,
                    total.quantity,
                    total.resource.unit,
                    total.cost
                );
            }
        }
        Commands::Show { project, costs } => {
            let project = resolve_project(&db, &project)?;
            let tree = db.read_estimation_tree(project.id)?;
            if tree.is_empty() {
                println!("No estimate stored for '{}'", project.name);
            } else {
                print!("{}", render::render_tree(&tree, costs));
                if costs {
                    println!("Total: {:.2}", tree.total_cost());
                }
            }
        }
        Commands::Templates => {
            for template in db.get_all_templates()? {
                println!(
                    "{:<18} {}  [{}] {} tasks",
                    template.code,
                    template.name,
                    template.section,
                    template.tasks.len()
                );
            }
        }
    }

    Ok(())
}

fn resolve_project(db: &Database, key: &str) -> anyhow::Result<Project> {
    db.find_project(key)?
        .ok_or_else(|| anyhow::anyhow!("Project '{}' not found", key))
}

/// Merge parameters from an optional JSON file and `--set` pairs; later
/// `--set` values win.
fn build_parameters(file: Option<&std::path::Path>, set: &[String]) -> anyhow::Result<ParameterSet> {
    let mut params = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<ParameterSet>(&text)
                .with_context(|| format!("Invalid parameter file {}", path.display()))?
        }
        None => ParameterSet::new(),
    };

    for pair in set {
        let (name, value) = parse_parameter(pair)?;
        params.set(name, value);
    }

    Ok(params)
}

fn parse_parameter(pair: &str) -> anyhow::Result<(String, f64)> {
    let (name, raw) = pair
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected NAME=VALUE, got '{}'", pair))?;
    let name = name.trim();
    let raw = raw.trim();

    if let Some(code) = selector::choice_code(name, raw) {
        return Ok((name.to_string(), code));
    }
    let value: f64 = raw
        .parse()
        .with_context(|| format!("Invalid value for '{}': '{}'", name, raw))?;
    Ok((name.to_string(), value))
}
