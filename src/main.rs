use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use grid_lite::broker::{Booking, Broker, RankerKind};
use grid_lite::config::{ClientConfig, Credentials};
use grid_lite::controller::Transports;
use grid_lite::job::Job;
use grid_lite::resource::{ExecutionTarget, JobDescription};
use grid_lite::supervisor::{ControllerRegistry, JobRegistry, JobSelection, JobSupervisor};

#[derive(Parser, Debug)]
#[command(name = "grid-lite")]
#[command(version)]
#[command(about = "Job brokering and remote job control for grid computing sites")]
#[command(propagate_version = true)]
struct Args {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    debug: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Target matching and ranking
    Broker {
        #[command(subcommand)]
        command: BrokerCommands,
    },

    /// Job list commands
    Jobs {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobsCommands,
    },
}

// =============================================================================
// Client Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// File holding the list of managed jobs
    #[arg(long, short = 'j', default_value = "jobs.json")]
    joblist: PathBuf,

    /// Timeout for every remote connection and command, in seconds
    #[arg(long, default_value = "20")]
    timeout: u64,

    /// Path to a proxy certificate (PEM format)
    #[arg(long)]
    proxy: Option<PathBuf>,

    /// Path to user certificate (PEM format)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Path to user private key (PEM format)
    #[arg(long)]
    key: Option<PathBuf>,

    /// Directory of trusted CA certificates
    #[arg(long)]
    ca_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

impl ClientArgs {
    fn config(&self) -> ClientConfig {
        ClientConfig::new(self.joblist.clone())
            .with_timeout(Duration::from_secs(self.timeout))
            .with_credentials(Credentials {
                proxy_path: self.proxy.clone(),
                cert_path: self.cert.clone(),
                key_path: self.key.clone(),
                ca_dir: self.ca_dir.clone(),
            })
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Broker Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum BrokerCommands {
    /// Rank the targets a job can run on and book submissions against them
    Select {
        /// JSON file with an array of execution targets
        #[arg(long)]
        targets: PathBuf,

        /// JSON file with the job description
        #[arg(long)]
        job: PathBuf,

        /// Endpoint URL to exclude (repeatable)
        #[arg(long = "reject")]
        reject: Vec<String>,

        /// Ranking: free-slots, shortest-queue or benchmark:<name>
        #[arg(long, default_value = "free-slots")]
        ranker: RankerKind,

        /// Number of submissions to book
        #[arg(long, default_value = "0")]
        book: u32,

        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },
}

// =============================================================================
// Jobs Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum JobsCommands {
    /// List the stored jobs
    List,

    /// Show which job controllers a selection of jobs needs
    Plan {
        /// Job IDs to select (all jobs when omitted)
        ids: Vec<String>,

        /// Only select jobs on this cluster, by host name or URL (repeatable)
        #[arg(long = "cluster")]
        clusters: Vec<String>,

        /// Skip jobs on this cluster, by host name or URL (repeatable)
        #[arg(long = "reject-cluster")]
        rejected_clusters: Vec<String>,
    },

    /// Remove jobs from the job list
    Remove {
        /// Job IDs to remove
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct CandidateOutput {
    rank: usize,
    url: String,
    queue: String,
    free_slots: i32,
    used_slots: i32,
    waiting_jobs: i32,
}

#[derive(Serialize)]
struct BookingOutput {
    submission: u32,
    url: Option<String>,
    booking: String,
}

#[derive(Serialize)]
struct SelectOutput {
    ranker: String,
    candidates: Vec<CandidateOutput>,
    bookings: Vec<BookingOutput>,
}

#[derive(Serialize)]
struct JobListItem {
    job_id: String,
    flavour: String,
    state: String,
    name: Option<String>,
    queue: Option<String>,
}

#[derive(Serialize)]
struct FlavourPlan {
    flavour: String,
    jobs: usize,
    supported: bool,
}

#[derive(Serialize)]
struct PlanOutput {
    flavours: Vec<FlavourPlan>,
    missing_ids: Vec<String>,
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<T, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    Ok(serde_json::from_str(&content)
        .map_err(|e| format!("cannot parse {}: {}", path.display(), e))?)
}

fn booking_to_string(booking: Booking) -> String {
    match booking {
        Booking::Reserved => "RESERVED".to_string(),
        Booking::Queued => "QUEUED".to_string(),
        Booking::Rejected => "REJECTED".to_string(),
        Booking::NoSelection => "NO_SELECTION".to_string(),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

async fn handle_broker_select(
    targets: PathBuf,
    job: PathBuf,
    reject: Vec<String>,
    ranker: RankerKind,
    book: u32,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets: Vec<ExecutionTarget> = read_json(&targets).await?;
    let job: JobDescription = read_json(&job).await?;

    let config = ClientConfig::default().with_ranker(ranker);
    let mut broker = Broker::from_config(&config);
    broker.prefilter_targets(&targets, &job, &reject);
    tracing::info!(
        targets = targets.len(),
        candidates = broker.possible_targets().len(),
        ranker = broker.ranker_name(),
        "Targets prefiltered"
    );

    // Rank once for the candidate listing; booking re-ranks per submission.
    broker.best_target();
    let candidates: Vec<CandidateOutput> = broker
        .possible_targets()
        .iter()
        .enumerate()
        .map(|(i, t)| CandidateOutput {
            rank: i + 1,
            url: t.url().to_string(),
            queue: t.computing_share.name.clone(),
            free_slots: t.computing_share.free_slots,
            used_slots: t.computing_share.used_slots,
            waiting_jobs: t.computing_share.waiting_jobs,
        })
        .collect();

    let mut bookings = Vec::new();
    for submission in 1..=book {
        let url = broker.best_target().map(|t| t.url().to_string());
        let booking = broker.register_job_submission();
        bookings.push(BookingOutput {
            submission,
            url,
            booking: booking_to_string(booking),
        });
    }

    match output_format {
        OutputFormat::Json => {
            let output = SelectOutput {
                ranker: broker.ranker_name().to_string(),
                candidates,
                bookings,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if candidates.is_empty() {
                println!("No target accepts the job.");
                return Ok(());
            }
            println!(
                "{:<5} {:<45} {:<12} {:>6} {:>6} {:>8}",
                "RANK", "ENDPOINT", "QUEUE", "FREE", "USED", "WAITING"
            );
            println!("{}", "-".repeat(87));
            for c in &candidates {
                println!(
                    "{:<5} {:<45} {:<12} {:>6} {:>6} {:>8}",
                    c.rank, c.url, c.queue, c.free_slots, c.used_slots, c.waiting_jobs
                );
            }
            if !bookings.is_empty() {
                println!();
                for b in &bookings {
                    println!(
                        "Submission {}: {} {}",
                        b.submission,
                        b.booking,
                        b.url.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_jobs_list(
    registry: &JobRegistry,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = registry.load().await?;
    let items: Vec<JobListItem> = jobs
        .iter()
        .map(|j: &Job| JobListItem {
            job_id: j.job_id.clone(),
            flavour: j.flavour.clone(),
            state: j.state.to_string(),
            name: j.name.clone(),
            queue: j.queue.clone(),
        })
        .collect();

    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }
            println!("{:<55} {:<8} {:<12} NAME", "JOB ID", "FLAVOUR", "STATE");
            println!("{}", "-".repeat(90));
            for item in &items {
                println!(
                    "{:<55} {:<8} {:<12} {}",
                    item.job_id,
                    item.flavour,
                    item.state,
                    item.name.as_deref().unwrap_or("")
                );
            }
            println!();
            println!("Total: {} jobs", items.len());
        }
    }
    Ok(())
}

async fn handle_jobs_plan(
    registry: &JobRegistry,
    config: &ClientConfig,
    selection: JobSelection,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let jobs = registry.load().await?;
    let controllers = ControllerRegistry::with_transports(config, Transports::offline());
    let supervisor = JobSupervisor::with_selection(&controllers, jobs, &selection);

    let mut flavours: Vec<FlavourPlan> = Vec::new();
    for job in supervisor.jobs() {
        match flavours.iter_mut().find(|p| p.flavour == job.flavour) {
            Some(plan) => plan.jobs += 1,
            None => flavours.push(FlavourPlan {
                flavour: job.flavour.clone(),
                jobs: 1,
                supported: supervisor.controller(&job.flavour).is_some(),
            }),
        }
    }

    match output_format {
        OutputFormat::Json => {
            let output = PlanOutput {
                flavours,
                missing_ids: supervisor.missing_ids().to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("{:<10} {:>6}  CONTROLLER", "FLAVOUR", "JOBS");
            println!("{}", "-".repeat(32));
            for plan in &flavours {
                let controller = if plan.supported { "loaded" } else { "unsupported" };
                println!("{:<10} {:>6}  {}", plan.flavour, plan.jobs, controller);
            }
            if !supervisor.missing_ids().is_empty() {
                println!();
                println!("Not in job list:");
                for id in supervisor.missing_ids() {
                    println!("  {}", id);
                }
            }
        }
    }
    Ok(())
}

async fn handle_jobs_remove(
    registry: &JobRegistry,
    ids: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let removed = registry.remove(&ids).await?;
    println!("Removed {} of {} jobs from {}", removed, ids.len(), registry.path().display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.debug)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Broker { command } => match command {
            BrokerCommands::Select {
                targets,
                job,
                reject,
                ranker,
                book,
                output,
            } => handle_broker_select(targets, job, reject, ranker, book, &output).await?,
        },
        Commands::Jobs { client, command } => {
            let config = client.config();
            let registry = JobRegistry::new(config.joblist.clone());
            match command {
                JobsCommands::List => handle_jobs_list(&registry, &client.output).await?,
                JobsCommands::Plan {
                    ids,
                    clusters,
                    rejected_clusters,
                } => {
                    let selection = JobSelection::default()
                        .with_ids(ids)
                        .with_clusters(clusters)
                        .with_rejected_clusters(rejected_clusters);
                    handle_jobs_plan(&registry, &config, selection, &client.output).await?
                }
                JobsCommands::Remove { ids } => handle_jobs_remove(&registry, ids).await?,
            }
        }
    }

    Ok(())
}
