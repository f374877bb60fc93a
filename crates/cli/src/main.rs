//! WOTC CLI - operator commands against the submitter's job store

mod render;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tabled::Table;
use wotc_core::application::{EnqueueRequest, RecoveryService};
use wotc_core::domain::{JobStatus, SubmissionRecord};
use wotc_core::encoding::{encode, validate_record};
use wotc_core::port::{JobStore, TimeProvider};
use wotc_daemon::{Services, Settings};

use render::{format_millis, job_status, JobLine, RecordLine, ValidationLine};

#[derive(Parser)]
#[command(name = "wotc")]
#[command(about = "WOTC portal submitter CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $WOTC_CONFIG, then ~/.wotc-submitter/submitter.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upsert canonical record payloads from a JSON array
    Import {
        file: PathBuf,
    },

    /// Create a pending submission job
    Enqueue {
        /// Jurisdiction code (e.g., AZ, TX, NY, FL)
        #[arg(short, long)]
        jurisdiction: String,

        #[arg(short, long)]
        employer: String,

        /// Queue record IDs
        #[arg(required = true)]
        record_ids: Vec<String>,
    },

    /// List jobs, newest first
    Jobs {
        /// PENDING, IN_PROGRESS, COMPLETED or FAILED
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Show one job and its bound records
    Show {
        job_id: String,
    },

    /// Check payloads against a jurisdiction's required fields
    Validate {
        #[arg(short, long)]
        jurisdiction: String,

        file: PathBuf,
    },

    /// Render payloads in a jurisdiction's upload format
    Encode {
        #[arg(short, long)]
        jurisdiction: String,

        file: PathBuf,

        /// Write the artifact here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Requeue or fail IN_PROGRESS jobs that have gone stale
    Sweep {
        #[arg(long)]
        stale_after_secs: Option<u64>,
    },
}

fn read_payloads(path: &Path) -> Result<Vec<SubmissionRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid payload file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { file } => {
            let records = read_payloads(&file)?;
            let services = Services::connect(&settings).await?;
            let now = services.clock.now_millis();
            for record in &records {
                services.records.upsert(record, now).await?;
            }
            println!(
                "{}",
                format!("✓ Imported {} record payloads", records.len()).green().bold()
            );
        }

        Commands::Enqueue {
            jurisdiction,
            employer,
            record_ids,
        } => {
            let services = Services::connect(&settings).await?;
            let job = services
                .enqueue()
                .enqueue(EnqueueRequest::new(jurisdiction, employer, record_ids))
                .await?;

            println!("{}", "✓ Job enqueued successfully".green().bold());
            println!();
            println!("{}", Table::new([JobLine::from(&job)]));
        }

        Commands::Jobs { status, limit } => {
            let status = status
                .map(|s| s.parse::<JobStatus>())
                .transpose()
                .context("Invalid --status")?;
            let services = Services::connect(&settings).await?;
            let jobs = services.store.find_by_status(status, limit).await?;

            if jobs.is_empty() {
                println!("{}", "No jobs found".yellow());
            } else {
                println!("{}", Table::new(jobs.iter().map(JobLine::from)));
            }
            for (status, count) in services.store.count_by_status().await? {
                println!("  {} {}", job_status(status), count);
            }
        }

        Commands::Show { job_id } => {
            let services = Services::connect(&settings).await?;
            let Some(job) = services.store.find_by_id(&job_id).await? else {
                bail!("Job {job_id} not found");
            };

            println!("{}", format!("Job {}", job.id).cyan().bold());
            println!("  Jurisdiction:  {}", job.jurisdiction_code);
            println!("  Employer:      {}", job.employer_id);
            println!("  Status:        {}", job_status(job.status));
            println!("  Retries:       {}/{}", job.retry_count, job.max_retries);
            println!("  Next retry:    {}", format_millis(job.next_retry_at));
            println!("  Started:       {}", format_millis(job.started_at));
            println!("  Finished:      {}", format_millis(job.finished_at));
            if let Some(conf) = &job.confirmation_number {
                println!("  Confirmation:  {}", conf.green());
            }
            if let Some(submitted) = job.records_submitted {
                println!("  Submitted:     {submitted}");
            }
            if let Some(err) = &job.error_message {
                println!("  Error:         {}", err.red());
            }
            println!();

            let records = services.store.find_records(&job.id).await?;
            println!("{}", Table::new(records.iter().map(RecordLine::from)));
        }

        Commands::Validate { jurisdiction, file } => {
            let descriptor = wotc_core::domain::jurisdiction::require(&jurisdiction)?;
            let records = read_payloads(&file)?;

            let mut invalid = 0;
            let lines: Vec<_> = records
                .iter()
                .map(|record| {
                    let report = validate_record(descriptor, record);
                    if !report.valid {
                        invalid += 1;
                    }
                    ValidationLine {
                        record: record.record_id.clone(),
                        valid: if report.valid { "✓".green() } else { "✗".red() }.to_string(),
                        issues: report.summary(),
                    }
                })
                .collect();
            println!("{}", Table::new(lines));

            if invalid > 0 {
                bail!("{invalid} of {} records failed validation", records.len());
            }
            println!("{}", format!("✓ All {} records valid", records.len()).green().bold());
        }

        Commands::Encode {
            jurisdiction,
            file,
            output,
        } => {
            let records = read_payloads(&file)?;
            let artifact = encode(&jurisdiction, &records)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, artifact.bytes())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!(
                        "{}",
                        format!(
                            "✓ Wrote {} ({} records) to {}",
                            artifact.file_name,
                            artifact.record_count(),
                            path.display()
                        )
                        .green()
                        .bold()
                    );
                }
                None => print!("{}", artifact.content),
            }
        }

        Commands::Sweep { stale_after_secs } => {
            if let Some(secs) = stale_after_secs {
                settings.stale_after_secs = secs;
            }
            let services = Services::connect(&settings).await?;
            let recovery: RecoveryService = services.recovery(&settings);
            let report = recovery.sweep_stale().await?;
            println!(
                "{}",
                format!(
                    "✓ Sweep complete: {} requeued, {} failed",
                    report.requeued, report.failed
                )
                .green()
                .bold()
            );
        }
    }

    Ok(())
}
