//! CLI binary for resume-tailor.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs one submission and saves the two PDFs.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use resume_tailor::{
    save_artifacts, ConversionMode, DocumentKind, ErrorInfo, FailureStage, HttpBackend, JobDescriptionPolicy,
    Pipeline, PipelineConfig, PipelineObserver, PipelineState, SubmitOutcome, UploadCandidate,
    Validation, DEFAULT_API_BASE_URL,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: a spinner for the slow remote calls plus one log line
/// per finished step. Conversions may finish in either order.
struct CliObserver {
    bar: ProgressBar,
    started: Instant,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Instant::now(),
        })
    }

    fn elapsed(&self) -> String {
        dim(&format!("{:.1}s", self.started.elapsed().as_secs_f64()))
    }
}

impl PipelineObserver for CliObserver {
    fn on_submission_start(&self, _request_id: u64) {
        self.bar.set_prefix("Generating");
        self.bar.set_message("tailoring resume and cover letter…");
    }

    fn on_generation_complete(&self, _request_id: u64, suggestion_count: usize) {
        self.bar.println(format!(
            "  {} Generated documents  {}  {}",
            green("✓"),
            dim(&format!("{suggestion_count} suggestion(s)")),
            self.elapsed()
        ));
        self.bar.set_prefix("Converting");
        self.bar.set_message("rendering PDFs…");
    }

    fn on_document_converted(&self, _request_id: u64, kind: DocumentKind, size_bytes: usize) {
        self.bar.println(format!(
            "  {} {:<13} {}  {}",
            green("✓"),
            capitalise(&kind.to_string()),
            dim(&format!("{:>8} bytes", size_bytes)),
            self.elapsed()
        ));
    }

    fn on_ready(&self, _request_id: u64) {
        self.bar.finish_and_clear();
    }

    fn on_failed(&self, _request_id: u64, error: &ErrorInfo) {
        self.bar.finish_and_clear();
        let stage = match error.stage {
            FailureStage::Generation => "Generation".to_string(),
            FailureStage::Conversion(kind) => format!("{} conversion", capitalise(&kind.to_string())),
        };
        eprintln!("{} {} failed  {}", red("✘"), stage, self.elapsed());
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Tailor a resume to a pasted job description
  tailor resume.pdf --job "Senior backend engineer, distributed systems"

  # Read the job description from a file, save PDFs to ./out
  tailor resume.pdf --job-file posting.txt -o out

  # Deployments that take a job posting URL instead of text
  tailor resume.pdf --policy url --job https://example.com/jobs/42

  # Convert the two documents one after the other
  tailor resume.pdf --job-file posting.txt --sequential

  # JSON summary (paths + suggestions) for scripting
  tailor resume.pdf --job-file posting.txt --json > result.json

  # Is the service up?
  tailor --check

OUTPUT:
  optimized-resume.pdf   the tailored resume
  cover-letter.pdf       the generated cover letter
  Suggestions are printed to stdout, one per line.

ENVIRONMENT VARIABLES:
  TAILOR_API_URL          Base URL of the generation service (default http://127.0.0.1:5000)
  TAILOR_OUTPUT_DIR       Directory for the generated PDFs
  TAILOR_JOB_POLICY       free-text or url
  RUST_LOG                Override the log filter (e.g. resume_tailor=debug)
"#;

/// Tailor a resume and cover letter to a job description.
#[derive(Parser, Debug)]
#[command(
    name = "tailor",
    version,
    about = "Tailor a resume and cover letter to a job description",
    long_about = "Upload a resume PDF and a job description to a resume generation service, \
render the tailored resume and cover letter to PDF, and save both next to a list of \
improvement suggestions.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Resume PDF to tailor.
    #[arg(required_unless_present = "check")]
    resume: Option<PathBuf>,

    /// Job description text (or a posting URL with `--policy url`).
    #[arg(short, long, conflicts_with = "job_file",
          required_unless_present_any = ["check", "job_file"])]
    job: Option<String>,

    /// Read the job description from this file.
    #[arg(long)]
    job_file: Option<PathBuf>,

    /// Directory the PDFs are written to.
    #[arg(short, long, env = "TAILOR_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// How the job description is validated: free-text or url.
    #[arg(long, env = "TAILOR_JOB_POLICY", value_enum, default_value = "free-text")]
    policy: PolicyArg,

    /// Base URL of the generation service.
    #[arg(long, env = "TAILOR_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Convert the resume first and the cover letter afterwards.
    #[arg(long, env = "TAILOR_SEQUENTIAL")]
    sequential: bool,

    /// Generation timeout in seconds (0 = wait forever).
    #[arg(long, env = "TAILOR_GENERATE_TIMEOUT", default_value_t = 180)]
    generate_timeout: u64,

    /// Per-document conversion timeout in seconds (0 = wait forever).
    #[arg(long, env = "TAILOR_CONVERT_TIMEOUT", default_value_t = 60)]
    convert_timeout: u64,

    /// Print a JSON summary (paths + suggestions) instead of text.
    #[arg(long)]
    json: bool,

    /// Only ask the service whether it is up.
    #[arg(long)]
    check: bool,

    /// Disable the spinner.
    #[arg(long, env = "TAILOR_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs (also prints the model's raw output on failure).
    #[arg(short, long, env = "TAILOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TAILOR_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    FreeText,
    Url,
}

impl From<PolicyArg> for JobDescriptionPolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::FreeText => JobDescriptionPolicy::FreeText,
            PolicyArg::Url => JobDescriptionPolicy::Url,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out of
    // its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer = if show_progress {
        Some(CliObserver::new() as Arc<dyn PipelineObserver>)
    } else {
        None
    };
    let config = build_config(&cli, observer)?;

    // ── Health check ─────────────────────────────────────────────────────
    if cli.check {
        let backend = HttpBackend::new(&config).context("Failed to set up HTTP client")?;
        let health = backend
            .health()
            .await
            .with_context(|| format!("Service at {} is not reachable", config.base_url()))?;
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "status": health.status, "message": health.message })
            );
        } else {
            println!(
                "{} {}  {}",
                green("✔"),
                bold(&health.status),
                dim(health.message.as_deref().unwrap_or_default())
            );
        }
        return Ok(());
    }

    // ── Inputs ───────────────────────────────────────────────────────────
    let Some(ref resume_path) = cli.resume else {
        bail!("No resume given");
    };
    let resume = UploadCandidate::from_path(resume_path)
        .await
        .context("Failed to load resume")?;
    let job_description = read_job_description(&cli).await?;

    let pipeline = Pipeline::with_http(config).context("Failed to set up pipeline")?;

    if let Validation::Invalid(e) = pipeline.select_file(Some(resume)) {
        bail!("{}: {}", resume_path.display(), e);
    }
    if let Validation::Invalid(e) = pipeline.set_job_description(job_description) {
        bail!("{e}");
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let result = run(&cli, &pipeline).await;
    pipeline.teardown();
    result
}

async fn run(cli: &Cli, pipeline: &Pipeline) -> Result<()> {
    if let SubmitOutcome::Rejected(rejection) = pipeline.submit_current().await {
        bail!("{rejection}");
    }

    match pipeline.state() {
        PipelineState::Ready(pair) => {
            let saved = save_artifacts(pipeline, &pair, &cli.output_dir)
                .await
                .context("Failed to save documents")?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&saved).context("Failed to serialise summary")?
                );
                return Ok(());
            }

            if !cli.quiet {
                eprintln!(
                    "{} {}  +  {}",
                    green("✔"),
                    bold(&saved.resume.display().to_string()),
                    bold(&saved.cover_letter.display().to_string()),
                );
                if !saved.suggestions.is_empty() {
                    eprintln!("{} {}", cyan("◆"), bold("Suggestions"));
                }
            }
            for suggestion in &saved.suggestions {
                println!("- {suggestion}");
            }
            Ok(())
        }
        PipelineState::Failed { error, .. } => {
            if cli.verbose {
                if let Some(ref details) = error.details {
                    eprintln!("{} {}", dim("details:"), details);
                }
                if let Some(ref raw) = error.raw_output {
                    eprintln!("{}\n{}", dim("raw model output:"), raw);
                }
            }
            bail!("{}", error.message)
        }
        other => bail!("Submission ended in an unexpected state: {other:?}"),
    }
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, observer: Option<Arc<dyn PipelineObserver>>) -> Result<PipelineConfig> {
    let mode = if cli.sequential {
        ConversionMode::Sequential
    } else {
        ConversionMode::Concurrent
    };

    let mut builder = PipelineConfig::builder()
        .api_base_url(cli.api_url.clone())
        .job_description_policy(cli.policy.into())
        .conversion_mode(mode)
        .generate_timeout_secs(non_zero(cli.generate_timeout))
        .convert_timeout_secs(non_zero(cli.convert_timeout));

    if let Some(observer) = observer {
        builder = builder.observer(observer);
    }

    builder.build().context("Invalid configuration")
}

fn non_zero(secs: u64) -> Option<u64> {
    (secs > 0).then_some(secs)
}

async fn read_job_description(cli: &Cli) -> Result<String> {
    match (&cli.job, &cli.job_file) {
        (Some(text), _) => Ok(text.clone()),
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read job description from {:?}", path)),
        (None, None) => bail!("Pass --job or --job-file"),
    }
}
