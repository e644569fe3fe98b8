use crate::config::HarnessConfig;
use crate::error::AppError;
use crate::http::client::{ClientConfig, Credentials};
use crate::http::proxyprint::ProxyPrintClient;
use crate::models::{FormatSpec, Job, ProviderSet};
use crate::output::LoadReport;
use crate::simulator::{ActionWeights, Simulator, SimulatorConfig};
use crate::workflow::file_pool::FilePool;
use crate::workflow::round::{RoundOutcome, RoundPlan, RoundRunner};
/// CLI argument parsing and command execution.
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// printload - Quote-collection load simulator for the ProxyPrint service.
#[derive(Parser, Debug)]
#[command(name = "printload")]
#[command(about = "Load and integration harness for the ProxyPrint print-ordering service")]
#[command(
    long_about = r#"printload - Load and integration harness for the ProxyPrint print-ordering service

Simulated consumers generate print jobs, ask several print shops for a budget,
pick a winning quote, submit the order and let the print shop operator move it
through its status chain.

EXAMPLES:
  # One budget round against a local deployment
  printload round --file-pool ./files_pool

  # 50 users, 20 actions each, locust-style pacing
  printload load-test --file-pool ./files_pool --users 50 --iterations 20 --think-time 5-9s

  # Two minutes of budget rounds only, JSON report
  printload load-test --file-pool ./files_pool --duration 2m --weights 0,0,0,1 -o json"#
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML). Command-line flags take precedence.
    #[arg(long, value_name = "FILE", global = true, env = "PRINTLOAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run simulated users concurrently against the service
    #[command(name = "load-test")]
    LoadTest(LoadTestArgs),

    /// Run a single budget round and print what happened
    Round(RoundArgs),
}

/// Options describing the target deployment, shared by all commands.
#[derive(Args, Debug, Clone, Default)]
pub struct HarnessArgs {
    /// Service base URL
    #[arg(long, env = "PRINTLOAD_BASE_URL")]
    pub base_url: Option<String>,

    /// Directory of files uploaded with budget requests
    #[arg(long, value_name = "DIR", env = "PRINTLOAD_FILE_POOL")]
    pub file_pool: Option<PathBuf>,

    /// Number of print shop ids in the ring
    #[arg(long, env = "PRINTLOAD_PRINTSHOPS")]
    pub printshops: Option<u32>,

    /// Print shop included in every budget request
    #[arg(long, env = "PRINTLOAD_HOME_PRINTSHOP")]
    pub home_printshop: Option<u32>,

    /// Maximum print shops per budget request, home included
    #[arg(long, env = "PRINTLOAD_MAX_BUDGETS")]
    pub max_budgets: Option<usize>,

    /// Consumers are drawn from aaa1..aaa{N-1}
    #[arg(long, env = "PRINTLOAD_MAX_CONSUMERS")]
    pub max_consumers: Option<u32>,

    /// Highest printing schema id to request
    #[arg(long, env = "PRINTLOAD_MAX_SCHEMAS")]
    pub max_schemas: Option<u32>,

    /// Page count, fixed ("30") or a range ("10-40")
    #[arg(long, value_name = "N|MIN-MAX", env = "PRINTLOAD_PAGES")]
    pub pages: Option<String>,

    /// Print shop operator, repeatable or comma-separated (e.g. --operator 8=mafalda)
    #[arg(
        long,
        value_name = "ID=NAME",
        value_parser = parse_operator,
        value_delimiter = ',',
        env = "PRINTLOAD_OPERATORS"
    )]
    pub operator: Vec<(String, String)>,

    /// Do not drive operator status transitions after a submission
    #[arg(long, env = "PRINTLOAD_SKIP_STATUS")]
    pub skip_status: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "PRINTLOAD_TIMEOUT")]
    pub timeout: Option<u64>,
}

impl HarnessArgs {
    /// Layer the flags over a loaded configuration.
    pub fn apply(&self, config: &mut HarnessConfig) -> Result<(), AppError> {
        if let Some(ref base_url) = self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(ref file_pool) = self.file_pool {
            config.file_pool = Some(file_pool.clone());
        }
        if let Some(printshops) = self.printshops {
            config.printshops = printshops;
        }
        if let Some(home) = self.home_printshop {
            config.home_printshop = home;
        }
        if let Some(max_budgets) = self.max_budgets {
            config.max_budgets = max_budgets;
        }
        if let Some(max_consumers) = self.max_consumers {
            config.max_consumers = max_consumers;
        }
        if let Some(max_schemas) = self.max_schemas {
            config.max_schemas = max_schemas;
        }
        if let Some(ref pages) = self.pages {
            let (min, max) = parse_pages(pages).map_err(AppError::Config)?;
            config.min_pages = min;
            config.max_pages = max;
        }
        if !self.operator.is_empty() {
            config.operators = self.operator.iter().cloned().collect();
        }
        if self.skip_status {
            config.drive_status = false;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        Ok(())
    }
}

/// Arguments of `load-test`.
#[derive(Args, Debug, Clone)]
pub struct LoadTestArgs {
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// Number of concurrent simulated users
    #[arg(short, long, default_value = "10")]
    pub users: usize,

    /// Actions per user
    #[arg(short = 'n', long)]
    pub iterations: Option<usize>,

    /// Stop after this long (e.g. "90s", "5m")
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Think time between actions (e.g. "5000-9000ms" or "5-9s")
    #[arg(long, env = "PRINTLOAD_THINK_TIME")]
    pub think_time: Option<String>,

    /// Retry count for transport failures (off by default)
    #[arg(long, env = "PRINTLOAD_RETRY")]
    pub retry: Option<u32>,

    /// Action weights as login,list,nearest,budget (default 2,1,4,3)
    #[arg(long, value_name = "L,P,N,B", env = "PRINTLOAD_WEIGHTS")]
    pub weights: Option<String>,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output_format: ReportFormat,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments of `round`.
#[derive(Args, Debug, Clone)]
pub struct RoundArgs {
    #[command(flatten)]
    pub harness: HarnessArgs,

    /// Pool entry to upload instead of a random one
    #[arg(long, value_name = "NAME")]
    pub file: Option<String>,

    /// Print shops to ask instead of a random selection (e.g. "8,3,4")
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub providers: Vec<u32>,

    /// Consumer account instead of a random one
    #[arg(long)]
    pub consumer: Option<String>,

    /// Printing schema id instead of a random one
    #[arg(long)]
    pub schema: Option<u32>,

    /// Seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: RoundFormat,
}

impl RoundArgs {
    /// Replace the parts of a drawn plan that were given on the command line.
    pub fn override_plan(
        &self,
        plan: RoundPlan,
        consumer_password: &str,
    ) -> Result<RoundPlan, AppError> {
        let RoundPlan {
            consumer,
            job,
            providers,
        } = plan;

        let job = if self.file.is_none() && self.schema.is_none() {
            job
        } else {
            let file = self
                .file
                .clone()
                .unwrap_or_else(|| job.file_ref().to_string());
            let specs = match self.schema {
                Some(id) => vec![FormatSpec::schema(id)],
                None => job.format_specs().to_vec(),
            };
            Job::new(file, job.page_count(), specs)
        };
        let providers = if self.providers.is_empty() {
            providers
        } else {
            ProviderSet::new(self.providers.clone())?
        };
        let consumer = match self.consumer {
            Some(ref name) => Credentials::new(name.clone(), consumer_password),
            None => consumer,
        };

        Ok(RoundPlan {
            consumer,
            job,
            providers,
        })
    }
}

/// Load test report formats.
#[derive(Debug, Clone, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
    /// CSV output
    Csv,
}

/// Round output formats.
#[derive(Debug, Clone, ValueEnum)]
pub enum RoundFormat {
    Text,
    Json,
}

impl Cli {
    /// Execute the CLI command.
    pub fn run(self) -> Result<(), AppError> {
        let mut config = HarnessConfig::load(self.config.as_deref())?;

        match self.command {
            Command::LoadTest(args) => {
                args.harness.apply(&mut config)?;
                Self::run_load_test(config, args)
            }
            Command::Round(args) => {
                args.harness.apply(&mut config)?;
                Self::run_round(config, args)
            }
        }
    }

    fn build_runner(config: &HarnessConfig) -> Result<Arc<RoundRunner<ProxyPrintClient>>, AppError> {
        config.validate()?;
        let pool = FilePool::open(config.file_pool_path()?)?;
        info!(
            pool = %pool.root().display(),
            files = pool.len(),
            "file pool ready"
        );

        let client = ProxyPrintClient::new(ClientConfig {
            base_url: config.base_url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            headers: Vec::new(),
        })?;

        Ok(Arc::new(RoundRunner::from_config(
            Arc::new(client),
            config,
            pool,
        )?))
    }

    fn runtime() -> Result<tokio::runtime::Runtime, AppError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| AppError::Config(format!("Failed to create async runtime: {}", e)))
    }

    /// Run load test command.
    fn run_load_test(mut config: HarnessConfig, args: LoadTestArgs) -> Result<(), AppError> {
        if let Some(retry) = args.retry {
            config.retry = retry;
        }
        if let Some(ref weights) = args.weights {
            config.weights = ActionWeights::parse(weights).map_err(AppError::Config)?;
        }
        if let Some(ref think_time) = args.think_time {
            let think = SimulatorConfig::parse_think_time(think_time).map_err(AppError::Config)?;
            config.min_wait_ms = think.min_ms;
            config.max_wait_ms = think.max_ms;
        }
        if args.iterations.is_none() && args.duration.is_none() {
            return Err(AppError::Config(
                "Specify --iterations, --duration or both".to_string(),
            ));
        }

        let runner = Self::build_runner(&config)?;

        let mut sim_config = SimulatorConfig::new(args.users, 0);
        sim_config.iterations = args.iterations;
        sim_config.duration = args
            .duration
            .as_deref()
            .map(SimulatorConfig::parse_duration)
            .transpose()
            .map_err(AppError::Config)?;
        sim_config.think_time = Some(config.think_time());
        sim_config.retry = config.retry;
        sim_config.timeout = Duration::from_secs(config.timeout_secs);
        sim_config.weights = config.weights;
        sim_config.login = Credentials::new(
            config.login_username.clone(),
            config.login_password.clone(),
        );
        sim_config.seed = args.seed;

        eprintln!(
            "Starting load test against {} with {} users",
            config.base_url, args.users
        );

        let progress_bar = if args.no_progress {
            None
        } else {
            Some(Arc::new(Self::progress_bar(
                args.iterations.map(|n| (n * args.users) as u64),
            )?))
        };

        let simulator = Simulator::new(sim_config);
        let stop = simulator.stop_handle();
        let rt = Self::runtime()?;

        let started = Instant::now();
        let results = rt.block_on(async {
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, stopping simulated users");
                    stop.stop();
                }
            });
            simulator.run_with_progress(runner, progress_bar).await
        })?;
        let elapsed = started.elapsed();

        let report = LoadReport::from_results(&results, args.users, elapsed);
        match args.output_format {
            ReportFormat::Text => println!("\n{}", report.to_text()),
            ReportFormat::Json => println!("{}", report.to_json()?),
            ReportFormat::Csv => println!("{}", report.to_csv()),
        }

        Ok(())
    }

    fn progress_bar(total: Option<u64>) -> Result<indicatif::ProgressBar, AppError> {
        let pb = match total {
            Some(total) => {
                let pb = indicatif::ProgressBar::new(total);
                pb.set_style(
                    indicatif::ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
                        )
                        .map_err(|e| AppError::Config(format!("Invalid progress template: {}", e)))?
                        .progress_chars("#>-"),
                );
                pb
            }
            None => {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.enable_steady_tick(Duration::from_millis(200));
                pb
            }
        };
        pb.set_message("Starting load test...");
        Ok(pb)
    }

    /// Run a single budget round.
    fn run_round(config: HarnessConfig, args: RoundArgs) -> Result<(), AppError> {
        let runner = Self::build_runner(&config)?;
        let rt = Self::runtime()?;

        let mut rng = match args.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        let plan = args.override_plan(runner.plan(&mut rng), &config.consumer_password)?;
        let outcome = rt.block_on(runner.run_with(plan.consumer, plan.job, plan.providers))?;

        match args.format {
            RoundFormat::Text => println!("{}", Self::format_round(&outcome)),
            RoundFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&Self::round_json(&outcome))?
            ),
        }
        Ok(())
    }

    fn format_round(outcome: &RoundOutcome) -> String {
        [
            "=== Budget Round ===".to_string(),
            format!("Consumer: {}", outcome.consumer),
            format!(
                "Job: {} ({} pages, schema {})",
                outcome.job.file_ref(),
                outcome.job.page_count(),
                outcome
                    .job
                    .format_specs()
                    .first()
                    .map(|s| s.id)
                    .unwrap_or_default()
            ),
            format!("Print shops asked: {:?}", outcome.providers.as_slice()),
            format!("Quotes offered: {}", outcome.offered),
            format!(
                "Winner: print shop {} at {} (request {})",
                outcome.selected.provider_id, outcome.selected.price, outcome.selected.job_id
            ),
            format!("Status transitions: {}", outcome.transitions),
        ]
        .join("\n")
    }

    fn round_json(outcome: &RoundOutcome) -> serde_json::Value {
        serde_json::json!({
            "consumer": outcome.consumer,
            "file": outcome.job.file_ref(),
            "pages": outcome.job.page_count(),
            "specs": outcome.job.format_specs(),
            "printshops": outcome.providers,
            "offered": outcome.offered,
            "selected": outcome.selected,
            "transitions": outcome.transitions,
        })
    }
}

fn parse_operator(s: &str) -> Result<(String, String), String> {
    let (id, name) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected ID=NAME, got '{}'", s))?;
    id.trim()
        .parse::<u32>()
        .map_err(|_| format!("'{}' is not a print shop id", id.trim()))?;
    if name.trim().is_empty() {
        return Err(format!("Operator name missing in '{}'", s));
    }
    Ok((id.trim().to_string(), name.trim().to_string()))
}

fn parse_pages(s: &str) -> Result<(u32, u32), String> {
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid page count '{}'", v.trim()))
    };
    match s.split_once('-') {
        Some((min, max)) => Ok((parse(min)?, parse(max)?)),
        None => {
            let pages = parse(s)?;
            Ok((pages, pages))
        }
    }
}
