/// Concurrent load driver: one task per simulated user.
use crate::error::{AppError, RoundError};
use crate::http::client::PrintShopApi;
use crate::simulator::action::Action;
use crate::simulator::config::SimulatorConfig;
use crate::workflow::round::RoundRunner;
use crate::workflow::submission::OrderMark;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Result of a single action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Simulated user index
    pub user: usize,
    pub action: Action,
    /// Success status
    pub success: bool,
    /// Latency in milliseconds, including retries
    pub latency_ms: u64,
    /// Attempts made
    pub attempts: u32,
    /// Short description of what happened (if successful)
    pub detail: Option<String>,
    /// Error message (if failed)
    pub error: Option<String>,
}

/// Asks a running simulation to stop after the users' current actions.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Default)]
struct LiveStats {
    completed: AtomicUsize,
    successful: AtomicUsize,
    failed: AtomicUsize,
    total_latency: AtomicU64,
}

impl LiveStats {
    fn record(&self, result: &ActionResult) -> usize {
        if result.success {
            self.successful.fetch_add(1, Ordering::Relaxed);
            self.total_latency
                .fetch_add(result.latency_ms, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn message(&self, started: Instant) -> String {
        let completed = self.completed.load(Ordering::Relaxed);
        let success = self.successful.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total_latency = self.total_latency.load(Ordering::Relaxed);
        let avg_latency = if success > 0 {
            total_latency / success as u64
        } else {
            0
        };
        let elapsed = started.elapsed().as_secs_f64();
        let throughput = if elapsed > 0.0 {
            completed as f64 / elapsed
        } else {
            0.0
        };
        format!(
            "Success: {} | Failed: {} | Avg Latency: {}ms | Throughput: {:.1} actions/s",
            success, failed, avg_latency, throughput
        )
    }
}

/// Load testing simulator.
pub struct Simulator {
    config: SimulatorConfig,
    stop: Arc<watch::Sender<bool>>,
}

impl Simulator {
    /// Create a new simulator.
    pub fn new(config: SimulatorConfig) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            config,
            stop: Arc::new(stop),
        }
    }

    /// Handle that stops the run, e.g. from a Ctrl-C listener.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.stop.clone())
    }

    /// Run the load test.
    pub async fn run<A: PrintShopApi + 'static>(
        &self,
        runner: Arc<RoundRunner<A>>,
    ) -> Result<Vec<ActionResult>, AppError> {
        self.run_with_progress(runner, None).await
    }

    /// Run the load test with optional progress bar.
    pub async fn run_with_progress<A: PrintShopApi + 'static>(
        &self,
        runner: Arc<RoundRunner<A>>,
        progress_bar: Option<Arc<indicatif::ProgressBar>>,
    ) -> Result<Vec<ActionResult>, AppError> {
        self.config.validate()?;
        self.stop.send_replace(false);

        let stats = Arc::new(LiveStats::default());
        let started = Instant::now();

        let deadline = self.config.duration.map(|duration| {
            let stop = self.stop_handle();
            tokio::spawn(async move {
                sleep(duration).await;
                debug!(?duration, "deadline reached");
                stop.stop();
            })
        });

        info!(
            users = self.config.users,
            iterations = ?self.config.iterations,
            duration = ?self.config.duration,
            "starting simulated users"
        );

        let mut handles = Vec::with_capacity(self.config.users);
        for user in 0..self.config.users {
            let runner = runner.clone();
            let config = self.config.clone();
            let stop = self.stop.subscribe();
            let stats = stats.clone();
            let progress = progress_bar.clone();

            handles.push(tokio::spawn(async move {
                Self::run_user(user, runner, config, stop, stats, progress, started).await
            }));
        }

        // Collect all results
        let mut collected_results = Vec::new();
        for (user, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(results) => collected_results.extend(results),
                Err(e) => error!(user, "simulated user task failed: {}", e),
            }
        }

        if let Some(deadline) = deadline {
            deadline.abort();
        }

        if let Some(ref pb) = progress_bar {
            pb.finish_with_message("Load test completed");
        }

        Ok(collected_results)
    }

    async fn run_user<A: PrintShopApi>(
        user: usize,
        runner: Arc<RoundRunner<A>>,
        config: SimulatorConfig,
        mut stop: watch::Receiver<bool>,
        stats: Arc<LiveStats>,
        progress: Option<Arc<indicatif::ProgressBar>>,
        started: Instant,
    ) -> Vec<ActionResult> {
        let mut rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed.wrapping_add(user as u64)),
            None => fastrand::Rng::new(),
        };
        let mut results = Vec::new();

        while config.iterations.map_or(true, |n| results.len() < n) && !*stop.borrow() {
            let action = config.weights.choose(&mut rng);
            let result = Self::execute_action(user, action, &runner, &config, &mut rng).await;

            match (&result.error, &result.detail) {
                (Some(err), _) => warn!(user, action = %action, "action failed: {}", err),
                (None, Some(detail)) => debug!(
                    user,
                    action = %action,
                    latency_ms = result.latency_ms,
                    "{}",
                    detail
                ),
                (None, None) => {}
            }

            let completed = stats.record(&result);
            if let Some(ref pb) = progress {
                pb.set_message(stats.message(started));
                pb.set_position(completed as u64);
            }
            results.push(result);

            let finished = config.iterations.is_some_and(|n| results.len() >= n);
            if let Some(think_time) = config.think_time.filter(|_| !finished) {
                let delay = think_time.sample(&mut rng);
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = stop.changed() => {}
                }
            }
        }

        debug!(user, actions = results.len(), "simulated user finished");
        results
    }

    /// Execute one action, repeating transport failures when retry is set.
    ///
    /// A budget round that already placed its order is never repeated.
    async fn execute_action<A: PrintShopApi>(
        user: usize,
        action: Action,
        runner: &RoundRunner<A>,
        config: &SimulatorConfig,
        rng: &mut fastrand::Rng,
    ) -> ActionResult {
        let start = Instant::now();
        let mark = OrderMark::default();
        let mut last_error = None;
        let mut attempts = 0;

        for attempt in 0..=config.retry {
            attempts += 1;
            let outcome = match timeout(
                config.timeout,
                Self::perform(action, runner, config, rng, &mark),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(RoundError::Timeout(config.timeout)),
            };

            match outcome {
                Ok(detail) => {
                    return ActionResult {
                        user,
                        action,
                        success: true,
                        latency_ms: start.elapsed().as_millis() as u64,
                        attempts,
                        detail: Some(detail),
                        error: None,
                    };
                }
                Err(e) => {
                    let retryable = e.is_retryable() && !mark.is_placed();
                    last_error = Some(e.to_string());
                    if !retryable {
                        break;
                    }
                    if attempt < config.retry {
                        // Exponential backoff
                        let delay_ms = (2_u64.pow(attempt)) * 100;
                        sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        ActionResult {
            user,
            action,
            success: false,
            latency_ms: start.elapsed().as_millis() as u64,
            attempts,
            detail: None,
            error: last_error,
        }
    }

    async fn perform<A: PrintShopApi>(
        action: Action,
        runner: &RoundRunner<A>,
        config: &SimulatorConfig,
        rng: &mut fastrand::Rng,
        mark: &OrderMark,
    ) -> Result<String, RoundError> {
        let api = runner.api();
        match action {
            Action::Login => {
                api.login(&config.login).await?;
                Ok(format!("logged in as {}", config.login.username))
            }
            Action::ListPrintShops => {
                let count = api.list_printshops().await?;
                Ok(format!("{} print shops", count))
            }
            Action::NearestPrintShops => {
                let latitude = rng.u32(1..=90);
                let longitude = rng.u32(1..=180);
                let count = api.nearest_printshops(latitude, longitude).await?;
                Ok(format!(
                    "{} print shops near ({}, {})",
                    count, latitude, longitude
                ))
            }
            Action::BudgetRound => {
                let outcome = runner.run_marked(rng, mark).await?;
                Ok(format!(
                    "request {} placed at print shop {} for {}",
                    outcome.selected.job_id, outcome.selected.provider_id, outcome.selected.price
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarnessConfig;
    use crate::http::client::Credentials;
    use crate::models::{Job, JobId, ProviderSet, QuoteResponse, SelectedQuote};
    use crate::simulator::action::ActionWeights;
    use crate::simulator::config::ThinkTime;
    use crate::workflow::file_pool::{FileLease, FilePool};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted API: listings succeed, logins and status transitions follow
    /// queues of outcomes, budgets always offer one valid quote.
    #[derive(Default)]
    struct MockApi {
        login_outcomes: Mutex<VecDeque<Result<(), RoundError>>>,
        status_outcomes: Mutex<VecDeque<Result<(), RoundError>>>,
        login_calls: AtomicUsize,
        budget_calls: AtomicUsize,
        submit_calls: AtomicUsize,
        slow_listing: Option<Duration>,
        slow_status: Option<Duration>,
    }

    #[async_trait]
    impl PrintShopApi for MockApi {
        async fn request_budget(
            &self,
            _consumer: &Credentials,
            _job: &Job,
            providers: &ProviderSet,
            _file: &FileLease,
        ) -> Result<QuoteResponse, RoundError> {
            let n = self.budget_calls.fetch_add(1, Ordering::SeqCst) as u64;
            let body = format!(
                r#"{{"success": true, "printRequestID": {}, "budgets": {{"{}": "1.50"}}}}"#,
                n + 1,
                providers.home()
            );
            serde_json::from_str(&body).map_err(|e| RoundError::MalformedResponse(e.to_string()))
        }

        async fn submit_order(
            &self,
            _consumer: &Credentials,
            _quote: &SelectedQuote,
        ) -> Result<(), RoundError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn advance_status(
            &self,
            _operator: &Credentials,
            _job_id: JobId,
        ) -> Result<(), RoundError> {
            if let Some(delay) = self.slow_status {
                sleep(delay).await;
            }
            let mut outcomes = self.status_outcomes.lock().expect("outcomes mutex poisoned");
            outcomes.pop_front().unwrap_or(Ok(()))
        }

        async fn login(&self, _credentials: &Credentials) -> Result<(), RoundError> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.login_outcomes.lock().expect("outcomes mutex poisoned");
            outcomes.pop_front().unwrap_or(Ok(()))
        }

        async fn list_printshops(&self) -> Result<usize, RoundError> {
            if let Some(delay) = self.slow_listing {
                sleep(delay).await;
            }
            Ok(8)
        }

        async fn nearest_printshops(&self, _lat: u32, _lon: u32) -> Result<usize, RoundError> {
            Ok(3)
        }
    }

    fn runner(api: Arc<MockApi>, dir: &tempfile::TempDir) -> Arc<RoundRunner<MockApi>> {
        std::fs::write(dir.path().join("1.pdf"), b"pdf").expect("write file");
        let pool = FilePool::open(dir.path()).expect("open pool");
        let config = HarnessConfig::default();
        Arc::new(RoundRunner::from_config(api, &config, pool).expect("runner"))
    }

    fn only(action: Action) -> ActionWeights {
        let mut weights = ActionWeights {
            login: 0,
            list_printshops: 0,
            nearest_printshops: 0,
            budget_round: 0,
        };
        match action {
            Action::Login => weights.login = 1,
            Action::ListPrintShops => weights.list_printshops = 1,
            Action::NearestPrintShops => weights.nearest_printshops = 1,
            Action::BudgetRound => weights.budget_round = 1,
        }
        weights
    }

    #[tokio::test]
    async fn every_user_runs_its_iterations() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi::default());
        let mut config = SimulatorConfig::new(4, 5);
        config.seed = Some(10);

        let results = Simulator::new(config)
            .run(runner(api.clone(), &dir))
            .await
            .expect("simulation should complete");

        assert_eq!(results.len(), 20);
        for user in 0..4 {
            assert_eq!(results.iter().filter(|r| r.user == user).count(), 5);
        }
        assert!(results.iter().all(|r| r.success));

        let rounds = results
            .iter()
            .filter(|r| r.action == Action::BudgetRound)
            .count();
        assert_eq!(api.budget_calls.load(Ordering::SeqCst), rounds);
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), rounds);
    }

    #[tokio::test]
    async fn failures_are_not_retried_by_default() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi {
            login_outcomes: Mutex::new(VecDeque::from(vec![
                Err(RoundError::Transport("refused".into())),
                Ok(()),
            ])),
            ..MockApi::default()
        });
        let mut config = SimulatorConfig::new(1, 2);
        config.weights = only(Action::Login);

        let results = Simulator::new(config)
            .run(runner(api.clone(), &dir))
            .await
            .expect("simulation should complete");

        assert_eq!(api.login_calls.load(Ordering::SeqCst), 2);
        assert!(!results[0].success);
        assert_eq!(results[0].attempts, 1);
        assert_eq!(
            results[0].error.as_deref(),
            Some("Transport failure: refused")
        );
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn retry_is_opt_in_and_skips_rejections() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi {
            login_outcomes: Mutex::new(VecDeque::from(vec![
                Err(RoundError::Transport("reset".into())),
                Ok(()),
                Err(RoundError::Rejected {
                    status: 401,
                    body: "bad credentials".into(),
                }),
            ])),
            ..MockApi::default()
        });
        let mut config = SimulatorConfig::new(1, 2);
        config.weights = only(Action::Login);
        config.retry = 2;

        let results = Simulator::new(config)
            .run(runner(api.clone(), &dir))
            .await
            .expect("simulation should complete");

        assert!(results[0].success, "transport failure should be retried");
        assert_eq!(results[0].attempts, 2);
        assert!(!results[1].success, "rejections are final");
        assert_eq!(results[1].attempts, 1);
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn placed_orders_are_not_repeated_on_retry() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi {
            status_outcomes: Mutex::new(VecDeque::from(vec![Err(RoundError::Transport(
                "reset".into(),
            ))])),
            ..MockApi::default()
        });
        let mut config = SimulatorConfig::new(1, 1);
        config.weights = only(Action::BudgetRound);
        config.retry = 1;

        let results = Simulator::new(config)
            .run(runner(api.clone(), &dir))
            .await
            .expect("simulation should complete");

        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert_eq!(results[0].attempts, 1);
        assert!(results[0]
            .error
            .as_deref()
            .unwrap_or_default()
            .starts_with("Order 1 placed"));
        assert_eq!(api.budget_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_after_the_order_is_not_retried() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi {
            slow_status: Some(Duration::from_secs(5)),
            ..MockApi::default()
        });
        let mut config = SimulatorConfig::new(1, 1);
        config.weights = only(Action::BudgetRound);
        config.retry = 2;
        config.timeout = Duration::from_millis(200);

        let results = Simulator::new(config)
            .run(runner(api.clone(), &dir))
            .await
            .expect("simulation should complete");

        assert!(!results[0].success);
        assert_eq!(results[0].attempts, 1);
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_actions_time_out_per_user() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi {
            slow_listing: Some(Duration::from_secs(5)),
            ..MockApi::default()
        });
        let mut config = SimulatorConfig::new(2, 1);
        config.weights = only(Action::ListPrintShops);
        config.timeout = Duration::from_millis(50);

        let results = Simulator::new(config)
            .run(runner(api, &dir))
            .await
            .expect("simulation should complete");

        assert_eq!(results.len(), 2);
        for result in results {
            assert!(!result.success);
            assert!(result
                .error
                .as_deref()
                .unwrap_or_default()
                .starts_with("Action timed out"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duration_stops_open_ended_users() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi::default());
        let mut config = SimulatorConfig::new(3, 0);
        config.iterations = None;
        config.duration = Some(Duration::from_secs(30));
        config.weights = only(Action::NearestPrintShops);
        config.think_time = Some(ThinkTime {
            min_ms: 5000,
            max_ms: 9000,
        });

        let results = Simulator::new(config)
            .run(runner(api, &dir))
            .await
            .expect("simulation should complete");

        // Each user acts at most once per 5s over 30s.
        assert!(!results.is_empty());
        for user in 0..3 {
            let n = results.iter().filter(|r| r.user == user).count();
            assert!((1..=7).contains(&n), "user {} ran {} actions", user, n);
        }
    }

    #[tokio::test]
    async fn stop_handle_ends_the_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi::default());
        let mut config = SimulatorConfig::new(1, 0);
        config.iterations = None;
        config.duration = Some(Duration::from_secs(3600));
        config.weights = only(Action::ListPrintShops);
        config.think_time = Some(ThinkTime {
            min_ms: 20,
            max_ms: 20,
        });

        let simulator = Simulator::new(config);
        let stop = simulator.stop_handle();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            stop.stop();
        });

        let results = simulator
            .run(runner(api, &dir))
            .await
            .expect("simulation should complete");
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let api = Arc::new(MockApi::default());
        let config = SimulatorConfig::new(0, 1);

        let result = Simulator::new(config).run(runner(api, &dir)).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
