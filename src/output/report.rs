/// Aggregated load test statistics and their renderings.
use crate::error::AppError;
use crate::simulator::action::Action;
use crate::simulator::simulator::ActionResult;
use serde::Serialize;
use std::time::Duration;

/// Statistics for one action, or for all of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionStats {
    pub name: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub last_error: Option<String>,
}

impl ActionStats {
    fn from_results<'a>(name: &str, results: impl Iterator<Item = &'a ActionResult>) -> Self {
        let mut total = 0;
        let mut latencies = Vec::new();
        let mut last_error = None;

        for result in results {
            total += 1;
            if result.success {
                latencies.push(result.latency_ms);
            } else if let Some(ref err) = result.error {
                last_error = Some(err.clone());
            }
        }

        let successful = latencies.len();
        let success_rate = if total > 0 {
            (successful as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let avg_latency_ms = if !latencies.is_empty() {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        } else {
            0.0
        };

        latencies.sort_unstable();
        let p50_latency_ms = percentile(&latencies, 0.5);
        let p95_latency_ms = percentile(&latencies, 0.95);

        Self {
            name: name.to_string(),
            total,
            successful,
            failed: total - successful,
            success_rate,
            avg_latency_ms,
            p50_latency_ms,
            p95_latency_ms,
            last_error,
        }
    }
}

fn percentile(sorted: &[u64], quantile: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    if quantile <= 0.5 {
        return sorted[sorted.len() / 2];
    }
    let index = ((sorted.len() as f64) * quantile).ceil() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Summary of a finished load run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub users: usize,
    pub elapsed_secs: f64,
    pub throughput: f64,
    pub overall: ActionStats,
    pub actions: Vec<ActionStats>,
}

impl LoadReport {
    pub fn from_results(results: &[ActionResult], users: usize, elapsed: Duration) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        let throughput = if elapsed_secs > 0.0 {
            results.len() as f64 / elapsed_secs
        } else {
            0.0
        };

        let actions = Action::ALL
            .iter()
            .filter(|&&action| results.iter().any(|r| r.action == action))
            .map(|&action| {
                ActionStats::from_results(
                    action.as_str(),
                    results.iter().filter(|r| r.action == action),
                )
            })
            .collect();

        Self {
            users,
            elapsed_secs,
            throughput,
            overall: ActionStats::from_results("all", results.iter()),
            actions,
        }
    }

    pub fn to_text(&self) -> String {
        let mut output = Vec::new();

        output.push("=== Load Test Results ===".to_string());
        output.push(format!("Users: {}", self.users));
        output.push(format!(
            "Elapsed: {:.1}s ({:.2} actions/s)",
            self.elapsed_secs, self.throughput
        ));
        output.push(format!("Total Actions: {}", self.overall.total));
        output.push(format!(
            "Successful: {} ({:.1}%)",
            self.overall.successful, self.overall.success_rate
        ));
        output.push(format!(
            "Failed: {} ({:.1}%)",
            self.overall.failed,
            if self.overall.total > 0 {
                100.0 - self.overall.success_rate
            } else {
                0.0
            }
        ));
        output.push(String::new());

        output.push(format!(
            "{:<26} {:>7} {:>7} {:>10} {:>8} {:>8}",
            "Action", "Total", "Failed", "Avg (ms)", "p50", "p95"
        ));
        output.push("-".repeat(71));
        for stats in self.actions.iter().chain(std::iter::once(&self.overall)) {
            output.push(format!(
                "{:<26} {:>7} {:>7} {:>10.2} {:>8} {:>8}",
                stats.name,
                stats.total,
                stats.failed,
                stats.avg_latency_ms,
                stats.p50_latency_ms,
                stats.p95_latency_ms
            ));
        }

        let errors: Vec<_> = self
            .actions
            .iter()
            .filter_map(|s| s.last_error.as_ref().map(|e| (s.name.as_str(), e)))
            .collect();
        if !errors.is_empty() {
            output.push(String::new());
            output.push("Last errors:".to_string());
            for (name, err) in errors {
                output.push(format!("  {}: {}", name, err));
            }
        }

        output.join("\n")
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self).map_err(AppError::Json)
    }

    pub fn to_csv(&self) -> String {
        let mut lines = vec![
            "action,total,successful,failed,success_rate,avg_latency_ms,p50_latency_ms,p95_latency_ms"
                .to_string(),
        ];
        for stats in self.actions.iter().chain(std::iter::once(&self.overall)) {
            lines.push(format!(
                "{},{},{},{},{:.4},{:.2},{},{}",
                stats.name,
                stats.total,
                stats.successful,
                stats.failed,
                stats.success_rate,
                stats.avg_latency_ms,
                stats.p50_latency_ms,
                stats.p95_latency_ms
            ));
        }
        lines.join("\n")
    }
}
