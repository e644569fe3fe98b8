/// Load driver configuration.
use crate::error::AppError;
use crate::http::client::Credentials;
use std::time::Duration;

pub use crate::simulator::action::ActionWeights;

/// Pause between two actions of one simulated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl ThinkTime {
    pub fn sample(&self, rng: &mut fastrand::Rng) -> Duration {
        let delay_ms = if self.min_ms >= self.max_ms {
            self.min_ms
        } else {
            rng.u64(self.min_ms..=self.max_ms)
        };
        Duration::from_millis(delay_ms)
    }
}

/// Configuration of a load run.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Concurrent simulated users
    pub users: usize,
    /// Actions per user; `None` runs until the deadline
    pub iterations: Option<usize>,
    /// Stop all users after this long
    pub duration: Option<Duration>,
    pub think_time: Option<ThinkTime>,
    /// Extra attempts for transport failures and timeouts
    pub retry: u32,
    /// Per-action timeout
    pub timeout: Duration,
    pub weights: ActionWeights,
    /// Account used by the login action
    pub login: Credentials,
    /// Base seed; user `n` uses `seed + n`
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    pub fn new(users: usize, iterations: usize) -> Self {
        Self {
            users,
            iterations: Some(iterations),
            duration: None,
            think_time: None,
            retry: 0,
            timeout: Duration::from_secs(60),
            weights: ActionWeights::default(),
            login: Credentials::new("joao", "1234"),
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.users == 0 {
            return Err(AppError::Config("At least one user is required".to_string()));
        }
        if self.iterations.is_none() && self.duration.is_none() {
            return Err(AppError::Config(
                "Either an iteration count or a duration is required".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(AppError::Config("Timeout must be positive".to_string()));
        }
        self.weights.validate()
    }

    /// Parse a think time such as `"5000-9000ms"`, `"5-9s"` or `"500ms"`.
    ///
    /// A bound without a unit takes the unit of the upper bound; a bare
    /// number is milliseconds.
    pub fn parse_think_time(s: &str) -> Result<ThinkTime, String> {
        let parts: Vec<&str> = s.trim().split('-').collect();
        let (min_ms, max_ms) = match parts.as_slice() {
            [single] => {
                let ms = parse_ms(single, 1)?;
                (ms, ms)
            }
            [low, high] => {
                let (_, high_scale) = split_unit(high)?;
                let scale = high_scale.unwrap_or(1);
                (parse_ms(low, scale)?, parse_ms(high, scale)?)
            }
            _ => return Err(format!("Invalid think time '{}'", s)),
        };

        if min_ms > max_ms {
            return Err(format!(
                "Think time lower bound {}ms exceeds upper bound {}ms",
                min_ms, max_ms
            ));
        }
        Ok(ThinkTime { min_ms, max_ms })
    }

    /// Parse a duration such as `"90s"`, `"5m"` or `"1500ms"`.
    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        parse_ms(s, 1000).map(Duration::from_millis)
    }
}

fn split_unit(s: &str) -> Result<(&str, Option<u64>), String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty time value".to_string());
    }
    let unit = [("ms", 1), ("s", 1000), ("m", 60_000)]
        .into_iter()
        .find(|(suffix, _)| s.ends_with(suffix));
    Ok(match unit {
        Some((suffix, scale)) => (&s[..s.len() - suffix.len()], Some(scale)),
        None => (s, None),
    })
}

fn parse_ms(s: &str, default_scale: u64) -> Result<u64, String> {
    let (number, scale) = split_unit(s)?;
    let value = number
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("Invalid time value '{}'", s.trim()))?;
    value
        .checked_mul(scale.unwrap_or(default_scale))
        .ok_or_else(|| format!("Time value '{}' is too large", s.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_think_time_formats() {
        assert_eq!(
            SimulatorConfig::parse_think_time("5000-9000ms").expect("range ms"),
            ThinkTime {
                min_ms: 5000,
                max_ms: 9000
            }
        );
        assert_eq!(
            SimulatorConfig::parse_think_time("5-9s").expect("range s"),
            ThinkTime {
                min_ms: 5000,
                max_ms: 9000
            }
        );
        assert_eq!(
            SimulatorConfig::parse_think_time("500ms-2s").expect("mixed"),
            ThinkTime {
                min_ms: 500,
                max_ms: 2000
            }
        );
        assert_eq!(
            SimulatorConfig::parse_think_time("250").expect("bare"),
            ThinkTime {
                min_ms: 250,
                max_ms: 250
            }
        );
        assert!(SimulatorConfig::parse_think_time("9-5s").is_err());
        assert!(SimulatorConfig::parse_think_time("fast").is_err());
        assert!(SimulatorConfig::parse_think_time("1-2-3").is_err());
    }

    #[test]
    fn parse_duration_defaults_to_seconds() {
        assert_eq!(
            SimulatorConfig::parse_duration("90").expect("bare"),
            Duration::from_secs(90)
        );
        assert_eq!(
            SimulatorConfig::parse_duration("5m").expect("minutes"),
            Duration::from_secs(300)
        );
        assert_eq!(
            SimulatorConfig::parse_duration("1500ms").expect("millis"),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn think_time_samples_within_bounds() {
        let think = ThinkTime {
            min_ms: 10,
            max_ms: 20,
        };
        let mut rng = fastrand::Rng::with_seed(8);
        for _ in 0..100 {
            let d = think.sample(&mut rng);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn validate_requires_a_stop_condition() {
        let mut config = SimulatorConfig::new(2, 10);
        config.validate().expect("valid");

        config.iterations = None;
        assert!(config.validate().is_err());
        config.duration = Some(Duration::from_secs(1));
        config.validate().expect("valid with duration");

        config.users = 0;
        assert!(config.validate().is_err());
    }
}
