/// Harness configuration: defaults, TOML file loading and validation.
use crate::error::AppError;
use crate::models::ProviderId;
use crate::simulator::config::{ActionWeights, ThinkTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Maps a print shop to the operator account allowed to move its requests
/// along.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorDirectory {
    operators: HashMap<ProviderId, String>,
}

impl OperatorDirectory {
    pub fn new(operators: HashMap<ProviderId, String>) -> Self {
        Self { operators }
    }

    pub fn operator_for(&self, provider: ProviderId) -> Option<&str> {
        self.operators.get(&provider).map(String::as_str)
    }
}

/// Everything the harness needs to know about the target deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Service base URL.
    pub base_url: String,
    /// Directory holding the files uploaded with budget requests.
    pub file_pool: Option<PathBuf>,
    /// Size of the print shop id ring.
    pub printshops: ProviderId,
    /// Print shop asked for a budget on every request.
    pub home_printshop: ProviderId,
    /// Upper bound on print shops per budget request, home included.
    pub max_budgets: usize,
    /// Consumers are named `<consumer_prefix>1..max_consumers`.
    pub max_consumers: u32,
    pub consumer_prefix: String,
    pub consumer_password: String,
    pub max_schemas: u32,
    pub min_pages: u32,
    pub max_pages: u32,
    /// Print shop id to operator username. Keys are ids written as strings.
    pub operators: BTreeMap<String, String>,
    pub operator_password: String,
    /// Post the two operator status transitions after a submission.
    pub drive_status: bool,
    pub login_username: String,
    pub login_password: String,
    pub min_wait_ms: u64,
    pub max_wait_ms: u64,
    pub timeout_secs: u64,
    /// Extra attempts for transport failures. Off unless set.
    pub retry: u32,
    pub weights: ActionWeights,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let operators = [("8", "mafalda"), ("6", "mariovdc"), ("7", "mariovdm")]
            .into_iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();

        Self {
            base_url: "http://localhost:8080".to_string(),
            file_pool: None,
            printshops: 8,
            home_printshop: 8,
            max_budgets: 5,
            max_consumers: 1000,
            consumer_prefix: "aaa".to_string(),
            consumer_password: "1234".to_string(),
            max_schemas: 5,
            min_pages: 30,
            max_pages: 30,
            operators,
            operator_password: "1234".to_string(),
            drive_status: true,
            login_username: "joao".to_string(),
            login_password: "1234".to_string(),
            min_wait_ms: 5000,
            max_wait_ms: 9000,
            timeout_secs: 60,
            retry: 0,
            weights: ActionWeights::default(),
        }
    }
}

impl HarnessConfig {
    /// Load a configuration file. Fields the file omits keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: HarnessConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults, or the given file when there is one.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve the operator table into typed ids.
    pub fn operator_directory(&self) -> Result<OperatorDirectory, AppError> {
        let mut operators = HashMap::with_capacity(self.operators.len());
        for (id, name) in &self.operators {
            let id = id.trim().parse::<ProviderId>().map_err(|_| {
                AppError::Config(format!("Operator key '{}' is not a print shop id", id))
            })?;
            operators.insert(id, name.clone());
        }
        Ok(OperatorDirectory::new(operators))
    }

    pub fn think_time(&self) -> ThinkTime {
        ThinkTime {
            min_ms: self.min_wait_ms,
            max_ms: self.max_wait_ms,
        }
    }

    pub fn file_pool_path(&self) -> Result<&Path, AppError> {
        self.file_pool.as_deref().ok_or_else(|| {
            AppError::Config(
                "A file pool is required. Use --file-pool or set file_pool in the config file."
                    .to_string(),
            )
        })
    }

    /// Check cross-field constraints before anything runs.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.base_url.trim().is_empty() {
            return Err(AppError::Config("base_url cannot be empty".to_string()));
        }
        if self.printshops < 2 {
            return Err(AppError::Config(format!(
                "printshops must be at least 2, got {}",
                self.printshops
            )));
        }
        if self.home_printshop == 0 {
            return Err(AppError::Config(
                "home_printshop must be a positive id".to_string(),
            ));
        }
        if self.max_consumers < 2 {
            return Err(AppError::Config(format!(
                "max_consumers must be at least 2, got {}",
                self.max_consumers
            )));
        }
        if self.max_schemas == 0 {
            return Err(AppError::Config("max_schemas must be at least 1".to_string()));
        }
        if self.max_pages == 0 || self.min_pages > self.max_pages {
            return Err(AppError::Config(format!(
                "page range {}..={} is invalid",
                self.min_pages, self.max_pages
            )));
        }
        if self.min_wait_ms > self.max_wait_ms {
            return Err(AppError::Config(format!(
                "min wait {}ms exceeds max wait {}ms",
                self.min_wait_ms, self.max_wait_ms
            )));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::Config("timeout_secs must be positive".to_string()));
        }
        self.weights.validate()?;
        self.operator_directory()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().expect("defaults validate");

        let operators = config.operator_directory().expect("operators");
        assert_eq!(operators.operator_for(8), Some("mafalda"));
        assert_eq!(operators.operator_for(6), Some("mariovdc"));
        assert_eq!(operators.operator_for(1), None);
        assert_eq!(config.think_time().min_ms, 5000);
    }

    #[test]
    fn from_file_overrides_only_given_fields() {
        let mut temp = tempfile::NamedTempFile::new().expect("create temp file");
        let content = r#"
            base_url = "http://print.test:9000"
            printshops = 12
            retry = 2

            [operators]
            12 = "ana"

            [weights]
            login = 0
            list_printshops = 1
            nearest_printshops = 1
            budget_round = 5
        "#;
        temp.write_all(content.as_bytes()).expect("write config");

        let config = HarnessConfig::from_file(temp.path()).expect("load config");
        assert_eq!(config.base_url, "http://print.test:9000");
        assert_eq!(config.printshops, 12);
        assert_eq!(config.retry, 2);
        assert_eq!(config.max_budgets, 5);
        assert_eq!(config.weights.budget_round, 5);
        assert_eq!(
            config.operator_directory().expect("operators").operator_for(12),
            Some("ana")
        );
        config.validate().expect("valid");
    }

    #[test]
    fn unreadable_or_malformed_files_fail() {
        assert!(matches!(
            HarnessConfig::from_file("/no/such/printload.toml"),
            Err(AppError::Config(_))
        ));

        let mut temp = tempfile::NamedTempFile::new().expect("create temp file");
        temp.write_all(b"printshops = \"many\"").expect("write config");
        assert!(matches!(
            HarnessConfig::from_file(temp.path()),
            Err(AppError::Toml(_))
        ));
    }

    #[test]
    fn validate_rejects_inconsistent_values() {
        let mut config = HarnessConfig {
            min_wait_ms: 10,
            max_wait_ms: 5,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        config = HarnessConfig::default();
        config.operators.insert("eight".into(), "x".into());
        assert!(config.validate().is_err());

        config = HarnessConfig {
            printshops: 1,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());

        config = HarnessConfig {
            min_pages: 40,
            max_pages: 30,
            ..HarnessConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn file_pool_is_required_when_asked_for() {
        let config = HarnessConfig::default();
        assert!(config.file_pool_path().is_err());

        let config = HarnessConfig {
            file_pool: Some(PathBuf::from("/pool")),
            ..HarnessConfig::default()
        };
        assert_eq!(config.file_pool_path().expect("path"), Path::new("/pool"));
    }
}
