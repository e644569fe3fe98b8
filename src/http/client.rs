/// HTTP client abstraction for the print-ordering service.
use crate::error::RoundError;
use crate::models::{Job, JobId, ProviderSet, QuoteResponse, SelectedQuote};
use crate::workflow::file_pool::FileLease;
use std::time::Duration;

/// Basic-auth identity of a consumer or a print shop operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Trait for clients of the print-ordering API.
///
/// Every method is one HTTP exchange. Implementations never retry; the
/// load driver decides whether an action is repeated.
#[async_trait::async_trait]
pub trait PrintShopApi: Send + Sync {
    /// Ask the listed print shops for a budget on `job`.
    ///
    /// # Arguments
    ///
    /// * `consumer` - Identity the request is made under
    /// * `job` - The job being quoted
    /// * `providers` - Print shops asked for a quote
    /// * `file` - Leased file uploaded with the request
    async fn request_budget(
        &self,
        consumer: &Credentials,
        job: &Job,
        providers: &ProviderSet,
        file: &FileLease,
    ) -> Result<QuoteResponse, RoundError>;

    /// Confirm a quote as the consumer that requested it.
    async fn submit_order(
        &self,
        consumer: &Credentials,
        quote: &SelectedQuote,
    ) -> Result<(), RoundError>;

    /// Move a print request one step along its status chain, as an operator.
    async fn advance_status(&self, operator: &Credentials, job_id: JobId)
        -> Result<(), RoundError>;

    async fn login(&self, credentials: &Credentials) -> Result<(), RoundError>;

    /// List all print shops. Returns how many were listed.
    async fn list_printshops(&self) -> Result<usize, RoundError>;

    /// Print shops closest to a coordinate. Returns how many were listed.
    async fn nearest_printshops(&self, latitude: u32, longitude: u32)
        -> Result<usize, RoundError>;
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL, without a trailing path
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Additional headers
    pub headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Join an endpoint path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(60),
            headers: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slashes() {
        let config = ClientConfig {
            base_url: "http://localhost:8080/".into(),
            ..ClientConfig::default()
        };
        assert_eq!(
            config.url("/consumer/budget"),
            "http://localhost:8080/consumer/budget"
        );
        assert_eq!(config.url("printshops"), "http://localhost:8080/printshops");
    }
}
