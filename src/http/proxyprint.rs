/// reqwest implementation of the ProxyPrint API.
use crate::error::{AppError, RoundError};
use crate::http::client::{ClientConfig, Credentials, PrintShopApi};
use crate::models::{Job, JobId, ProviderSet, QuoteResponse, SelectedQuote};
use crate::workflow::file_pool::FileLease;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

/// Client for a ProxyPrint deployment.
pub struct ProxyPrintClient {
    client: Client,
    config: ClientConfig,
}

impl ProxyPrintClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Result<Self, AppError> {
        if config.base_url.is_empty() {
            return Err(AppError::Config(
                "A base URL is required. Specify one with --base-url.".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn with_headers(&self, mut req: RequestBuilder) -> RequestBuilder {
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }
        req
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, RoundError> {
        let response = self
            .with_headers(req)
            .send()
            .await
            .map_err(|e| RoundError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RoundError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    async fn send_for_count(&self, req: RequestBuilder) -> Result<usize, RoundError> {
        let response = self.send(req).await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| RoundError::MalformedResponse(format!("Invalid JSON: {}", e)))?;
        Ok(count_entries(&body))
    }
}

#[async_trait::async_trait]
impl PrintShopApi for ProxyPrintClient {
    async fn request_budget(
        &self,
        consumer: &Credentials,
        job: &Job,
        providers: &ProviderSet,
        file: &FileLease,
    ) -> Result<QuoteResponse, RoundError> {
        let print_request = serde_json::to_string(&job.print_request(providers))
            .map_err(|e| RoundError::MalformedResponse(format!("Unserializable job: {}", e)))?;

        let form = Form::new()
            .part(
                "files",
                Part::bytes(file.bytes().to_vec()).file_name(file.name().to_string()),
            )
            .text("printRequest", print_request);

        let req = self
            .client
            .post(self.config.url("/consumer/budget"))
            .basic_auth(&consumer.username, Some(&consumer.password))
            .multipart(form);

        let response = self.send(req).await?;
        let text = response
            .text()
            .await
            .map_err(|e| RoundError::Transport(format!("Failed to read body: {}", e)))?;

        let parsed: QuoteResponse = serde_json::from_str(&text).map_err(|e| {
            RoundError::MalformedResponse(format!("Failed to parse budget response: {}", e))
        })?;

        debug!(
            consumer = %consumer.username,
            job_id = ?parsed.job_id,
            quotes = parsed.quotes.len(),
            "budget received"
        );

        Ok(parsed)
    }

    async fn submit_order(
        &self,
        consumer: &Credentials,
        quote: &SelectedQuote,
    ) -> Result<(), RoundError> {
        let path = format!("/consumer/printrequest/{}/submit", quote.job_id);
        let req = self
            .client
            .post(self.config.url(&path))
            .basic_auth(&consumer.username, Some(&consumer.password))
            .json(quote);

        self.send(req).await?;
        Ok(())
    }

    async fn advance_status(
        &self,
        operator: &Credentials,
        job_id: JobId,
    ) -> Result<(), RoundError> {
        let path = format!("/printshops/requests/{}", job_id);
        let req = self
            .client
            .post(self.config.url(&path))
            .basic_auth(&operator.username, Some(&operator.password));

        self.send(req).await?;
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> Result<(), RoundError> {
        let req = self.client.post(self.config.url("/login")).form(&[
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
        ]);

        self.send(req).await?;
        Ok(())
    }

    async fn list_printshops(&self) -> Result<usize, RoundError> {
        let req = self.client.get(self.config.url("/printshops"));
        self.send_for_count(req).await
    }

    async fn nearest_printshops(
        &self,
        latitude: u32,
        longitude: u32,
    ) -> Result<usize, RoundError> {
        let req = self
            .client
            .get(self.config.url("/printshops/nearest"))
            .query(&[("latitude", latitude), ("longitude", longitude)]);
        self.send_for_count(req).await
    }
}

/// Number of entries in a listing body: a bare array or an object whose
/// first array field holds the entries.
fn count_entries(body: &Value) -> usize {
    match body {
        Value::Array(items) => items.len(),
        Value::Object(fields) => fields
            .values()
            .find_map(|v| v.as_array().map(Vec::len))
            .unwrap_or(0),
        _ => 0,
    }
}
