/// Error types for the printload crate.
use crate::models::JobId;
use std::time::Duration;
use thiserror::Error;

/// Application-level errors. These are fatal: they stop the command.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Round failed: {0}")]
    Round(#[from] RoundError),
}

/// Errors local to one simulated user's round.
///
/// None of these stop the load driver; they are logged and counted as a
/// failed action.
#[derive(Error, Debug)]
pub enum RoundError {
    /// Connection-level or HTTP-level failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status or `success: false`.
    #[error("Request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The body could not be parsed or lacked an expected field.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No quote in the response passed the eligibility rule.
    #[error("No eligible quote among {offered} offered")]
    NoEligibleQuote { offered: usize },

    /// A file pool entry could not be opened or read.
    #[error("Resource unavailable: {path}: {reason}")]
    ResourceUnavailable { path: String, reason: String },

    #[error("Action timed out after {0:?}")]
    Timeout(Duration),

    /// The order was placed and a later step failed. Repeating the round
    /// would place a second order.
    #[error("Order {job_id} placed, then: {source}")]
    AfterOrder {
        job_id: JobId,
        source: Box<RoundError>,
    },
}

impl RoundError {
    /// Whether an opt-in retry may repeat the action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoundError::Transport(_) | RoundError::Timeout(_))
    }
}
