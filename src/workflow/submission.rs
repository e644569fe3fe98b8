/// Order confirmation and operator-side status transitions.
use crate::config::OperatorDirectory;
use crate::error::RoundError;
use crate::http::client::{Credentials, PrintShopApi};
use crate::models::SelectedQuote;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Transitions posted after a submission: accept, then finish.
pub const STATUS_TRANSITIONS: usize = 2;

/// What a submission got through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Status transitions that succeeded.
    pub transitions: usize,
}

/// Set once a round's order has gone through.
///
/// Lives outside the round's future so it can still be read after the
/// future was dropped, e.g. by a timeout.
#[derive(Debug, Default)]
pub struct OrderMark(AtomicBool);

impl OrderMark {
    pub fn is_placed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn place(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Confirms selected quotes and plays the operator's part.
pub struct SubmissionClient<A> {
    api: Arc<A>,
    operators: OperatorDirectory,
    operator_password: String,
    drive_status: bool,
}

impl<A: PrintShopApi> SubmissionClient<A> {
    pub fn new(
        api: Arc<A>,
        operators: OperatorDirectory,
        operator_password: impl Into<String>,
        drive_status: bool,
    ) -> Self {
        Self {
            api,
            operators,
            operator_password: operator_password.into(),
            drive_status,
        }
    }

    /// Submit `quote` as `consumer`, then optionally post the status
    /// transitions as the winning print shop's operator.
    ///
    /// Calls are sequential and independent: an error in a transition is
    /// returned as [`RoundError::AfterOrder`] and the submission before it
    /// stands. `mark` is set as soon as the order is accepted.
    pub async fn submit(
        &self,
        consumer: &Credentials,
        quote: &SelectedQuote,
        mark: &OrderMark,
    ) -> Result<SubmissionOutcome, RoundError> {
        self.api.submit_order(consumer, quote).await?;
        mark.place();
        debug!(
            job_id = quote.job_id,
            printshop = quote.provider_id,
            "order submitted"
        );

        if !self.drive_status {
            return Ok(SubmissionOutcome { transitions: 0 });
        }

        let Some(operator) = self.operators.operator_for(quote.provider_id) else {
            warn!(
                printshop = quote.provider_id,
                "no operator configured, skipping status transitions"
            );
            return Ok(SubmissionOutcome { transitions: 0 });
        };
        let operator = Credentials::new(operator, self.operator_password.clone());

        for step in 0..STATUS_TRANSITIONS {
            self.api
                .advance_status(&operator, quote.job_id)
                .await
                .map_err(|e| RoundError::AfterOrder {
                    job_id: quote.job_id,
                    source: Box::new(e),
                })?;
            debug!(job_id = quote.job_id, step = step + 1, "status advanced");
        }

        Ok(SubmissionOutcome {
            transitions: STATUS_TRANSITIONS,
        })
    }
}
