/// One consumer's quote, select and submit pipeline.
use crate::config::HarnessConfig;
use crate::error::{AppError, RoundError};
use crate::http::client::{Credentials, PrintShopApi};
use crate::models::{Job, ProviderSet, SelectedQuote};
use crate::workflow::file_pool::FilePool;
use crate::workflow::generator::RequestGenerator;
use crate::workflow::picker::pick_winner;
use crate::workflow::quote::{ConsumerPool, QuoteClient, Quoted};
use crate::workflow::selector::ProviderSelector;
use crate::workflow::submission::{OrderMark, SubmissionClient};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a completed round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub consumer: String,
    pub job: Job,
    pub providers: ProviderSet,
    /// Quotes offered in the budget response.
    pub offered: usize,
    pub selected: SelectedQuote,
    /// Status transitions driven after submission.
    pub transitions: usize,
}

/// What a round will send, drawn before anything goes out.
#[derive(Debug, Clone)]
pub struct RoundPlan {
    pub consumer: Credentials,
    pub job: Job,
    pub providers: ProviderSet,
}

/// Runs rounds against one API client. Shared read-only by all users.
pub struct RoundRunner<A> {
    api: Arc<A>,
    generator: RequestGenerator,
    selector: ProviderSelector,
    quotes: QuoteClient<A>,
    submission: SubmissionClient<A>,
}

impl<A: PrintShopApi> RoundRunner<A> {
    pub fn new(
        api: Arc<A>,
        generator: RequestGenerator,
        selector: ProviderSelector,
        quotes: QuoteClient<A>,
        submission: SubmissionClient<A>,
    ) -> Self {
        Self {
            api,
            generator,
            selector,
            quotes,
            submission,
        }
    }

    /// Wire every stage from a validated configuration and an open pool.
    pub fn from_config(
        api: Arc<A>,
        config: &HarnessConfig,
        pool: FilePool,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let generator = RequestGenerator::new(
            pool.clone(),
            config.min_pages..=config.max_pages,
            config.max_schemas,
        )?;
        let selector =
            ProviderSelector::new(config.printshops, config.max_budgets, config.home_printshop)?;
        let consumers = ConsumerPool::new(
            config.consumer_prefix.clone(),
            config.max_consumers,
            config.consumer_password.clone(),
        )?;
        let quotes = QuoteClient::new(api.clone(), pool, consumers);
        let submission = SubmissionClient::new(
            api.clone(),
            config.operator_directory()?,
            config.operator_password.clone(),
            config.drive_status,
        );

        Ok(Self::new(api, generator, selector, quotes, submission))
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    /// Draw a job, a provider set and a consumer.
    pub fn plan(&self, rng: &mut fastrand::Rng) -> RoundPlan {
        let job = self.generator.generate(rng);
        let providers = self.selector.select(rng);
        let consumer = self.quotes.consumers().pick(rng);
        debug!(
            consumer = %consumer.username,
            file = job.file_ref(),
            pages = job.page_count(),
            printshops = ?providers.as_slice(),
            "round planned"
        );
        RoundPlan {
            consumer,
            job,
            providers,
        }
    }

    /// Plan a round and run it, setting `mark` once the order is placed.
    pub async fn run_marked(
        &self,
        rng: &mut fastrand::Rng,
        mark: &OrderMark,
    ) -> Result<RoundOutcome, RoundError> {
        let plan = self.plan(rng);
        self.run_plan(plan, mark).await
    }

    /// Run a round for a given job, provider set and consumer.
    pub async fn run_with(
        &self,
        consumer: Credentials,
        job: Job,
        providers: ProviderSet,
    ) -> Result<RoundOutcome, RoundError> {
        let plan = RoundPlan {
            consumer,
            job,
            providers,
        };
        self.run_plan(plan, &OrderMark::default()).await
    }

    async fn run_plan(&self, plan: RoundPlan, mark: &OrderMark) -> Result<RoundOutcome, RoundError> {
        let RoundPlan {
            consumer,
            job,
            providers,
        } = plan;
        let quoted = self.quotes.request_as(consumer, &job, &providers).await?;
        self.finish(job, providers, quoted, mark).await
    }

    async fn finish(
        &self,
        job: Job,
        providers: ProviderSet,
        quoted: Quoted,
        mark: &OrderMark,
    ) -> Result<RoundOutcome, RoundError> {
        let Quoted { consumer, response } = quoted;
        let offered = response.quotes.len();

        if response.success == Some(false) {
            return Err(RoundError::Rejected {
                status: 200,
                body: "budget endpoint reported failure".to_string(),
            });
        }
        if response.job_id.is_none() {
            return Err(RoundError::MalformedResponse(
                "budget response has no printRequestID".to_string(),
            ));
        }

        let selected = pick_winner(&response).ok_or(RoundError::NoEligibleQuote { offered })?;
        let outcome = self.submission.submit(&consumer, &selected, mark).await?;

        info!(
            consumer = %consumer.username,
            job_id = selected.job_id,
            printshop = selected.provider_id,
            price = selected.price,
            offered,
            "round completed"
        );

        Ok(RoundOutcome {
            consumer: consumer.username,
            job,
            providers,
            offered,
            selected,
            transitions: outcome.transitions,
        })
    }
}
