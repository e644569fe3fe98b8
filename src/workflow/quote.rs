/// Budget collection from the quote endpoint.
use crate::error::{AppError, RoundError};
use crate::http::client::{Credentials, PrintShopApi};
use crate::models::{Job, ProviderSet, QuoteResponse};
use crate::workflow::file_pool::FilePool;
use std::sync::Arc;

/// Synthetic consumer accounts `<prefix>1` to `<prefix>{max - 1}`.
#[derive(Debug, Clone)]
pub struct ConsumerPool {
    prefix: String,
    max_consumers: u32,
    password: String,
}

impl ConsumerPool {
    pub fn new(
        prefix: impl Into<String>,
        max_consumers: u32,
        password: impl Into<String>,
    ) -> Result<Self, AppError> {
        if max_consumers < 2 {
            return Err(AppError::Config(format!(
                "max consumers must be at least 2, got {}",
                max_consumers
            )));
        }
        Ok(Self {
            prefix: prefix.into(),
            max_consumers,
            password: password.into(),
        })
    }

    pub fn pick(&self, rng: &mut fastrand::Rng) -> Credentials {
        let n = rng.u32(1..self.max_consumers);
        Credentials::new(format!("{}{}", self.prefix, n), self.password.clone())
    }
}

/// A budget response together with the identity that requested it.
#[derive(Debug, Clone)]
pub struct Quoted {
    pub consumer: Credentials,
    pub response: QuoteResponse,
}

/// Requests budgets for generated jobs.
pub struct QuoteClient<A> {
    api: Arc<A>,
    pool: FilePool,
    consumers: ConsumerPool,
}

impl<A: PrintShopApi> QuoteClient<A> {
    pub fn new(api: Arc<A>, pool: FilePool, consumers: ConsumerPool) -> Self {
        Self {
            api,
            pool,
            consumers,
        }
    }

    pub fn consumers(&self) -> &ConsumerPool {
        &self.consumers
    }

    /// Request budgets as `consumer`.
    ///
    /// The job's file is leased for exactly the duration of the call and
    /// released whether or not the request succeeds.
    pub async fn request_as(
        &self,
        consumer: Credentials,
        job: &Job,
        providers: &ProviderSet,
    ) -> Result<Quoted, RoundError> {
        let lease = self.pool.lease(job.file_ref()).await?;
        let result = self
            .api
            .request_budget(&consumer, job, providers, &lease)
            .await;
        drop(lease);

        Ok(Quoted {
            consumer,
            response: result?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormatSpec, JobId, SelectedQuote};
    use crate::workflow::file_pool::FileLease;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every budget request and records how many leases were open
    /// while it ran.
    struct FailingApi {
        pool: FilePool,
        leases_seen: AtomicUsize,
    }

    #[async_trait]
    impl PrintShopApi for FailingApi {
        async fn request_budget(
            &self,
            _consumer: &Credentials,
            _job: &Job,
            _providers: &ProviderSet,
            file: &FileLease,
        ) -> Result<QuoteResponse, RoundError> {
            assert!(!file.bytes().is_empty());
            self.leases_seen
                .store(self.pool.open_leases(), Ordering::SeqCst);
            Err(RoundError::Transport("connection reset".into()))
        }

        async fn submit_order(
            &self,
            _consumer: &Credentials,
            _quote: &SelectedQuote,
        ) -> Result<(), RoundError> {
            unreachable!("not used")
        }

        async fn advance_status(
            &self,
            _operator: &Credentials,
            _job_id: JobId,
        ) -> Result<(), RoundError> {
            unreachable!("not used")
        }

        async fn login(&self, _credentials: &Credentials) -> Result<(), RoundError> {
            unreachable!("not used")
        }

        async fn list_printshops(&self) -> Result<usize, RoundError> {
            unreachable!("not used")
        }

        async fn nearest_printshops(&self, _lat: u32, _lon: u32) -> Result<usize, RoundError> {
            unreachable!("not used")
        }
    }

    #[tokio::test]
    async fn file_lease_released_after_transport_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("1.pdf"), b"pdf").expect("write file");
        let pool = FilePool::open(dir.path()).expect("open pool");

        let api = Arc::new(FailingApi {
            pool: pool.clone(),
            leases_seen: AtomicUsize::new(0),
        });
        let client = QuoteClient::new(
            api.clone(),
            pool.clone(),
            ConsumerPool::new("aaa", 1000, "1234").expect("consumers"),
        );

        let job = Job::new("1.pdf", 30, vec![FormatSpec::schema(2)]);
        let providers = ProviderSet::new(vec![8]).expect("providers");
        let mut rng = fastrand::Rng::with_seed(5);

        let consumer = client.consumers().pick(&mut rng);
        let result = client.request_as(consumer, &job, &providers).await;

        assert!(matches!(result, Err(RoundError::Transport(_))));
        assert_eq!(api.leases_seen.load(Ordering::SeqCst), 1);
        assert_eq!(pool.open_leases(), 0);
    }

    #[tokio::test]
    async fn missing_file_never_reaches_the_api() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("1.pdf"), b"pdf").expect("write file");
        let pool = FilePool::open(dir.path()).expect("open pool");
        let api = Arc::new(FailingApi {
            pool: pool.clone(),
            leases_seen: AtomicUsize::new(usize::MAX),
        });
        let client = QuoteClient::new(
            api.clone(),
            pool.clone(),
            ConsumerPool::new("aaa", 1000, "1234").expect("consumers"),
        );

        let job = Job::new("2.pdf", 30, vec![FormatSpec::schema(2)]);
        let providers = ProviderSet::new(vec![8]).expect("providers");
        let result = client
            .request_as(Credentials::new("aaa1", "1234"), &job, &providers)
            .await;

        assert!(matches!(
            result,
            Err(RoundError::ResourceUnavailable { .. })
        ));
        assert_eq!(api.leases_seen.load(Ordering::SeqCst), usize::MAX);
    }

    #[test]
    fn consumer_names_stay_in_range() {
        let consumers = ConsumerPool::new("aaa", 3, "1234").expect("consumers");
        let mut rng = fastrand::Rng::with_seed(2);
        for _ in 0..100 {
            let c = consumers.pick(&mut rng);
            assert!(c.username == "aaa1" || c.username == "aaa2");
            assert_eq!(c.password, "1234");
        }
        assert!(ConsumerPool::new("aaa", 1, "1234").is_err());
    }
}
