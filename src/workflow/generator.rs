/// Synthetic print job generation.
use crate::error::AppError;
use crate::models::{FormatSpec, Job};
use crate::workflow::file_pool::FilePool;
use std::ops::RangeInclusive;

/// Builds randomized jobs from a file pool.
#[derive(Debug, Clone)]
pub struct RequestGenerator {
    pool: FilePool,
    pages: RangeInclusive<u32>,
    max_schema_id: u32,
}

impl RequestGenerator {
    pub fn new(
        pool: FilePool,
        pages: RangeInclusive<u32>,
        max_schema_id: u32,
    ) -> Result<Self, AppError> {
        if pages.is_empty() || *pages.end() == 0 {
            return Err(AppError::Config(format!(
                "Page range {}..={} must be non-empty with a positive upper bound",
                pages.start(),
                pages.end()
            )));
        }
        if max_schema_id == 0 {
            return Err(AppError::Config(
                "The maximum printing schema id must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            pool,
            pages,
            max_schema_id,
        })
    }

    /// Generate a job with one format spec referencing a random schema.
    pub fn generate(&self, rng: &mut fastrand::Rng) -> Job {
        let file = self.pool.pick(rng).to_string();
        let pages = rng.u32(self.pages.clone());
        let schema = rng.u32(1..=self.max_schema_id);
        Job::new(file, pages, vec![FormatSpec::schema(schema)])
    }
}
