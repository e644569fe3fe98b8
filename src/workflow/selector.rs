/// Random provider subsets drawn from a ring of print shop ids.
use crate::error::AppError;
use crate::models::{ProviderId, ProviderSet};

/// Circular walk over provider ids `1..count`.
///
/// After `count - 1` the walk wraps back to 1; id 0 is never produced.
#[derive(Debug, Clone)]
pub struct RingWalk {
    next: ProviderId,
    count: ProviderId,
}

impl RingWalk {
    pub fn new(start: ProviderId, count: ProviderId) -> Self {
        let next = if start == 0 || start >= count { 1 } else { start };
        Self { next, count }
    }
}

impl Iterator for RingWalk {
    type Item = ProviderId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next;
        self.next += 1;
        if self.next >= self.count {
            self.next = 1;
        }
        Some(current)
    }
}

/// Picks which print shops are asked for a budget.
#[derive(Debug, Clone)]
pub struct ProviderSelector {
    provider_count: ProviderId,
    max_budgets: usize,
    home: ProviderId,
}

impl ProviderSelector {
    /// # Arguments
    ///
    /// * `provider_count` - Size of the id ring; the walk covers `1..provider_count`
    /// * `max_budgets` - Upper bound on the size of a selection, home included
    /// * `home` - Provider prepended to every selection
    pub fn new(
        provider_count: ProviderId,
        max_budgets: usize,
        home: ProviderId,
    ) -> Result<Self, AppError> {
        if provider_count < 2 {
            return Err(AppError::Config(format!(
                "At least 2 print shops are needed for the id ring, got {}",
                provider_count
            )));
        }
        if home == 0 {
            return Err(AppError::Config(
                "The home print shop id must be positive".to_string(),
            ));
        }
        Ok(Self {
            provider_count,
            max_budgets,
            home,
        })
    }

    /// Draw a selection whose size is uniform in `[1, max_budgets]`.
    pub fn select(&self, rng: &mut fastrand::Rng) -> ProviderSet {
        if self.max_budgets <= 1 {
            return self.from_walk(1, 0);
        }
        let size = rng.usize(1..=self.max_budgets);
        let start = rng.u32(1..self.provider_count);
        self.from_walk(start, size - 1)
    }

    fn from_walk(&self, start: ProviderId, extra: usize) -> ProviderSet {
        ProviderSet::with_home(
            self.home,
            RingWalk::new(start, self.provider_count).take(extra),
        )
    }
}
