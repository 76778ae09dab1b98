//! Evicts idle clients from the login rate limiter.

use std::sync::Arc;
use std::time::Duration;

use super::scheduler::Job;
use crate::middleware::RateLimiterState;

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Drops limiter keys whose quota has fully replenished.
pub struct RateLimitCleanupJob {
    limiter: Arc<RateLimiterState>,
}

impl RateLimitCleanupJob {
    pub fn new(limiter: Arc<RateLimiterState>) -> Self {
        Self { limiter }
    }
}

#[async_trait::async_trait]
impl Job for RateLimitCleanupJob {
    fn name(&self) -> &'static str {
        "rate_limit_cleanup"
    }

    fn interval(&self) -> Duration {
        RATE_LIMIT_CLEANUP_INTERVAL
    }

    async fn execute(&self) -> Result<(), String> {
        let before = self.limiter.tracked_clients();
        self.limiter.retain_recent();
        let after = self.limiter.tracked_clients();
        if after < before {
            tracing::debug!(evicted = before - after, tracked = after, "Pruned login rate limiter");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_identity() {
        let job = RateLimitCleanupJob::new(Arc::new(RateLimiterState::new(5, false).unwrap()));
        assert_eq!(job.name(), "rate_limit_cleanup");
        assert_eq!(job.interval(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_execute_keeps_clients_still_limited() {
        let limiter = Arc::new(RateLimiterState::new(1, false).unwrap());
        let client = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(client).is_ok());

        let job = RateLimitCleanupJob::new(limiter.clone());
        assert!(job.execute().await.is_ok());

        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.check(client).is_err());
    }
}
