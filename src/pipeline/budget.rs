//! One deadline + token budget shared by every stage of a request

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::metrics::Stage;
use crate::config::Tuning;
use crate::error::{FlowcraftError, Result};

#[derive(Debug)]
pub struct Budget {
    started: Instant,
    deadline: Instant,
    token_limit: u64,
    used_tokens: AtomicU64,
    cancel: CancellationToken,
}

impl Budget {
    pub fn new(wall_clock: Duration, token_limit: u64) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + wall_clock,
            token_limit,
            used_tokens: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_tuning(tuning: &Tuning) -> Self {
        Self::new(
            Duration::from_millis(tuning.request_deadline_ms),
            tuning.request_token_budget,
        )
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining_time(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn used_tokens(&self) -> u64 {
        self.used_tokens.load(Ordering::Relaxed)
    }

    pub fn remaining_tokens(&self) -> u64 {
        self.token_limit.saturating_sub(self.used_tokens())
    }

    pub fn consume(&self, tokens: u64) {
        self.used_tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn is_exhausted(&self) -> bool {
        self.cancel.is_cancelled() || self.remaining_time().is_zero() || self.remaining_tokens() == 0
    }

    /// `Err(BudgetExhausted)` once the deadline, token ceiling or cancellation hits.
    pub fn check(&self, stage: Stage) -> Result<()> {
        if self.is_exhausted() {
            return Err(FlowcraftError::BudgetExhausted {
                stage: stage.as_str().to_string(),
            });
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves when the request is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_exhaust_budget() {
        let budget = Budget::new(Duration::from_secs(60), 100);
        assert!(budget.check(Stage::Draft).is_ok());
        budget.consume(60);
        assert_eq!(budget.remaining_tokens(), 40);
        budget.consume(60);
        assert_eq!(budget.remaining_tokens(), 0);
        assert!(matches!(
            budget.check(Stage::Guide),
            Err(FlowcraftError::BudgetExhausted { ref stage }) if stage == "guide"
        ));
    }

    #[test]
    fn zero_deadline_and_cancel() {
        let budget = Budget::new(Duration::ZERO, 1000);
        assert!(budget.is_exhausted());

        let budget = Budget::new(Duration::from_secs(60), 1000);
        budget.cancel();
        assert!(budget.check(Stage::Verify).is_err());
    }
}
