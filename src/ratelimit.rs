// src/ratelimit.rs
//! Monthly call-budget limiter with automatic month-rollover reset.
//!
//! Metered upstreams consult this before every call; the content source is
//! not budget-limited and stays delay-paced in the aggregation loop. The
//! remaining budget is reported on the status endpoint.

use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info};

struct BudgetState {
    used: u32,
    month_key: String,
}

pub struct MonthlyRateLimiter {
    budget: u32,
    state: Mutex<BudgetState>,
}

impl MonthlyRateLimiter {
    pub fn new(budget: u32) -> Self {
        Self {
            budget,
            state: Mutex::new(BudgetState {
                used: 0,
                month_key: current_month_key(),
            }),
        }
    }

    pub fn can_make_request(&self) -> bool {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        reset_if_new_month(&mut state);
        state.used < self.budget
    }

    pub fn record_request(&self) {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        reset_if_new_month(&mut state);
        state.used += 1;
        debug!(used = state.used, budget = self.budget, "metered upstream call recorded");
    }

    pub fn remaining_calls(&self) -> u32 {
        let mut state = self.state.lock().expect("rate limiter mutex poisoned");
        reset_if_new_month(&mut state);
        self.budget.saturating_sub(state.used)
    }

    #[cfg(test)]
    fn force_month_key(&self, key: &str) {
        self.state.lock().unwrap().month_key = key.to_string();
    }
}

fn current_month_key() -> String {
    Utc::now().format("%Y-%m").to_string()
}

fn reset_if_new_month(state: &mut BudgetState) {
    let current = current_month_key();
    if state.month_key != current {
        state.used = 0;
        state.month_key = current;
        info!("monthly call budget reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_enforced() {
        let limiter = MonthlyRateLimiter::new(2);
        assert!(limiter.can_make_request());
        limiter.record_request();
        limiter.record_request();
        assert!(!limiter.can_make_request());
        assert_eq!(limiter.remaining_calls(), 0);
    }

    #[test]
    fn remaining_never_underflows() {
        let limiter = MonthlyRateLimiter::new(1);
        limiter.record_request();
        limiter.record_request();
        assert_eq!(limiter.remaining_calls(), 0);
    }

    #[test]
    fn month_rollover_resets_usage() {
        let limiter = MonthlyRateLimiter::new(3);
        limiter.record_request();
        limiter.record_request();
        assert_eq!(limiter.remaining_calls(), 1);

        limiter.force_month_key("2000-01");
        assert_eq!(limiter.remaining_calls(), 3);
        assert!(limiter.can_make_request());
    }
}
