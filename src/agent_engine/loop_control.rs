// Step and retry budgets for one objective.

/// Counts executed actions. Starts at 1 and only moves on execution.
#[derive(Debug, Clone)]
pub struct StepCounter {
    step: u32,
    max_steps: u32,
}

impl StepCounter {
    pub fn new(max_steps: u32) -> Self {
        Self { step: 1, max_steps }
    }

    pub fn current(&self) -> u32 {
        self.step
    }

    /// Number of actions executed so far.
    pub fn executed(&self) -> u32 {
        self.step - 1
    }

    pub fn record_execution(&mut self) {
        self.step += 1;
    }

    pub fn exceeded(&self) -> bool {
        self.step > self.max_steps
    }
}

/// Proposer queries allowed within a single step: `retries + 1`.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    remaining: u32,
    attempts: u32,
}

impl RetryBudget {
    pub fn new(retries: u32) -> Self {
        Self {
            remaining: retries,
            attempts: 0,
        }
    }

    /// Register a proposer query; returns its 1-based attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Consume one retry after a rejected proposal. `false` once exhausted.
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_counter_exceeds_after_max_executions() {
        let mut c = StepCounter::new(2);
        assert_eq!(c.current(), 1);
        c.record_execution();
        assert!(!c.exceeded());
        c.record_execution();
        assert!(c.exceeded());
        assert_eq!(c.executed(), 2);
    }

    #[test]
    fn retry_budget_allows_retries_plus_one_attempts() {
        let mut b = RetryBudget::new(2);
        b.begin_attempt();
        assert!(b.consume());
        b.begin_attempt();
        assert!(b.consume());
        b.begin_attempt();
        assert!(!b.consume());
        assert_eq!(b.attempts(), 3);
    }
}
