use std::time::Duration;

/// Where the refill loop currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefillState {
    Idle,
    /// Exactly one fetch is outstanding
    Refilling,
    /// The last fetch failed; no fetch until the cooldown timer fires
    CoolingDown { error: String },
}

/// What the driver must do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefillAction {
    None,
    Fetch,
    StartCooldown(Duration),
}

/// Pure refill state machine. Performs no I/O; the driver feeds it events and
/// executes the returned actions.
#[derive(Debug, Clone)]
pub struct RefillMachine {
    state: RefillState,
    threshold: usize,
    cooldown: Duration,
    depth: usize,
}

impl RefillMachine {
    pub fn new(threshold: usize, cooldown: Duration) -> Self {
        Self {
            state: RefillState::Idle,
            threshold,
            cooldown,
            depth: 0,
        }
    }

    pub fn state(&self) -> &RefillState {
        &self.state
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The queue length changed. Only `Idle` can start a fetch, so drops while
    /// refilling or cooling down are recorded but never stack requests.
    pub fn observe_depth(&mut self, depth: usize) -> RefillAction {
        self.depth = depth;
        self.evaluate()
    }

    /// A fetch returned `appended` items which the caller added to the queue.
    ///
    /// An empty result means the pool is exhausted for this actor and is paced
    /// like a failure.
    pub fn fetch_succeeded(&mut self, appended: usize) -> RefillAction {
        if self.state != RefillState::Refilling {
            return RefillAction::None;
        }
        if appended == 0 {
            return self.fetch_failed("no items available");
        }

        self.state = RefillState::Idle;
        self.depth += appended;
        self.evaluate()
    }

    pub fn fetch_failed(&mut self, error: impl Into<String>) -> RefillAction {
        if self.state != RefillState::Refilling {
            return RefillAction::None;
        }

        self.state = RefillState::CoolingDown {
            error: error.into(),
        };
        RefillAction::StartCooldown(self.cooldown)
    }

    pub fn cooldown_elapsed(&mut self) -> RefillAction {
        if !matches!(self.state, RefillState::CoolingDown { .. }) {
            return RefillAction::None;
        }

        self.state = RefillState::Idle;
        self.evaluate()
    }

    fn evaluate(&mut self) -> RefillAction {
        if self.state != RefillState::Idle || self.depth > self.threshold {
            return RefillAction::None;
        }

        self.state = RefillState::Refilling;
        RefillAction::Fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(3);

    fn machine() -> RefillMachine {
        RefillMachine::new(3, COOLDOWN)
    }

    #[test]
    fn test_depth_above_threshold_does_nothing() {
        let mut machine = machine();
        assert_eq!(machine.observe_depth(10), RefillAction::None);
        assert_eq!(machine.observe_depth(4), RefillAction::None);
        assert_eq!(machine.state(), &RefillState::Idle);
    }

    #[test]
    fn test_single_fetch_at_threshold() {
        let mut machine = machine();
        machine.observe_depth(10);

        assert_eq!(machine.observe_depth(3), RefillAction::Fetch);
        assert_eq!(machine.state(), &RefillState::Refilling);

        // Further drops while the fetch is outstanding
        assert_eq!(machine.observe_depth(2), RefillAction::None);
        assert_eq!(machine.observe_depth(1), RefillAction::None);
    }

    #[test]
    fn test_success_returns_to_idle_and_reevaluates() {
        let mut machine = machine();
        machine.observe_depth(3);

        assert_eq!(machine.fetch_succeeded(10), RefillAction::None);
        assert_eq!(machine.state(), &RefillState::Idle);
        assert_eq!(machine.depth(), 13);
    }

    #[test]
    fn test_small_success_requests_again_immediately() {
        let mut machine = machine();
        machine.observe_depth(0);

        assert_eq!(machine.fetch_succeeded(2), RefillAction::Fetch);
        assert_eq!(machine.state(), &RefillState::Refilling);
    }

    #[test]
    fn test_failure_cools_down_without_fetching() {
        let mut machine = machine();
        machine.observe_depth(2);

        assert_eq!(
            machine.fetch_failed("timeout"),
            RefillAction::StartCooldown(COOLDOWN)
        );
        assert_eq!(
            machine.state(),
            &RefillState::CoolingDown {
                error: "timeout".to_string()
            }
        );

        assert_eq!(machine.observe_depth(1), RefillAction::None);
        assert_eq!(machine.observe_depth(0), RefillAction::None);

        assert_eq!(machine.cooldown_elapsed(), RefillAction::Fetch);
    }

    #[test]
    fn test_empty_success_takes_failure_path() {
        let mut machine = machine();
        machine.observe_depth(0);

        assert_eq!(
            machine.fetch_succeeded(0),
            RefillAction::StartCooldown(COOLDOWN)
        );
        assert!(matches!(machine.state(), RefillState::CoolingDown { .. }));
    }

    #[test]
    fn test_cooldown_with_healthy_queue_goes_idle() {
        let mut machine = machine();
        machine.observe_depth(3);
        machine.fetch_failed("boom");
        machine.observe_depth(8);

        assert_eq!(machine.cooldown_elapsed(), RefillAction::None);
        assert_eq!(machine.state(), &RefillState::Idle);

        // A later drop triggers a fresh attempt
        assert_eq!(machine.observe_depth(3), RefillAction::Fetch);
    }

    #[test]
    fn test_stale_completions_are_ignored() {
        let mut machine = machine();
        assert_eq!(machine.fetch_succeeded(5), RefillAction::None);
        assert_eq!(machine.fetch_failed("late"), RefillAction::None);
        assert_eq!(machine.cooldown_elapsed(), RefillAction::None);
        assert_eq!(machine.state(), &RefillState::Idle);
    }
}
