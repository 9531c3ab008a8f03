//! Pagination strategies and the selector's memory of which one works
use std::fmt;

/// One way of getting from a result page to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaginationStrategy {
    /// "View more" button that appends the next page to the current one
    ExpandInPlace,

    /// Classic "next" link that replaces the current page
    NextLink,
}

impl PaginationStrategy {
    /// All strategies in declaration order
    pub const ALL: [PaginationStrategy; 2] = [Self::ExpandInPlace, Self::NextLink];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpandInPlace => "expand-in-place",
            Self::NextLink => "next-link",
        }
    }
}

impl fmt::Display for PaginationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory carried between calls to the pagination selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyState {
    preferred: Option<PaginationStrategy>,
    consecutive_failures: u32,
}

impl StrategyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state that already prefers `strategy`
    pub fn with_preferred(strategy: PaginationStrategy, consecutive_failures: u32) -> Self {
        Self {
            preferred: Some(strategy),
            consecutive_failures,
        }
    }

    pub fn preferred(&self) -> Option<PaginationStrategy> {
        self.preferred
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Strategies to try, preferred first and the rest in declaration order
    pub fn candidate_order(&self) -> Vec<PaginationStrategy> {
        let mut order = Vec::with_capacity(PaginationStrategy::ALL.len());
        if let Some(preferred) = self.preferred {
            order.push(preferred);
        }
        order.extend(
            PaginationStrategy::ALL
                .iter()
                .copied()
                .filter(|s| Some(*s) != self.preferred),
        );
        order
    }

    /// Records that `strategy` advanced the page
    pub fn record_success(&mut self, strategy: PaginationStrategy) {
        self.preferred = Some(strategy);
        self.consecutive_failures = 0;
    }

    /// Records a failed attempt with `strategy`
    ///
    /// Returns true if the failure cleared the preferred strategy.
    pub fn record_failure(&mut self, strategy: PaginationStrategy, threshold: u32) -> bool {
        self.consecutive_failures += 1;

        if self.preferred == Some(strategy) && self.consecutive_failures >= threshold {
            self.preferred = None;
            self.consecutive_failures = 0;
            return true;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_state_uses_declaration_order() {
        let state = StrategyState::new();
        assert_eq!(
            state.candidate_order(),
            vec![PaginationStrategy::ExpandInPlace, PaginationStrategy::NextLink]
        );
    }

    #[test]
    fn test_preferred_strategy_goes_first() {
        let state = StrategyState::with_preferred(PaginationStrategy::NextLink, 0);
        assert_eq!(
            state.candidate_order(),
            vec![PaginationStrategy::NextLink, PaginationStrategy::ExpandInPlace]
        );
    }

    #[test]
    fn test_success_sets_preference_and_clears_failures() {
        let mut state = StrategyState::with_preferred(PaginationStrategy::ExpandInPlace, 1);
        state.record_success(PaginationStrategy::NextLink);

        assert_eq!(state.preferred(), Some(PaginationStrategy::NextLink));
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn test_preferred_failing_to_threshold_resets() {
        let mut state = StrategyState::with_preferred(PaginationStrategy::ExpandInPlace, 0);

        assert!(!state.record_failure(PaginationStrategy::ExpandInPlace, 2));
        assert_eq!(state.preferred(), Some(PaginationStrategy::ExpandInPlace));
        assert_eq!(state.consecutive_failures(), 1);

        assert!(state.record_failure(PaginationStrategy::ExpandInPlace, 2));
        assert_eq!(state.preferred(), None);
        assert_eq!(state.consecutive_failures(), 0);
    }

    #[test]
    fn test_non_preferred_failures_only_count() {
        let mut state = StrategyState::with_preferred(PaginationStrategy::ExpandInPlace, 0);

        assert!(!state.record_failure(PaginationStrategy::NextLink, 2));
        assert!(!state.record_failure(PaginationStrategy::NextLink, 2));

        assert_eq!(state.preferred(), Some(PaginationStrategy::ExpandInPlace));
        assert_eq!(state.consecutive_failures(), 2);
    }

    #[test]
    fn test_failure_of_preferred_after_other_failures_resets() {
        let mut state = StrategyState::with_preferred(PaginationStrategy::ExpandInPlace, 0);
        state.record_failure(PaginationStrategy::NextLink, 2);

        assert!(state.record_failure(PaginationStrategy::ExpandInPlace, 2));
        assert_eq!(state.preferred(), None);
    }
}
