use std::time::Duration;

use rand_core::{OsRng, RngCore};

/// Desktop browser identities presented on direct caption downloads.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
];

pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(4000);

/// Request disguise knobs: which user agents to rotate through and how long
/// to wait before each transcript fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPolicy {
    user_agents: Vec<String>,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect(),
            DEFAULT_MIN_DELAY,
            DEFAULT_MAX_DELAY,
        )
    }
}

impl RequestPolicy {
    /// An empty pool falls back to the built-in agents. Swapped bounds are
    /// reordered.
    pub fn new(user_agents: Vec<String>, min_delay: Duration, max_delay: Duration) -> Self {
        let user_agents = if user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            user_agents
        };
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };

        Self {
            user_agents,
            min_delay,
            max_delay,
        }
    }

    /// Always the same agent and the same delay.
    pub fn fixed(user_agent: impl Into<String>, delay: Duration) -> Self {
        Self::new(vec![user_agent.into()], delay, delay)
    }

    /// No pacing at all; for tests.
    pub fn disabled() -> Self {
        Self::fixed(DEFAULT_USER_AGENTS[0], Duration::ZERO)
    }

    pub fn with_delay_bounds(self, min_delay: Duration, max_delay: Duration) -> Self {
        Self::new(self.user_agents, min_delay, max_delay)
    }

    pub fn user_agent(&self) -> &str {
        let idx = random_below(self.user_agents.len() as u64) as usize;
        &self.user_agents[idx]
    }

    pub fn pacing_delay(&self) -> Duration {
        let span =
            u64::try_from((self.max_delay - self.min_delay).as_millis()).unwrap_or(u64::MAX);
        self.min_delay + Duration::from_millis(random_below(span.saturating_add(1)))
    }
}

fn random_below(bound: u64) -> u64 {
    if bound <= 1 {
        return 0;
    }
    OsRng.next_u64() % bound
}
