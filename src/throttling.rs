//! Producer admission control.
//!
//! A [`ThrottlingPolicy`] maps the current queue depth to a
//! [`ThrottleDecision`]. The decision is pure; the pipeline acts on it.

use std::{fmt, str::FromStr, time::Duration};

use serde::Deserialize;

/// Admission rule applied when the queue fills up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottlingKind {
    /// Unbounded queue, every record is admitted.
    None,
    /// Drop records once the queue holds `limit` entries.
    #[default]
    Discard,
    /// Same rule as [`ThrottlingKind::Discard`], named for configuration
    /// surfaces that spell it out.
    DiscardAtLimit,
    /// Wait up to the configured timeout for room in the queue.
    Block,
}

impl fmt::Display for ThrottlingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThrottlingKind::None => "none",
            ThrottlingKind::Discard => "discard",
            ThrottlingKind::DiscardAtLimit => "discard_at_limit",
            ThrottlingKind::Block => "block",
        };
        f.write_str(s)
    }
}

impl FromStr for ThrottlingKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "discard" => Ok(Self::Discard),
            "discard_at_limit" | "discardatlimit" => Ok(Self::DiscardAtLimit),
            "block" => Ok(Self::Block),
            _ => Err(()),
        }
    }
}

/// How long an admitted enqueue may wait for queue capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    Infinite,
    Timeout(Duration),
}

/// Outcome of evaluating a policy against the current queue depth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Accept(Wait),
    Discard,
}

/// Configured admission policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThrottlingPolicy {
    kind: ThrottlingKind,
    limit: usize,
    timeout: Duration,
}

/// Default queue limit for the discard policies.
pub const DEFAULT_THROTTLING_LIMIT: usize = 65_536;
/// Default enqueue wait for the block policy.
pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_millis(500);

impl Default for ThrottlingPolicy {
    fn default() -> Self {
        Self::new(
            ThrottlingKind::Discard,
            DEFAULT_THROTTLING_LIMIT,
            DEFAULT_BLOCK_TIMEOUT,
        )
    }
}

impl ThrottlingPolicy {
    /// Build a policy from its configured parts. `timeout` is only consulted
    /// by [`ThrottlingKind::Block`].
    pub const fn new(kind: ThrottlingKind, limit: usize, timeout: Duration) -> Self {
        Self {
            kind,
            limit,
            timeout,
        }
    }

    pub const fn none() -> Self {
        Self::new(ThrottlingKind::None, 0, Duration::ZERO)
    }

    pub const fn discard(limit: usize) -> Self {
        Self::new(ThrottlingKind::Discard, limit, Duration::ZERO)
    }

    pub const fn block(limit: usize, timeout: Duration) -> Self {
        Self::new(ThrottlingKind::Block, limit, timeout)
    }

    pub fn kind(&self) -> ThrottlingKind {
        self.kind
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate the policy for a queue currently holding `depth` entries.
    pub fn decide(&self, depth: usize) -> ThrottleDecision {
        match self.kind {
            ThrottlingKind::None => ThrottleDecision::Accept(Wait::Infinite),
            ThrottlingKind::Discard | ThrottlingKind::DiscardAtLimit => {
                if depth >= self.limit {
                    ThrottleDecision::Discard
                } else {
                    ThrottleDecision::Accept(Wait::Infinite)
                }
            }
            ThrottlingKind::Block => ThrottleDecision::Accept(Wait::Timeout(self.timeout)),
        }
    }

    /// Callback form of [`ThrottlingPolicy::decide`].
    pub fn apply<T>(
        &self,
        depth: usize,
        on_accept: impl FnOnce(Wait) -> T,
        on_discard: impl FnOnce() -> T,
    ) -> T {
        match self.decide(depth) {
            ThrottleDecision::Accept(wait) => on_accept(wait),
            ThrottleDecision::Discard => on_discard(),
        }
    }

    /// Capacity the work queue must be created with, or `None` for an
    /// unbounded queue.
    ///
    /// The block policy is bounded as well: its timeout only has an effect
    /// when the queue can actually fill.
    pub fn bounded_capacity(&self) -> Option<usize> {
        match self.kind {
            ThrottlingKind::None => None,
            ThrottlingKind::Discard | ThrottlingKind::DiscardAtLimit | ThrottlingKind::Block => {
                Some(self.limit.max(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(250);

    #[rstest]
    #[case(ThrottlingKind::None)]
    #[case(ThrottlingKind::Discard)]
    #[case(ThrottlingKind::DiscardAtLimit)]
    #[case(ThrottlingKind::Block)]
    fn below_limit_is_always_accepted(#[case] kind: ThrottlingKind) {
        let policy = ThrottlingPolicy::new(kind, 4, TIMEOUT);
        for depth in 0..4 {
            assert!(matches!(
                policy.decide(depth),
                ThrottleDecision::Accept(_)
            ));
        }
    }

    #[rstest]
    #[case(ThrottlingKind::Discard, 1)]
    #[case(ThrottlingKind::Discard, 7)]
    #[case(ThrottlingKind::DiscardAtLimit, 1)]
    fn discard_family_rejects_at_limit(#[case] kind: ThrottlingKind, #[case] limit: usize) {
        let policy = ThrottlingPolicy::new(kind, limit, TIMEOUT);
        assert_eq!(policy.decide(limit), ThrottleDecision::Discard);
        assert_eq!(policy.decide(limit + 10), ThrottleDecision::Discard);
        assert_eq!(
            policy.decide(limit - 1),
            ThrottleDecision::Accept(Wait::Infinite)
        );
    }

    #[test]
    fn block_always_accepts_with_timeout() {
        let policy = ThrottlingPolicy::block(1, TIMEOUT);
        assert_eq!(
            policy.decide(100),
            ThrottleDecision::Accept(Wait::Timeout(TIMEOUT))
        );
    }

    #[test]
    fn none_accepts_without_waiting_limit() {
        let policy = ThrottlingPolicy::none();
        assert_eq!(
            policy.decide(usize::MAX),
            ThrottleDecision::Accept(Wait::Infinite)
        );
        assert_eq!(policy.bounded_capacity(), None);
    }

    #[test]
    fn apply_routes_to_callbacks() {
        let policy = ThrottlingPolicy::discard(2);
        let accepted = policy.apply(1, |wait| Some(wait), || None);
        assert_eq!(accepted, Some(Wait::Infinite));
        let discarded = policy.apply(2, |wait| Some(wait), || None);
        assert_eq!(discarded, None);
    }

    #[rstest]
    #[case(ThrottlingPolicy::discard(8), Some(8))]
    #[case(ThrottlingPolicy::new(ThrottlingKind::DiscardAtLimit, 3, TIMEOUT), Some(3))]
    #[case(ThrottlingPolicy::block(16, TIMEOUT), Some(16))]
    #[case(ThrottlingPolicy::none(), None)]
    fn queue_capacity_follows_policy(
        #[case] policy: ThrottlingPolicy,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(policy.bounded_capacity(), expected);
    }

    #[rstest]
    #[case("none", ThrottlingKind::None)]
    #[case("Discard", ThrottlingKind::Discard)]
    #[case("discard-at-limit", ThrottlingKind::DiscardAtLimit)]
    #[case("BLOCK", ThrottlingKind::Block)]
    fn kind_parses_from_config_names(#[case] input: &str, #[case] expected: ThrottlingKind) {
        assert_eq!(input.parse::<ThrottlingKind>(), Ok(expected));
    }
}
