//! Crawl bookkeeping.
//!
//! `CrawlState` is shared by every top-level crawl in the process: which
//! domains are in flight and when each last finished. `CrawlSession` is
//! scoped to one top-level crawl and tracks what it has visited.

use crate::domain::value_objects::Timestamp;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Why a crawl was not scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    Cooldown,
    QueueFull,
    PoolShutdown,
    Disabled,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InFlight => "in_flight",
            SkipReason::Cooldown => "cooldown",
            SkipReason::QueueFull => "queue_full",
            SkipReason::PoolShutdown => "pool_shutdown",
            SkipReason::Disabled => "disabled",
        }
    }
}

/// Result of [`CrawlState::try_claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    Skipped(SkipReason),
}

#[derive(Debug, Default)]
struct Inner {
    in_flight: HashSet<String>,
    last_completed_at: HashMap<String, Timestamp>,
}

/// Process-wide in-flight set and cooldown clock.
#[derive(Debug)]
pub struct CrawlState {
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl CrawlState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Check in-flight and cooldown and claim `domain` in one critical section.
    pub fn try_claim(&self, domain: &str, now: Timestamp) -> ClaimOutcome {
        let mut inner = self.inner.lock();
        if inner.in_flight.contains(domain) {
            return ClaimOutcome::Skipped(SkipReason::InFlight);
        }
        if let Some(last) = inner.last_completed_at.get(domain) {
            if now.secs_since(*last) < self.cooldown.as_secs() {
                return ClaimOutcome::Skipped(SkipReason::Cooldown);
            }
        }
        inner.in_flight.insert(domain.to_string());
        ClaimOutcome::Claimed
    }

    /// Drop the in-flight claim. `completed_at` starts the cooldown; `None`
    /// (the schedule attempt failed) allows an immediate re-claim.
    pub fn release(&self, domain: &str, completed_at: Option<Timestamp>) {
        let mut inner = self.inner.lock();
        inner.in_flight.remove(domain);
        if let Some(at) = completed_at {
            inner.last_completed_at.insert(domain.to_string(), at);
        }
    }

    pub fn is_in_flight(&self, domain: &str) -> bool {
        self.inner.lock().in_flight.contains(domain)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().in_flight.len()
    }

    pub fn last_completed_at(&self, domain: &str) -> Option<Timestamp> {
        self.inner.lock().last_completed_at.get(domain).copied()
    }
}

/// Visit set and limits of one top-level crawl.
#[derive(Debug)]
pub struct CrawlSession {
    visited: HashSet<String>,
    per_response_limit: usize,
    overall_limit: usize,
}

impl CrawlSession {
    pub fn new(per_response_limit: usize, overall_limit: usize) -> Self {
        Self {
            visited: HashSet::new(),
            per_response_limit,
            overall_limit,
        }
    }

    /// Mark `domain` visited. False when already visited or the overall
    /// limit is reached.
    pub fn visit(&mut self, domain: &str) -> bool {
        if self.visited.contains(domain) || self.limit_reached() {
            return false;
        }
        self.visited.insert(domain.to_string());
        true
    }

    pub fn limit_reached(&self) -> bool {
        self.visited.len() >= self.overall_limit
    }

    pub fn has_visited(&self, domain: &str) -> bool {
        self.visited.contains(domain)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn per_response_limit(&self) -> usize {
        self.per_response_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_while_in_flight_is_skipped() {
        let state = CrawlState::new(Duration::from_secs(60));
        let now = Timestamp::new(1_000);

        assert_eq!(state.try_claim("peer.example", now), ClaimOutcome::Claimed);
        assert_eq!(
            state.try_claim("peer.example", now),
            ClaimOutcome::Skipped(SkipReason::InFlight)
        );
        assert_eq!(state.try_claim("other.example", now), ClaimOutcome::Claimed);
    }

    #[test]
    fn test_completion_starts_cooldown() {
        let state = CrawlState::new(Duration::from_secs(60));
        let now = Timestamp::new(1_000);

        state.try_claim("peer.example", now);
        state.release("peer.example", Some(now));

        assert_eq!(
            state.try_claim("peer.example", now.add_secs(59)),
            ClaimOutcome::Skipped(SkipReason::Cooldown)
        );
        assert_eq!(state.try_claim("peer.example", now.add_secs(60)), ClaimOutcome::Claimed);
    }

    #[test]
    fn test_release_without_completion_allows_reclaim() {
        let state = CrawlState::new(Duration::from_secs(60));
        let now = Timestamp::new(1_000);

        state.try_claim("peer.example", now);
        state.release("peer.example", None);

        assert!(!state.is_in_flight("peer.example"));
        assert_eq!(state.last_completed_at("peer.example"), None);
        assert_eq!(state.try_claim("peer.example", now), ClaimOutcome::Claimed);
    }

    #[test]
    fn test_session_visits_once_and_honors_limit() {
        let mut session = CrawlSession::new(10, 2);
        assert!(session.visit("a.example"));
        assert!(!session.visit("a.example"));
        assert!(session.visit("b.example"));
        assert!(!session.visit("c.example"));
        assert!(session.limit_reached());
        assert_eq!(session.visited_count(), 2);
    }
}
