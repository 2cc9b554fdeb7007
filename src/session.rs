use std::sync::Arc;

use dashmap::DashMap;
use ulid::Ulid;

use crate::model::{now_ms, LoginGrant, Ms};
use crate::observability;
use crate::rng::RandomSource;

/// Hard session ceiling: 7 minutes.
pub const SESSION_TTL_MS: Ms = 420_000;

/// Per-check probability of dropping an otherwise-live session. Checked on
/// every validity probe so expiries spread across the session lifetime
/// instead of clustering at creation.
pub const EARLY_EXPIRY_PROB: f64 = 0.04;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub owner: String,
    pub created_at: Ms,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub ttl_ms: Ms,
    pub early_expiry_prob: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_ms: SESSION_TTL_MS,
            early_expiry_prob: EARLY_EXPIRY_PROB,
        }
    }
}

impl SessionConfig {
    /// No random drops — for tests that need stable sessions.
    pub fn reliable() -> Self {
        Self {
            early_expiry_prob: 0.0,
            ..Self::default()
        }
    }
}

/// In-memory session registry. An injectable instance, not a process global:
/// tests run isolated registries side by side.
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
    cfg: SessionConfig,
    rng: Arc<RandomSource>,
}

impl SessionRegistry {
    pub fn new(cfg: SessionConfig, rng: Arc<RandomSource>) -> Self {
        Self {
            sessions: DashMap::new(),
            cfg,
            rng,
        }
    }

    /// Mint a session for `owner`. The token is opaque to callers; a ulid
    /// gives in-process uniqueness without pretending to be a credential.
    /// Login latency is the caller's concern, not ours.
    pub fn create(&self, owner: &str) -> LoginGrant {
        let token = format!("ust_{}", Ulid::new());
        self.sessions.insert(
            token.clone(),
            Session {
                token: token.clone(),
                owner: owner.to_string(),
                created_at: now_ms(),
            },
        );
        metrics::counter!(observability::SESSIONS_CREATED_TOTAL).increment(1);
        metrics::gauge!(observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        LoginGrant {
            session_token: token,
            expires_in: self.cfg.ttl_ms / 1000,
        }
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.validate_at(token, now_ms())
    }

    /// Validity check against an explicit clock. A session found invalid by
    /// either rule is evicted on the spot and never resurrected.
    pub fn validate_at(&self, token: &str, now: Ms) -> bool {
        let created_at = match self.sessions.get(token) {
            Some(s) => s.created_at,
            None => return false,
        };

        if now - created_at > self.cfg.ttl_ms {
            self.evict(token, "ttl");
            return false;
        }

        // Independent of TTL: flaky-infrastructure drop, rolled per check.
        if self.rng.chance(self.cfg.early_expiry_prob) {
            self.evict(token, "early");
            return false;
        }

        true
    }

    /// Idempotent removal.
    pub fn destroy(&self, token: &str) {
        if self.sessions.remove(token).is_some() {
            metrics::gauge!(observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        }
    }

    /// Seconds left before the TTL ceiling. `None` for tokens the registry
    /// does not hold; callers must check `is_valid` first.
    pub fn remaining_seconds(&self, token: &str) -> Option<i64> {
        self.remaining_seconds_at(token, now_ms())
    }

    pub fn remaining_seconds_at(&self, token: &str, now: Ms) -> Option<i64> {
        self.sessions
            .get(token)
            .map(|s| (self.cfg.ttl_ms - (now - s.created_at)) / 1000)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every session. Explicit end-of-life for the registry instance.
    pub fn shutdown(&self) {
        self.sessions.clear();
        metrics::gauge!(observability::SESSIONS_ACTIVE).set(0.0);
    }

    fn evict(&self, token: &str, cause: &'static str) {
        if self.sessions.remove(token).is_some() {
            tracing::debug!("session evicted ({cause}): {token}");
            metrics::counter!(observability::SESSIONS_EXPIRED_TOTAL, "cause" => cause)
                .increment(1);
            metrics::gauge!(observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, token: &str, by_ms: Ms) {
        if let Some(mut s) = self.sessions.get_mut(token) {
            s.created_at -= by_ms;
        }
    }
}
