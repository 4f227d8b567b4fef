//! Per-client rolling-window rate limiting.
//!
//! Every chat request from a client appends a timestamp to that client's
//! history. Timestamps older than the window are pruned, and the request is
//! admitted while the remaining count stays within the limit. Rejected
//! requests are recorded too, so a client that keeps retrying while limited
//! keeps its own window full.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};

/// Limits applied to every client address
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Requests admitted per client within one window
    #[validate(range(min = 1))]
    pub max_requests: usize,

    /// Length of the rolling window in seconds
    #[validate(range(min = 1))]
    pub window_secs: u64,

    /// Upper bound on the number of client histories kept in memory
    #[validate(range(min = 1))]
    pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 3600,
            max_tracked_clients: 10_000,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Outcome of a single admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Requests recorded for the client within the window, this one included
    pub count: usize,
    pub limit: usize,
    /// How long until the next request would be admitted, when rejected
    pub retry_after: Option<Duration>,
}

impl Decision {
    /// `retry_after` in whole seconds, rounded up so callers never retry early
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after
            .map(|wait| (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1))
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clients: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            clients: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request from `client` and decide whether to admit it
    pub fn admit(&self, client: &str) -> Result<Decision> {
        self.admit_at(client, Instant::now())
    }

    /// Same as [`RateLimiter::admit`] with an explicit clock reading
    pub fn admit_at(&self, client: &str, now: Instant) -> Result<Decision> {
        let window = self.config.window();
        let limit = self.config.max_requests;

        let mut clients = self.clients.write().map_err(|_| Error::LockPoisoned)?;

        if !clients.contains_key(client) && clients.len() >= self.config.max_tracked_clients {
            self.make_room(&mut clients, now);
        }

        let history = clients.entry(client.to_string()).or_default();

        // Histories stay sorted in arrival order.
        let now = history.back().map_or(now, |last| now.max(*last));
        history.push_back(now);
        prune(history, now, window);

        let count = history.len();
        let allowed = count <= limit;

        let retry_after = if allowed {
            None
        } else {
            // The next request is admitted once the history shrinks to
            // `limit - 1` entries, i.e. once entry `count - limit` is strictly
            // older than the cutoff.
            history.get(count - limit).map(|oldest| {
                (*oldest + window + Duration::from_nanos(1)).saturating_duration_since(now)
            })
        };

        if !allowed {
            tracing::debug!(client = %client, count, limit, "Client over rate limit");
        }

        Ok(Decision {
            allowed,
            count,
            limit,
            retry_after,
        })
    }

    /// Current number of recorded requests per client
    pub fn snapshot(&self) -> Result<BTreeMap<String, usize>> {
        let clients = self.clients.read().map_err(|_| Error::LockPoisoned)?;

        Ok(clients
            .iter()
            .map(|(client, history)| (client.clone(), history.len()))
            .collect())
    }

    /// Number of client histories currently held
    pub fn tracked_clients(&self) -> Result<usize> {
        let clients = self.clients.read().map_err(|_| Error::LockPoisoned)?;
        Ok(clients.len())
    }

    /// Prune every history and drop clients with nothing left in the window
    pub fn sweep(&self, now: Instant) -> Result<usize> {
        let mut clients = self.clients.write().map_err(|_| Error::LockPoisoned)?;
        Ok(sweep_expired(&mut clients, now, self.config.window()))
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.clients.write().unwrap();
            panic!("rate limiter state poisoned");
        }));
    }

    fn make_room(&self, clients: &mut HashMap<String, VecDeque<Instant>>, now: Instant) {
        sweep_expired(clients, now, self.config.window());
        if clients.len() < self.config.max_tracked_clients {
            return;
        }

        let stalest = clients
            .iter()
            .min_by_key(|(_, history)| history.back().copied())
            .map(|(client, _)| client.clone());

        if let Some(client) = stalest {
            tracing::debug!(client = %client, "Evicting least recently seen client");
            clients.remove(&client);
        }
    }
}

fn prune(history: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    let Some(cutoff) = now.checked_sub(window) else {
        return;
    };

    while history.front().is_some_and(|time| *time < cutoff) {
        history.pop_front();
    }
}

fn sweep_expired(
    clients: &mut HashMap<String, VecDeque<Instant>>,
    now: Instant,
    window: Duration,
) -> usize {
    let before = clients.len();

    clients.retain(|_, history| {
        prune(history, now, window);
        !history.is_empty()
    });

    before - clients.len()
}
