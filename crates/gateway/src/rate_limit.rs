//! Sliding-window request budget keyed by an arbitrary string (the client
//! API key for credential validation).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
    window: Duration,
    max_tracked_keys: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, max_tracked_keys: usize) -> Self {
        Self {
            hits: Mutex::new(HashMap::new()),
            window,
            max_tracked_keys: max_tracked_keys.max(1),
        }
    }

    /// Records a hit for `key` when it fits in the budget. On rejection the
    /// error carries how long until the oldest hit leaves the window.
    /// A `limit` of zero disables the check.
    pub fn check(&self, key: &str, limit: u32) -> Result<(), Duration> {
        self.check_at(key, limit, Instant::now())
    }

    fn check_at(&self, key: &str, limit: u32, now: Instant) -> Result<(), Duration> {
        if limit == 0 {
            return Ok(());
        }

        let mut hits = match self.hits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let window = self.window;
        let queue = hits.entry(key.to_string()).or_default();
        expire(queue, now, window);
        if queue.len() >= limit as usize {
            let oldest = queue.front().copied().unwrap_or(now);
            return Err(window.saturating_sub(now.duration_since(oldest)));
        }
        queue.push_back(now);

        if hits.len() > self.max_tracked_keys {
            hits.retain(|_, queue| {
                expire(queue, now, window);
                !queue.is_empty()
            });
        }
        while hits.len() > self.max_tracked_keys {
            // Forget the key that has been quiet the longest.
            let stalest = hits
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .min_by_key(|(_, queue)| queue.back().copied())
                .map(|(k, _)| k.clone());
            match stalest {
                Some(stalest) => {
                    hits.remove(&stalest);
                }
                None => break,
            }
        }

        Ok(())
    }

    pub fn tracked_keys(&self) -> usize {
        match self.hits.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

fn expire(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while queue
        .front()
        .is_some_and(|hit| now.duration_since(*hit) >= window)
    {
        queue.pop_front();
    }
}
