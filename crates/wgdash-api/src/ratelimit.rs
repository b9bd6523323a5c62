use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Failed logins allowed per key inside one window.
const MAX_ATTEMPTS: u32 = 5;
const WINDOW: Duration = Duration::from_secs(15 * 60);

/// Injectable store for login-attempt tracking, keyed by client address.
///
/// The in-memory implementation suits a single-instance deployment; a
/// multi-instance one would put an external store behind this trait.
pub trait AttemptStore: Send + Sync {
    fn record(&self, key: &str);
    /// Remaining lockout, if the key is currently blocked.
    fn blocked(&self, key: &str) -> Option<Duration>;
    fn clear(&self, key: &str);
}

#[derive(Debug)]
struct Attempts {
    count: u32,
    first: Instant,
}

#[derive(Debug)]
pub struct MemoryAttemptStore {
    attempts: DashMap<String, Attempts>,
    max_attempts: u32,
    window: Duration,
}

impl MemoryAttemptStore {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            max_attempts,
            window,
        }
    }
}

impl Default for MemoryAttemptStore {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, WINDOW)
    }
}

impl AttemptStore for MemoryAttemptStore {
    fn record(&self, key: &str) {
        let now = Instant::now();
        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert(Attempts { count: 0, first: now });
        if now.duration_since(entry.first) >= self.window {
            *entry = Attempts { count: 0, first: now };
        }
        entry.count += 1;
    }

    fn blocked(&self, key: &str) -> Option<Duration> {
        {
            let entry = self.attempts.get(key)?;
            let elapsed = entry.first.elapsed();
            if elapsed < self.window {
                return (entry.count >= self.max_attempts).then(|| self.window - elapsed);
            }
        }
        // Window expired; forget the key.
        self.attempts.remove(key);
        None
    }

    fn clear(&self, key: &str) {
        self.attempts.remove(key);
    }
}
