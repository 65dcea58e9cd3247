//! Sliding-window admission control per user.
//!
//! Every call first sweeps all tracked users, dropping timestamps that fell
//! out of the window and forgetting users left with none. The sweep is
//! proportional to the number of active users, which is fine at chat-bot
//! scale.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::types::UserId;

pub const DEFAULT_RATE_LIMIT: usize = 5;
pub const DEFAULT_TIME_WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    limit: usize,
    window: Duration,
    windows: Mutex<HashMap<UserId, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or deny one action for `user`. A denied call does not count.
    pub fn allow(&self, user: UserId) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let window = self.window;
        windows.retain(|_, stamps| {
            while let Some(&oldest) = stamps.front() {
                if now.duration_since(oldest) >= window {
                    stamps.pop_front();
                } else {
                    break;
                }
            }
            !stamps.is_empty()
        });

        let stamps = windows.entry(user).or_default();
        if stamps.len() < self.limit {
            stamps.push_back(now);
            true
        } else {
            debug!(user = %user, limit = self.limit, "rate limit hit");
            false
        }
    }

    /// Number of users currently holding at least one timestamp.
    pub fn tracked_users(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT, DEFAULT_TIME_WINDOW)
    }
}
