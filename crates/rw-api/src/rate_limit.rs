//! Fixed-window request counting per client address.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Allows `max` requests per `window` for each client address.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max: u32,
    clients: DashMap<Option<IpAddr>, Window>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            clients: DashMap::new(),
        }
    }

    /// Counts one request. Returns `false` once the client's budget for the
    /// current window is spent. `None` stands for an unknown peer.
    pub fn check(&self, client: Option<IpAddr>) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: Option<IpAddr>, now: Instant) -> bool {
        let mut entry = self.clients.entry(client).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                hits: 0,
            };
        }
        if entry.hits >= self.max {
            return false;
        }
        entry.hits += 1;
        true
    }

    /// Drops windows that have run out. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.clients.len();
        let now = Instant::now();
        self.clients
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.clients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn budget_is_per_client_and_per_window() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 2);
        let a = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        let b = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        let start = Instant::now();

        assert!(limiter.check_at(a, start));
        assert!(limiter.check_at(a, start));
        assert!(!limiter.check_at(a, start));
        assert!(limiter.check_at(b, start));

        let later = start + Duration::from_secs(61);
        assert!(limiter.check_at(a, later));
    }
}
