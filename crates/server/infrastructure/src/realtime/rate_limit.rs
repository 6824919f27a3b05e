//! Per-connection ingress rate limiting
//!
//! Fixed-size sliding-minute counter keyed by connection id. The bucket
//! resets when the wall-clock minute rolls over. Denial drops the event and
//! warns the offending connection; it never disconnects the client.

use atrio_server_domain::shared_kernel::ConnectionId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct MinuteBucket {
    /// Wall-clock minute (unix seconds / 60) this bucket counts
    minute: i64,
    count: u32,
}

#[derive(Debug)]
pub struct IngressRateLimiter {
    ceiling: u32,
    buckets: DashMap<ConnectionId, MinuteBucket>,
}

impl IngressRateLimiter {
    pub fn new(events_per_minute: u32) -> Self {
        Self {
            ceiling: events_per_minute,
            buckets: DashMap::new(),
        }
    }

    /// Whether this connection may submit one more event right now.
    pub fn allow(&self, connection_id: ConnectionId) -> bool {
        self.allow_at(connection_id, Utc::now())
    }

    /// Clock-injected variant of `allow`, used by tests.
    pub fn allow_at(&self, connection_id: ConnectionId, now: DateTime<Utc>) -> bool {
        let minute = now.timestamp().div_euclid(60);
        let mut bucket = self.buckets.entry(connection_id).or_insert(MinuteBucket {
            minute,
            count: 0,
        });

        if bucket.minute != minute {
            bucket.minute = minute;
            bucket.count = 0;
        }

        if bucket.count >= self.ceiling {
            return false;
        }

        bucket.count += 1;
        true
    }

    /// Forget a connection. Called from registry removal so long-gone
    /// connections do not leak table entries.
    pub fn remove(&self, connection_id: ConnectionId) {
        self.buckets.remove(&connection_id);
    }

    pub fn tracked_connections(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sixty_one_calls_admit_exactly_sixty() {
        let limiter = IngressRateLimiter::new(60);
        let conn = ConnectionId::new();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 5).unwrap();

        let admitted = (0..61)
            .filter(|_| limiter.allow_at(conn, now))
            .count();
        assert_eq!(admitted, 60);
        assert!(!limiter.allow_at(conn, now));
    }

    #[test]
    fn bucket_resets_on_minute_rollover() {
        let limiter = IngressRateLimiter::new(60);
        let conn = ConnectionId::new();
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 59).unwrap();
        for _ in 0..60 {
            assert!(limiter.allow_at(conn, t0));
        }
        assert!(!limiter.allow_at(conn, t0));

        let t1 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 31, 0).unwrap();
        assert!(limiter.allow_at(conn, t1));
    }

    #[test]
    fn connections_are_limited_independently() {
        let limiter = IngressRateLimiter::new(1);
        let now = Utc::now();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        assert!(limiter.allow_at(a, now));
        assert!(!limiter.allow_at(a, now));
        assert!(limiter.allow_at(b, now));
    }

    #[test]
    fn remove_prunes_the_entry() {
        let limiter = IngressRateLimiter::new(60);
        let conn = ConnectionId::new();
        limiter.allow(conn);
        assert_eq!(limiter.tracked_connections(), 1);

        limiter.remove(conn);
        assert_eq!(limiter.tracked_connections(), 0);
    }
}
