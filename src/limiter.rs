use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::config::LimiterConfig;
use crate::errors::ApiError;
use crate::state::AppState;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// Per-client-IP token bucket. State is in-memory only and resets on
/// restart. The lock is held for map operations only, never across
/// downstream work.
pub struct RateLimiter {
    rps: f64,
    burst: f64,
    clients: Mutex<HashMap<IpAddr, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            rps: config.rps,
            burst: f64::from(config.burst),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, ip: IpAddr) -> bool {
        self.allow_at(ip, Instant::now())
    }

    fn allow_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut clients = self.clients.lock().expect("limiter lock poisoned");
        let bucket = clients.entry(ip).or_insert(Bucket {
            tokens: self.burst,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rps).min(self.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops state for clients idle longer than `idle_threshold`. Invoked on
    /// a timer by the reaper task.
    pub fn sweep(&self, idle_threshold: Duration) {
        self.sweep_at(idle_threshold, Instant::now());
    }

    fn sweep_at(&self, idle_threshold: Duration, now: Instant) {
        let mut clients = self.clients.lock().expect("limiter lock poisoned");
        clients.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) <= idle_threshold);
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}

/// Extracts the client IP for throttling. A request the server cannot
/// attribute to a peer must not slip past the limiter, so a missing address
/// is a server error rather than a bypass.
fn peer_ip(connect_info: Option<ConnectInfo<SocketAddr>>) -> Result<IpAddr, ApiError> {
    match connect_info {
        Some(ConnectInfo(addr)) => Ok(addr.ip()),
        None => Err(ApiError::Internal(anyhow::anyhow!(
            "client address unavailable for rate limiting"
        ))),
    }
}

/// Per-IP throttle applied before authentication. The bucket check happens
/// under the lock; the downstream handler runs outside it.
pub async fn rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.limiter.enabled {
        let ip = peer_ip(connect_info)?;
        if !state.limiter.allow(ip) {
            return Err(ApiError::RateLimited);
        }
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(&LimiterConfig {
            enabled: true,
            rps,
            burst,
        })
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn burst_then_reject() {
        let limiter = limiter(2.0, 4);
        let now = Instant::now();
        for _ in 0..4 {
            assert!(limiter.allow_at(ip(1), now));
        }
        assert!(!limiter.allow_at(ip(1), now));
    }

    #[test]
    fn refills_over_time() {
        let limiter = limiter(2.0, 4);
        let now = Instant::now();
        for _ in 0..4 {
            assert!(limiter.allow_at(ip(1), now));
        }
        assert!(!limiter.allow_at(ip(1), now));
        // 1 second at 2 rps buys two more requests.
        let later = now + Duration::from_secs(1);
        assert!(limiter.allow_at(ip(1), later));
        assert!(limiter.allow_at(ip(1), later));
        assert!(!limiter.allow_at(ip(1), later));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter(2.0, 1);
        let now = Instant::now();
        assert!(limiter.allow_at(ip(1), now));
        assert!(!limiter.allow_at(ip(1), now));
        assert!(limiter.allow_at(ip(2), now));
    }

    #[test]
    fn missing_peer_address_fails_closed() {
        let err = peer_ip(None).unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));

        let addr: SocketAddr = "10.1.2.3:50000".parse().unwrap();
        assert_eq!(peer_ip(Some(ConnectInfo(addr))).unwrap(), addr.ip());
    }

    #[test]
    fn sweep_evicts_only_idle_clients() {
        let limiter = limiter(2.0, 4);
        let now = Instant::now();
        limiter.allow_at(ip(1), now);
        limiter.allow_at(ip(2), now + Duration::from_secs(150));
        assert_eq!(limiter.tracked_clients(), 2);

        limiter.sweep_at(Duration::from_secs(180), now + Duration::from_secs(200));
        assert_eq!(limiter.tracked_clients(), 1);
        // The surviving client keeps its bucket state.
        assert!(limiter.allow_at(ip(2), now + Duration::from_secs(200)));
    }
}
