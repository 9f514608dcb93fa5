//! Loopback port leases shared by concurrently running cases

use crate::{
    error::{HarnessError, Result},
    metrics::PORTS_LEASED,
};
use rand::Rng;
use std::{
    collections::HashSet,
    fmt,
    net::TcpListener,
    ops::RangeInclusive,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
};

#[derive(Debug)]
struct PoolState {
    cursor: u16,
    leased: HashSet<u16>,
}

#[derive(Debug)]
struct Inner {
    start: u16,
    end: u16,
    state: Mutex<PoolState>,
}

/// Hands out ports from a range; a port is never leased twice at once
#[derive(Debug, Clone)]
pub struct PortPool {
    inner: Arc<Inner>,
}

impl PortPool {
    /// Pool starting at a random offset, so parallel harness runs spread out
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an empty range or one containing port 0
    pub fn new(range: RangeInclusive<u16>) -> Result<Self> {
        let pool = Self::sequential(range)?;
        let offset = rand::rng().random_range(0..=pool.inner.end - pool.inner.start);
        pool.lock().cursor = pool.inner.start + offset;
        Ok(pool)
    }

    /// Pool that hands out ports in ascending order from the start of `range`
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an empty range or one containing port 0
    pub fn sequential(range: RangeInclusive<u16>) -> Result<Self> {
        let (start, end) = range.into_inner();
        if start == 0 || start > end {
            return Err(HarnessError::configuration(format!(
                "invalid port range {start}-{end}"
            )));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                start,
                end,
                state: Mutex::new(PoolState {
                    cursor: start,
                    leased: HashSet::new(),
                }),
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        usize::from(self.inner.end - self.inner.start) + 1
    }

    #[must_use]
    pub fn leased(&self) -> usize {
        self.lock().leased.len()
    }

    /// Lease a port that no other case holds and that is bindable right now
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when every port in the range is leased or busy
    pub fn lease(&self) -> Result<PortLease> {
        let mut state = self.lock();
        for _ in 0..self.capacity() {
            let port = state.cursor;
            state.cursor = if port >= self.inner.end {
                self.inner.start
            } else {
                port + 1
            };

            if state.leased.contains(&port) || !is_bindable(port) {
                continue;
            }

            state.leased.insert(port);
            PORTS_LEASED.inc();
            tracing::trace!(port, "leased port");
            return Ok(PortLease {
                port,
                pool: self.clone(),
            });
        }

        Err(HarnessError::configuration(format!(
            "no free port in range {}-{}",
            self.inner.start, self.inner.end
        )))
    }

    fn release(&self, port: u16) {
        if self.lock().leased.remove(&port) {
            PORTS_LEASED.dec();
            tracing::trace!(port, "released port");
        }
    }
}

fn is_bindable(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// A leased port, returned to its pool on drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    pool: PortPool,
}

impl PortLease {
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        self.pool.release(self.port);
    }
}

/// `start-end` as given on the command line or in a matrix file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    #[must_use]
    pub const fn range(self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 8000,
            end: 30000,
        }
    }
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid port range: {s} (expected START-END)"))?;
        let start = start
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("Invalid port range start {start}: {e}"))?;
        let end = end
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("Invalid port range end {end}: {e}"))?;
        if start == 0 || start > end {
            return Err(format!("Invalid port range: {s}"));
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    /// A small range starting at a port the OS just handed out
    fn free_range(len: u16) -> RangeInclusive<u16> {
        let port = TcpListener::bind(("127.0.0.1", 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let start = port.min(u16::MAX - len);
        start..=start + len - 1
    }

    #[test]
    fn test_leases_are_distinct_and_released() {
        let pool = PortPool::sequential(free_range(4)).unwrap();
        let a = pool.lease().unwrap();
        let b = pool.lease().unwrap();
        assert_ne!(a.port(), b.port());
        assert_eq!(pool.leased(), 2);

        drop(a);
        assert_eq!(pool.leased(), 1);
        drop(b);
        assert_eq!(pool.leased(), 0);
    }

    #[test]
    fn test_exhausted_pool() {
        let pool = PortPool::sequential(free_range(1)).unwrap();
        let held = pool.lease().unwrap();
        let err = pool.lease().unwrap_err();
        assert_eq!(err.kind(), "configuration");

        drop(held);
        assert!(pool.lease().is_ok());
    }

    #[test]
    fn test_busy_port_is_skipped() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let busy = listener.local_addr().unwrap().port();
        if busy == u16::MAX {
            return;
        }
        let pool = PortPool::sequential(busy..=busy + 1).unwrap();
        if let Ok(lease) = pool.lease() {
            assert_ne!(lease.port(), busy);
        }
    }

    #[test]
    fn test_random_start_within_range() {
        let range = free_range(16);
        let pool = PortPool::new(range.clone()).unwrap();
        let lease = pool.lease().unwrap();
        assert!(range.contains(&lease.port()));
        assert_eq!(pool.capacity(), 16);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(PortPool::sequential(0..=10).is_err());
        assert!(PortPool::new(9000..=8000).is_err());
    }

    #[test]
    fn test_port_range_from_str() {
        let range: PortRange = "8000-30000".parse().unwrap();
        assert_eq!(range, PortRange::default());
        assert_eq!(range.to_string(), "8000-30000");
        assert!("8000".parse::<PortRange>().is_err());
        assert!("0-10".parse::<PortRange>().is_err());
        assert!("20-10".parse::<PortRange>().is_err());
        assert!("a-10".parse::<PortRange>().is_err());
    }
}
