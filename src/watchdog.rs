use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{info, warn};


/// Heartbeat bookkeeping. `connected` only changes in `Watchdog::evaluate`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LinkHealth {
    last_heartbeat_timestamp: Option<DateTime<Utc>>,
    last_receive_time: Option<DateTime<Utc>>,
    connected: bool,
}


impl LinkHealth {
    pub fn last_heartbeat_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_heartbeat_timestamp
    }

    /// Wall clock receive time, for display. Staleness is measured on the monotonic clock.
    pub fn last_receive_time(&self) -> Option<DateTime<Utc>> {
        self.last_receive_time
    }

    pub fn connected(&self) -> bool {
        self.connected
    }
}


/**
 * Turns heartbeat recency into a connected/disconnected state. Heartbeats
 * only record timestamps; the transition happens when `evaluate` runs on
 * the periodic tick, so silence is detected even when no messages arrive.
 *
 * The link is connected at `now` iff the last heartbeat arrived less than
 * `timeout` before `now`, both read from the monotonic clock so that wall
 * clock steps neither drop nor hold the link.
 */
#[derive(Clone, Debug)]
pub struct Watchdog {
    timeout: Duration,
    last_arrival: Option<Instant>,
    health: LinkHealth,
}


impl Watchdog {
    pub fn new(timeout: Duration) -> Watchdog {
        Watchdog {
            timeout,
            last_arrival: None,
            health: LinkHealth::default(),
        }
    }

    pub fn record_heartbeat(&mut self, timestamp: DateTime<Utc>, received: DateTime<Utc>, arrived: Instant) {
        // Delivery threads can hand us heartbeats slightly out of order
        match self.last_arrival {
            Some(last) if arrived < last => {
                warn!("Ignoring heartbeat stamped {}, a later one was already recorded", timestamp);
            }
            _ => {
                self.last_arrival = Some(arrived);
                self.health.last_heartbeat_timestamp = Some(timestamp);
                self.health.last_receive_time = Some(received);
            }
        }
    }

    /// Returns the new state if this evaluation changed it.
    pub fn evaluate(&mut self, now: Instant) -> Option<bool> {
        let connected = match self.last_arrival {
            Some(arrived) => now.saturating_duration_since(arrived) < self.timeout,
            None => false,
        };
        if connected == self.health.connected {
            return None;
        }
        self.health.connected = connected;
        if connected {
            info!("Link connected");
        } else {
            warn!("Link lost, no heartbeat for {} ms", self.timeout.as_millis());
        }
        Some(connected)
    }

    pub fn health(&self) -> LinkHealth {
        self.health
    }
}


#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use chrono::{DateTime, TimeZone, Utc};

    use super::Watchdog;

    fn wall() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_initially_disconnected() {
        let mut watchdog = Watchdog::new(ms(2000));
        assert!(!watchdog.health().connected());
        assert_eq!(watchdog.evaluate(Instant::now()), None);
        assert!(!watchdog.health().connected());
    }

    #[test]
    fn test_timeout_boundary() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(ms(2000));
        watchdog.record_heartbeat(wall(), wall(), t0);
        // Arrival alone does not connect
        assert!(!watchdog.health().connected());

        let mut transitions = Vec::new();
        for offset_ms in (0..4000).step_by(100) {
            if let Some(state) = watchdog.evaluate(t0 + ms(offset_ms)) {
                transitions.push((offset_ms, state));
            }
            assert_eq!(watchdog.health().connected(), offset_ms < 2000, "at {} ms", offset_ms);
        }
        assert_eq!(transitions, vec![(0, true), (2000, false)]);
    }

    #[test]
    fn test_edge_triggered() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(ms(1000));
        watchdog.record_heartbeat(wall(), wall(), t0);
        assert_eq!(watchdog.evaluate(t0), Some(true));
        for step in 1..10 {
            let now = t0 + ms(50 * step);
            watchdog.record_heartbeat(wall(), wall(), now);
            assert_eq!(watchdog.evaluate(now), None);
        }
        let late = t0 + ms(5000);
        assert_eq!(watchdog.evaluate(late), Some(false));
        assert_eq!(watchdog.evaluate(late + ms(1000)), None);

        watchdog.record_heartbeat(wall(), wall(), late + ms(2000));
        assert_eq!(watchdog.evaluate(late + ms(2000)), Some(true));
    }

    #[test]
    fn test_out_of_order_heartbeat_ignored() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(ms(1000));
        let newer = wall() + chrono::Duration::seconds(5);
        watchdog.record_heartbeat(newer, newer, t0 + ms(5000));
        watchdog.record_heartbeat(wall(), wall(), t0);
        let health = watchdog.health();
        assert_eq!(health.last_heartbeat_timestamp(), Some(newer));
        assert_eq!(health.last_receive_time(), Some(newer));
    }

    #[test]
    fn test_wall_clock_step_does_not_matter() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(ms(1000));
        // Receive time a day in the past, as after a clock step forward
        let stepped = wall() - chrono::Duration::days(1);
        watchdog.record_heartbeat(stepped, stepped, t0);
        assert_eq!(watchdog.evaluate(t0 + ms(10)), Some(true));
        assert_eq!(watchdog.evaluate(t0 + ms(999)), None);
        assert_eq!(watchdog.evaluate(t0 + ms(1000)), Some(false));
    }

    #[test]
    fn test_huge_timeout_connects() {
        let t0 = Instant::now();
        let mut watchdog = Watchdog::new(ms(u64::MAX));
        watchdog.record_heartbeat(wall(), wall(), t0);
        assert_eq!(watchdog.evaluate(t0), Some(true));
    }
}
