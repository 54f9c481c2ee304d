//! Draw countdown, recomputed on a timer and published on a watch channel.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountdownDisplay {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub expired: bool,
}

impl CountdownDisplay {
    pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining = (deadline - now).num_seconds();
        if remaining <= 0 {
            return Self {
                expired: true,
                ..Self::default()
            };
        }

        Self {
            days: remaining / 86_400,
            hours: remaining % 86_400 / 3_600,
            minutes: remaining % 3_600 / 60,
            seconds: remaining % 60,
            expired: false,
        }
    }
}

impl fmt::Display for CountdownDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expired {
            return f.write_str("draw closed");
        }
        if self.days > 0 {
            write!(f, "{}d ", self.days)?;
        }
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Background ticker for one draw deadline. Stops after publishing the
/// expired display, or when dropped.
pub struct Countdown {
    receiver: watch::Receiver<CountdownDisplay>,
    handle: Option<JoinHandle<()>>,
}

impl Countdown {
    /// A zero `period` is raised to one millisecond.
    pub fn spawn(deadline: DateTime<Utc>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (sender, receiver) = watch::channel(CountdownDisplay::until(deadline, Utc::now()));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let display = CountdownDisplay::until(deadline, Utc::now());
                if sender.send(display).is_err() {
                    break;
                }
                if display.expired {
                    tracing::debug!("Countdown to {} finished", deadline);
                    break;
                }
            }
        });

        Self {
            receiver,
            handle: Some(handle),
        }
    }

    pub fn current(&self) -> CountdownDisplay {
        *self.receiver.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownDisplay> {
        self.receiver.clone()
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Wait for the ticker to publish the expired display.
    pub async fn finished(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_until_breakdown() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let deadline = Utc.with_ymd_and_hms(2025, 3, 3, 15, 4, 5).unwrap();
        let display = CountdownDisplay::until(deadline, now);
        assert_eq!(
            display,
            CountdownDisplay {
                days: 2,
                hours: 3,
                minutes: 4,
                seconds: 5,
                expired: false,
            }
        );
        assert_eq!(display.to_string(), "2d 03:04:05");
    }

    #[test]
    fn test_past_deadline_is_expired() {
        let now = Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap();
        let display = CountdownDisplay::until(now, now);
        assert!(display.expired);
        assert_eq!(display.to_string(), "draw closed");
    }

    #[tokio::test]
    async fn test_ticker_reaches_expiry() {
        let deadline = Utc::now() + chrono::Duration::milliseconds(1_200);
        let countdown = Countdown::spawn(deadline, Duration::from_millis(50));
        assert!(!countdown.current().expired);

        let mut rx = countdown.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !rx.borrow_and_update().expired {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        countdown.finished().await;
    }

    #[tokio::test]
    async fn test_zero_period_still_ticks() {
        let deadline = Utc::now() + chrono::Duration::milliseconds(20);
        let countdown = Countdown::spawn(deadline, Duration::ZERO);

        let mut rx = countdown.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !rx.borrow_and_update().expired {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert!(countdown.current().expired);

        countdown.finished().await;
    }

    #[tokio::test]
    async fn test_cancel_stops_updates() {
        let deadline = Utc::now() + chrono::Duration::hours(1);
        let mut countdown = Countdown::spawn(deadline, Duration::from_millis(10));
        let mut rx = countdown.subscribe();
        countdown.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        rx.borrow_and_update();
        let result = tokio::time::timeout(Duration::from_millis(100), rx.changed()).await;
        // Either nothing arrives or the sender is gone.
        assert!(result.is_err() || result.unwrap().is_err());
    }
}
