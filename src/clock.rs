use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};

/// Lookback of [`recent_window`], in milliseconds.
pub const RECENT_WINDOW_MS: i64 = 60_000;

/// Formats an instant as a 24-hour `HH:MM:SS` string in the local time zone.
pub fn format_time_of_day<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    format_time_of_day_in(instant, &Local)
}

pub fn format_time_of_day_in<Tz, Z>(instant: &DateTime<Tz>, zone: &Z) -> String
where
    Tz: TimeZone,
    Z: TimeZone,
    Z::Offset: std::fmt::Display,
{
    instant.with_timezone(zone).format("%H:%M:%S").to_string()
}

/// The last minute, ending now.
pub fn recent_window() -> (DateTime<Utc>, DateTime<Utc>) {
    recent_window_at(Utc::now())
}

pub fn recent_window_at(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now - TimeDelta::milliseconds(RECENT_WINDOW_MS), now)
}

pub async fn sleep(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await
}

/// Stopwatch on the monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Timer {
        Timer {
            start: Instant::now(),
        }
    }

    pub fn elapsed_duration(&self) -> Duration {
        self.start.elapsed()
    }

    /// Milliseconds since [`Timer::start`], with two decimals.
    pub fn elapsed(&self) -> String {
        format!("{:.2}", self.elapsed_duration().as_secs_f64() * 1000.0)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_time_of_day_is_zero_padded_24h() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 5, 0, 7, 9).unwrap();
        assert_eq!(format_time_of_day_in(&instant, &Utc), "00:07:09");

        let instant = Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 58).unwrap();
        assert_eq!(format_time_of_day_in(&instant, &Utc), "23:59:58");
    }

    #[test]
    fn test_time_of_day_converts_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 5, 22, 30, 0).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(format_time_of_day_in(&instant, &tokyo), "07:30:00");
    }

    #[test]
    fn test_time_of_day_local_shape() {
        let formatted = format_time_of_day(&Utc::now());
        assert_eq!(formatted.len(), 8);
        assert_eq!(&formatted[2..3], ":");
        assert_eq!(&formatted[5..6], ":");
    }

    #[test]
    fn test_recent_window_is_one_minute() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let (start, end) = recent_window_at(now);
        assert_eq!(end, now);
        assert_eq!((end - start).num_milliseconds(), 60_000);

        let (start, end) = recent_window();
        assert_eq!((end - start).num_milliseconds(), RECENT_WINDOW_MS);
    }

    #[test]
    fn test_timer_elapsed_format_and_monotonic() {
        let timer = Timer::start();
        let first = timer.elapsed();
        std::thread::sleep(Duration::from_millis(2));
        let second = timer.elapsed();

        for value in [&first, &second] {
            let (_, decimals) = value.split_once('.').expect("decimal point");
            assert_eq!(decimals.len(), 2);
        }
        assert!(second.parse::<f64>().unwrap() >= first.parse::<f64>().unwrap());
        assert!(timer.elapsed_duration() >= Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_sleep_waits_at_least() {
        let timer = Timer::start();
        sleep(20).await;
        assert!(timer.elapsed_duration() >= Duration::from_millis(20));
    }
}
