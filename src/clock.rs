use log::info;
use std::thread;
use std::time::Duration;

/// Readings below this are "clock not set yet" (ESP-IDF boots at epoch 0).
const CLOCK_VALID_AFTER: i64 = 1_000_000_000;
const POLL_INTERVAL_MS: u64 = 250;
const POLL_LOG_EVERY: u32 = 20;

const SECONDS_PER_DAY: i64 = 86_400;

/// Calendar time after applying the fetched UTC offset. Rebuilt from scratch
/// every loop iteration; nothing is carried over between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Current epoch seconds from the system clock (SNTP keeps it in sync).
pub fn epoch_now() -> i64 {
    let mut now: libc::time_t = 0;
    unsafe {
        libc::time(&mut now);
    }
    now as i64
}

/// Block until the system clock has been set by SNTP. This gates startup
/// only; there is deliberately no attempt ceiling here, the clock is
/// expected to eventually sync once the network is up.
pub fn wait_for_clock() {
    info!("Waiting for the clock to be set...");
    let mut polls: u32 = 0;
    loop {
        let now = epoch_now();
        if now >= CLOCK_VALID_AFTER {
            info!("Clock set: epoch = {}", now);
            return;
        }
        polls += 1;
        if polls % POLL_LOG_EVERY == 0 {
            info!("Still waiting for clock sync ({} polls)", polls);
        }
        thread::sleep(Duration::from_millis(POLL_INTERVAL_MS));
    }
}

/// Decompose `epoch + offset_secs` into calendar fields. Plain offset
/// arithmetic, no DST rules.
pub fn local_from_epoch(epoch: i64, offset_secs: i32) -> LocalTime {
    let shifted = epoch + offset_secs as i64;
    let days = shifted.div_euclid(SECONDS_PER_DAY);
    let secs_today = shifted.rem_euclid(SECONDS_PER_DAY);

    let (year, month, day) = civil_from_days(days as i32);

    LocalTime {
        year,
        month,
        day,
        hour: (secs_today / 3600) as u8,
        minute: ((secs_today % 3600) / 60) as u8,
        second: (secs_today % 60) as u8,
    }
}

/// Days since 1970-01-01 to (year, month, day), Howard Hinnant's
/// civil_from_days. O(1), leap years handled for the whole Gregorian range.
fn civil_from_days(days_since_epoch: i32) -> (u16, u8, u8) {
    let z = days_since_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i32 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = if m <= 2 { y + 1 } else { y };
    (year as u16, m, d)
}

/// Render a 12-hour `H:MM:SS AM/PM` string. Hour 0 and hour 12 both display
/// as 12; the hour itself is not zero-padded.
pub fn format_12h(t: &LocalTime) -> String {
    let mut hour = t.hour % 12;
    if hour == 0 {
        hour = 12;
    }
    let am_pm = if t.hour >= 12 { "PM" } else { "AM" };
    format!("{}:{:02}:{:02} {}", hour, t.minute, t.second, am_pm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u8, minute: u8, second: u8) -> LocalTime {
        LocalTime { year: 2024, month: 6, day: 1, hour, minute, second }
    }

    #[test]
    fn formats_hour_boundaries() {
        assert_eq!(format_12h(&at(0, 15, 9)), "12:15:09 AM");
        assert_eq!(format_12h(&at(11, 59, 59)), "11:59:59 AM");
        assert_eq!(format_12h(&at(12, 0, 0)), "12:00:00 PM");
        assert_eq!(format_12h(&at(13, 5, 0)), "1:05:00 PM");
        assert_eq!(format_12h(&at(23, 0, 1)), "11:00:01 PM");
    }

    #[test]
    fn zero_pads_minutes_and_seconds_only() {
        assert_eq!(format_12h(&at(7, 5, 9)), "7:05:09 AM");
    }

    #[test]
    fn decomposes_epoch_at_utc() {
        // 2021-01-01 00:00:00 UTC
        let t = local_from_epoch(1_609_459_200, 0);
        assert_eq!(
            t,
            LocalTime { year: 2021, month: 1, day: 1, hour: 0, minute: 0, second: 0 }
        );
    }

    #[test]
    fn negative_offset_crosses_midnight() {
        // 2021-01-01 02:00:00 UTC at -05:00 is still New Year's Eve.
        let t = local_from_epoch(1_609_459_200 + 2 * 3600, -18_000);
        assert_eq!(
            t,
            LocalTime { year: 2020, month: 12, day: 31, hour: 21, minute: 0, second: 0 }
        );
    }

    #[test]
    fn positive_offset_applies_by_addition() {
        // 2021-06-30 23:30:00 UTC at +05:45 (Kathmandu)
        let t = local_from_epoch(1_625_095_800, 20_700);
        assert_eq!(
            t,
            LocalTime { year: 2021, month: 7, day: 1, hour: 5, minute: 15, second: 0 }
        );
    }

    #[test]
    fn leap_day_is_decomposed_correctly() {
        // 2024-02-29 12:00:00 UTC
        let t = local_from_epoch(1_709_208_000, 0);
        assert_eq!(
            t,
            LocalTime { year: 2024, month: 2, day: 29, hour: 12, minute: 0, second: 0 }
        );
    }
}
