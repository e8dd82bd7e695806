use anyhow::{anyhow, bail, Context, Result};
use log::info;
use serde::Deserialize;
use std::time::Duration;

use crate::http_client;

/// Subset of the worldtimeapi payload we care about.
#[derive(Deserialize)]
struct TimeApiResponse {
    utc_offset: String,
}

/// Parse a `"±HH:MM"` UTC offset into signed seconds.
///
/// The sign applies to the whole offset: `"-05:30"` is -(5h + 30m) = -19800.
pub fn parse_utc_offset(offset: &str) -> Result<i32> {
    let (sign, rest) = match offset.as_bytes().first() {
        Some(b'+') => (1, &offset[1..]),
        Some(b'-') => (-1, &offset[1..]),
        _ => bail!("UTC offset {:?} is missing a sign", offset),
    };

    let (hours_str, minutes_str) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("UTC offset {:?} is not of form ±HH:MM", offset))?;

    let hours: i32 = hours_str
        .parse()
        .with_context(|| format!("bad hours in UTC offset {:?}", offset))?;
    let minutes: i32 = minutes_str
        .parse()
        .with_context(|| format!("bad minutes in UTC offset {:?}", offset))?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        bail!("UTC offset {:?} out of range", offset);
    }

    Ok(sign * (hours * 3600 + minutes * 60))
}

fn parse_response(body: &str) -> Result<i32> {
    let response: TimeApiResponse =
        serde_json::from_str(body).context("time API response is not the expected JSON")?;
    parse_utc_offset(&response.utc_offset)
}

/// Fetch the local UTC offset from the time API, retrying failed requests up
/// to `max_attempts` times with `retry_delay` between them. The attempt
/// ceiling is a hard cap: no further request is issued once it is reached.
pub fn fetch_utc_offset(url: &str, max_attempts: u8, retry_delay: Duration) -> Result<i32> {
    fetch_utc_offset_with(max_attempts, retry_delay, || https_get_body(url))
}

fn https_get_body(url: &str) -> Result<String> {
    info!("Fetching UTC offset from {}", url);
    http_client::https_get(url)
}

/// Retry skeleton with an injectable request function.
fn fetch_utc_offset_with<F>(max_attempts: u8, retry_delay: Duration, mut request: F) -> Result<i32>
where
    F: FnMut() -> Result<String>,
{
    let mut last_err = None;
    for attempt in 1..=max_attempts {
        match request() {
            Ok(body) => {
                let offset = parse_response(&body)?;
                info!("UTC offset = {} seconds", offset);
                return Ok(offset);
            }
            Err(e) => {
                log::warn!(
                    "Time API request attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                last_err = Some(e);
                if attempt < max_attempts {
                    std::thread::sleep(retry_delay);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no attempts made"))).context(
        "Failed to reach the time API; please check your router's DNS configuration",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_negative_offset() {
        assert_eq!(parse_utc_offset("-05:30").unwrap(), -19800);
        assert_eq!(parse_utc_offset("-05:00").unwrap(), -18000);
    }

    #[test]
    fn parses_zero_and_positive_offsets() {
        assert_eq!(parse_utc_offset("+00:00").unwrap(), 0);
        assert_eq!(parse_utc_offset("+05:45").unwrap(), 20700);
        assert_eq!(parse_utc_offset("+13:00").unwrap(), 46800);
    }

    #[test]
    fn rejects_malformed_offsets() {
        assert!(parse_utc_offset("05:00").is_err());
        assert!(parse_utc_offset("+0500").is_err());
        assert!(parse_utc_offset("+aa:bb").is_err());
        assert!(parse_utc_offset("+25:00").is_err());
        assert!(parse_utc_offset("").is_err());
    }

    #[test]
    fn parses_api_payload() {
        let body = r#"{"utc_offset":"-05:00","timezone":"America/New_York","unixtime":1731200000}"#;
        assert_eq!(parse_response(body).unwrap(), -18000);
    }

    #[test]
    fn stops_at_attempt_ceiling() {
        let mut calls = 0;
        let result = fetch_utc_offset_with(3, Duration::ZERO, || {
            calls += 1;
            Err(anyhow!("connect refused"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3, "must not issue a request past the ceiling");
        let msg = format!("{:#}", result.unwrap_err());
        assert!(msg.contains("DNS"), "exhaustion message should hint at DNS: {msg}");
    }

    #[test]
    fn succeeds_mid_retry_without_extra_requests() {
        let mut calls = 0;
        let result = fetch_utc_offset_with(3, Duration::ZERO, || {
            calls += 1;
            if calls < 2 {
                Err(anyhow!("transient"))
            } else {
                Ok(r#"{"utc_offset":"+01:00"}"#.to_string())
            }
        });
        assert_eq!(result.unwrap(), 3600);
        assert_eq!(calls, 2);
    }

    #[test]
    fn bad_payload_is_not_retried_as_request_failure() {
        let mut calls = 0;
        let result = fetch_utc_offset_with(3, Duration::ZERO, || {
            calls += 1;
            Ok("{}".to_string())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
