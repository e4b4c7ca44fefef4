use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::core::models::usage::{ClaudeQuota, QuotaBucket};

const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";
const USER_AGENT: &str = "claude-code/2.0.32";
const OAUTH_BETA: &str = "oauth-2025-04-20";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Reject bodies larger than this before deserializing.
const MAX_RESPONSE_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("token expired — re-login to Claude Code")]
    TokenExpired,
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("API response too large")]
    ResponseTooLarge,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct UsageResponse {
    five_hour: Option<RawBucket>,
    seven_day: Option<RawBucket>,
    seven_day_opus: Option<RawBucket>,
}

#[derive(Deserialize)]
struct RawBucket {
    /// Already a percentage (0.0 - 100.0).
    utilization: f64,
    resets_at: Option<String>,
}

fn parse_bucket(raw: RawBucket, window_minutes: u64) -> QuotaBucket {
    let resets_at = raw
        .resets_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    QuotaBucket {
        used_percent: raw.utilization,
        window_minutes: Some(window_minutes),
        resets_at,
    }
}

fn parse_response(body: &[u8]) -> Result<ClaudeQuota, FetchError> {
    let raw: UsageResponse = serde_json::from_slice(body)?;
    Ok(ClaudeQuota {
        five_hour: raw.five_hour.map(|b| parse_bucket(b, 300)),
        seven_day: raw.seven_day.map(|b| parse_bucket(b, 10_080)),
        seven_day_opus: raw.seven_day_opus.map(|b| parse_bucket(b, 10_080)),
    })
}

/// Fetch the current rate-limit snapshot from the Claude OAuth usage
/// endpoint. Fails fast: total-elapsed timeout and a bounded body read.
pub async fn fetch_quota(token: &str) -> Result<ClaudeQuota, FetchError> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let mut response = client
        .get(USAGE_URL)
        .header("Authorization", format!("Bearer {token}"))
        .header("User-Agent", USER_AGENT)
        .header("anthropic-beta", OAUTH_BETA)
        .header("Accept", "application/json")
        .header("Content-Type", "application/json")
        .send()
        .await?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(FetchError::TokenExpired);
    }

    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(FetchError::ResponseTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    if status != reqwest::StatusCode::OK {
        return Err(FetchError::Api {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    parse_response(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_response() {
        let body = br#"{
            "five_hour": { "utilization": 28.0, "resets_at": "2026-03-04T19:15:00Z" },
            "seven_day": { "utilization": 59.5, "resets_at": "2026-03-05T17:00:00Z" },
            "seven_day_opus": { "utilization": 12.0, "resets_at": null }
        }"#;
        let quota = parse_response(body).unwrap();

        let five_hour = quota.five_hour.unwrap();
        assert!((five_hour.used_percent - 28.0).abs() < f64::EPSILON);
        assert_eq!(five_hour.window_minutes, Some(300));
        assert!(five_hour.resets_at.is_some());

        let seven_day = quota.seven_day.unwrap();
        assert!((seven_day.used_percent - 59.5).abs() < f64::EPSILON);
        assert_eq!(seven_day.window_minutes, Some(10_080));

        let opus = quota.seven_day_opus.unwrap();
        assert!(opus.resets_at.is_none());
    }

    #[test]
    fn parse_partial_response() {
        let quota = parse_response(br#"{ "five_hour": { "utilization": 3.0 } }"#).unwrap();
        assert!(quota.five_hour.is_some());
        assert!(quota.seven_day.is_none());
        assert!(quota.seven_day_opus.is_none());
    }

    #[test]
    fn parse_ignores_unknown_fields() {
        let body = br#"{ "seven_day": { "utilization": 1.0 }, "seven_day_oauth_apps": [1, 2] }"#;
        assert!(parse_response(body).unwrap().seven_day.is_some());
    }

    #[test]
    fn parse_invalid_resets_at_becomes_none() {
        let quota = parse_response(
            br#"{ "five_hour": { "utilization": 3.0, "resets_at": "not-a-date" } }"#,
        )
        .unwrap();
        assert!(quota.five_hour.unwrap().resets_at.is_none());
    }

    #[test]
    fn parse_rejects_malformed_body() {
        assert!(matches!(
            parse_response(b"<html>nope</html>"),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn token_expired_is_distinct_from_generic_api_error() {
        let expired = FetchError::TokenExpired.to_string();
        let api = FetchError::Api {
            status: 500,
            body: "oops".to_string(),
        }
        .to_string();
        assert!(expired.contains("token expired"));
        assert!(api.contains("500"));
        assert_ne!(expired, api);
    }
}
