use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::models::usage::{CodexQuota, QuotaBucket};
use crate::core::scan::{self, codex::sessions_dir};

/// How many of the most recent session files to inspect before giving up.
const RECENT_FILES: usize = 5;

#[derive(Debug, Error)]
pub enum CodexQuotaError {
    #[error("codex not installed")]
    NotInstalled,
    #[error("no codex session files found")]
    NoSessions,
    #[error("no rate limit data found in recent codex sessions")]
    NoRateData,
}

#[derive(Deserialize)]
struct CodexLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    payload: Option<CodexPayload>,
}

#[derive(Deserialize)]
struct CodexPayload {
    #[serde(rename = "type")]
    payload_type: Option<String>,
    rate_limits: Option<RawRateLimits>,
}

#[derive(Deserialize, Clone)]
struct RawRateLimits {
    limit_id: Option<String>,
    primary: Option<RawBucket>,
    secondary: Option<RawBucket>,
}

#[derive(Deserialize, Clone, Copy)]
struct RawBucket {
    #[serde(default)]
    used_percent: f64,
    #[serde(default)]
    window_minutes: u64,
    /// Unix seconds; zero means unknown.
    #[serde(default)]
    resets_at: i64,
}

fn convert_bucket(raw: RawBucket, now: DateTime<Utc>) -> QuotaBucket {
    let mut used_percent = raw.used_percent;
    let mut resets_at = (raw.resets_at > 0)
        .then(|| DateTime::from_timestamp(raw.resets_at, 0))
        .flatten();
    // A window that already reset reads as unused.
    if let Some(reset) = resets_at {
        if reset < now {
            used_percent = 0.0;
            resets_at = None;
        }
    }
    QuotaBucket {
        used_percent,
        window_minutes: (raw.window_minutes > 0).then_some(raw.window_minutes),
        resets_at,
    }
}

/// Read one session file and return its last rate-limit report, or `None`
/// when the file has no rate_limits entries.
///
/// Codex may emit rate_limits under several limit_ids per API call; the last
/// report per id is tracked and the one showing actual usage is preferred.
fn parse_rate_limits(path: &Path, now: DateTime<Utc>) -> Option<CodexQuota> {
    let mut last_by_id: HashMap<String, RawRateLimits> = HashMap::new();

    scan::for_each_line(path, |line| {
        if !line.contains("\"rate_limits\"") {
            return;
        }
        let Ok(parsed) = serde_json::from_str::<CodexLine>(line) else {
            return;
        };
        if parsed.line_type.as_deref() != Some("event_msg") {
            return;
        }
        let Some(payload) = parsed.payload else {
            return;
        };
        if payload.payload_type.as_deref() != Some("token_count") {
            return;
        }
        if let Some(limits) = payload.rate_limits {
            let id = limits.limit_id.clone().unwrap_or_else(|| "_default".to_string());
            last_by_id.insert(id, limits);
        }
    });

    if last_by_id.is_empty() {
        return None;
    }

    let has_usage = |rl: &RawRateLimits| {
        rl.primary.map_or(false, |b| b.used_percent > 0.0)
            || rl.secondary.map_or(false, |b| b.used_percent > 0.0)
    };
    let chosen = last_by_id
        .values()
        .find(|rl| has_usage(rl))
        .or_else(|| last_by_id.values().next())
        .cloned()?;

    Some(CodexQuota {
        primary: chosen.primary.map(|b| convert_bucket(b, now)),
        secondary: chosen.secondary.map(|b| convert_bucket(b, now)),
    })
}

fn fetch_from_root(root: &Path, now: DateTime<Utc>) -> Result<CodexQuota, CodexQuotaError> {
    if !root.is_dir() {
        return Err(CodexQuotaError::NotInstalled);
    }

    let mut files: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
    collect_session_files(root, &mut files);
    if files.is_empty() {
        return Err(CodexQuotaError::NoSessions);
    }

    // Newest first; the latest session is the most likely to carry current
    // rate-limit data, so stop at the first file that yields any.
    files.sort_by(|a, b| b.1.cmp(&a.1));
    for (path, _) in files.iter().take(RECENT_FILES) {
        if let Some(quota) = parse_rate_limits(path, now) {
            return Ok(quota);
        }
    }
    Err(CodexQuotaError::NoRateData)
}

fn collect_session_files(dir: &Path, files: &mut Vec<(PathBuf, std::time::SystemTime)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_session_files(&path, files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::UNIX_EPOCH);
            files.push((path, modified));
        }
    }
}

/// Look up the current Codex rate-limit snapshot from recent session files.
pub fn fetch_quota() -> Result<CodexQuota, CodexQuotaError> {
    let root = sessions_dir().ok_or(CodexQuotaError::NotInstalled)?;
    fetch_from_root(&root, Utc::now())
}
