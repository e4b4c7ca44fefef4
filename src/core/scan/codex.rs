use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::models::stats::TokenStats;
use crate::core::providers::Provider;
use crate::core::scan::{DedupPolicy, LogSource, UsageRecord};

#[derive(Deserialize)]
struct CodexLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    timestamp: Option<String>,
    payload: Option<CodexPayload>,
}

#[derive(Deserialize)]
struct CodexPayload {
    #[serde(rename = "type")]
    payload_type: Option<String>,
    info: Option<CodexTokenInfo>,
}

#[derive(Deserialize)]
struct CodexTokenInfo {
    total_token_usage: Option<CodexTokenUsage>,
}

#[derive(Deserialize)]
struct CodexTokenUsage {
    input_tokens: Option<u64>,
    cached_input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

/// Resolve the Codex sessions directory: `$CODEX_HOME/sessions` first, else
/// `~/.codex/sessions`.
pub fn sessions_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("CODEX_HOME") {
        if !home.is_empty() {
            return Some(PathBuf::from(home).join("sessions"));
        }
    }
    dirs::home_dir().map(|home| home.join(".codex").join("sessions"))
}

/// Codex session logs: `*.jsonl` under the sessions tree. `token_count`
/// events carry the running session total, so only the last one counts.
pub struct CodexLogs;

impl LogSource for CodexLogs {
    fn provider(&self) -> Provider {
        Provider::Codex
    }

    fn data_roots(&self) -> Vec<PathBuf> {
        sessions_dir().into_iter().collect()
    }

    fn is_log_file(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("jsonl")
    }

    fn decode_line(&self, line: &str) -> Option<UsageRecord> {
        if !line.contains("\"token_count\"") {
            return None;
        }
        let parsed: CodexLine = serde_json::from_str(line).ok()?;
        if parsed.line_type.as_deref() != Some("event_msg") {
            return None;
        }
        let payload = parsed.payload?;
        if payload.payload_type.as_deref() != Some("token_count") {
            return None;
        }
        let usage = payload.info?.total_token_usage?;

        let input = usage.input_tokens.unwrap_or(0);
        let cached = usage.cached_input_tokens.unwrap_or(0);
        // input_tokens includes cached reads; clamp guards against payloads
        // where the cached figure exceeds the total.
        let non_cached = input.saturating_sub(cached);

        // A missing or unparseable timestamp leaves the record unfiltered.
        let timestamp = parsed
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Some(UsageRecord {
            message_id: None,
            timestamp,
            delta: TokenStats {
                input_tokens: non_cached,
                output_tokens: usage.output_tokens.unwrap_or(0),
                cache_creation_tokens: 0,
                cache_read_tokens: cached,
            },
        })
    }

    fn dedup(&self) -> DedupPolicy {
        DedupPolicy::LastSnapshot
    }
}
