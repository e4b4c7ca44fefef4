use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::models::stats::TokenStats;
use crate::core::providers::Provider;
use crate::core::scan::{DedupPolicy, LogSource, UsageRecord};

#[derive(Deserialize)]
struct ClaudeLine {
    #[serde(rename = "type")]
    line_type: Option<String>,
    timestamp: Option<String>,
    message: Option<ClaudeMessage>,
}

#[derive(Deserialize)]
struct ClaudeMessage {
    id: Option<String>,
    usage: Option<ClaudeUsagePayload>,
}

#[derive(Deserialize)]
struct ClaudeUsagePayload {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
    cache_read_input_tokens: Option<u64>,
}

/// Fast ASCII check: does this line look like it carries usage data?
fn is_candidate_line(line: &str) -> bool {
    line.contains("\"type\":\"assistant\"") && line.contains("\"usage\"")
}

/// Claude Code session logs: `*.jsonl` under the projects directory.
/// Streaming re-emits running totals per `message.id`, so lines dedup
/// cumulatively with the last emission winning.
pub struct ClaudeLogs;

impl LogSource for ClaudeLogs {
    fn provider(&self) -> Provider {
        Provider::Claude
    }

    fn data_roots(&self) -> Vec<PathBuf> {
        if let Ok(dir) = std::env::var("CLAUDE_CONFIG_DIR") {
            if !dir.is_empty() {
                return vec![PathBuf::from(dir).join("projects")];
            }
        }
        let Some(home) = dirs::home_dir() else {
            return Vec::new();
        };
        vec![
            home.join(".claude").join("projects"),
            home.join(".config").join("claude").join("projects"),
        ]
    }

    fn require_root(&self) -> bool {
        true
    }

    fn is_log_file(&self, path: &Path) -> bool {
        path.extension().and_then(|e| e.to_str()) == Some("jsonl")
    }

    fn decode_line(&self, line: &str) -> Option<UsageRecord> {
        if !is_candidate_line(line) {
            return None;
        }
        let parsed: ClaudeLine = serde_json::from_str(line).ok()?;
        if parsed.line_type.as_deref() != Some("assistant") {
            return None;
        }
        let message = parsed.message?;
        let usage = message.usage?;
        // Dedup resolves ties by emission order, so a record without a
        // parseable timestamp cannot be window-filtered and is dropped.
        let timestamp = DateTime::parse_from_rfc3339(parsed.timestamp.as_deref()?)
            .ok()?
            .with_timezone(&Utc);
        Some(UsageRecord {
            message_id: message.id,
            timestamp: Some(timestamp),
            delta: TokenStats {
                input_tokens: usage.input_tokens.unwrap_or(0),
                output_tokens: usage.output_tokens.unwrap_or(0),
                cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
                cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
            },
        })
    }

    fn dedup(&self) -> DedupPolicy {
        DedupPolicy::Cumulative
    }
}
