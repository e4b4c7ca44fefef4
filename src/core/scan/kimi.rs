use chrono::DateTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::core::models::stats::TokenStats;
use crate::core::providers::Provider;
use crate::core::scan::{DedupPolicy, LogSource, UsageRecord};

#[derive(Deserialize)]
struct KimiWireEntry {
    /// Unix timestamp with fractional seconds.
    timestamp: Option<f64>,
    message: Option<KimiMessage>,
}

#[derive(Deserialize)]
struct KimiMessage {
    #[serde(rename = "type")]
    message_type: Option<String>,
    payload: Option<KimiPayload>,
}

#[derive(Deserialize)]
struct KimiPayload {
    token_usage: Option<KimiTokenUsage>,
}

#[derive(Deserialize)]
struct KimiTokenUsage {
    input_other: Option<u64>,
    output: Option<u64>,
    input_cache_read: Option<u64>,
    input_cache_creation: Option<u64>,
}

/// Kimi session logs: `wire.jsonl` files under the sessions tree.
/// `StatusUpdate` events carry cumulative session usage, so only the last
/// one counts.
pub struct KimiLogs;

impl LogSource for KimiLogs {
    fn provider(&self) -> Provider {
        Provider::Kimi
    }

    fn data_roots(&self) -> Vec<PathBuf> {
        if let Ok(home) = std::env::var("KIMI_HOME") {
            if !home.is_empty() {
                return vec![PathBuf::from(home).join("sessions")];
            }
        }
        dirs::home_dir()
            .map(|home| home.join(".kimi").join("sessions"))
            .into_iter()
            .collect()
    }

    fn is_log_file(&self, path: &Path) -> bool {
        path.file_name().and_then(|n| n.to_str()) == Some("wire.jsonl")
    }

    fn decode_line(&self, line: &str) -> Option<UsageRecord> {
        if !line.contains("\"StatusUpdate\"") {
            return None;
        }
        let parsed: KimiWireEntry = serde_json::from_str(line).ok()?;
        let message = parsed.message?;
        if message.message_type.as_deref() != Some("StatusUpdate") {
            return None;
        }
        let usage = message.payload?.token_usage?;

        // A zero or absent timestamp leaves the record unfiltered.
        let timestamp = parsed
            .timestamp
            .filter(|&t| t > 0.0)
            .and_then(|t| {
                let secs = t.trunc() as i64;
                let nanos = ((t - t.trunc()) * 1e9) as u32;
                DateTime::from_timestamp(secs, nanos)
            });

        Some(UsageRecord {
            message_id: None,
            timestamp,
            delta: TokenStats {
                input_tokens: usage.input_other.unwrap_or(0),
                output_tokens: usage.output.unwrap_or(0),
                cache_creation_tokens: usage.input_cache_creation.unwrap_or(0),
                cache_read_tokens: usage.input_cache_read.unwrap_or(0),
            },
        })
    }

    fn dedup(&self) -> DedupPolicy {
        DedupPolicy::LastSnapshot
    }
}
