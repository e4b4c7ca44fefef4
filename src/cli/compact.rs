use anyhow::Result;

use crate::core::auth;
use crate::core::config::Config;
use crate::core::formatter::format_token_count;
use crate::core::models::usage::QuotaBucket;
use crate::core::providers::{claude, codex};
use crate::core::scan::{self, Window};

/// Format the session/weekly windows of one provider as "5h:72%,7d:41%"
/// style fragments. Percentages are remaining, matching an HP-bar reading.
fn quota_windows(session: Option<&QuotaBucket>, weekly: Option<&QuotaBucket>) -> Vec<String> {
    let mut windows = Vec::new();
    if let Some(bucket) = session {
        windows.push(format!("5h:{:.0}%", bucket.remaining_percent()));
    }
    if let Some(bucket) = weekly {
        windows.push(format!("7d:{:.0}%", bucket.remaining_percent()));
    }
    windows
}

fn provider_part(name: &str, windows: &[String]) -> Option<String> {
    if windows.is_empty() {
        None
    } else {
        Some(format!("{}:{}", name, windows.join(",")))
    }
}

/// One fetch+scan cycle printed as a single status-bar line, e.g.
/// `claude:5h:72%,7d:41% codex:5h:80%,7d:95% tok:1.2M`.
///
/// Credential and quota-fetch errors propagate so the caller can exit
/// non-zero; a provider that is simply not installed is skipped.
pub async fn run(config: &Config) -> Result<()> {
    let creds = auth::load_token().await?;

    let mut parts: Vec<String> = Vec::new();

    if config.providers.claude {
        let quota = claude::fetch_quota(&creds.access_token).await?;
        let windows = quota_windows(quota.five_hour.as_ref(), quota.seven_day.as_ref());
        parts.extend(provider_part("claude", &windows));
    }

    if config.providers.codex {
        // Rate limits come from local session files; their absence just
        // means nothing to report for Codex.
        if let Ok(quota) = codex::fetch_quota() {
            let windows = quota_windows(quota.primary.as_ref(), quota.secondary.as_ref());
            parts.extend(provider_part("codex", &windows));
        }
    }

    if config.any_enabled() {
        let config = *config;
        let week =
            tokio::task::spawn_blocking(move || scan::scan_all(&config, Window::trailing_days(7)))
                .await?;
        if week.total() > 0 {
            parts.push(format!("tok:{}", format_token_count(week.total())));
        }
    }

    println!("{}", parts.join(" "));
    Ok(())
}
