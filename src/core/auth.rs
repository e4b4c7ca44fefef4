use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";
const KEYCHAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: String,
    /// Subscription-tier label ("pro", "max", ...); empty when unknown.
    pub subscription_type: String,
}

#[derive(Deserialize)]
struct KeychainCredentials {
    #[serde(rename = "claudeAiOauth")]
    claude_ai_oauth: Option<OAuthEntry>,
}

#[derive(Deserialize)]
struct OAuthEntry {
    #[serde(rename = "accessToken")]
    access_token: Option<String>,
    #[serde(rename = "subscriptionType")]
    subscription_type: Option<String>,
}

fn parse_keychain_blob(blob: &str) -> Result<Credentials> {
    let creds: KeychainCredentials =
        serde_json::from_str(blob.trim()).context("failed to parse Keychain credentials")?;
    let oauth = creds
        .claude_ai_oauth
        .context("no OAuth entry in Keychain credentials")?;
    let token = oauth.access_token.unwrap_or_default();
    if token.is_empty() {
        anyhow::bail!("no OAuth token in Keychain credentials");
    }
    Ok(Credentials {
        access_token: token,
        subscription_type: oauth.subscription_type.unwrap_or_default(),
    })
}

/// Acquire the bearer token: `CLAUDE_OAUTH_TOKEN` first, else the macOS
/// Keychain entry written by Claude Code. Absence of both is fatal for the
/// caller.
pub async fn load_token() -> Result<Credentials> {
    if let Ok(token) = std::env::var("CLAUDE_OAUTH_TOKEN") {
        if !token.is_empty() {
            return Ok(Credentials {
                access_token: token,
                subscription_type: String::new(),
            });
        }
    }

    if !cfg!(target_os = "macos") {
        anyhow::bail!("CLAUDE_OAUTH_TOKEN must be set (Keychain auto-detection is macOS-only)");
    }

    let output = tokio::time::timeout(
        KEYCHAIN_TIMEOUT,
        tokio::process::Command::new("/usr/bin/security")
            .args(["find-generic-password", "-s", KEYCHAIN_SERVICE, "-w"])
            .output(),
    )
    .await
    .context("timed out reading Keychain credentials")?
    .context("failed to run security(1)")?;

    if !output.status.success() {
        anyhow::bail!("no Claude Code credentials found in Keychain");
    }

    parse_keychain_blob(&String::from_utf8_lossy(&output.stdout))
}
