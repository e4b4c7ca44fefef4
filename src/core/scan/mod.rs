pub mod claude;
pub mod codex;
pub mod kimi;

use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::models::stats::{merge_daily, DailyTokenStats, TokenStats};
use crate::core::providers::Provider;

/// Longest log line the scanner will buffer. Lines beyond this are treated
/// as unparseable and skipped, never as an error.
const MAX_LINE_BYTES: usize = 512 * 1024;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no {0} data directories found")]
    DataRootNotFound(Provider),
}

/// Time interval used to filter log events: start inclusive, end exclusive
/// when present.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub since: DateTime<Utc>,
    pub until: Option<DateTime<Utc>>,
}

impl Window {
    /// Open-ended window starting at `since`.
    pub fn since(since: DateTime<Utc>) -> Self {
        Self { since, until: None }
    }

    /// Open-ended window starting at local midnight today.
    pub fn today() -> Self {
        let now = Local::now();
        let since = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(local_to_utc)
            .unwrap_or_else(|| now.with_timezone(&Utc));
        Self::since(since)
    }

    /// Open-ended window covering the trailing `days` days.
    pub fn trailing_days(days: i64) -> Self {
        Self::since(Utc::now() - chrono::Duration::days(days))
    }

    /// Closed-open window covering one calendar month in the local timezone.
    /// `None` for an out-of-range year/month pair.
    pub fn calendar_month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.and_hms_opt(0, 0, 0)?;
        Some(Self {
            since: local_to_utc(start),
            until: Some(local_to_utc(end)),
        })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.since && self.until.map_or(true, |until| ts < until)
    }
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match naive.and_local_timezone(Local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

/// Normalized decode result of one log line.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    /// Stable id for the logical message when the provider tags streamed
    /// deltas with one; `None` for snapshot-style formats.
    pub message_id: Option<String>,
    /// `None` only for providers whose dedup does not depend on ordering;
    /// such records are retained without a timestamp filter.
    pub timestamp: Option<DateTime<Utc>>,
    pub delta: TokenStats,
}

/// How multiple log lines describing the same logical usage collapse into
/// one counted contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupPolicy {
    /// The log re-emits running totals per message id while streaming; the
    /// last line per id wins, id-less records are all retained.
    Cumulative,
    /// The log periodically reports a cumulative session total; the single
    /// last qualifying record is the whole file's contribution.
    LastSnapshot,
}

/// One provider's log format: where its files live, which files qualify,
/// how a line decodes, and how duplicates collapse.
pub trait LogSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Candidate data roots in resolution order (env override first).
    /// Empty when no home directory could be determined.
    fn data_roots(&self) -> Vec<PathBuf>;

    /// When true, no existing root at all is surfaced as
    /// [`ScanError::DataRootNotFound`] instead of zero stats.
    fn require_root(&self) -> bool {
        false
    }

    fn is_log_file(&self, path: &Path) -> bool;

    fn decode_line(&self, line: &str) -> Option<UsageRecord>;

    fn dedup(&self) -> DedupPolicy;
}

// ── line reader ───────────────────────────────────────────────────────

/// Call `visit` for every non-empty line of `path`, skipping lines longer
/// than [`MAX_LINE_BYTES`]. IO errors end the walk silently; the file then
/// contributes whatever was read up to that point.
pub(crate) fn for_each_line<F: FnMut(&str)>(path: &Path, mut visit: F) {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return,
    };
    let mut reader = BufReader::new(file);
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    loop {
        buf.clear();
        let read = match reader
            .by_ref()
            .take(MAX_LINE_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
        {
            Ok(n) => n,
            Err(_) => return,
        };
        if read == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        if buf.len() > MAX_LINE_BYTES {
            if !skip_to_line_end(&mut reader) {
                return;
            }
            continue;
        }
        if let Ok(line) = std::str::from_utf8(&buf) {
            let line = line.trim();
            if !line.is_empty() {
                visit(line);
            }
        }
    }
}

/// Drain the remainder of an oversized line. Returns false on IO error.
fn skip_to_line_end<R: BufRead>(reader: &mut R) -> bool {
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(_) => return false,
        };
        if available.is_empty() {
            return true;
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return true;
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

// ── per-file scanner ──────────────────────────────────────────────────

/// Reduce one log file to its in-window token contribution.
pub fn scan_file(source: &dyn LogSource, path: &Path, window: Window) -> TokenStats {
    match source.dedup() {
        DedupPolicy::Cumulative => scan_file_cumulative(source, path, window),
        DedupPolicy::LastSnapshot => scan_file_last_snapshot(source, path, window),
    }
}

fn scan_file_cumulative(source: &dyn LogSource, path: &Path, window: Window) -> TokenStats {
    // Filter first, then group: only in-window records participate in dedup.
    let mut keyed: HashMap<String, TokenStats> = HashMap::new();
    let mut stats = TokenStats::default();
    for_each_line(path, |line| {
        let Some(record) = source.decode_line(line) else {
            return;
        };
        if let Some(ts) = record.timestamp {
            if !window.contains(ts) {
                return;
            }
        }
        match record.message_id {
            // Last line per id wins; file order defines recency.
            Some(id) => {
                keyed.insert(id, record.delta);
            }
            None => stats += record.delta,
        }
    });
    for delta in keyed.into_values() {
        stats += delta;
    }
    stats
}

fn scan_file_last_snapshot(source: &dyn LogSource, path: &Path, window: Window) -> TokenStats {
    let mut last: Option<UsageRecord> = None;
    for_each_line(path, |line| {
        if let Some(record) = source.decode_line(line) {
            last = Some(record);
        }
    });
    match last {
        Some(record) => match record.timestamp {
            // The snapshot is the whole file's contribution, but only if it
            // falls inside the window.
            Some(ts) if !window.contains(ts) => TokenStats::default(),
            _ => record.delta,
        },
        None => TokenStats::default(),
    }
}

/// Reduce one log file into per-day buckets for a calendar-month window.
fn scan_file_by_day(
    source: &dyn LogSource,
    path: &Path,
    window: Window,
    daily: &mut DailyTokenStats,
) {
    match source.dedup() {
        DedupPolicy::Cumulative => {
            let mut keyed: HashMap<String, UsageRecord> = HashMap::new();
            let mut anonymous: Vec<UsageRecord> = Vec::new();
            for_each_line(path, |line| {
                let Some(record) = source.decode_line(line) else {
                    return;
                };
                // Day bucketing needs a timestamp.
                let Some(ts) = record.timestamp else {
                    return;
                };
                if !window.contains(ts) {
                    return;
                }
                match &record.message_id {
                    Some(id) => {
                        keyed.insert(id.clone(), record);
                    }
                    None => anonymous.push(record),
                }
            });
            for record in keyed.into_values().chain(anonymous) {
                if let Some(ts) = record.timestamp {
                    let day = ts.with_timezone(&Local).day();
                    *daily.entry(day).or_default() += record.delta;
                }
            }
        }
        DedupPolicy::LastSnapshot => {
            let mut last: Option<UsageRecord> = None;
            for_each_line(path, |line| {
                if let Some(record) = source.decode_line(line) {
                    if record.timestamp.is_some() {
                        last = Some(record);
                    }
                }
            });
            if let Some(record) = last {
                if let Some(ts) = record.timestamp {
                    if window.contains(ts) {
                        let day = ts.with_timezone(&Local).day();
                        *daily.entry(day).or_default() += record.delta;
                    }
                }
            }
        }
    }
}

// ── directory walker ──────────────────────────────────────────────────

fn walk_files(dir: &Path, visit: &mut dyn FnMut(&Path)) {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_files(&path, visit);
        } else {
            visit(&path);
        }
    }
}

/// Log files are append-only, so a file untouched since before the window
/// start cannot hold in-window events. Files with unreadable metadata are
/// scanned anyway.
fn modified_before(path: &Path, cutoff: DateTime<Utc>) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    DateTime::<Utc>::from(modified) < cutoff
}

fn existing_roots(source: &dyn LogSource) -> Result<Vec<PathBuf>, ScanError> {
    let candidates = source.data_roots();
    if candidates.is_empty() {
        return Err(ScanError::DataRootNotFound(source.provider()));
    }
    Ok(candidates.into_iter().filter(|root| root.is_dir()).collect())
}

/// Scan all of one provider's log files within `window` and sum.
pub fn scan_source(source: &dyn LogSource, window: Window) -> Result<TokenStats, ScanError> {
    let roots = existing_roots(source)?;
    if roots.is_empty() {
        if source.require_root() {
            return Err(ScanError::DataRootNotFound(source.provider()));
        }
        // Provider simply not installed.
        return Ok(TokenStats::default());
    }

    let mut stats = TokenStats::default();
    let mut files = 0usize;
    for root in &roots {
        walk_files(root, &mut |path| {
            if !source.is_log_file(path) || modified_before(path, window.since) {
                return;
            }
            files += 1;
            stats += scan_file(source, path, window);
        });
    }
    debug!(provider = %source.provider(), files, "scanned provider logs");
    Ok(stats)
}

/// Scan one provider's logs for a calendar month, bucketed by day of month.
/// Missing roots yield an empty map.
pub fn scan_source_by_day(source: &dyn LogSource, year: i32, month: u32) -> DailyTokenStats {
    let mut daily = DailyTokenStats::new();
    let Some(window) = Window::calendar_month(year, month) else {
        return daily;
    };
    let Ok(roots) = existing_roots(source) else {
        return daily;
    };
    for root in &roots {
        walk_files(root, &mut |path| {
            if !source.is_log_file(path) || modified_before(path, window.since) {
                return;
            }
            scan_file_by_day(source, path, window, &mut daily);
        });
    }
    daily
}

// ── cross-provider aggregator ─────────────────────────────────────────

/// The log source for one provider.
pub fn source_for(provider: Provider) -> Box<dyn LogSource> {
    match provider {
        Provider::Claude => Box::new(claude::ClaudeLogs),
        Provider::Codex => Box::new(codex::CodexLogs),
        Provider::Kimi => Box::new(kimi::KimiLogs),
    }
}

/// The enabled providers' log sources, in display order.
pub fn enabled_sources(config: &Config) -> Vec<Box<dyn LogSource>> {
    Provider::all()
        .iter()
        .copied()
        .filter(|provider| config.is_enabled(*provider))
        .map(source_for)
        .collect()
}

/// Sum token usage across all enabled providers for `window`. A provider
/// that fails to scan contributes zero; one broken provider never blanks
/// the whole aggregate.
pub fn scan_all(config: &Config, window: Window) -> TokenStats {
    let mut total = TokenStats::default();
    for source in enabled_sources(config) {
        match scan_source(source.as_ref(), window) {
            Ok(stats) => total += stats,
            Err(err) => {
                warn!(provider = %source.provider(), %err, "provider scan failed, counting zero")
            }
        }
    }
    total
}

/// Per-day token usage across all enabled providers for one calendar month.
pub fn scan_all_by_day(config: &Config, year: i32, month: u32) -> DailyTokenStats {
    let mut daily = DailyTokenStats::new();
    for source in enabled_sources(config) {
        merge_daily(&mut daily, scan_source_by_day(source.as_ref(), year, month));
    }
    daily
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    /// Minimal source decoding `{"id":..,"ts":..,"in":..,"out":..}` lines,
    /// used to exercise the engine without provider-specific schemas.
    struct FakeSource {
        root: PathBuf,
        dedup: DedupPolicy,
        require_root: bool,
    }

    impl LogSource for FakeSource {
        fn provider(&self) -> Provider {
            Provider::Claude
        }

        fn data_roots(&self) -> Vec<PathBuf> {
            vec![self.root.clone()]
        }

        fn require_root(&self) -> bool {
            self.require_root
        }

        fn is_log_file(&self, path: &Path) -> bool {
            path.extension().and_then(|e| e.to_str()) == Some("jsonl")
        }

        fn decode_line(&self, line: &str) -> Option<UsageRecord> {
            let value: serde_json::Value = serde_json::from_str(line).ok()?;
            let delta = TokenStats {
                input_tokens: value.get("in")?.as_u64()?,
                output_tokens: value.get("out").and_then(|v| v.as_u64()).unwrap_or(0),
                ..TokenStats::default()
            };
            let timestamp = value
                .get("ts")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            Some(UsageRecord {
                message_id: value
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                timestamp,
                delta,
            })
        }

        fn dedup(&self) -> DedupPolicy {
            self.dedup
        }
    }

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("llm_usage_scan_{name}"));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    fn write_log(root: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = root.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    fn epoch_window() -> Window {
        Window::since(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn cumulative_dedup_keeps_last_line_per_id() {
        let root = temp_root("cumulative_last_wins");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        let path = write_log(
            &root,
            "a.jsonl",
            &[
                r#"{"id":"m1","ts":"2026-03-01T10:00:00Z","in":10,"out":1}"#,
                r#"{"id":"m1","ts":"2026-03-01T10:00:01Z","in":25,"out":2}"#,
                r#"{"id":"m1","ts":"2026-03-01T10:00:02Z","in":40,"out":3}"#,
                r#"{"id":"m2","ts":"2026-03-01T10:01:00Z","in":5,"out":1}"#,
            ],
        );

        let stats = scan_file(&source, &path, epoch_window());
        assert_eq!(stats.input_tokens, 45);
        assert_eq!(stats.output_tokens, 4);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn cumulative_dedup_retains_all_records_without_id() {
        let root = temp_root("cumulative_no_id");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        let path = write_log(
            &root,
            "a.jsonl",
            &[
                r#"{"ts":"2026-03-01T10:00:00Z","in":10}"#,
                r#"{"ts":"2026-03-01T10:00:01Z","in":10}"#,
            ],
        );

        let stats = scan_file(&source, &path, epoch_window());
        assert_eq!(stats.input_tokens, 20);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn cumulative_dedup_filters_before_grouping() {
        let root = temp_root("cumulative_filter_first");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        // The later (in-window) line shares the id with an out-of-window one;
        // only the in-window line participates.
        let path = write_log(
            &root,
            "a.jsonl",
            &[
                r#"{"id":"m1","ts":"2026-02-01T10:00:00Z","in":100}"#,
                r#"{"id":"m1","ts":"2026-03-02T10:00:00Z","in":40}"#,
            ],
        );

        let window = Window::since(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        let stats = scan_file(&source, &path, window);
        assert_eq!(stats.input_tokens, 40);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn last_snapshot_uses_only_final_record() {
        let root = temp_root("snapshot_final");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::LastSnapshot,
            require_root: false,
        };
        let path = write_log(
            &root,
            "a.jsonl",
            &[
                r#"{"ts":"2026-03-01T10:00:00Z","in":100,"out":10}"#,
                r#"{"ts":"2026-03-01T11:00:00Z","in":150,"out":20}"#,
            ],
        );

        let stats = scan_file(&source, &path, epoch_window());
        assert_eq!(stats.input_tokens, 150);
        assert_eq!(stats.output_tokens, 20);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn last_snapshot_before_window_contributes_zero() {
        let root = temp_root("snapshot_stale");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::LastSnapshot,
            require_root: false,
        };
        let path = write_log(
            &root,
            "a.jsonl",
            &[r#"{"ts":"2026-01-15T10:00:00Z","in":500}"#],
        );

        let window = Window::since(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert!(scan_file(&source, &path, window).is_zero());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn last_snapshot_without_timestamp_is_retained() {
        let root = temp_root("snapshot_no_ts");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::LastSnapshot,
            require_root: false,
        };
        let path = write_log(&root, "a.jsonl", &[r#"{"in":77}"#]);

        let window = Window::since(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(scan_file(&source, &path, window).input_tokens, 77);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn malformed_empty_and_unrelated_lines_contribute_zero() {
        let root = temp_root("garbage");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        let path = write_log(
            &root,
            "a.jsonl",
            &["{not json", "", r#"{"other":"event"}"#],
        );

        assert!(scan_file(&source, &path, epoch_window()).is_zero());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn oversized_line_is_skipped_and_following_line_counts() {
        let root = temp_root("oversized");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        let path = root.join("a.jsonl");
        let mut file = File::create(&path).unwrap();
        let huge = format!(r#"{{"in":1,"pad":"{}"}}"#, "x".repeat(MAX_LINE_BYTES));
        writeln!(file, "{huge}").unwrap();
        writeln!(file, r#"{{"ts":"2026-03-01T10:00:00Z","in":9}}"#).unwrap();
        drop(file);

        let stats = scan_file(&source, &path, epoch_window());
        assert_eq!(stats.input_tokens, 9);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn today_window_starts_at_local_midnight() {
        let window = Window::today();
        assert!(window.until.is_none());
        assert!(window.contains(Utc::now()));
        assert!(!window.contains(Utc::now() - chrono::Duration::days(2)));
    }

    #[test]
    fn calendar_window_is_closed_open() {
        let window = Window::calendar_month(2026, 3).unwrap();
        assert!(window.contains(window.since));
        let until = window.until.unwrap();
        assert!(!window.contains(until));
        assert!(window.contains(until - chrono::Duration::seconds(1)));
    }

    #[test]
    fn scan_source_missing_root_yields_zero_without_error() {
        let source = FakeSource {
            root: std::env::temp_dir().join("llm_usage_scan_does_not_exist"),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        let stats = scan_source(&source, epoch_window()).unwrap();
        assert!(stats.is_zero());
    }

    #[test]
    fn scan_source_missing_required_root_is_an_error() {
        let source = FakeSource {
            root: std::env::temp_dir().join("llm_usage_scan_does_not_exist_req"),
            dedup: DedupPolicy::Cumulative,
            require_root: true,
        };
        assert!(matches!(
            scan_source(&source, epoch_window()),
            Err(ScanError::DataRootNotFound(Provider::Claude))
        ));
    }

    #[test]
    fn scan_source_sums_nested_files() {
        let root = temp_root("nested");
        let sub = root.join("project-a").join("deep");
        fs::create_dir_all(&sub).unwrap();
        write_log(&root, "a.jsonl", &[r#"{"ts":"2026-03-01T10:00:00Z","in":1}"#]);
        write_log(&sub, "b.jsonl", &[r#"{"ts":"2026-03-01T11:00:00Z","in":2}"#]);
        write_log(&root, "ignored.txt", &[r#"{"ts":"2026-03-01T12:00:00Z","in":4}"#]);

        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        let stats = scan_source(&source, epoch_window()).unwrap();
        assert_eq!(stats.input_tokens, 3);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn mtime_prefilter_skips_old_files() {
        let root = temp_root("prefilter");
        write_log(&root, "a.jsonl", &[r#"{"ts":"2026-03-01T10:00:00Z","in":8}"#]);

        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        // A window starting far in the future: the file was just written, so
        // its mtime precedes the window and it is skipped unopened.
        let window = Window::since(Utc::now() + chrono::Duration::days(365));
        let stats = scan_source(&source, window).unwrap();
        assert!(stats.is_zero());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn scan_source_by_day_buckets_by_local_day() {
        let root = temp_root("by_day");
        let source = FakeSource {
            root: root.clone(),
            dedup: DedupPolicy::Cumulative,
            require_root: false,
        };
        // January of the current local year keeps the window start in the
        // past so the mtime prefilter cannot skip the fixture. Midday
        // timestamps keep the local day equal to the UTC day for any offset
        // within ±11 hours.
        let year = Local::now().year();
        write_log(
            &root,
            "a.jsonl",
            &[
                &format!(r#"{{"id":"m1","ts":"{year}-01-03T12:00:00Z","in":10}}"#),
                &format!(r#"{{"id":"m2","ts":"{year}-01-11T12:00:00Z","in":20}}"#),
                &format!(r#"{{"id":"m2","ts":"{year}-01-11T12:00:05Z","in":30}}"#),
            ],
        );

        let daily = scan_source_by_day(&source, year, 1);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[&3].input_tokens, 10);
        assert_eq!(daily[&11].input_tokens, 30);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn aggregator_merges_present_provider_and_ignores_missing_one() {
        let _guard = super::test_support::env_lock();
        let claude_home = temp_root("agg_claude_home");
        let projects = claude_home.join("projects");
        fs::create_dir_all(&projects).unwrap();
        write_log(
            &projects,
            "session.jsonl",
            &[
                r#"{"type":"assistant","timestamp":"2026-03-01T10:00:00Z","message":{"id":"m1","usage":{"input_tokens":40,"output_tokens":4}}}"#,
            ],
        );

        std::env::set_var("CLAUDE_CONFIG_DIR", &claude_home);
        std::env::set_var(
            "CODEX_HOME",
            std::env::temp_dir().join("llm_usage_agg_codex_missing"),
        );
        std::env::set_var(
            "KIMI_HOME",
            std::env::temp_dir().join("llm_usage_agg_kimi_missing"),
        );

        let config = Config::default();
        let stats = scan_all(&config, epoch_window());

        std::env::remove_var("CLAUDE_CONFIG_DIR");
        std::env::remove_var("CODEX_HOME");
        std::env::remove_var("KIMI_HOME");

        assert_eq!(stats.input_tokens, 40);
        assert_eq!(stats.output_tokens, 4);

        let _ = fs::remove_dir_all(&claude_home);
    }

    #[test]
    fn aggregator_respects_disabled_providers() {
        let _guard = super::test_support::env_lock();
        let claude_home = temp_root("agg_disabled_claude");
        let projects = claude_home.join("projects");
        fs::create_dir_all(&projects).unwrap();
        write_log(
            &projects,
            "session.jsonl",
            &[
                r#"{"type":"assistant","timestamp":"2026-03-01T10:00:00Z","message":{"id":"m1","usage":{"input_tokens":40}}}"#,
            ],
        );

        std::env::set_var("CLAUDE_CONFIG_DIR", &claude_home);
        let mut config = Config::default();
        config.providers.claude = false;
        config.providers.codex = false;
        config.providers.kimi = false;
        let stats = scan_all(&config, epoch_window());
        std::env::remove_var("CLAUDE_CONFIG_DIR");

        assert!(stats.is_zero());

        let _ = fs::remove_dir_all(&claude_home);
    }
}
