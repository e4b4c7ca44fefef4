use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::warn;

use crate::cli::view;
use crate::core::auth::Credentials;
use crate::core::config::Config;
use crate::core::models::stats::{DailyTokenStats, TokenStats};
use crate::core::models::usage::{ClaudeQuota, CodexQuota};
use crate::core::providers::{claude, claude::FetchError, codex, codex::CodexQuotaError, Provider};
use crate::core::scan::{self, kimi::KimiLogs, Window};

/// Automatic refresh cadence.
const REFRESH_INTERVAL: Duration = Duration::from_secs(300);
/// Manual refreshes closer together than this are no-ops.
const REFRESH_DEBOUNCE: Duration = Duration::from_secs(10);
/// Keyboard poll granularity; also bounds redraw latency for async results.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

type TerminalBackend = CrosstermBackend<Stdout>;

/// One completed unit of background work.
pub enum AppEvent {
    ClaudeQuota(Result<ClaudeQuota, FetchError>),
    CodexQuota(Result<CodexQuota, CodexQuotaError>),
    Tokens {
        today: TokenStats,
        week: TokenStats,
    },
    KimiTokens {
        today: TokenStats,
        week: TokenStats,
    },
    Calendar {
        year: i32,
        month: u32,
        data: DailyTokenStats,
    },
}

/// Dashboard state: the last good result per unit of work, plus staleness.
pub struct App {
    pub config: Config,
    pub subscription: String,
    token: String,

    pub claude: Option<ClaudeQuota>,
    pub claude_err: Option<String>,
    pub stale: bool,
    pub last_fetch: Option<DateTime<Local>>,

    pub codex: Option<CodexQuota>,

    pub kimi_today: TokenStats,
    pub kimi_week: TokenStats,

    pub tokens_today: TokenStats,
    pub tokens_week: TokenStats,

    pub loading: bool,
    pub show_calendar: bool,
    pub calendar: Option<DailyTokenStats>,
    pub calendar_year: i32,
    pub calendar_month: u32,

    last_refresh: Option<Instant>,
}

impl App {
    fn new(config: Config, creds: Credentials) -> Self {
        let now = Local::now();
        Self {
            config,
            subscription: creds.subscription_type,
            token: creds.access_token,
            claude: None,
            claude_err: None,
            stale: false,
            last_fetch: None,
            codex: None,
            kimi_today: TokenStats::default(),
            kimi_week: TokenStats::default(),
            tokens_today: TokenStats::default(),
            tokens_week: TokenStats::default(),
            loading: false,
            show_calendar: false,
            calendar: None,
            calendar_year: now.year(),
            calendar_month: now.month(),
            last_refresh: None,
        }
    }

    /// Kick off every enabled unit of work; results arrive as [`AppEvent`]s
    /// and the view updates incrementally as each completes.
    fn refresh(&mut self, tx: &mpsc::Sender<AppEvent>) {
        self.loading = true;

        if self.config.providers.claude {
            let token = self.token.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = claude::fetch_quota(&token).await;
                let _ = tx.send(AppEvent::ClaudeQuota(result)).await;
            });
        }

        if self.config.providers.codex {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(result) = tokio::task::spawn_blocking(codex::fetch_quota).await {
                    let _ = tx.send(AppEvent::CodexQuota(result)).await;
                }
            });
        }

        {
            let config = self.config;
            let tx = tx.clone();
            tokio::spawn(async move {
                let scanned = tokio::task::spawn_blocking(move || {
                    let today = scan::scan_all(&config, Window::today());
                    let week = scan::scan_all(&config, Window::trailing_days(7));
                    (today, week)
                })
                .await;
                if let Ok((today, week)) = scanned {
                    let _ = tx.send(AppEvent::Tokens { today, week }).await;
                }
            });
        }

        if self.config.providers.kimi {
            let tx = tx.clone();
            tokio::spawn(async move {
                let scanned = tokio::task::spawn_blocking(|| {
                    let today =
                        scan::scan_source(&KimiLogs, Window::today()).unwrap_or_default();
                    let week = scan::scan_source(&KimiLogs, Window::trailing_days(7))
                        .unwrap_or_default();
                    (today, week)
                })
                .await;
                if let Ok((today, week)) = scanned {
                    let _ = tx.send(AppEvent::KimiTokens { today, week }).await;
                }
            });
        }

        if self.show_calendar {
            self.request_calendar(tx);
        }
    }

    fn manual_refresh(&mut self, tx: &mpsc::Sender<AppEvent>) {
        if let Some(last) = self.last_refresh {
            if last.elapsed() < REFRESH_DEBOUNCE {
                return;
            }
        }
        self.last_refresh = Some(Instant::now());
        self.refresh(tx);
    }

    fn toggle_calendar(&mut self, tx: &mpsc::Sender<AppEvent>) {
        self.show_calendar = !self.show_calendar;
        if self.show_calendar && self.calendar.is_none() {
            let now = Local::now();
            self.calendar_year = now.year();
            self.calendar_month = now.month();
            self.request_calendar(tx);
        }
    }

    fn request_calendar(&self, tx: &mpsc::Sender<AppEvent>) {
        let config = self.config;
        let (year, month) = (self.calendar_year, self.calendar_month);
        let tx = tx.clone();
        tokio::spawn(async move {
            let scanned =
                tokio::task::spawn_blocking(move || scan::scan_all_by_day(&config, year, month))
                    .await;
            if let Ok(data) = scanned {
                let _ = tx.send(AppEvent::Calendar { year, month, data }).await;
            }
        });
    }

    /// Flip a provider's visibility, persist it, and rescan. The config file
    /// is written only here, on explicit toggles.
    fn toggle_provider(&mut self, provider: Provider, tx: &mpsc::Sender<AppEvent>) {
        self.config.toggle(provider);
        if let Err(err) = self.config.save() {
            warn!(%err, "failed to save config");
        }
        match provider {
            Provider::Claude => {
                self.claude = None;
                self.claude_err = None;
                self.stale = false;
            }
            Provider::Codex => self.codex = None,
            Provider::Kimi => {
                self.kimi_today = TokenStats::default();
                self.kimi_week = TokenStats::default();
            }
        }
        self.calendar = None;
        self.refresh(tx);
    }

    fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::ClaudeQuota(result) => {
                self.loading = false;
                match result {
                    Ok(quota) => {
                        self.claude = Some(quota);
                        self.claude_err = None;
                        self.stale = false;
                        self.last_fetch = Some(Local::now());
                    }
                    Err(err) => {
                        // Keep showing the last good snapshot, marked stale.
                        self.stale = self.claude.is_some();
                        self.claude_err = Some(err.to_string());
                    }
                }
            }
            AppEvent::CodexQuota(result) => {
                if let Ok(quota) = result {
                    self.codex = Some(quota);
                }
            }
            AppEvent::Tokens { today, week } => {
                self.tokens_today = today;
                self.tokens_week = week;
            }
            AppEvent::KimiTokens { today, week } => {
                self.kimi_today = today;
                self.kimi_week = week;
            }
            AppEvent::Calendar { year, month, data } => {
                self.calendar = Some(data);
                self.calendar_year = year;
                self.calendar_month = month;
            }
        }
    }
}

/// Run the interactive dashboard until the user quits.
pub async fn run(config: Config, creds: Credentials) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, config, creds).await;
    cleanup_terminal(&mut terminal)?;
    result
}

async fn run_loop(
    terminal: &mut Terminal<TerminalBackend>,
    config: Config,
    creds: Credentials,
) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<AppEvent>(32);
    let mut app = App::new(config, creds);
    app.refresh(&tx);
    let mut last_auto = Instant::now();

    loop {
        while let Ok(event) = rx.try_recv() {
            app.apply(event);
        }

        terminal.draw(|frame| view::render(frame, &app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            break;
                        }
                        KeyCode::Char('q') => break,
                        KeyCode::Char('r') => app.manual_refresh(&tx),
                        KeyCode::Char('c') => app.toggle_calendar(&tx),
                        KeyCode::Char('1') => app.toggle_provider(Provider::Claude, &tx),
                        KeyCode::Char('2') => app.toggle_provider(Provider::Codex, &tx),
                        KeyCode::Char('3') => app.toggle_provider(Provider::Kimi, &tx),
                        _ => {}
                    }
                }
            }
        }

        if last_auto.elapsed() >= REFRESH_INTERVAL {
            last_auto = Instant::now();
            app.refresh(&tx);
        }
    }

    Ok(())
}

fn setup_terminal() -> Result<Terminal<TerminalBackend>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("failed to create terminal")
}

fn cleanup_terminal(terminal: &mut Terminal<TerminalBackend>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}
