use chrono::{Datelike, Local, NaiveDate};
use ratatui::{
    layout::Alignment,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Padding, Paragraph},
    Frame,
};

use crate::cli::dashboard::App;
use crate::core::formatter::{format_reset, format_token_count};
use crate::core::models::stats::TokenStats;
use crate::core::models::usage::QuotaBucket;
use crate::core::providers::Provider;

const BAR_WIDTH: usize = 30;
const LABEL_WIDTH: usize = 14;

fn title_style() -> Style {
    Style::default()
        .fg(Color::Magenta)
        .add_modifier(Modifier::BOLD)
}

fn section_style() -> Style {
    Style::default()
        .fg(Color::White)
        .add_modifier(Modifier::BOLD)
}

fn dim_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn value_style() -> Style {
    Style::default().fg(Color::Gray)
}

fn stale_style() -> Style {
    Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC)
}

fn error_style() -> Style {
    Style::default().fg(Color::Red)
}

/// "█░" bar filled by remaining percentage, HP-bar style.
fn usage_bar(remaining_percent: f64, width: usize) -> String {
    let ratio = (remaining_percent / 100.0).clamp(0.0, 1.0);
    let filled = (ratio * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn bar_color(remaining_percent: f64) -> Color {
    if remaining_percent > 50.0 {
        Color::Green
    } else if remaining_percent > 20.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// "Session" + the bucket's window, e.g. "Session (5h)" or "Weekly (7d)".
fn window_label(bucket: &QuotaBucket, base: &str) -> String {
    match bucket.window_minutes {
        Some(minutes) if minutes % 1440 == 0 => format!("{base} ({}d)", minutes / 1440),
        Some(minutes) if minutes % 60 == 0 => format!("{base} ({}h)", minutes / 60),
        Some(minutes) => format!("{base} ({minutes}m)"),
        None => base.to_string(),
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

pub fn render(frame: &mut Frame, app: &App) {
    let mut title_spans = vec![Span::styled(" llm-usage ", title_style())];
    if app.loading {
        title_spans.push(Span::styled("… ", dim_style()));
    } else if app.stale {
        title_spans.push(Span::styled("stale ", stale_style()));
    }

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Magenta))
        .padding(Padding::horizontal(2))
        .title_top(Line::from(title_spans));

    if let Some(right) = header_right(app) {
        block = block.title_top(Line::from(Span::styled(right, dim_style())).alignment(Alignment::Right));
    }

    let lines = if app.show_calendar {
        calendar_lines(app)
    } else {
        dashboard_lines(app)
    };

    frame.render_widget(Paragraph::new(lines).block(block), frame.area());
}

/// Subscription tier and last fetch time, e.g. " Max • 14:05 ".
fn header_right(app: &App) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if !app.subscription.is_empty() {
        let mut chars = app.subscription.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        parts.push(capitalized);
    }
    if let Some(at) = app.last_fetch {
        parts.push(at.format("%H:%M").to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!(" {} ", parts.join(" • ")))
    }
}

fn dashboard_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    // No data at all: show the error alone.
    if app.claude.is_none() && app.codex.is_none() {
        if let Some(err) = &app.claude_err {
            lines.push(Line::from(Span::styled(format!("  {err}"), error_style())));
            return lines;
        }
    }

    if let Some(quota) = &app.claude {
        lines.push(Line::from(Span::styled(
            Provider::Claude.display_name(),
            section_style(),
        )));
        if let Some(bucket) = &quota.five_hour {
            lines.push(bar_line(&window_label(bucket, "Session"), bucket));
        }
        if let Some(bucket) = &quota.seven_day {
            lines.push(bar_line(&window_label(bucket, "Weekly"), bucket));
        }
        if let Some(bucket) = &quota.seven_day_opus {
            lines.push(bar_line(&window_label(bucket, "Opus"), bucket));
        }
        if let Some(resets) = reset_line(quota.five_hour.as_ref(), quota.seven_day.as_ref()) {
            lines.push(resets);
        }
    }

    if let Some(quota) = &app.codex {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            Provider::Codex.display_name(),
            section_style(),
        )));
        if let Some(bucket) = &quota.primary {
            lines.push(bar_line(&window_label(bucket, "Session"), bucket));
        }
        if let Some(bucket) = &quota.secondary {
            lines.push(bar_line(&window_label(bucket, "Weekly"), bucket));
        }
        if let Some(resets) = reset_line(quota.primary.as_ref(), quota.secondary.as_ref()) {
            lines.push(resets);
        }
    }

    if !app.kimi_today.is_zero() || !app.kimi_week.is_zero() {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            Provider::Kimi.display_name(),
            section_style(),
        )));
        push_token_rows(&mut lines, app.kimi_today, app.kimi_week);
    }

    if !app.tokens_today.is_zero() || !app.tokens_week.is_zero() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Tokens", section_style())));
        push_token_rows(&mut lines, app.tokens_today, app.tokens_week);
    }

    if app.stale {
        if let Some(err) = &app.claude_err {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(format!("  {err}"), stale_style())));
        }
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "  [r] refresh  [c] calendar  [1/2/3] providers  [q] quit",
        dim_style(),
    )));

    lines
}

fn bar_line(label: &str, bucket: &QuotaBucket) -> Line<'static> {
    let remaining = bucket.remaining_percent();
    Line::from(vec![
        Span::styled(format!("{label:<LABEL_WIDTH$}"), value_style()),
        Span::styled(
            usage_bar(remaining, BAR_WIDTH),
            Style::default().fg(bar_color(remaining)),
        ),
        Span::styled(format!(" {remaining:>4.0}%"), value_style()),
    ])
}

fn reset_line(session: Option<&QuotaBucket>, weekly: Option<&QuotaBucket>) -> Option<Line<'static>> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(at) = session.and_then(|b| b.resets_at) {
        parts.push(format!("5h: {}", format_reset(at)));
    }
    if let Some(at) = weekly.and_then(|b| b.resets_at) {
        parts.push(format!("7d: {}", format_reset(at)));
    }
    if parts.is_empty() {
        None
    } else {
        Some(Line::from(Span::styled(parts.join("  "), dim_style())))
    }
}

fn push_token_rows(lines: &mut Vec<Line<'static>>, today: TokenStats, week: TokenStats) {
    if !today.is_zero() {
        lines.push(token_row("Today", today));
    }
    if !week.is_zero() {
        lines.push(token_row("Last 7 days", week));
    }
}

fn token_row(label: &str, stats: TokenStats) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<LABEL_WIDTH$}"), value_style()),
        Span::styled(format_token_count(stats.total_input()), value_style()),
        Span::styled(" in  ", dim_style()),
        Span::styled(format_token_count(stats.output_tokens), value_style()),
        Span::styled(" out", dim_style()),
    ])
}

fn calendar_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    let month_name = NaiveDate::from_ymd_opt(app.calendar_year, app.calendar_month, 1)
        .map(|d| d.format("%B").to_string())
        .unwrap_or_default();
    lines.push(Line::from(Span::styled(
        format!("{month_name} {}", app.calendar_year),
        section_style(),
    )));

    let Some(calendar) = &app.calendar else {
        lines.push(Line::from(Span::styled("  loading...", dim_style())));
        return lines;
    };

    let today = Local::now();
    let is_current_month =
        today.year() == app.calendar_year && today.month() == app.calendar_month;
    let mut month_total = TokenStats::default();

    for day in 1..=days_in_month(app.calendar_year, app.calendar_month) {
        let Some(stats) = calendar.get(&day) else {
            continue;
        };
        if stats.is_zero() {
            continue;
        }
        month_total += *stats;

        let weekday = NaiveDate::from_ymd_opt(app.calendar_year, app.calendar_month, day)
            .map(|d| d.format("%a").to_string())
            .unwrap_or_default();
        let row = format!(
            "  {day:02}  {weekday}  {:>7} in  {:>7} out",
            format_token_count(stats.total_input()),
            format_token_count(stats.output_tokens),
        );

        if is_current_month && today.day() == day {
            lines.push(Line::from(vec![
                Span::styled(row, title_style()),
                Span::styled(" ←", dim_style()),
            ]));
        } else {
            lines.push(Line::from(Span::styled(row, value_style())));
        }
    }

    if !month_total.is_zero() {
        lines.push(Line::from(Span::styled(
            "  ──────────────────────────────",
            dim_style(),
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "           {:>7} in  {:>7} out",
                format_token_count(month_total.total_input()),
                format_token_count(month_total.output_tokens),
            ),
            value_style(),
        )));
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled("  [c] back", dim_style())));

    lines
}
