//! CPU average sparkline + per-core mini bars.

use std::collections::VecDeque;

use ratatui::style::Modifier;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Sparkline},
};
use resmon_core::Sample;

use crate::history::{PerCoreHistory, RollingStats};
use crate::ui::util::pct_or_na;

pub fn draw_cpu_avg_graph(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    hist: &VecDeque<u64>,
    stats: &RollingStats,
    m: Option<&Sample>,
) {
    let now = m.and_then(|s| s.cpu.as_ref()).map(|c| c.utilization_percent);
    let title = format!(
        "CPU (now: {} | min {} avg {} max {})",
        pct_or_na(now),
        pct_or_na(stats.min()),
        pct_or_na(stats.avg()),
        pct_or_na(stats.max()),
    );
    let max_points = area.width.saturating_sub(2) as usize;
    let start = hist.len().saturating_sub(max_points);
    let data: Vec<u64> = hist.iter().skip(start).cloned().collect();
    let spark = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .data(&data)
        .max(100)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(spark, area);
}

pub fn draw_per_core_bars(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    m: Option<&Sample>,
    per_core_hist: &PerCoreHistory,
) {
    f.render_widget(Block::default().borders(Borders::ALL).title("Per-core"), area);
    let inner = Rect { x: area.x + 1, y: area.y + 1, width: area.width.saturating_sub(2), height: area.height.saturating_sub(2) };
    if inner.height == 0 { return; }

    let Some(cpu) = m.and_then(|s| s.cpu.as_ref()) else {
        f.render_widget(Paragraph::new("N/A"), inner);
        return;
    };

    let rows = inner.height as usize;
    let show_n = rows.min(cpu.per_core.len());
    let constraints: Vec<Constraint> = (0..show_n).map(|_| Constraint::Length(1)).collect();
    let vchunks = Layout::default().direction(Direction::Vertical).constraints(constraints).split(inner);

    for (i, rect) in vchunks.iter().enumerate() {
        let hchunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(6), Constraint::Length(12)])
            .split(*rect);

        let curr = cpu.per_core[i].clamp(0.0, 100.0);
        let older = per_core_hist.deques.get(i)
            .and_then(|d| d.iter().rev().nth(20).copied())
            .map(|v| v as f32)
            .unwrap_or(curr);
        let trend = if curr > older + 0.2 { "↑" }
                    else if curr + 0.2 < older { "↓" }
                    else { "╌" };

        let fg = match curr {
            x if x < 25.0 => Color::Green,
            x if x < 60.0 => Color::Yellow,
            _ => Color::Red,
        };

        let hist: Vec<u64> = per_core_hist
            .deques
            .get(i)
            .map(|d| {
                let max_points = hchunks[0].width as usize;
                let start = d.len().saturating_sub(max_points);
                d.iter().skip(start).map(|&v| v as u64).collect()
            })
            .unwrap_or_default();

        let spark = Sparkline::default()
            .data(&hist)
            .max(100)
            .style(Style::default().fg(fg));
        f.render_widget(spark, hchunks[0]);

        let label = format!("cpu{:<2}{}{:>5.1}%", i, trend, curr);
        let line = Line::from(Span::styled(label, Style::default().fg(fg).add_modifier(Modifier::BOLD)));
        f.render_widget(Paragraph::new(line).right_aligned(), hchunks[1]);
    }
}
