//! Disk summary gauge with I/O rates, and per-volume cards.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Gauge, Paragraph},
};
use resmon_core::Sample;

use crate::ui::util::{disk_icon, human, human_rate, truncate_middle, NA};

fn usage_color(pct: u16) -> Color {
    if pct < 70 { Color::Green } else if pct < 90 { Color::Yellow } else { Color::Red }
}

/// `rates` are (read, write) in bytes per second.
pub fn draw_disk_summary(
    f: &mut ratatui::Frame<'_>,
    area: Rect,
    m: Option<&Sample>,
    rates: (Option<f64>, Option<f64>),
) {
    let (pct, label) = match m.and_then(|s| s.disk.as_ref()) {
        Some(d) => (
            d.percent.clamp(0.0, 100.0).round() as u16,
            format!(
                "{} / {}  ({:.1}%)  R: {}  W: {}",
                human(d.used_bytes),
                human(d.total_bytes),
                d.percent,
                human_rate(rates.0),
                human_rate(rates.1)
            ),
        ),
        None => (0, NA.to_string()),
    };
    let g = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Disk"))
        .gauge_style(Style::default().fg(usage_color(pct)))
        .percent(pct)
        .label(label);
    f.render_widget(g, area);
}

pub fn draw_disks(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&Sample>) {
    f.render_widget(Block::default().borders(Borders::ALL).title("Volumes"), area);

    let inner = Rect {
        x: area.x + 1,
        y: area.y + 1,
        width: area.width.saturating_sub(2),
        height: area.height.saturating_sub(2),
    };
    if inner.height == 0 { return; }

    let Some(disk) = m.and_then(|s| s.disk.as_ref()) else {
        f.render_widget(Paragraph::new(NA), inner);
        return;
    };
    if inner.height < 3 { return; }

    let per_disk_h = 3u16;
    let max_cards = (inner.height / per_disk_h).min(disk.volumes.len() as u16) as usize;

    let constraints: Vec<Constraint> = (0..max_cards).map(|_| Constraint::Length(per_disk_h)).collect();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    for (v, slot) in disk.volumes.iter().zip(rows.iter()) {
        let ratio = if v.total_bytes > 0 { v.used_bytes as f64 / v.total_bytes as f64 } else { 0.0 };
        let pct = (ratio * 100.0).round().min(100.0) as u16;

        let title = format!(
            "{} {} on {} [{}]   {} / {}  ({}%)",
            disk_icon(&v.name),
            truncate_middle(&v.name, (slot.width.saturating_sub(6)) as usize / 3),
            truncate_middle(&v.mount_point, (slot.width.saturating_sub(6)) as usize / 3),
            v.file_system,
            human(v.used_bytes),
            human(v.total_bytes),
            pct
        );

        let card = Block::default().borders(Borders::ALL).title(title);
        f.render_widget(card, *slot);

        let inner_card = Rect {
            x: slot.x + 1,
            y: slot.y + 1,
            width: slot.width.saturating_sub(2),
            height: slot.height.saturating_sub(2),
        };
        if inner_card.height == 0 { continue; }

        let gauge_rect = Rect {
            x: inner_card.x,
            y: inner_card.y + inner_card.height / 2,
            width: inner_card.width,
            height: 1,
        };

        let g = Gauge::default()
            .percent(pct)
            .gauge_style(Style::default().fg(usage_color(pct)));

        f.render_widget(g, gauge_rect);
    }
}
