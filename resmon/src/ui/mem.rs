//! Memory gauge.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders, Gauge},
};
use resmon_core::Sample;

use crate::ui::util::{human, NA};

pub fn draw_mem(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&Sample>) {
    let (pct, label) = match m.and_then(|s| s.memory.as_ref()) {
        Some(mm) => (
            mm.percent.clamp(0.0, 100.0).round() as u16,
            format!("{} / {}  ({:.1}%)", human(mm.used_bytes), human(mm.total_bytes), mm.percent),
        ),
        None => (0, NA.to_string()),
    };

    let g = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title("Memory"))
        .gauge_style(Style::default().fg(Color::Magenta))
        .percent(pct)
        .label(label);
    f.render_widget(g, area);
}
