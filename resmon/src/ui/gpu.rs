use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Span,
    widgets::{Block, Borders, Gauge, Paragraph},
};
use resmon_core::Sample;

use crate::ui::util::{human, NA};

pub fn draw_gpu(f: &mut ratatui::Frame<'_>, area: Rect, m: Option<&Sample>) {
    let mut area = area;
    let block = Block::default().borders(Borders::ALL).title("GPU");
    f.render_widget(block, area);

    // Guard: need some space inside the block
    if area.height <= 2 || area.width <= 2 {
        return;
    }

    area.y += 1;
    area.height = area.height.saturating_sub(2);
    area.x += 1;
    area.width = area.width.saturating_sub(2);

    let Some(gpus) = m.and_then(|s| s.gpu.as_ref()).filter(|g| !g.devices.is_empty()) else {
        f.render_widget(Paragraph::new(NA), area);
        return;
    };

    // Show 3 rows per GPU: name, util bar, vram bar.
    if area.height < 3 {
        return;
    }
    let per_gpu_rows: u16 = 3;
    let max_gpus = (area.height / per_gpu_rows) as usize;
    let count = gpus.devices.len().min(max_gpus);

    let constraints = vec![Constraint::Length(1); count * per_gpu_rows as usize];
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    // Per bar horizontal layout: [gauge] [value]
    let split_bar = |r: Rect| {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(8),     // gauge column
                Constraint::Length(24), // value column
            ])
            .split(r)
    };

    for (i, g) in gpus.devices.iter().take(count).enumerate() {
        let temp = g
            .temperature_celsius
            .map(|t| format!("{t:.0}°C"))
            .unwrap_or_else(|| NA.into());
        f.render_widget(
            Paragraph::new(Span::raw(format!("#{} {}  temp: {temp}", g.index, g.name)))
                .style(Style::default().fg(Color::Gray)),
            rows[i * 3],
        );

        let util_cols = split_bar(rows[i * 3 + 1]);
        let util = g.utilization_percent.clamp(0.0, 100.0);
        let util_gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::Green))
            .label(Span::raw(""))
            .ratio(util as f64 / 100.0);
        f.render_widget(util_gauge, util_cols[0]);
        f.render_widget(
            Paragraph::new(Span::raw(format!("util: {util:.0}%")))
                .style(Style::default().fg(Color::Gray)),
            util_cols[1],
        );

        let mem_cols = split_bar(rows[i * 3 + 2]);
        let used = g.memory_used_bytes;
        let total = g.memory_total_bytes.max(1);
        let mem_ratio = (used as f64 / total as f64).min(1.0);
        let mem_pct = (mem_ratio * 100.0).round() as u16;

        let mem_gauge = Gauge::default()
            .gauge_style(Style::default().fg(Color::LightMagenta))
            .label(Span::raw(""))
            .ratio(mem_ratio);
        f.render_widget(mem_gauge, mem_cols[0]);
        let used_s = human(used);
        let total_s = human(g.memory_total_bytes);
        f.render_widget(
            Paragraph::new(Span::raw(format!("vram: {used_s}/{total_s} ({mem_pct}%)")))
                .style(Style::default().fg(Color::Gray)),
            mem_cols[1],
        );
    }
}
