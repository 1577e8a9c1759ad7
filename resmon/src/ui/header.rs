//! Top header: host, sample time, tick count, elapsed time and output file.

use std::path::Path;

use ratatui::{
    layout::Rect,
    widgets::{Block, Borders},
};
use resmon_core::Sample;

use crate::ui::util::clock;

pub fn draw_header(f: &mut ratatui::Frame<'_>, area: Rect, host: &str, output: &Path, m: Option<&Sample>) {
    let file = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.display().to_string());
    let title = if let Some(s) = m {
        format!(
            "resmon | host: {host} | {} | tick {} | elapsed {} | {file}  (press 'q' to quit)",
            s.wall.format("%H:%M:%S"),
            s.seq,
            clock(s.elapsed)
        )
    } else {
        format!("resmon | host: {host} | waiting for first sample... | {file}  (press 'q' to quit)")
    };
    f.render_widget(Block::default().title(title).borders(Borders::BOTTOM), area);
}
