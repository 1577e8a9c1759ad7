//! Small UI helpers: human-readable sizes, durations, truncation, icons.

use std::time::Duration;

pub const NA: &str = "N/A";

pub fn human(b: u64) -> String {
    const K: f64 = 1024.0;
    let b = b as f64;
    if b < K { return format!("{b:.0}B"); }
    let kb = b / K;
    if kb < K { return format!("{kb:.1}KB"); }
    let mb = kb / K;
    if mb < K { return format!("{mb:.1}MB"); }
    let gb = mb / K;
    if gb < K { return format!("{gb:.1}GB"); }
    let tb = gb / K;
    format!("{tb:.2}TB")
}

pub fn human_rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(r) => format!("{}/s", human(r.max(0.0).round() as u64)),
        None => NA.into(),
    }
}

pub fn pct_or_na(v: Option<f32>) -> String {
    v.map(|p| format!("{p:.1}%")).unwrap_or_else(|| NA.into())
}

/// HH:MM:SS, hours unbounded.
pub fn clock(d: Duration) -> String {
    let s = d.as_secs();
    format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60)
}

pub fn truncate_middle(s: &str, max: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max { return s.to_string(); }
    if max <= 3 { return "...".into(); }
    let keep = max - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    format!("{head}...{tail}")
}

pub fn disk_icon(name: &str) -> &'static str {
    let n = name.to_ascii_lowercase();
    if n.contains(':') { "🗄️" }
    else if n.contains("nvme") { "⚡" }
    else if n.starts_with("sd") || n.contains("/dev/sd") { "💽" }
    else if n.contains("overlay") { "📦" }
    else { "🖴" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_rates() {
        assert_eq!(human(512), "512B");
        assert_eq!(human(1536), "1.5KB");
        assert_eq!(human_rate(Some(2048.0)), "2.0KB/s");
        assert_eq!(human_rate(None), "N/A");
    }

    #[test]
    fn clock_formats_long_runs() {
        assert_eq!(clock(Duration::from_secs(59)), "00:00:59");
        assert_eq!(clock(Duration::from_secs(3 * 3600 + 61)), "03:01:01");
    }

    #[test]
    fn truncate_keeps_both_ends() {
        assert_eq!(truncate_middle("/dev/nvme0n1p1", 9), "/de...1p1");
        assert_eq!(truncate_middle("sda", 9), "sda");
        assert_eq!(truncate_middle("ünïcödé-volume", 7), "ün...me");
    }
}
