//! App state and main loop: input handling, following the sample feed, updating history, and drawing.

use std::{
    collections::VecDeque,
    io,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    Terminal,
};
use resmon_core::{DisplayReceiver, Sample, StopHandle};
use tracing::debug;

use crate::history::{push_capped, PerCoreHistory, RollingStats};
use crate::ui::cpu::{draw_cpu_avg_graph, draw_per_core_bars};
use crate::ui::{
    disks::{draw_disk_summary, draw_disks},
    gpu::draw_gpu,
    header::draw_header,
    mem::draw_mem,
};

const HIST_CAP: usize = 600;
const STATS_WINDOW: usize = 60;

pub struct App {
    host: String,
    output: PathBuf,
    interval: Duration,

    // Latest sample + histories
    last: Option<Arc<Sample>>,
    cpu_hist: VecDeque<u64>,
    cpu_stats: RollingStats,
    per_core_hist: PerCoreHistory,
    // bytes/s derived from the last disk deltas
    disk_rates: (Option<f64>, Option<f64>),
    // elapsed time of the previous disk reading; deltas span back to it
    last_disk_at: Option<Duration>,

    should_quit: bool,
}

impl App {
    pub fn new(host: String, output: PathBuf, interval: Duration) -> Self {
        Self {
            host,
            output,
            interval,
            last: None,
            cpu_hist: VecDeque::with_capacity(HIST_CAP),
            cpu_stats: RollingStats::new(STATS_WINDOW),
            per_core_hist: PerCoreHistory::new(60),
            disk_rates: (None, None),
            last_disk_at: None,
            should_quit: false,
        }
    }

    /// Own the terminal until the feed closes or the user asks to quit.
    pub async fn run(&mut self, feed: DisplayReceiver, stop: StopHandle) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let res = self.event_loop(&mut terminal, feed, &stop).await;

        // Teardown runs even if the loop failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        res
    }

    async fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        mut feed: DisplayReceiver,
        stop: &StopHandle,
    ) -> io::Result<()> {
        loop {
            // Input (non-blocking)
            while event::poll(Duration::from_millis(10))? {
                if let Event::Key(k) = event::read()? {
                    if k.kind != KeyEventKind::Release && is_quit_key(k.code, k.modifiers) {
                        self.should_quit = true;
                    }
                }
            }
            if self.should_quit {
                debug!("quit requested from the terminal");
                stop.stop();
                break;
            }

            match feed.has_changed() {
                Ok(true) => {
                    let latest = feed.borrow_and_update().clone();
                    if let Some(sample) = latest {
                        self.update_with_sample(sample);
                    }
                }
                Ok(false) => {}
                // feed closed: the session is over
                Err(_) => break,
            }

            terminal.draw(|f| self.draw(f))?;

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    pub fn update_with_sample(&mut self, s: Arc<Sample>) {
        if let Some(cpu) = s.cpu.as_ref() {
            let v = cpu.utilization_percent.clamp(0.0, 100.0);
            push_capped(&mut self.cpu_hist, v.round() as u64, HIST_CAP);
            self.cpu_stats.push(v);
            self.per_core_hist.push_samples(&cpu.per_core);
        }

        self.disk_rates = match s.disk.as_ref() {
            Some(d) => {
                let secs = self.disk_span(s.elapsed).as_secs_f64().max(1e-6);
                self.last_disk_at = Some(s.elapsed);
                (
                    d.read_bytes_delta.map(|b| b as f64 / secs),
                    d.write_bytes_delta.map(|b| b as f64 / secs),
                )
            }
            None => (None, None),
        };

        self.last = Some(s);
    }

    /// Time covered by a disk delta read at `now`: back to the previous disk
    /// reading, which is more than one interval when ticks were skipped.
    fn disk_span(&self, now: Duration) -> Duration {
        match self.last_disk_at {
            Some(prev) if now > prev => now - prev,
            _ => self.interval,
        }
    }

    pub fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let area = f.area();
        let m = self.last.as_deref();

        // Root rows: header, cpu, memory, disk summary, volumes
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),   // header
                Constraint::Ratio(1, 3), // cpu avg + per-core
                Constraint::Length(3),   // memory (left) + GPU (right, part 1)
                Constraint::Length(3),   // disk   (left) + GPU (right, part 2)
                Constraint::Min(4),      // volumes
            ])
            .split(area);

        draw_header(f, rows[0], &self.host, &self.output, m);

        let top_lr = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
            .split(rows[1]);
        draw_cpu_avg_graph(f, top_lr[0], &self.cpu_hist, &self.cpu_stats, m);
        draw_per_core_bars(f, top_lr[1], m, &self.per_core_hist);

        let mem_lr = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
            .split(rows[2]);
        let disk_lr = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(66), Constraint::Percentage(34)])
            .split(rows[3]);

        draw_mem(f, mem_lr[0], m);
        draw_disk_summary(f, disk_lr[0], m, self.disk_rates);

        // GPU spans the same vertical space as Memory + Disk
        let gpu_area = Rect {
            x: mem_lr[1].x,
            y: mem_lr[1].y,
            width: mem_lr[1].width,
            height: mem_lr[1].height + disk_lr[1].height,
        };
        draw_gpu(f, gpu_area, m);

        draw_disks(f, rows[4], m);
    }
}

fn is_quit_key(code: KeyCode, mods: KeyModifiers) -> bool {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        KeyCode::Char('c') => mods.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use ratatui::backend::TestBackend;
    use resmon_core::{CpuMetric, DiskMetric, GpuDevice, GpuMetric, MemMetric, VolumeUsage};

    fn render(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    fn app() -> App {
        App::new("testhost".into(), PathBuf::from("/tmp/run.csv"), Duration::from_secs(1))
    }

    fn sample(seq: u64) -> Sample {
        Sample::empty(seq, Duration::from_secs(seq), Local::now())
    }

    #[test]
    fn waiting_screen_before_first_sample() {
        let text = render(&mut app());
        assert!(text.contains("waiting for first sample"));
        assert!(text.contains("run.csv"));
    }

    #[test]
    fn absent_fields_render_as_na() {
        let mut a = app();
        a.update_with_sample(Arc::new(sample(3)));
        let text = render(&mut a);
        assert!(text.contains("tick 3"));
        assert!(text.contains("now: N/A"));
        assert!(text.matches("N/A").count() >= 4, "{text}");
    }

    #[test]
    fn populated_sample_shows_every_panel() {
        let mut s = sample(7);
        s.cpu = Some(CpuMetric {
            utilization_percent: 42.0,
            per_core: vec![40.0, 44.0],
        });
        s.memory = Some(MemMetric {
            used_bytes: 2 * 1024 * 1024 * 1024,
            total_bytes: 8 * 1024 * 1024 * 1024,
            percent: 25.0,
        });
        s.disk = Some(DiskMetric {
            used_bytes: 50,
            total_bytes: 100,
            percent: 50.0,
            read_bytes_delta: Some(2048),
            write_bytes_delta: Some(0),
            volumes: vec![VolumeUsage {
                name: "sda1".into(),
                mount_point: "/".into(),
                file_system: "ext4".into(),
                used_bytes: 50,
                total_bytes: 100,
            }],
        });
        s.gpu = Some(GpuMetric {
            devices: vec![GpuDevice {
                index: 0,
                name: "Test GPU".into(),
                utilization_percent: 12.0,
                memory_used_bytes: 1024,
                memory_total_bytes: 4096,
                temperature_celsius: Some(55.0),
            }],
        });
        let mut a = app();
        a.update_with_sample(Arc::new(s));
        let text = render(&mut a);
        assert!(text.contains("now: 42.0%"));
        assert!(text.contains("cpu1"));
        assert!(text.contains("2.0GB / 8.0GB"));
        assert!(text.contains("R: 2.0KB/s"));
        assert!(text.contains("sda1"));
        assert!(text.contains("Test GPU"));
        assert!(text.contains("55°C"));
    }

    #[test]
    fn rolling_stats_skip_absent_cpu_ticks() {
        let mut a = app();
        for (seq, v) in [(0, Some(10.0)), (1, None), (2, Some(30.0))] {
            let mut s = sample(seq);
            s.cpu = v.map(|u| CpuMetric {
                utilization_percent: u,
                per_core: vec![],
            });
            a.update_with_sample(Arc::new(s));
        }
        assert_eq!(a.cpu_stats.avg(), Some(20.0));
        assert_eq!(a.cpu_hist.len(), 2);
    }

    fn disk_sample(seq: u64, read: u64) -> Sample {
        let mut s = sample(seq);
        s.disk = Some(DiskMetric {
            used_bytes: 1,
            total_bytes: 2,
            percent: 50.0,
            read_bytes_delta: Some(read),
            write_bytes_delta: None,
            volumes: vec![],
        });
        s
    }

    #[test]
    fn disk_rate_spans_skipped_ticks() {
        let mut a = app();
        a.update_with_sample(Arc::new(disk_sample(0, 0)));
        a.update_with_sample(Arc::new(disk_sample(1, 1000)));
        assert_eq!(a.disk_rates, (Some(1000.0), None));

        // ticks 2 and 3 were skipped: the delta covers three seconds
        a.update_with_sample(Arc::new(disk_sample(4, 3000)));
        assert_eq!(a.disk_rates, (Some(1000.0), None));

        // a tick without disk data stretches the next span too
        a.update_with_sample(Arc::new(sample(5)));
        assert_eq!(a.disk_rates, (None, None));
        a.update_with_sample(Arc::new(disk_sample(6, 4000)));
        assert_eq!(a.disk_rates, (Some(2000.0), None));
    }

    #[test]
    fn quit_keys() {
        assert!(is_quit_key(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(is_quit_key(KeyCode::Esc, KeyModifiers::NONE));
        assert!(is_quit_key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(!is_quit_key(KeyCode::Char('c'), KeyModifiers::NONE));
    }
}
