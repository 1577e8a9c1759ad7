//! Append-only CSV log of samples.
//!
//! Rows are fully formatted before they reach the buffer, so the file only
//! ever grows by whole rows. The header is written once, when the file is
//! empty. Nothing already on disk is rewritten: an existing log must start
//! with our header, and a torn last line is terminated before new rows.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::SecondsFormat;
use tracing::{debug, info, warn};

use crate::config::FlushPolicy;
use crate::error::{RecorderError, SinkError};
use crate::sink::{SampleSink, SinkKind};
use crate::types::Sample;

pub const CSV_HEADER: &str = "timestamp,cpu_percent,mem_used_bytes,mem_total_bytes,mem_percent,disk_used_bytes,disk_total_bytes,disk_percent,disk_read_delta,disk_write_delta,gpu_percent,gpu_mem_used,gpu_mem_total,gpu_temp_c";

pub struct Recorder {
    path: PathBuf,
    out: Option<BufWriter<File>>,
    policy: FlushPolicy,
    needs_header: bool,
    needs_newline: bool,
    pending_rows: usize,
    last_flush: Instant,
    rows_written: u64,
}

impl Recorder {
    pub fn open(path: impl AsRef<Path>, policy: FlushPolicy) -> Result<Self, RecorderError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| RecorderError::Open {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(open_err)?;
        let existing = file.metadata().map_err(open_err)?.len();
        let mut needs_newline = false;
        if existing > 0 {
            let tail = inspect_existing(&mut file).map_err(open_err)?;
            if !tail.header_matches {
                return Err(RecorderError::NotALog { path });
            }
            needs_newline = !tail.ends_with_newline;
            if needs_newline {
                warn!(path = %path.display(), "existing log ends mid-row; starting on a new line");
            }
            info!(path = %path.display(), bytes = existing, "appending to existing log");
        }
        Ok(Self {
            out: Some(BufWriter::new(file)),
            needs_header: existing == 0,
            needs_newline,
            policy,
            pending_rows: 0,
            last_flush: Instant::now(),
            rows_written: 0,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn record(&mut self, sample: &Sample) -> Result<(), RecorderError> {
        let mut chunk = String::with_capacity(160);
        if self.needs_newline {
            chunk.push('\n');
        }
        if self.needs_header {
            chunk.push_str(CSV_HEADER);
            chunk.push('\n');
        }
        format_row(sample, &mut chunk);

        let out = self.out.as_mut().ok_or(RecorderError::Closed)?;
        out.write_all(chunk.as_bytes()).map_err(|source| RecorderError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.needs_header = false;
        self.needs_newline = false;
        self.rows_written += 1;
        self.pending_rows += 1;

        if self.pending_rows >= self.policy.max_rows
            || self.last_flush.elapsed() >= self.policy.max_age
        {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), RecorderError> {
        let out = self.out.as_mut().ok_or(RecorderError::Closed)?;
        out.flush().map_err(|source| RecorderError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(rows = self.pending_rows, "recorder flushed");
        self.pending_rows = 0;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Final flush and sync. Further writes fail with `Closed`.
    pub fn close(&mut self) -> Result<(), RecorderError> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        let write_err = |source| RecorderError::Write {
            path: self.path.clone(),
            source,
        };
        out.flush().map_err(write_err)?;
        out.get_ref().sync_data().map_err(write_err)?;
        info!(path = %self.path.display(), rows = self.rows_written, "recorder closed");
        Ok(())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = out.flush() {
                warn!(path = %self.path.display(), "flush on drop failed: {e}");
            }
        }
    }
}

impl SampleSink for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Durable
    }

    fn accept(&mut self, sample: &Arc<Sample>) -> Result<(), SinkError> {
        Ok(self.record(sample)?)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        Ok(Recorder::close(self)?)
    }
}

struct ExistingLog {
    header_matches: bool,
    ends_with_newline: bool,
}

/// Check the first line and the last byte of a non-empty log.
fn inspect_existing(file: &mut File) -> io::Result<ExistingLog> {
    let mut first = Vec::with_capacity(CSV_HEADER.len() + 2);
    BufReader::new(&mut *file)
        .take(CSV_HEADER.len() as u64 + 2)
        .read_until(b'\n', &mut first)?;
    while matches!(first.last(), Some(b'\n' | b'\r')) {
        first.pop();
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(ExistingLog {
        header_matches: first == CSV_HEADER.as_bytes(),
        ends_with_newline: last[0] == b'\n',
    })
}

/// Append one CSV line for `s`. Absent readings are empty cells.
pub fn format_row(s: &Sample, line: &mut String) {
    line.push_str(&s.wall.to_rfc3339_opts(SecondsFormat::Millis, false));

    let cpu = s.cpu.as_ref();
    cell_f32(line, cpu.map(|c| c.utilization_percent));

    let mem = s.memory.as_ref();
    cell_u64(line, mem.map(|m| m.used_bytes));
    cell_u64(line, mem.map(|m| m.total_bytes));
    cell_f32(line, mem.map(|m| m.percent));

    let disk = s.disk.as_ref();
    cell_u64(line, disk.map(|d| d.used_bytes));
    cell_u64(line, disk.map(|d| d.total_bytes));
    cell_f32(line, disk.map(|d| d.percent));
    cell_u64(line, disk.and_then(|d| d.read_bytes_delta));
    cell_u64(line, disk.and_then(|d| d.write_bytes_delta));

    let gpu = s.gpu.as_ref();
    cell_f32(line, gpu.and_then(|g| g.mean_utilization()));
    cell_u64(line, gpu.map(|g| g.memory_used()));
    cell_u64(line, gpu.map(|g| g.memory_total()));
    cell_f32(line, gpu.and_then(|g| g.max_temperature()));

    line.push('\n');
}

fn cell_f32(line: &mut String, v: Option<f32>) {
    line.push(',');
    if let Some(v) = v {
        let _ = write!(line, "{v:.2}");
    }
}

fn cell_u64(line: &mut String, v: Option<u64>) {
    line.push(',');
    if let Some(v) = v {
        let _ = write!(line, "{v}");
    }
}
