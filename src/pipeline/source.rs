//! Reading source abstraction for kiln telemetry ingestion.
//!
//! One source per process instance; the processing loop is its single
//! consumer. Sources: newline-delimited JSON on stdin, an mpsc channel fed by
//! an upstream transport, and an in-memory replay.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::mpsc;

use crate::types::SensorReading;

/// Events produced by a reading source.
#[derive(Debug)]
pub enum ReadingEvent {
    Reading(Box<SensorReading>),
    /// No more data (EOF, sender dropped, replay exhausted)
    Eof,
}

/// Where readings come from. Called in a `select!` with cancellation.
#[async_trait]
pub trait ReadingSource: Send + 'static {
    /// Next reading, or `Eof`. `Err` only on unrecoverable source failure.
    async fn next_reading(&mut self) -> Result<ReadingEvent>;

    fn source_name(&self) -> &str;
}

// ============================================================================
// Replay Source
// ============================================================================

/// Replays pre-loaded readings with an optional inter-reading delay.
pub struct ReplaySource {
    readings: std::vec::IntoIter<SensorReading>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(readings: Vec<SensorReading>, delay_ms: u64) -> Self {
        Self {
            readings: readings.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    /// Load an NDJSON file. Malformed lines are skipped with a warning.
    pub fn from_ndjson(contents: &str, delay_ms: u64) -> Self {
        let readings = contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .filter_map(|line| match parse_line(line) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!("[ReplaySource] Skipping malformed reading: {}", e);
                    None
                }
            })
            .collect();
        Self::new(readings, delay_ms)
    }
}

#[async_trait]
impl ReadingSource for ReplaySource {
    async fn next_reading(&mut self) -> Result<ReadingEvent> {
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.readings.next() {
            Some(r) => {
                self.yielded_first = true;
                Ok(ReadingEvent::Reading(Box::new(r)))
            }
            None => Ok(ReadingEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Line Source (JSON readings, one per line)
// ============================================================================

/// NDJSON readings from any buffered reader. Lines that are not UTF-8 or not
/// a valid reading are dropped; only an I/O failure ends the stream.
pub struct LineSource<R> {
    reader: R,
    line_buffer: Vec<u8>,
    name: &'static str,
}

/// `kiln-simulator | kiln-agent`
pub type StdinSource = LineSource<BufReader<Stdin>>;

impl StdinSource {
    pub fn new() -> Self {
        LineSource::from_reader(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn from_reader(reader: R, name: &'static str) -> Self {
        Self {
            reader,
            line_buffer: Vec::with_capacity(1024),
            name,
        }
    }
}

#[async_trait]
impl<R> ReadingSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_reading(&mut self) -> Result<ReadingEvent> {
        loop {
            self.line_buffer.clear();
            let bytes = self.reader.read_until(b'\n', &mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(ReadingEvent::Eof);
            }
            let line = match std::str::from_utf8(&self.line_buffer) {
                Ok(line) => line.trim(),
                Err(e) => {
                    tracing::warn!("[{}] Dropping non-UTF-8 line: {}", self.name, e);
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(r) => return Ok(ReadingEvent::Reading(Box::new(r))),
                Err(e) => {
                    // Malformed messages are dropped, the stream continues
                    tracing::warn!("[{}] Failed to parse reading: {}", self.name, e);
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        self.name
    }
}

// ============================================================================
// Channel Source
// ============================================================================

/// Receives readings pushed by an in-process transport.
pub struct ChannelSource {
    rx: mpsc::Receiver<SensorReading>,
}

impl ChannelSource {
    pub fn new(rx: mpsc::Receiver<SensorReading>) -> Self {
        Self { rx }
    }

    /// Bounded channel plus its source. Senders get backpressure when full.
    pub fn channel(capacity: usize) -> (mpsc::Sender<SensorReading>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl ReadingSource for ChannelSource {
    async fn next_reading(&mut self) -> Result<ReadingEvent> {
        Ok(match self.rx.recv().await {
            Some(r) => ReadingEvent::Reading(Box::new(r)),
            None => ReadingEvent::Eof,
        })
    }

    fn source_name(&self) -> &str {
        "channel"
    }
}

fn parse_line(line: &str) -> serde_json::Result<SensorReading> {
    serde_json::from_str(line)
}
