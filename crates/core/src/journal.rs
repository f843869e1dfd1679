//! Non-blocking log tail with secret redaction.
//!
//! All tracing output funnels through a bounded queue drained by a single
//! writer thread. Producers never block: when the queue is full the line is
//! dropped. A redaction table performs whole-string replacement on every
//! line before it reaches the sink, so configured secrets (the TMDB key,
//! the Telegram token) never appear in the log.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use tracing_subscriber::fmt::MakeWriter;

/// Default queue depth before lines start being dropped.
pub const DEFAULT_CAPACITY: usize = 128;

enum JournalMsg {
    Line(Vec<u8>),
    Stop,
}

/// Whole-string replacement rules applied to every emitted line.
#[derive(Debug, Clone, Default)]
pub struct RedactTable {
    rules: Vec<(String, String)>,
}

impl RedactTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every occurrence of `secret` with `placeholder`.
    /// Empty or identity rules are ignored.
    pub fn hide(mut self, secret: &str, placeholder: &str) -> Self {
        if !secret.is_empty() && secret != placeholder {
            self.rules.push((secret.to_string(), placeholder.to_string()));
        }
        self
    }

    fn apply(&self, line: &str) -> String {
        let mut line = line.to_string();
        for (old, new) in &self.rules {
            line = line.replace(old, new);
        }
        line
    }

    fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Producer half: hand this to `tracing_subscriber` as the writer.
///
/// Cloning is cheap; every formatted event becomes one queued line.
#[derive(Clone)]
pub struct JournalWriter {
    tx: SyncSender<JournalMsg>,
}

/// Flushes the queue and stops the writer thread when dropped.
/// Keep it alive for the lifetime of the process.
pub struct JournalGuard {
    tx: Option<SyncSender<JournalMsg>>,
    worker: Option<JoinHandle<()>>,
}

/// Create the journal with the given queue capacity, redaction table and
/// sink. Returns the writer for the subscriber and the shutdown guard.
pub fn journal(
    capacity: usize,
    redact: RedactTable,
    output: impl Write + Send + 'static,
) -> (JournalWriter, JournalGuard) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let worker = thread::Builder::new()
        .name("journal".to_string())
        .spawn(move || drain(rx, redact, output))
        .expect("spawning the journal thread");

    (
        JournalWriter { tx: tx.clone() },
        JournalGuard { tx: Some(tx), worker: Some(worker) },
    )
}

/// Journal writing to stdout, for the common case.
pub fn stdout_journal(redact: RedactTable) -> (JournalWriter, JournalGuard) {
    journal(DEFAULT_CAPACITY, redact, io::stdout())
}

fn drain(rx: Receiver<JournalMsg>, redact: RedactTable, mut output: impl Write) {
    while let Ok(msg) = rx.recv() {
        match msg {
            JournalMsg::Line(line) => write_line(&mut output, &redact, line),
            JournalMsg::Stop => break,
        }
    }
    // Emit whatever was queued behind the stop marker, then exit. Senders
    // fail from here on and their lines are silently discarded.
    while let Ok(JournalMsg::Line(line)) = rx.try_recv() {
        write_line(&mut output, &redact, line);
    }
    let _ = output.flush();
}

fn write_line(output: &mut impl Write, redact: &RedactTable, line: Vec<u8>) {
    if redact.is_empty() {
        let _ = output.write_all(&line);
        return;
    }
    let line = redact.apply(&String::from_utf8_lossy(&line));
    let _ = output.write_all(line.as_bytes());
}

impl Drop for JournalGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(JournalMsg::Stop);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// One formatted event being accumulated before enqueueing.
pub struct JournalLine {
    tx: SyncSender<JournalMsg>,
    buf: Vec<u8>,
}

impl Write for JournalLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let line = std::mem::take(&mut self.buf);
        match self.tx.try_send(JournalMsg::Line(line)) {
            Ok(()) => {}
            // Queue full or writer gone: drop the line, never block the
            // producer.
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {}
        }
        Ok(())
    }
}

impl Drop for JournalLine {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for JournalWriter {
    type Writer = JournalLine;

    fn make_writer(&'a self) -> Self::Writer {
        JournalLine { tx: self.tx.clone(), buf: Vec::new() }
    }
}
