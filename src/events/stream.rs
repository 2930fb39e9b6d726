//! Per-host event streams.
//!
//! Each host has an append-only local file of single-line structured events
//! fed by a background reader from the live remote feed. The engine only
//! ever reads complete lines; a partial trailing line stays pending until
//! its newline arrives.

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::debug;

use crate::Result;

/// Line-buffered reader over one host's event file. The writer side is the
/// background feeder (single writer); this reader runs on the orchestration
/// thread only, so no locking is needed here.
pub struct EventStream {
    path: PathBuf,
    offset: u64,
    pending: String,
    lines: Vec<String>,
}

impl EventStream {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            pending: String::new(),
            lines: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pull newly appended bytes into the line buffer. Returns the number
    /// of complete lines added. A missing file just means the feeder has
    /// not produced anything yet.
    pub fn refresh(&mut self) -> Result<usize> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(self.offset))?;
        let mut chunk = String::new();
        let read = file.read_to_string(&mut chunk)?;
        if read == 0 {
            return Ok(0);
        }
        self.offset += read as u64;

        let mut added = 0;
        self.pending.push_str(&chunk);
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            self.lines.push(line.trim_end().to_string());
            added += 1;
        }
        Ok(added)
    }

    /// All complete lines seen so far, in stream order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// Background copier from a live event source into the local stream file.
/// Single writer per file; the orchestration thread may inject marker lines
/// through the shared sink.
pub struct EventFeeder {
    sink: Arc<Mutex<File>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EventFeeder {
    /// Spawn a thread that appends everything `source` produces to `path`.
    pub fn spawn(mut source: Box<dyn Read + Send>, path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let sink = Arc::new(Mutex::new(file));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_sink = Arc::clone(&sink);
        let thread_stop = Arc::clone(&stop);
        let path_for_log = path.display().to_string();
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }
                match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let mut file = thread_sink.lock();
                        if file.write_all(&buf[..n]).and_then(|_| file.flush()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
            debug!(path = path_for_log, "event feeder finished");
        });

        Ok(Self {
            sink,
            stop,
            handle: Some(handle),
        })
    }

    /// Append a marker line to the stream from the orchestration thread.
    pub fn inject(&self, line: &str) -> Result<()> {
        let mut file = self.sink.lock();
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventFeeder {
    fn drop(&mut self) {
        self.stop();
    }
}
