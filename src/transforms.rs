//! The built-in stage library and the name-resolution boundary.
//!
//! Each transform mirrors one plugin of the analyzer: four pure byte-level
//! rewrites (`uppercaser`, `rotator`, `flipper`, `expander`) and two
//! printing stages (`logger`, `typewriter`). Transforms operate on raw byte
//! buffers, so non-UTF-8 input flows through unchanged. Printing stages
//! perform their side effect inside [`Transform::apply`] and pass the line
//! through untouched, so they compose anywhere in a chain.

use crate::error::{PipelineError, Result};
use crate::stage::Transform;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default per-character delay of the typewriter stage
pub const TYPEWRITER_DELAY: Duration = Duration::from_millis(100);

fn write_failed(err: io::Error) -> PipelineError {
    PipelineError::TransformFailed(err.to_string())
}

/// Converts ASCII lowercase letters to uppercase; other bytes pass through
pub struct Uppercaser;

impl Transform for Uppercaser {
    fn name(&self) -> &str {
        "uppercaser"
    }

    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        let mut out = input;
        out.make_ascii_uppercase();
        Ok(out)
    }
}

/// Rotates the line right by one: the last byte moves to the front
pub struct Rotator;

impl Transform for Rotator {
    fn name(&self) -> &str {
        "rotator"
    }

    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        let mut out = input;
        if out.len() > 1 {
            out.rotate_right(1);
        }
        Ok(out)
    }
}

/// Reverses the order of bytes
pub struct Flipper;

impl Transform for Flipper {
    fn name(&self) -> &str {
        "flipper"
    }

    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        let mut out = input;
        out.reverse();
        Ok(out)
    }
}

/// Inserts a single space between adjacent bytes
pub struct Expander;

impl Transform for Expander {
    fn name(&self) -> &str {
        "expander"
    }

    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        if input.len() <= 1 {
            return Ok(input);
        }
        let mut out = Vec::with_capacity(input.len() * 2 - 1);
        for (i, byte) in input.iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            out.push(*byte);
        }
        Ok(out)
    }
}

/// Prints `[logger] <line>` to its sink and passes the line through.
///
/// The whole line goes out in a single write so lines from concurrently
/// printing stages cannot interleave mid-line.
pub struct Logger {
    sink: Box<dyn Write + Send>,
}

impl Logger {
    /// A logger printing to standard output
    pub fn new() -> Self {
        Self::with_sink(Box::new(io::stdout()))
    }

    /// A logger printing to an arbitrary sink (used by tests)
    pub fn with_sink(sink: Box<dyn Write + Send>) -> Self {
        Self { sink }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Logger {
    fn name(&self) -> &str {
        "logger"
    }

    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        let mut line = Vec::with_capacity(input.len() + 10);
        line.extend_from_slice(b"[logger] ");
        line.extend_from_slice(&input);
        line.push(b'\n');
        self.sink.write_all(&line).map_err(write_failed)?;
        self.sink.flush().map_err(write_failed)?;
        Ok(input)
    }
}

/// Prints `[typewriter] <line>` one byte at a time with a delay per byte,
/// flushing after each, then passes the line through.
pub struct Typewriter {
    sink: Box<dyn Write + Send>,
    delay: Duration,
}

impl Typewriter {
    /// A typewriter printing to standard output at the default pace
    pub fn new() -> Self {
        Self::with_sink(Box::new(io::stdout()), TYPEWRITER_DELAY)
    }

    /// A typewriter with a custom sink and pace (used by tests)
    pub fn with_sink(sink: Box<dyn Write + Send>, delay: Duration) -> Self {
        Self { sink, delay }
    }
}

impl Default for Typewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for Typewriter {
    fn name(&self) -> &str {
        "typewriter"
    }

    fn apply(&mut self, input: Vec<u8>) -> Result<Vec<u8>> {
        for byte in b"[typewriter] ".iter().chain(input.iter()) {
            self.sink
                .write_all(std::slice::from_ref(byte))
                .map_err(write_failed)?;
            self.sink.flush().map_err(write_failed)?;
            thread::sleep(self.delay);
        }
        self.sink.write_all(b"\n").map_err(write_failed)?;
        self.sink.flush().map_err(write_failed)?;
        Ok(input)
    }
}

/// An in-memory `Write` sink that can be read back, for capturing what a
/// printing stage emitted
#[derive(Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, as raw bytes
    pub fn bytes(&self) -> Vec<u8> {
        self.buf.lock().clone()
    }

    /// Everything written so far, lossily decoded for assertions on text
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Resolve a stage name to a fresh transform instance.
///
/// This is the in-process counterpart of the analyzer's dynamic loader:
/// the orchestrator sees only the [`Transform`] contract behind the name.
pub fn resolve(name: &str) -> Option<Box<dyn Transform>> {
    match name {
        "uppercaser" => Some(Box::new(Uppercaser)),
        "rotator" => Some(Box::new(Rotator)),
        "flipper" => Some(Box::new(Flipper)),
        "expander" => Some(Box::new(Expander)),
        "logger" => Some(Box::new(Logger::new())),
        "typewriter" => Some(Box::new(Typewriter::new())),
        _ => None,
    }
}

/// Name/description pairs of every built-in stage, for the usage block
pub fn catalog() -> &'static [(&'static str, &'static str)] {
    &[
        ("logger", "Logs all strings that pass through"),
        ("typewriter", "Simulates typewriter effect with delays"),
        ("uppercaser", "Converts strings to uppercase"),
        (
            "rotator",
            "Moves every character to the right; the last character wraps to the front",
        ),
        ("flipper", "Reverses the order of characters"),
        ("expander", "Expands each character with spaces"),
    ]
}
