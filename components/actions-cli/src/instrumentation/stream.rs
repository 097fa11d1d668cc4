//! Console streams the shell writes to.
//!
//! Production runs use the process stdout/stderr. Embedders (and the
//! integration tests) can swap either stream for an in-memory buffer.

// External crates
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

/// Destination of console output.
#[derive(Debug, Clone, Default)]
pub enum Stream {
    #[default]
    Stdout,
    Stderr,
    Captured(Arc<Mutex<Vec<u8>>>),
}

impl Stream {
    /// A stream that collects everything written to it in memory.
    pub fn captured() -> Self {
        Stream::Captured(Arc::new(Mutex::new(Vec::new())))
    }

    /// Everything written so far to a captured stream. Empty for process streams.
    pub fn contents(&self) -> String {
        match self {
            Stream::Captured(buffer) => {
                let buffer = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                String::from_utf8_lossy(&buffer).into_owned()
            }
            _ => String::new(),
        }
    }

    /// Write a chunk of text directly (outside of the logging pipeline).
    pub fn write_str(&self, text: &str) {
        let mut writer = self.make_writer();
        // Nothing sensible to do when the console itself is gone.
        let _ = writer.write_all(text.as_bytes());
        let _ = writer.flush();
    }
}

/// Writer handed out by [`Stream`] for one record.
#[derive(Debug)]
pub enum StreamWriter<'a> {
    Stdout(io::StdoutLock<'static>),
    Stderr(io::StderrLock<'static>),
    Captured(MutexGuard<'a, Vec<u8>>),
}

impl io::Write for StreamWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            StreamWriter::Stdout(out) => out.write(buf),
            StreamWriter::Stderr(err) => err.write(buf),
            StreamWriter::Captured(buffer) => buffer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            StreamWriter::Stdout(out) => out.flush(),
            StreamWriter::Stderr(err) => err.flush(),
            StreamWriter::Captured(_) => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for Stream {
    type Writer = StreamWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match self {
            Stream::Stdout => StreamWriter::Stdout(io::stdout().lock()),
            Stream::Stderr => StreamWriter::Stderr(io::stderr().lock()),
            Stream::Captured(buffer) => {
                StreamWriter::Captured(buffer.lock().unwrap_or_else(PoisonError::into_inner))
            }
        }
    }
}

/// The pair of console streams a shell invocation writes to.
#[derive(Debug, Clone)]
pub struct ShellIo {
    pub stdout: Stream,
    pub stderr: Stream,
}

impl ShellIo {
    /// Both streams captured in memory.
    pub fn captured() -> Self {
        Self {
            stdout: Stream::captured(),
            stderr: Stream::captured(),
        }
    }
}

impl Default for ShellIo {
    fn default() -> Self {
        Self {
            stdout: Stream::Stdout,
            stderr: Stream::Stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_stream_keeps_written_text() {
        let stream = Stream::captured();
        stream.write_str("first\n");
        stream.write_str("second\n");

        assert_eq!(stream.contents(), "first\nsecond\n");
    }

    #[test]
    fn clones_share_the_same_buffer() {
        let stream = Stream::captured();
        let clone = stream.clone();
        clone.write_str("shared");

        assert_eq!(stream.contents(), "shared");
    }
}
