//! Log output while the display owns the terminal
//!
//! Raw mode turns stray stderr writes into garbage over the plot, so log
//! records are held back and shown in a pane instead, then replayed once the
//! terminal is restored.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lines kept while capturing
const CAPTURED_LINES: usize = 500;

#[derive(Debug, Default)]
struct Captured {
    active: bool,
    lines: VecDeque<String>,
    partial: Vec<u8>,
}

/// Log target that passes through to stderr unless capture is on
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    inner: Arc<Mutex<Captured>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hold log lines back from stderr
    pub fn start(&self) {
        self.lock().active = true;
    }

    /// Go back to stderr, returning everything captured oldest first
    pub fn finish(&self) -> Vec<String> {
        let mut guard = self.lock();
        let captured = &mut *guard;
        captured.active = false;
        if !captured.partial.is_empty() {
            let rest = std::mem::take(&mut captured.partial);
            captured.lines.push_back(String::from_utf8_lossy(&rest).into_owned());
        }
        captured.lines.drain(..).collect()
    }

    pub fn is_capturing(&self) -> bool {
        self.lock().active
    }

    /// The newest `count` captured lines, oldest first
    pub fn recent(&self, count: usize) -> Vec<String> {
        let captured = self.lock();
        let skip = captured.lines.len().saturating_sub(count);
        captured.lines.iter().skip(skip).cloned().collect()
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.lock();
        if !guard.active {
            drop(guard);
            return io::stderr().write(buf);
        }

        let captured = &mut *guard;
        captured.partial.extend_from_slice(buf);
        while let Some(end) = captured.partial.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = captured.partial.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..end]);
            if captured.lines.len() == CAPTURED_LINES {
                captured.lines.pop_front();
            }
            captured.lines.push_back(text.trim_end_matches('\r').to_string());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_when_idle() {
        let mut log = LogCapture::new();
        writeln!(log, "to stderr").unwrap();
        assert!(!log.is_capturing());
        assert!(log.recent(10).is_empty());
    }

    #[test]
    fn test_captures_whole_lines() {
        let mut log = LogCapture::new();
        log.start();
        log.write_all(b"PLEASE WAIT: Calibrating").unwrap();
        assert!(log.recent(10).is_empty());
        log.write_all(b" amplitude range\nCalibration complete\n").unwrap();

        assert_eq!(
            log.recent(10),
            vec!["PLEASE WAIT: Calibrating amplitude range", "Calibration complete"]
        );
        assert_eq!(log.recent(1), vec!["Calibration complete"]);
    }

    #[test]
    fn test_finish_returns_everything_and_stops() {
        let mut log = LogCapture::new();
        log.start();
        log.write_all(b"one\r\ntwo\nunterminated").unwrap();

        assert_eq!(log.finish(), vec!["one", "two", "unterminated"]);
        assert!(!log.is_capturing());
        assert!(log.recent(10).is_empty());
    }

    #[test]
    fn test_bounded_while_capturing() {
        let mut log = LogCapture::new();
        log.start();
        for i in 0..CAPTURED_LINES + 5 {
            writeln!(log, "line {}", i).unwrap();
        }
        let lines = log.finish();
        assert_eq!(lines.len(), CAPTURED_LINES);
        assert_eq!(lines[0], "line 5");
    }
}
