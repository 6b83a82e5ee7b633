use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One decoded motion event, timestamped against its device's own clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Milliseconds since the owning reader started. Not comparable across devices.
    pub t_ms: u64,
    pub dx: i32,
    pub dy: i32,
}

impl Reading {
    pub fn new(t_ms: u64, dx: i32, dy: i32) -> Self {
        Self { t_ms, dx, dy }
    }

    /// Archive line without the trailing newline: `t_ms,dx,dy`
    pub fn to_csv_line(&self) -> String {
        format!("{},{},{}", self.t_ms, self.dx, self.dy)
    }
}

#[derive(Debug, Default)]
struct LogInner {
    entries: Vec<Reading>,
    /// Number of leading entries already handed out by `drain_since`
    cursor: usize,
}

/// Append-only per-device log with an incremental consumption cursor.
///
/// Appends, drains and full scans all take the same lock, so a drain observes
/// a consistent prefix: anything appended after it is returned by the next one.
#[derive(Debug, Default)]
pub struct ReadingLog {
    inner: Mutex<LogInner>,
}

impl ReadingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reading at the end of the log
    pub fn append(&self, reading: Reading) {
        let mut inner = self.inner.lock();
        inner.entries.push(reading);
        trace!("Appended reading at position {}", inner.entries.len() - 1);
    }

    /// Return every reading appended since the previous drain, in arrival order,
    /// and advance the cursor past them.
    pub fn drain_since(&self) -> Vec<Reading> {
        let mut inner = self.inner.lock();
        let current = inner.cursor;
        inner.cursor = inner.entries.len();
        inner.entries[current..inner.cursor].to_vec()
    }

    /// Copy of the whole log, ignoring the cursor
    pub fn snapshot_all(&self) -> Vec<Reading> {
        self.inner.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.inner.lock().cursor
    }

    /// Entries not yet returned by a drain
    pub fn pending(&self) -> usize {
        let inner = self.inner.lock();
        inner.entries.len() - inner.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_drain_returns_only_new_entries() {
        let log = ReadingLog::new();
        log.append(Reading::new(10, 3, -2));
        log.append(Reading::new(20, 1, 1));

        assert_eq!(
            log.drain_since(),
            vec![Reading::new(10, 3, -2), Reading::new(20, 1, 1)]
        );
        assert!(log.drain_since().is_empty());

        log.append(Reading::new(30, 0, 5));
        assert_eq!(log.drain_since(), vec![Reading::new(30, 0, 5)]);
        assert_eq!(log.cursor(), 3);
        assert_eq!(log.pending(), 0);
    }

    #[test]
    fn test_interleaved_drains_concatenate_to_append_sequence() {
        let log = ReadingLog::new();
        let mut appended = Vec::new();
        let mut drained = Vec::new();

        for i in 0..50u64 {
            let reading = Reading::new(i, i as i32 % 7, -(i as i32 % 3));
            log.append(reading);
            appended.push(reading);
            if i % 4 == 0 {
                drained.extend(log.drain_since());
            }
            assert!(log.cursor() <= log.len());
        }
        drained.extend(log.drain_since());

        assert_eq!(drained, appended);
    }

    #[test]
    fn test_snapshot_all_ignores_cursor() {
        let log = ReadingLog::new();
        log.append(Reading::new(1, 1, 1));
        log.drain_since();
        log.append(Reading::new(2, 2, 2));

        assert_eq!(log.snapshot_all().len(), 2);
        assert_eq!(log.pending(), 1);
        assert_eq!(log.cursor(), 1);
    }

    #[test]
    fn test_concurrent_append_and_drain_has_no_gaps_or_duplicates() {
        let log = Arc::new(ReadingLog::new());
        let total = 10_000u64;

        let writer = {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..total {
                    log.append(Reading::new(i, 1, -1));
                }
            })
        };

        let mut drained = Vec::new();
        while drained.len() < total as usize {
            drained.extend(log.drain_since());
            thread::yield_now();
        }
        writer.join().unwrap();
        drained.extend(log.drain_since());

        assert_eq!(drained.len(), total as usize);
        for (i, reading) in drained.iter().enumerate() {
            assert_eq!(reading.t_ms, i as u64);
        }
    }

    #[test]
    fn test_csv_line() {
        assert_eq!(Reading::new(1500, -3, 127).to_csv_line(), "1500,-3,127");
    }
}
