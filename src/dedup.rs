use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use log::debug;

/// Tracks which notification ids have already been acted on. The backing
/// log is append-only and newline-delimited; it is reloaded at startup so a
/// redelivery after a crash is still rejected.
pub struct NotificationDeduplicator {
    seen: HashSet<String>,
    log: File,
}

impl NotificationDeduplicator {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut log = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(path)?;
        let mut contents = String::new();
        log.read_to_string(&mut contents)?;
        let seen: HashSet<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!("Loaded {} previously admitted notification ids", seen.len());
        Ok(Self { seen, log })
    }

    /// Admit a notification id for processing. Returns true exactly once per
    /// distinct id across the process lifetime, restarts included. The id is
    /// durably recorded before admission is reported, so a crash between the
    /// two cannot lead to a second admission.
    pub fn admit(&mut self, id: &str) -> io::Result<bool> {
        if self.seen.contains(id) {
            return Ok(false);
        }
        writeln!(self.log, "{id}")?;
        self.log.sync_data()?;
        self.seen.insert(id.to_string());
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_each_id_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistent_ids.txt");
        let mut dedup = NotificationDeduplicator::open(&path).unwrap();

        assert!(dedup.admit("abc").unwrap());
        assert!(!dedup.admit("abc").unwrap());
        assert!(dedup.admit("def").unwrap());
        assert!(!dedup.admit("abc").unwrap());
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn rejection_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persistent_ids.txt");

        {
            let mut dedup = NotificationDeduplicator::open(&path).unwrap();
            assert!(dedup.admit("abc").unwrap());
            assert!(dedup.admit("def").unwrap());
        }

        // Simulated restart: a fresh instance reloads the persisted log.
        let mut dedup = NotificationDeduplicator::open(&path).unwrap();
        assert_eq!(dedup.len(), 2);
        assert!(!dedup.admit("abc").unwrap());
        assert!(!dedup.admit("def").unwrap());
        assert!(dedup.admit("ghi").unwrap());
    }

    #[test]
    fn opens_with_missing_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let dedup = NotificationDeduplicator::open(dir.path().join("fresh.txt")).unwrap();
        assert!(dedup.is_empty());
    }
}
