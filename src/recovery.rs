// SPDX-License-Identifier: CC0-1.0

//! The recovery log: an append-only, plaintext, line-per-event file.
//!
//! Every line is flushed to the OS before any dependent database mutation
//! is attempted (§5's log-precedes-DB ordering guarantee). Reconstructing
//! a wallet from the log alone must reproduce every secret the database
//! ever knew, so the event vocabulary below — including the preserved
//! `recieve` misspelling — is a durable on-disk format, not a style choice.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// A category name as it appears in a recovery log line.
///
/// Deliberately distinct from [`crate::Category`]'s `Display` impl: the
/// log's `recieve` spelling must never be "fixed", even though the
/// in-memory/CLI-facing name is spelled correctly elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// The HD root was created.
    HdRoot,
    /// A secret not yet assigned to any chain.
    Unused,
    /// A secret derived for an outgoing payment.
    Pay,
    /// A secret derived to receive funds (sic: `recieve` on disk).
    Recieve,
    /// A secret derived as change from a replace.
    Change,
    /// A secret derived for mining income.
    Mining,
}

impl LogEvent {
    /// The literal token written to the log line.
    pub fn as_token(self) -> &'static str {
        match self {
            LogEvent::HdRoot => "hdroot",
            LogEvent::Unused => "unused",
            LogEvent::Pay => "pay",
            LogEvent::Recieve => "recieve",
            LogEvent::Change => "change",
            LogEvent::Mining => "mining",
        }
    }
}

/// Narrow append-line-and-flush interface, so the wallet can be driven by
/// an in-memory log in tests without touching the filesystem.
pub trait RecoveryLog: Send {
    /// Appends one line (the caller supplies the full line body, without a
    /// trailing newline) and flushes it durably before returning.
    fn append_line(&mut self, line: &str) -> io::Result<()>;
}

/// Appends a fully-formed `<timestamp> <event> <payload>` line.
pub fn append_event(
    log: &mut dyn RecoveryLog,
    timestamp: u64,
    event: LogEvent,
    payload: &str,
) -> io::Result<()> {
    log.append_line(&format!("{timestamp} {} {payload}", event.as_token()))
}

/// A recovery log backed by a real file on disk (`<base>.bak`).
pub struct FileRecoveryLog {
    file: File,
}

impl FileRecoveryLog {
    /// Opens (creating if absent) the recovery log file at `path`.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileRecoveryLog { file })
    }
}

impl RecoveryLog for FileRecoveryLog {
    fn append_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        self.file.sync_data()
    }
}


#[cfg(test)]
mod tests {
    use super::mock::InMemoryRecoveryLog;
    use super::*;

    #[test]
    fn formats_line_grammar() {
        let mut log = InMemoryRecoveryLog::default();
        append_event(&mut log, 100, LogEvent::Recieve, "e5:secret:ab").unwrap();
        assert_eq!(log.lines, vec!["100 recieve e5:secret:ab".to_string()]);
    }

    #[test]
    fn preserves_recieve_misspelling() {
        assert_eq!(LogEvent::Recieve.as_token(), "recieve");
    }

    #[test]
    fn file_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.bak");
        {
            let mut log = FileRecoveryLog::open(&path).unwrap();
            append_event(&mut log, 1, LogEvent::HdRoot, "ab version=1").unwrap();
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "1 hdroot ab version=1\n");
    }
}
