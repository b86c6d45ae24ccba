//! The worker's local journal of completed mints.
//!
//! One JSON record per line, append-only. The journal is a forensic record
//! and feeds the introspection endpoints; the monitor's ledger stays
//! authoritative. A partial trailing line (crash mid-append) is skipped on
//! load and never halts the service.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub txid: String,
    pub inscription_id: String,
    pub destination: String,
    /// RFC 3339 completion time.
    pub timestamp: String,
}

pub struct MintJournal {
    path: PathBuf,
}

impl MintJournal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Appends one whole record and flushes it. If the previous append was
    /// torn (no trailing newline), the new record starts on a fresh line so
    /// only the torn record is lost.
    pub fn append(&self, entry: &JournalEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let torn_tail = !self.ends_with_newline()?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        if torn_tail {
            writeln!(file)?;
        }
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line)?;
        file.flush()
    }

    fn ends_with_newline(&self) -> std::io::Result<bool> {
        use std::io::{Read, Seek, SeekFrom};

        let mut file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e),
        };
        if file.metadata()?.len() == 0 {
            return Ok(true);
        }
        file.seek(SeekFrom::End(-1))?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    /// Reads every intact record. A missing file is an empty journal;
    /// undecodable lines are logged and skipped.
    pub fn load_entries(&self) -> Vec<JournalEntry> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<JournalEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(error:% = e; "Journal: skipping undecodable record");
                },
            }
        }
        entries
    }
}
