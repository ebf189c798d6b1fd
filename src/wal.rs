//! Write-ahead log for the development peer's world state
//!
//! Every `PutState` is appended as one JSON line before it is applied

use crate::error::{Result, ShareVoteError};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::warn;

/// WAL entry representing one state write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub timestamp: u64,
    pub key: String,
    pub value: Vec<u8>,
}

impl WalEntry {
    pub fn new(key: String, value: Vec<u8>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self { timestamp, key, value }
    }
}

/// Write-Ahead Log for durable persistence
pub struct WriteAheadLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl WriteAheadLog {
    /// Open (or create) a WAL at `path` in append mode
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    /// Write an entry to the WAL
    pub async fn write_entry(&self, entry: &WalEntry) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let json = serde_json::to_string(entry)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Log a state write
    pub async fn log_write(&self, key: &str, value: &[u8]) -> Result<()> {
        let entry = WalEntry::new(key.to_string(), value.to_vec());
        self.write_entry(&entry).await
    }

    /// Replay all state writes in log order
    ///
    /// An unparsable final line with no trailing newline is a write torn by
    /// a crash: it is dropped and truncated off the file. Any other bad line
    /// is an error.
    pub fn replay<F>(&self, mut apply_fn: F) -> Result<()>
    where
        F: FnMut(String, Vec<u8>) -> Result<()>,
    {
        if !self.path.exists() {
            return Ok(());
        }

        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut line = String::new();
        let mut line_no = 0usize;
        let mut offset = 0u64;

        loop {
            line.clear();
            let read = reader.read_line(&mut line)?;
            if read == 0 {
                break;
            }
            line_no += 1;

            if line.trim().is_empty() {
                offset += read as u64;
                continue;
            }

            match serde_json::from_str::<WalEntry>(&line) {
                Ok(entry) => apply_fn(entry.key, entry.value)?,
                Err(e) if !line.ends_with('\n') => {
                    warn!(line = line_no, error = %e, "dropping torn WAL tail");
                    OpenOptions::new().write(true).open(&self.path)?.set_len(offset)?;
                    break;
                }
                Err(e) => {
                    return Err(ShareVoteError::Wal(format!(
                        "Failed to parse WAL entry at line {}: {}",
                        line_no, e
                    )));
                }
            }
            offset += read as u64;
        }

        Ok(())
    }

    /// Compact the WAL by rewriting it with the given live state
    pub async fn compact(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        // Hold the writer for the whole rewrite so no append lands in the old file
        let mut writer = self.writer.lock().await;

        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let temp_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut temp_writer = BufWriter::new(temp_file);

        for (key, value) in entries {
            let json = serde_json::to_string(&WalEntry::new(key, value))?;
            writeln!(temp_writer, "{}", json)?;
        }

        temp_writer.flush()?;
        drop(temp_writer);

        std::fs::rename(&temp_path, &self.path)?;

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        *writer = BufWriter::new(file);

        Ok(())
    }
}
