//! JSON persistence for the address book.
//!
//! File layout: `{ "key": <hex32>, "addrs": [<entry>, ...] }`. Writes go to
//! a sibling temp file that is renamed over the target, so a crash never
//! leaves a truncated book behind. Loading is best-effort.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::book::{AddressBook, BookState};
use super::security::GroupKey;
use super::types::{AddrBookEntry, BucketType};
use crate::domain::AddressBookError;

#[derive(Serialize)]
struct BookFile<'a> {
    key: String,
    addrs: Vec<&'a AddrBookEntry>,
}

/// Entries are kept as raw JSON so one bad record cannot void the file.
#[derive(Deserialize)]
struct RawBookFile {
    key: String,
    #[serde(default)]
    addrs: Vec<serde_json::Value>,
}

impl AddressBook {
    /// Save to the configured file. No-op for in-memory books.
    pub fn save(&self) -> Result<(), AddressBookError> {
        match &self.config.file_path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Load from the configured file, replacing the current contents.
    /// Returns the number of entries loaded.
    pub fn load(&self) -> usize {
        match &self.config.file_path {
            Some(path) => self.load_from(path),
            None => 0,
        }
    }

    /// Atomically write the book to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), AddressBookError> {
        let (json, count) = {
            let state = self.state.read();
            let file = BookFile {
                key: hex::encode(state.key),
                addrs: state.iter().collect(),
            };
            (serde_json::to_vec_pretty(&file)?, file.addrs.len())
        };

        let tmp = temp_path(path);
        fs::write(&tmp, &json).map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, path).map_err(|source| io_error(path, source))?;

        info!(path = %path.display(), count, "Saved address book");
        Ok(())
    }

    /// Replace the book's contents with the file at `path`.
    ///
    /// A missing or unparseable file yields an empty book. Individually
    /// invalid entries (bad address, duplicate or own identity) are
    /// skipped. Entries keep their recorded bucket when it is in range and
    /// has room; otherwise they are re-placed.
    pub fn load_from(&self, path: &Path) -> usize {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No address book file, starting empty");
                return 0;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable address book, starting empty");
                return 0;
            }
        };

        let raw: RawBookFile = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt address book, starting empty");
                return 0;
            }
        };

        let key = match decode_key(&raw.key) {
            Some(key) => key,
            None => {
                warn!(path = %path.display(), "Invalid bucketing key in address book, generating a new one");
                self.state.read().key
            }
        };

        let mut state = BookState::new(key, &self.config);
        let mut skipped = 0usize;
        for value in raw.addrs {
            let entry: AddrBookEntry = match serde_json::from_value(value) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "Skipping unparseable address book entry");
                    skipped += 1;
                    continue;
                }
            };
            if self.admissible(&entry.addr).is_err() || state.contains(&entry.addr.id) {
                debug!(peer = %entry.addr, "Skipping invalid address book entry");
                skipped += 1;
                continue;
            }
            if !self.restore_entry(&mut state, entry) {
                skipped += 1;
            }
        }

        let loaded = state.len();
        *self.state.write() = state;
        info!(path = %path.display(), loaded, skipped, "Loaded address book");
        loaded
    }

    fn restore_entry(&self, state: &mut BookState, mut entry: AddrBookEntry) -> bool {
        let size = self.config.bucket_size;

        if entry.bucket_type == BucketType::Vetted {
            let recorded = entry.bucket;
            let index = if recorded < state.vetted_table.bucket_count()
                && state.vetted_table.bucket(recorded).len() < size
            {
                recorded
            } else {
                state.vetted_bucket_index(&self.config, &entry.addr)
            };
            if state.vetted_table.bucket(index).len() < size {
                entry.bucket = index;
                state.vetted_table.insert(index, entry);
                return true;
            }
            entry.bucket_type = BucketType::New;
            entry.bucket = usize::MAX;
        }

        let recorded = entry.bucket;
        let index = if recorded < state.new_table.bucket_count()
            && state.new_table.bucket(recorded).len() < size
        {
            recorded
        } else {
            state.new_bucket_index(&self.config, &entry.addr, &entry.src)
        };
        let group = GroupKey::from_ip(&entry.addr.ip);
        if state.new_table.bucket(index).len() >= size
            || state.group_total(&group) >= self.config.max_per_subnet_total
        {
            return false;
        }
        entry.bucket = index;
        state.new_table.insert(index, entry);
        true
    }
}

fn decode_key(hex_key: &str) -> Option<[u8; 32]> {
    hex::decode(hex_key).ok()?.try_into().ok()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn io_error(path: &Path, source: std::io::Error) -> AddressBookError {
    AddressBookError::Io {
        path: path.display().to_string(),
        source,
    }
}
