use crate::domain::{Hash, StateError};
use crate::ports::NodeStore;
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only, log-structured [`NodeStore`] backed by a single file.
///
/// Every `put` appends a `(32-byte key, 4-byte big-endian length, value)`
/// record to the end of the log; nothing is ever rewritten in place, which
/// is what §4.3 means by "no deletion required — old nodes remain
/// addressable." On open, the whole log is scanned once to rebuild an
/// in-memory offset index so `get` is a single seek-and-read rather than a
/// linear scan.
pub struct FileNodeStore {
    path: PathBuf,
    file: Mutex<File>,
    index: Mutex<HashMap<Hash, (u64, u32)>>,
}

impl FileNodeStore {
    /// Open (creating if absent) a log file at `path`, replaying its
    /// existing records into the index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        file.lock_exclusive()
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;

        let index = replay(&mut file)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            index: Mutex::new(index),
        })
    }

    /// The path this store is backed by.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn replay(file: &mut File) -> Result<HashMap<Hash, (u64, u32)>, StateError> {
    let mut index = HashMap::new();
    let mut offset = 0u64;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| StateError::DatabaseError(e.to_string()))?;

    loop {
        let mut key = [0u8; 32];
        match file.read_exact(&mut key) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(StateError::DatabaseError(e.to_string())),
        }
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        let len = u32::from_be_bytes(len_buf);
        let value_offset = offset + 36;
        file.seek(SeekFrom::Current(i64::from(len)))
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        index.insert(key, (value_offset, len));
        offset = value_offset + u64::from(len);
    }
    Ok(index)
}

impl NodeStore for FileNodeStore {
    fn get(&self, key: &Hash) -> Result<Option<Vec<u8>>, StateError> {
        let index = self.index.lock().map_err(|_| StateError::LockPoisoned)?;
        let Some(&(offset, len)) = index.get(key) else {
            return Ok(None);
        };
        drop(index);

        let mut file = self.file.lock().map_err(|_| StateError::LockPoisoned)?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        Ok(Some(buf))
    }

    fn put(&self, key: Hash, value: Vec<u8>) -> Result<(), StateError> {
        let mut file = self.file.lock().map_err(|_| StateError::LockPoisoned)?;
        let offset = file
            .seek(SeekFrom::End(0))
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;

        file.write_all(&key)
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        let len = value.len() as u32;
        file.write_all(&len.to_be_bytes())
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        file.write_all(&value)
            .map_err(|e| StateError::DatabaseError(e.to_string()))?;
        drop(file);

        let mut index = self.index.lock().map_err(|_| StateError::LockPoisoned)?;
        index.insert(key, (offset + 36, len));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = std::env::temp_dir().join(format!("qc04-filedb-{}", std::process::id()));
        let store = FileNodeStore::open(&dir).unwrap();
        let key = [0x11u8; 32];
        store.put(key, vec![9, 8, 7]).unwrap();
        assert_eq!(store.get(&key).unwrap(), Some(vec![9, 8, 7]));
        std::fs::remove_file(&dir).ok();
    }

    #[test]
    fn reopen_replays_existing_records() {
        let dir = std::env::temp_dir().join(format!("qc04-filedb-replay-{}", std::process::id()));
        {
            let store = FileNodeStore::open(&dir).unwrap();
            store.put([0x22u8; 32], vec![1, 2, 3]).unwrap();
        }
        {
            let store = FileNodeStore::open(&dir).unwrap();
            assert_eq!(store.get(&[0x22u8; 32]).unwrap(), Some(vec![1, 2, 3]));
        }
        std::fs::remove_file(&dir).ok();
    }
}
