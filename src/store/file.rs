use super::memory::{MemoryState, MemoryStore};
use super::{IndexEntry, OrderedStore, WriteBatch, WriteOp};
use crate::error::{GeoRangeError, Result};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Frame header: u32 payload length + u32 CRC32, both little endian
const FRAME_HEADER_LEN: usize = 8;

/// Ordered store persisted as an append-only operation log
///
/// Every commit (and every delete) becomes one framed record:
///
/// ```text
/// ┌────────────┬────────────┬──────────────────────────────────┐
/// │ len: u32le │ crc32: u32 │ payload: bincode Vec<WriteOp>    │
/// └────────────┴────────────┴──────────────────────────────────┘
/// ```
///
/// On open the log is replayed into a [`MemoryStore`], which then serves
/// all reads. A record cut short by a crash, or whose checksum does not
/// match, ends the replay. A writable store truncates the file back to the
/// last good record and logs a warning; a read-only store just stops there,
/// since the bytes may belong to a commit that another process is still
/// writing.
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    /// `None` when opened with [`FileStore::open_read_only`]
    log: Option<Mutex<File>>,
}

impl FileStore {
    /// Open (or create) the store at `path` and replay its log
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| GeoRangeError::io(parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| GeoRangeError::io(&path, e))?;

        let bytes = std::fs::read(&path).map_err(|e| GeoRangeError::io(&path, e))?;
        let (state, replay) = replay(&bytes)?;

        if replay.good_len < bytes.len() {
            warn!(
                "Store log {} has {} trailing bytes that do not form a valid record; truncating",
                path.display(),
                bytes.len() - replay.good_len
            );
            file.set_len(replay.good_len as u64)
                .map_err(|e| GeoRangeError::io(&path, e))?;
        }
        file.seek(SeekFrom::End(0))
            .map_err(|e| GeoRangeError::io(&path, e))?;

        info!(
            "Opened store {} ({} records replayed, {} bytes)",
            path.display(),
            replay.records,
            replay.good_len
        );

        Ok(Self {
            path,
            memory: MemoryStore::from_state(state),
            log: Some(Mutex::new(file)),
        })
    }

    /// Open an existing store for reading only
    ///
    /// Fails if `path` does not exist. The file is never created, written
    /// or truncated, so this is safe to use while an import is appending to
    /// the same log.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|e| GeoRangeError::io(&path, e))?;
        let (state, replay) = replay(&bytes)?;

        if replay.good_len < bytes.len() {
            debug!(
                "Ignoring {} trailing bytes of {} (incomplete record)",
                bytes.len() - replay.good_len,
                path.display()
            );
        }
        debug!(
            "Opened store {} read-only ({} records replayed)",
            path.display(),
            replay.records
        );

        Ok(Self {
            path,
            memory: MemoryStore::from_state(state),
            log: None,
        })
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the store was opened with [`open_read_only`](Self::open_read_only)
    pub fn is_read_only(&self) -> bool {
        self.log.is_none()
    }

    /// Current size of the log in bytes
    pub fn log_size(&self) -> Result<u64> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| GeoRangeError::io(&self.path, e))
    }

    /// Rewrite the log as a single snapshot record of the current state
    ///
    /// The snapshot is written to a sibling file and renamed over the log,
    /// so an interrupted compaction leaves the old log intact.
    pub fn compact(&self) -> Result<()> {
        let mut log = self.writer()?.lock();
        let ops = self.memory.snapshot_ops();
        let frame = encode_frame(&ops)?;

        let tmp_path = self.path.with_extension("compact");
        {
            let mut tmp = File::create(&tmp_path).map_err(|e| GeoRangeError::io(&tmp_path, e))?;
            tmp.write_all(&frame)
                .and_then(|_| tmp.sync_all())
                .map_err(|e| GeoRangeError::io(&tmp_path, e))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| GeoRangeError::io(&self.path, e))?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| GeoRangeError::io(&self.path, e))?;
        file.seek(SeekFrom::End(0))
            .map_err(|e| GeoRangeError::io(&self.path, e))?;
        *log = file;

        info!(
            "Compacted store {} to {} operations ({} bytes)",
            self.path.display(),
            ops.len(),
            frame.len()
        );
        Ok(())
    }

    fn writer(&self) -> Result<&Mutex<File>> {
        self.log.as_ref().ok_or_else(|| {
            GeoRangeError::Store(format!(
                "store {} is opened read-only",
                self.path.display()
            ))
        })
    }

    fn append(&self, log: &mut File, ops: &[WriteOp]) -> Result<()> {
        let frame = encode_frame(ops)?;
        log.write_all(&frame)
            .and_then(|_| log.sync_data())
            .map_err(|e| GeoRangeError::Store(format!("append to {} failed: {}", self.path.display(), e)))?;
        debug!("Appended {} operations ({} bytes)", ops.len(), frame.len());
        Ok(())
    }
}

impl OrderedStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.memory.get(key)
    }

    fn index_floor(&self, index: &str, score: u32) -> Result<Option<IndexEntry>> {
        self.memory.index_floor(index, score)
    }

    fn index_first(&self, index: &str) -> Result<Option<IndexEntry>> {
        self.memory.index_first(index)
    }

    fn index_last(&self, index: &str) -> Result<Option<IndexEntry>> {
        self.memory.index_last(index)
    }

    fn index_len(&self, index: &str) -> Result<usize> {
        self.memory.index_len(index)
    }

    fn index_entries(&self, index: &str) -> Result<Vec<IndexEntry>> {
        self.memory.index_entries(index)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.memory.keys(prefix)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut log = self.writer()?.lock();
        if !self.memory.contains(key) {
            return Ok(false);
        }
        self.append(
            &mut log,
            &[WriteOp::Delete {
                key: key.to_string(),
            }],
        )?;
        self.memory.delete(key)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        // The log lock is held across the memory apply so replay order matches.
        let mut log = self.writer()?.lock();
        self.append(&mut log, batch.ops())?;
        self.memory.commit(batch)
    }
}

struct Replay {
    records: usize,
    good_len: usize,
}

fn replay(bytes: &[u8]) -> Result<(MemoryState, Replay)> {
    let mut state = MemoryState::default();
    let mut offset = 0usize;
    let mut records = 0usize;

    while offset + FRAME_HEADER_LEN <= bytes.len() {
        let len = read_u32(bytes, offset) as usize;
        let crc = read_u32(bytes, offset + 4);
        let start = offset + FRAME_HEADER_LEN;
        let Some(payload) = bytes.get(start..start + len) else {
            break;
        };
        if crc32fast::hash(payload) != crc {
            break;
        }

        let ops: Vec<WriteOp> = bincode::deserialize(payload).map_err(|e| {
            GeoRangeError::Corrupt(format!("log record at offset {}: {}", offset, e))
        })?;
        for op in ops {
            state.apply(op);
        }
        records += 1;
        offset = start + len;
    }

    Ok((
        state,
        Replay {
            records,
            good_len: offset,
        },
    ))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

fn encode_frame(ops: &[WriteOp]) -> Result<Vec<u8>> {
    let payload = bincode::serialize(ops)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_batch() -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch
            .set("r:1", b"one".to_vec())
            .index_add("idx", 1, "r:1")
            .set("r:9", b"nine".to_vec())
            .index_add("idx", 9, "r:9");
        batch
    }

    #[test]
    fn test_frame_payload_replays() {
        let ops = vec![
            WriteOp::Set {
                key: "k".to_string(),
                value: vec![0, 1, 2],
            },
            WriteOp::IndexAdd {
                index: "i".to_string(),
                score: u32::MAX,
                member: "k".to_string(),
            },
            WriteOp::Delete {
                key: "gone".to_string(),
            },
        ];
        let frame = encode_frame(&ops).unwrap();
        let decoded: Vec<WriteOp> = bincode::deserialize(&frame[FRAME_HEADER_LEN..]).unwrap();
        assert_eq!(decoded, ops);

        let (_, replay) = replay(&frame).unwrap();
        assert_eq!(replay.records, 1);
        assert_eq!(replay.good_len, frame.len());
    }

    #[test]
    fn test_garbage_payload_with_valid_checksum_is_corrupt() {
        let payload = [0xffu8; 3];
        let mut frame = Vec::new();
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&payload);

        assert!(matches!(replay(&frame), Err(GeoRangeError::Corrupt(_))));
    }

    #[test]
    fn test_reopen_replays_commits_and_deletes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranges.log");
        {
            let store = FileStore::open(&path).unwrap();
            store.commit(sample_batch()).unwrap();
            assert!(store.delete("r:1").unwrap());
            assert!(!store.delete("never-there").unwrap());
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.index_len("idx").unwrap(), 2);
        assert_eq!(store.get("r:1").unwrap(), None);
        assert_eq!(store.get("r:9").unwrap(), Some(b"nine".to_vec()));
        assert_eq!(store.index_floor("idx", 5).unwrap().unwrap().member, "r:1");
    }

    #[test]
    fn test_empty_commit_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("ranges.log")).unwrap();
        store.commit(WriteBatch::new()).unwrap();
        assert_eq!(store.log_size().unwrap(), 0);
    }

    #[test]
    fn test_torn_tail_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranges.log");
        let good_len = {
            let store = FileStore::open(&path).unwrap();
            store.commit(sample_batch()).unwrap();
            let good_len = store.log_size().unwrap();

            let mut second = WriteBatch::new();
            second.set("r:20", b"twenty".to_vec()).index_add("idx", 20, "r:20");
            store.commit(second).unwrap();
            good_len
        };

        // Simulate a crash halfway through the second record.
        let full_len = std::fs::metadata(&path).unwrap().len();
        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(good_len + (full_len - good_len) / 2).unwrap();
        drop(file);

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.index_len("idx").unwrap(), 2);
        assert_eq!(store.get("r:20").unwrap(), None);
        assert_eq!(store.log_size().unwrap(), good_len);

        // The store keeps working after recovery.
        let mut third = WriteBatch::new();
        third.set("r:30", b"thirty".to_vec()).index_add("idx", 30, "r:30");
        store.commit(third).unwrap();
        drop(store);
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.index_len("idx").unwrap(), 3);
    }

    #[test]
    fn test_corrupt_checksum_stops_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranges.log");
        {
            let store = FileStore::open(&path).unwrap();
            store.commit(sample_batch()).unwrap();
        }
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.index_len("idx").unwrap(), 0);
        assert_eq!(store.log_size().unwrap(), 0);
    }

    #[test]
    fn test_read_only_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("typo.log");

        let err = FileStore::open_read_only(&path).err().unwrap();
        assert!(matches!(err, GeoRangeError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_only_leaves_partial_tail_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranges.log");
        let good_len = {
            let store = FileStore::open(&path).unwrap();
            store.commit(sample_batch()).unwrap();
            store.log_size().unwrap()
        };

        // A writer halfway through its next frame
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[42, 0, 0, 0, 1, 2]).unwrap();
        drop(file);

        let reader = FileStore::open_read_only(&path).unwrap();
        assert!(reader.is_read_only());
        assert_eq!(reader.index_len("idx").unwrap(), 2);
        assert_eq!(reader.log_size().unwrap(), good_len + 6);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), good_len + 6);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranges.log");
        FileStore::open(&path).unwrap().commit(sample_batch()).unwrap();
        let before = std::fs::metadata(&path).unwrap().len();

        let reader = FileStore::open_read_only(&path).unwrap();
        assert!(matches!(
            reader.commit(sample_batch()),
            Err(GeoRangeError::Store(_))
        ));
        assert!(matches!(reader.delete("r:1"), Err(GeoRangeError::Store(_))));
        assert!(matches!(reader.compact(), Err(GeoRangeError::Store(_))));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), before);
    }

    #[test]
    fn test_compact_preserves_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ranges.log");
        {
            let store = FileStore::open(&path).unwrap();
            for _ in 0..5 {
                store.commit(sample_batch()).unwrap();
            }
            let before = store.log_size().unwrap();
            store.compact().unwrap();
            assert!(store.log_size().unwrap() < before);

            let mut more = WriteBatch::new();
            more.set("r:50", b"fifty".to_vec()).index_add("idx", 50, "r:50");
            store.commit(more).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.index_len("idx").unwrap(), 3);
        assert_eq!(store.get("r:9").unwrap(), Some(b"nine".to_vec()));
        assert_eq!(store.get("r:50").unwrap(), Some(b"fifty".to_vec()));
        assert!(!path.with_extension("compact").exists());
    }
}
