//! Collection snapshot serialization and the persistence sidecar
//!
//! ## Snapshot Format (version 1)
//!
//! ```text
//! [Magic: "TRDS"]
//! [Version: u32 LE]
//! [Header Length: u32 LE]
//! [Header: MessagePack SnapshotHeader]
//! For each slot (in slot order, tombstones included):
//!   [Id Length: u32 LE]
//!   [Id: UTF-8 bytes]
//!   [Deleted: u8 (0 or 1)]
//!   [Embedding: dimension * f32 LE]
//!   [Metadata Length: u32 LE]
//!   [Metadata: JSON bytes]
//! ```
//!
//! Embeddings and metadata always travel in one file, so the persisted index
//! and metadata can never disagree. Backend structures (centroids, lists) are
//! not stored; they are rebuilt from the records on load.

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use tread_core::{DistanceMetric, Metadata, TreadError, TreadResult, VectorConfig, VectorRecord};

use super::arena::SlotArena;

/// Magic bytes for collection snapshots
const SNAPSHOT_MAGIC: &[u8; 4] = b"TRDS";
/// Current snapshot version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot header (MessagePack serialized)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    collection: String,
    dimension: usize,
    /// Distance metric (as byte)
    metric: u8,
    /// Must be persisted so generated ids stay unique across restarts
    next_counter: u64,
    /// Number of slot records that follow
    count: u64,
}

/// Decoded collection contents
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub collection: String,
    pub config: VectorConfig,
    pub next_counter: u64,
    pub records: Vec<VectorRecord>,
}

impl CollectionSnapshot {
    /// Capture an arena
    pub fn capture(collection: &str, config: VectorConfig, arena: &SlotArena) -> Self {
        CollectionSnapshot {
            collection: collection.to_string(),
            config,
            next_counter: arena.next_counter(),
            records: arena.records(),
        }
    }

    /// Restore an arena
    pub fn into_arena(self) -> TreadResult<SlotArena> {
        SlotArena::from_records(self.config.dimension, self.records, self.next_counter)
    }

    pub fn encode(&self) -> TreadResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> TreadResult<()> {
        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_u32::<LittleEndian>(SNAPSHOT_VERSION)?;

        let header = SnapshotHeader {
            collection: self.collection.clone(),
            dimension: self.config.dimension,
            metric: self.config.metric.to_byte(),
            next_counter: self.next_counter,
            count: self.records.len() as u64,
        };
        let header_bytes = rmp_serde::to_vec(&header)?;
        writer.write_u32::<LittleEndian>(header_bytes.len() as u32)?;
        writer.write_all(&header_bytes)?;

        for record in &self.records {
            let id = record.id.as_bytes();
            writer.write_u32::<LittleEndian>(id.len() as u32)?;
            writer.write_all(id)?;
            writer.write_u8(u8::from(record.deleted))?;
            for &value in &record.embedding {
                writer.write_f32::<LittleEndian>(value)?;
            }
            let meta = serde_json::to_vec(&record.metadata)?;
            writer.write_u32::<LittleEndian>(meta.len() as u32)?;
            writer.write_all(&meta)?;
        }
        Ok(())
    }

    pub fn decode(bytes: &[u8]) -> TreadResult<Self> {
        let mut reader = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(truncated)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(TreadError::Serialization("bad snapshot magic".to_string()));
        }
        let version = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        if version != SNAPSHOT_VERSION {
            return Err(TreadError::Serialization(format!(
                "unsupported snapshot version {}",
                version
            )));
        }

        let header_len = reader.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        let header_bytes = read_bytes(&mut reader, header_len)?;
        let header: SnapshotHeader = rmp_serde::from_slice(&header_bytes)?;

        let metric = DistanceMetric::from_byte(header.metric).ok_or_else(|| {
            TreadError::Serialization(format!("invalid metric byte {}", header.metric))
        })?;
        let config = VectorConfig::new(header.dimension, metric)
            .map_err(|e| TreadError::Serialization(e.to_string()))?;

        // each record holds at least its id length, flag, embedding, and metadata length
        let remaining = (bytes.len() as u64).saturating_sub(reader.position());
        let min_record = (config.dimension as u64)
            .checked_mul(4)
            .and_then(|n| n.checked_add(9));
        match min_record.and_then(|n| n.checked_mul(header.count)) {
            Some(needed) if needed <= remaining => {}
            _ => {
                return Err(TreadError::Serialization(format!(
                    "snapshot header claims {} records of dimension {}, only {} bytes follow",
                    header.count, config.dimension, remaining
                )))
            }
        }

        let mut records = Vec::new();
        for _ in 0..header.count {
            let id_len = reader.read_u32::<LittleEndian>().map_err(truncated)? as usize;
            let id = String::from_utf8(read_bytes(&mut reader, id_len)?)
                .map_err(|e| TreadError::Serialization(format!("invalid id: {}", e)))?;
            let deleted = reader.read_u8().map_err(truncated)? != 0;

            let mut embedding = Vec::with_capacity(config.dimension);
            for _ in 0..config.dimension {
                embedding.push(reader.read_f32::<LittleEndian>().map_err(truncated)?);
            }

            let meta_len = reader.read_u32::<LittleEndian>().map_err(truncated)? as usize;
            let metadata: Metadata = serde_json::from_slice(&read_bytes(&mut reader, meta_len)?)?;

            records.push(VectorRecord {
                id,
                embedding,
                metadata,
                deleted,
            });
        }

        if (reader.position() as usize) != bytes.len() {
            return Err(TreadError::Serialization(
                "trailing bytes after snapshot records".to_string(),
            ));
        }

        Ok(CollectionSnapshot {
            collection: header.collection,
            config,
            next_counter: header.next_counter,
            records,
        })
    }
}

fn truncated(e: io::Error) -> TreadError {
    TreadError::Serialization(format!("truncated snapshot: {}", e))
}

fn read_bytes(reader: &mut Cursor<&[u8]>, len: usize) -> TreadResult<Vec<u8>> {
    let remaining = reader.get_ref().len() - reader.position() as usize;
    if len > remaining {
        return Err(TreadError::Serialization(format!(
            "truncated snapshot: need {} bytes, have {}",
            len, remaining
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

// ============================================================================
// Sidecar
// ============================================================================

/// Durable home of a collection's snapshot blob
///
/// `store` must be all-or-nothing: after a crash, `load` returns either the
/// previous blob or the new one, never a mix.
pub trait Sidecar: Send + Sync {
    /// The last stored blob, or `None` if nothing was ever stored
    fn load(&self) -> TreadResult<Option<Vec<u8>>>;

    /// Replace the stored blob
    fn store(&self, blob: &[u8]) -> TreadResult<()>;
}

/// Sidecar backed by a single file, replaced via temp + fsync + rename
#[derive(Debug, Clone)]
pub struct FileSidecar {
    path: PathBuf,
}

impl FileSidecar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSidecar { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Sidecar for FileSidecar {
    fn load(&self) -> TreadResult<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TreadError::Storage(format!(
                "failed to read snapshot '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn store(&self, blob: &[u8]) -> TreadResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        // Atomic write: temp + fsync + rename
        let tmp_path = self.tmp_path();
        {
            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(blob)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            TreadError::Storage(format!(
                "failed to replace snapshot '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        // Sync parent directory so the rename itself is durable
        std::fs::File::open(dir)?.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> CollectionSnapshot {
        CollectionSnapshot {
            collection: "shoe_images".into(),
            config: VectorConfig::new(3, DistanceMetric::Cosine).unwrap(),
            next_counter: 5,
            records: vec![
                VectorRecord {
                    id: "item_0".into(),
                    embedding: vec![0.1, 0.2, 0.3],
                    metadata: json!({"brand": "nike", "tags": ["a", "b"]})
                        .as_object()
                        .cloned()
                        .unwrap(),
                    deleted: false,
                },
                VectorRecord {
                    id: "item_1".into(),
                    embedding: vec![1.0, -1.0, 0.0],
                    metadata: Metadata::new(),
                    deleted: true,
                },
            ],
        }
    }

    #[test]
    fn test_encode_decode() {
        let snapshot = sample();
        let bytes = snapshot.encode().unwrap();
        assert_eq!(&bytes[0..4], b"TRDS");
        assert_eq!(CollectionSnapshot::decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(sample().encode().unwrap(), sample().encode().unwrap());
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = sample().encode().unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            CollectionSnapshot::decode(&bytes),
            Err(TreadError::Serialization(_))
        ));
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let mut bytes = sample().encode().unwrap();
        bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
        let err = CollectionSnapshot::decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = sample().encode().unwrap();
        for cut in [3, 10, bytes.len() - 1] {
            assert!(
                CollectionSnapshot::decode(&bytes[..cut]).is_err(),
                "cut at {}",
                cut
            );
        }
    }

    fn with_header(header: &SnapshotHeader, body: &[u8]) -> Vec<u8> {
        let header_bytes = rmp_serde::to_vec(header).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&header_bytes);
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_decode_rejects_oversized_header_counts() {
        let snapshot = sample();
        let valid = snapshot.encode().unwrap();
        let header_len = u32::from_le_bytes(valid[8..12].try_into().unwrap()) as usize;
        let body = &valid[12 + header_len..];

        let mut header = SnapshotHeader {
            collection: snapshot.collection.clone(),
            dimension: usize::MAX / 2,
            metric: snapshot.config.metric.to_byte(),
            next_counter: snapshot.next_counter,
            count: 1,
        };
        for (dimension, count) in [(usize::MAX / 2, 1), (1 << 40, 1), (3, u64::MAX)] {
            header.dimension = dimension;
            header.count = count;
            let err = CollectionSnapshot::decode(&with_header(&header, body)).unwrap_err();
            assert!(matches!(err, TreadError::Serialization(_)), "{:?}", err);
        }

        // the unmodified header still decodes
        header.dimension = 3;
        header.count = 2;
        assert_eq!(
            CollectionSnapshot::decode(&with_header(&header, body)).unwrap(),
            snapshot
        );
    }

    #[test]
    fn test_capture_and_restore_arena() {
        let mut arena = SlotArena::new(2);
        arena.push("x".into(), &[1.0, 2.0], Metadata::new());
        arena.push("y".into(), &[3.0, 4.0], Metadata::new());
        arena.tombstone("x");
        let config = VectorConfig::new(2, DistanceMetric::Euclidean).unwrap();

        let snapshot = CollectionSnapshot::capture("c", config, &arena);
        let restored = CollectionSnapshot::decode(&snapshot.encode().unwrap())
            .unwrap()
            .into_arena()
            .unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.live_len(), 1);
        assert_eq!(restored.embedding(1), &[3.0, 4.0]);
    }

    #[test]
    fn test_file_sidecar_round_trip() {
        let dir = TempDir::new().unwrap();
        let sidecar = FileSidecar::new(dir.path().join("nested").join("c.tread"));
        assert!(sidecar.load().unwrap().is_none());

        sidecar.store(b"first").unwrap();
        sidecar.store(b"second").unwrap();
        assert_eq!(sidecar.load().unwrap().unwrap(), b"second");
        assert!(!sidecar.tmp_path().exists());
    }

    #[test]
    fn test_file_sidecar_store_syncs_existing_dir() {
        let dir = TempDir::new().unwrap();
        let sidecar = FileSidecar::new(dir.path().join("c.tread"));
        sidecar.store(&sample().encode().unwrap()).unwrap();

        let reopened = FileSidecar::new(dir.path().join("c.tread"));
        let blob = reopened.load().unwrap().unwrap();
        assert_eq!(CollectionSnapshot::decode(&blob).unwrap(), sample());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("c.tread")]);
    }
}
