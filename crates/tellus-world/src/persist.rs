//! Sparse modification records.
//!
//! Only edits are persisted; the base world is a pure function of the seed
//! and configuration. A record stores the edited lattice samples of one
//! chunk as `{index -> value}` pairs, so reapplying it after base
//! regeneration reproduces the lattice bitwise.
//!
//! Wire layout: a little-endian header length, a bincode header with magic
//! bytes and schema version, then the LZ4-compressed bincode entry list.

use serde::{Deserialize, Serialize};
use tellus_common::{ChunkCoord, ChunkError};

use crate::chunk::Chunk;

/// Magic bytes identifying a modification record.
const MAGIC: [u8; 4] = *b"TMOD";
/// Current record schema version.
const VERSION: u16 = 1;

/// Record header for format identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordHeader {
    magic: [u8; 4],
    version: u16,
    coord: ChunkCoord,
    resolution: u32,
    entry_count: u32,
}

/// Sparse edits of one chunk's density lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationRecord {
    /// The edited chunk.
    pub coord: ChunkCoord,
    /// Lattice resolution the indices refer to.
    pub resolution: u32,
    /// Edited samples as `(lattice index, value)`, sorted by index.
    pub entries: Vec<(u32, f32)>,
}

impl ModificationRecord {
    /// Captures a chunk's current edits.
    ///
    /// Returns `None` when the chunk has no modifications.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn capture(chunk: &Chunk) -> Option<Self> {
        if chunk.modifications().is_empty() {
            return None;
        }
        let mut entries: Vec<(u32, f32)> = chunk
            .modifications()
            .iter()
            .map(|(&index, &value)| (index, value))
            .collect();
        entries.sort_unstable_by_key(|(index, _)| *index);
        Some(Self {
            coord: chunk.coord(),
            resolution: chunk.resolution() as u32,
            entries,
        })
    }

    /// Applies the record's edits to a chunk.
    ///
    /// # Errors
    /// Fails when the record targets a different coordinate or resolution.
    pub fn apply(&self, chunk: &mut Chunk) -> Result<(), ChunkError> {
        if chunk.coord() != self.coord {
            return Err(ChunkError::DeserializationFailed(format!(
                "record for chunk {} applied to chunk {}",
                self.coord,
                chunk.coord()
            )));
        }
        #[allow(clippy::cast_possible_truncation)]
        if chunk.resolution() as u32 != self.resolution {
            return Err(ChunkError::DeserializationFailed(format!(
                "record resolution {} does not match chunk resolution {}",
                self.resolution,
                chunk.resolution()
            )));
        }
        chunk.apply_modifications(&self.entries);
        Ok(())
    }

    /// Serializes the record to bytes.
    ///
    /// # Errors
    /// Returns [`ChunkError::SerializationFailed`] on encoder failure.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(&self) -> Result<Vec<u8>, ChunkError> {
        let header = RecordHeader {
            magic: MAGIC,
            version: VERSION,
            coord: self.coord,
            resolution: self.resolution,
            entry_count: self.entries.len() as u32,
        };

        let header_bytes = bincode::serialize(&header)
            .map_err(|e| ChunkError::SerializationFailed(e.to_string()))?;
        let entry_bytes = bincode::serialize(&self.entries)
            .map_err(|e| ChunkError::SerializationFailed(e.to_string()))?;
        let compressed = lz4_flex::compress_prepend_size(&entry_bytes);

        let mut result = Vec::with_capacity(4 + header_bytes.len() + compressed.len());
        result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        result.extend_from_slice(&header_bytes);
        result.extend_from_slice(&compressed);
        Ok(result)
    }

    /// Deserializes a record from bytes.
    ///
    /// # Errors
    /// Returns a [`ChunkError`] on malformed input, wrong magic bytes, or
    /// an unsupported schema version.
    pub fn decode(bytes: &[u8]) -> Result<Self, ChunkError> {
        if bytes.len() < 8 {
            return Err(ChunkError::DeserializationFailed("data too short".into()));
        }

        let header_len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        if bytes.len() < 4 + header_len {
            return Err(ChunkError::DeserializationFailed(
                "header length mismatch".into(),
            ));
        }

        let header: RecordHeader = bincode::deserialize(&bytes[4..4 + header_len])
            .map_err(|e| ChunkError::DeserializationFailed(e.to_string()))?;
        if header.magic != MAGIC {
            return Err(ChunkError::InvalidFormat);
        }
        if header.version != VERSION {
            return Err(ChunkError::VersionMismatch {
                expected: VERSION,
                actual: header.version,
            });
        }

        let entry_bytes = lz4_flex::decompress_size_prepended(&bytes[4 + header_len..])
            .map_err(|e| ChunkError::CompressionFailed(e.to_string()))?;
        let entries: Vec<(u32, f32)> = bincode::deserialize(&entry_bytes)
            .map_err(|e| ChunkError::DeserializationFailed(e.to_string()))?;
        if entries.len() != header.entry_count as usize {
            return Err(ChunkError::DeserializationFailed(
                "entry count mismatch".into(),
            ));
        }

        Ok(Self {
            coord: header.coord,
            resolution: header.resolution,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::SharedBoundaryStore;
    use glam::Vec3;
    use tellus_worldgen::density::{DensityField, PlanetShape};
    use tellus_worldgen::layers::{LayerArena, LayerRange};

    fn sphere_field() -> DensityField {
        DensityField::new(
            PlanetShape {
                radius: 50.0,
                ..Default::default()
            },
            LayerArena::new(1, Vec::new()),
            LayerRange::EMPTY,
            None,
            None,
        )
    }

    fn edited_chunk(field: &DensityField) -> Chunk {
        let store = SharedBoundaryStore::new(16, 16.0);
        let mut chunk = Chunk::new(ChunkCoord::new(2, 0, 0), 16, 16.0);
        chunk
            .generate_density_field(&store, field, None)
            .expect("generation");
        assert!(chunk.modify(Vec3::new(47.0, 9.0, 9.0), 3.0, -8.0));
        chunk
    }

    #[test]
    fn test_capture_empty_chunk_is_none() {
        let field = sphere_field();
        let store = SharedBoundaryStore::new(16, 16.0);
        let mut chunk = Chunk::new(ChunkCoord::new(2, 0, 0), 16, 16.0);
        chunk
            .generate_density_field(&store, &field, None)
            .expect("generation");
        assert!(ModificationRecord::capture(&chunk).is_none());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let field = sphere_field();
        let chunk = edited_chunk(&field);
        let record = ModificationRecord::capture(&chunk).expect("record");

        let bytes = record.encode().expect("encode");
        let decoded = ModificationRecord::decode(&bytes).expect("decode");
        assert_eq!(record, decoded);
    }

    #[test]
    fn test_apply_restores_lattice_bitwise() {
        let field = sphere_field();
        let chunk = edited_chunk(&field);
        let record = ModificationRecord::capture(&chunk).expect("record");
        let bytes = record.encode().expect("encode");

        // Fresh base generation, then reapply the decoded record.
        let store = SharedBoundaryStore::new(16, 16.0);
        let mut restored = Chunk::new(ChunkCoord::new(2, 0, 0), 16, 16.0);
        restored
            .generate_density_field(&store, &field, None)
            .expect("generation");
        ModificationRecord::decode(&bytes)
            .expect("decode")
            .apply(&mut restored)
            .expect("apply");

        for (index, (&want, &got)) in chunk
            .lattice()
            .samples()
            .iter()
            .zip(restored.lattice().samples().iter())
            .enumerate()
        {
            assert_eq!(want.to_bits(), got.to_bits(), "sample {index}");
        }
        assert!(restored.is_modified());
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let field = sphere_field();
        let chunk = edited_chunk(&field);
        let mut bytes = ModificationRecord::capture(&chunk)
            .expect("record")
            .encode()
            .expect("encode");
        // Corrupt the magic inside the header.
        bytes[4] = b'X';
        assert!(matches!(
            ModificationRecord::decode(&bytes),
            Err(ChunkError::InvalidFormat)
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        assert!(ModificationRecord::decode(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_apply_rejects_wrong_chunk() {
        let field = sphere_field();
        let chunk = edited_chunk(&field);
        let record = ModificationRecord::capture(&chunk).expect("record");

        let mut other = Chunk::new(ChunkCoord::new(9, 9, 9), 16, 16.0);
        assert!(record.apply(&mut other).is_err());
    }
}
