//! Binary encoding of region snapshots.
//!
//! Layout (big-endian):
//!
//! ```text
//! magic u32 | version u8 | step_xz u8 | step_y u8 | min_y i32 | max_y i32
//! palette_len u32 | palette_len × (name_len u16, utf-8 bytes)
//! sample_count u32 | byte_indices u8 (0/1) | sample_count × (u8 | u16)
//! ```
//!
//! Indices are one byte wide whenever the palette has at most 255 names.

use std::str;

use solstice_biomes::{BiomeId, BiomeRegistry};
use solstice_world::{RegionCoord, SampleGrid, WorldHost, WorldId};

use crate::snapshot::RegionSnapshot;

pub const MAGIC: u32 = 0xAEB1_0B10;
pub const VERSION: u8 = 1;
pub const MAX_PALETTE: usize = u16::MAX as usize;
/// Tallest vertical extent a backup may cover.
pub const MAX_HEIGHT_SPAN: u64 = 1 << 16;
const BYTE_INDEX_LIMIT: usize = 255;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotFormatError {
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported version {0}")]
    BadVersion(u8),
    #[error("truncated backup")]
    Truncated,
    #[error("invalid utf8 in palette entry")]
    InvalidUtf8,
    #[error("zero sampling step (xz={xz}, y={y})")]
    ZeroStep { xz: u8, y: u8 },
    #[error("invalid index width flag {0}")]
    BadIndexFlag(u8),
    #[error("palette has {0} names, limit is 65535")]
    PaletteTooLarge(usize),
    #[error("palette name is {0} bytes, limit is 65535")]
    NameTooLong(usize),
    #[error("sample {index} refers to palette slot {slot} of {palette}")]
    IndexOutOfRange {
        index: usize,
        slot: u16,
        palette: usize,
    },
    #[error("height range {min_y}..{max_y} is inverted or too tall")]
    BadHeight { min_y: i32, max_y: i32 },
    #[error("{actual} samples recorded, grid expects {expected}")]
    SampleCountMismatch { expected: usize, actual: usize },
}

/// A snapshot in its persisted, name-based form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupFile {
    pub grid: SampleGrid,
    pub palette: Vec<String>,
    pub indices: Vec<u16>,
}

impl BackupFile {
    /// Builds a first-seen-order palette from the snapshot's biome names.
    pub fn from_snapshot(
        reg: &BiomeRegistry,
        snapshot: &RegionSnapshot,
    ) -> Result<Self, SnapshotFormatError> {
        let mut slots: hashbrown::HashMap<BiomeId, u16> = hashbrown::HashMap::new();
        let mut palette = Vec::new();
        let mut indices = Vec::with_capacity(snapshot.len());
        for &biome in snapshot.samples() {
            let slot = match slots.get(&biome) {
                Some(s) => *s,
                None => {
                    if palette.len() >= MAX_PALETTE {
                        return Err(SnapshotFormatError::PaletteTooLarge(palette.len() + 1));
                    }
                    let s = palette.len() as u16;
                    palette.push(reg.name_or_unknown(biome).to_string());
                    slots.insert(biome, s);
                    s
                }
            };
            indices.push(slot);
        }
        Ok(Self {
            grid: snapshot.grid(),
            palette,
            indices,
        })
    }

    #[inline]
    pub fn uses_byte_indices(&self) -> bool {
        self.palette.len() <= BYTE_INDEX_LIMIT
    }

    pub fn encode(&self) -> Result<Vec<u8>, SnapshotFormatError> {
        if self.palette.len() > MAX_PALETTE {
            return Err(SnapshotFormatError::PaletteTooLarge(self.palette.len()));
        }
        let names: usize = self.palette.iter().map(|n| 2 + n.len()).sum();
        let width = if self.uses_byte_indices() { 1 } else { 2 };
        let mut out = Vec::with_capacity(24 + names + self.indices.len() * width);
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.push(VERSION);
        out.push(self.grid.step_xz);
        out.push(self.grid.step_y);
        out.extend_from_slice(&self.grid.min_y.to_be_bytes());
        out.extend_from_slice(&self.grid.max_y.to_be_bytes());
        out.extend_from_slice(&(self.palette.len() as u32).to_be_bytes());
        for name in &self.palette {
            let bytes = name.as_bytes();
            let len = u16::try_from(bytes.len())
                .map_err(|_| SnapshotFormatError::NameTooLong(bytes.len()))?;
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(bytes);
        }
        out.extend_from_slice(&(self.indices.len() as u32).to_be_bytes());
        out.push(u8::from(self.uses_byte_indices()));
        if self.uses_byte_indices() {
            out.extend(self.indices.iter().map(|&i| i as u8));
        } else {
            for &i in &self.indices {
                out.extend_from_slice(&i.to_be_bytes());
            }
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotFormatError> {
        let mut cursor = Cursor::new(bytes);
        let magic = read_u32(&mut cursor)?;
        if magic != MAGIC {
            return Err(SnapshotFormatError::BadMagic(magic));
        }
        let version = read_u8(&mut cursor)?;
        if version != VERSION {
            return Err(SnapshotFormatError::BadVersion(version));
        }
        let step_xz = read_u8(&mut cursor)?;
        let step_y = read_u8(&mut cursor)?;
        if step_xz == 0 || step_y == 0 {
            return Err(SnapshotFormatError::ZeroStep {
                xz: step_xz,
                y: step_y,
            });
        }
        let min_y = read_u32(&mut cursor)? as i32;
        let max_y = read_u32(&mut cursor)? as i32;
        if max_y < min_y || i64::from(max_y) - i64::from(min_y) > MAX_HEIGHT_SPAN as i64 {
            return Err(SnapshotFormatError::BadHeight { min_y, max_y });
        }

        let palette_len = read_u32(&mut cursor)? as usize;
        if palette_len > MAX_PALETTE {
            return Err(SnapshotFormatError::PaletteTooLarge(palette_len));
        }
        let mut palette = Vec::with_capacity(palette_len.min(cursor.remaining() / 2));
        for _ in 0..palette_len {
            palette.push(read_string(&mut cursor)?);
        }

        let count = read_u32(&mut cursor)? as usize;
        let flag = read_u8(&mut cursor)?;
        let byte_indices = match flag {
            0 => false,
            1 => true,
            other => return Err(SnapshotFormatError::BadIndexFlag(other)),
        };
        let width = if byte_indices { 1 } else { 2 };
        if cursor.remaining() < count.saturating_mul(width) {
            return Err(SnapshotFormatError::Truncated);
        }
        let mut indices = Vec::with_capacity(count);
        for _ in 0..count {
            let slot = if byte_indices {
                u16::from(read_u8(&mut cursor)?)
            } else {
                read_u16(&mut cursor)?
            };
            indices.push(slot);
        }

        Ok(Self {
            grid: SampleGrid::new(step_xz, step_y, min_y, max_y),
            palette,
            indices,
        })
    }

    /// Resolves names against `reg`. Unknown names become `fallback`, logged
    /// once per name by the registry.
    pub fn to_snapshot(
        &self,
        reg: &BiomeRegistry,
        fallback: BiomeId,
    ) -> Result<RegionSnapshot, SnapshotFormatError> {
        if self.indices.len() != self.grid.len() {
            return Err(SnapshotFormatError::SampleCountMismatch {
                expected: self.grid.len(),
                actual: self.indices.len(),
            });
        }
        let resolved = self.resolve_palette(reg, fallback);
        let mut samples = Vec::with_capacity(self.indices.len());
        for (index, &slot) in self.indices.iter().enumerate() {
            let biome = resolved.get(slot as usize).copied().ok_or(
                SnapshotFormatError::IndexOutOfRange {
                    index,
                    slot,
                    palette: self.palette.len(),
                },
            )?;
            samples.push(biome);
        }
        Ok(RegionSnapshot::new(self.grid, samples))
    }

    /// Writes recorded samples straight into the live world. Samples whose
    /// palette slot is out of range, or whose height lies outside the world's
    /// current extent, are skipped. Returns the number of writes.
    pub fn apply(
        &self,
        reg: &BiomeRegistry,
        fallback: BiomeId,
        host: &dyn WorldHost,
        world: WorldId,
        coord: RegionCoord,
    ) -> usize {
        let Some(bounds) = host.bounds(world) else {
            return 0;
        };
        let resolved = self.resolve_palette(reg, fallback);
        let (bx, bz) = coord.origin();
        let mut writes = 0;
        for (p, &slot) in self.grid.points().zip(self.indices.iter()) {
            let Some(&biome) = resolved.get(slot as usize) else {
                continue;
            };
            if !bounds.contains_y(p.y) {
                continue;
            }
            host.set_biome(world, bx + p.lx, p.y, bz + p.lz, biome);
            writes += 1;
        }
        writes
    }

    fn resolve_palette(&self, reg: &BiomeRegistry, fallback: BiomeId) -> Vec<BiomeId> {
        self.palette
            .iter()
            .map(|n| reg.resolve_or(n, fallback, "backup palette"))
            .collect()
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SnapshotFormatError> {
        if self.remaining() < n {
            return Err(SnapshotFormatError::Truncated);
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }
}

fn read_u8(cursor: &mut Cursor<'_>) -> Result<u8, SnapshotFormatError> {
    Ok(cursor.take(1)?[0])
}

fn read_u16(cursor: &mut Cursor<'_>) -> Result<u16, SnapshotFormatError> {
    let b = cursor.take(2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(cursor: &mut Cursor<'_>) -> Result<u32, SnapshotFormatError> {
    let b = cursor.take(4)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_string(cursor: &mut Cursor<'_>) -> Result<String, SnapshotFormatError> {
    let len = read_u16(cursor)? as usize;
    let bytes = cursor.take(len)?;
    let text = str::from_utf8(bytes).map_err(|_| SnapshotFormatError::InvalidUtf8)?;
    Ok(text.to_owned())
}
