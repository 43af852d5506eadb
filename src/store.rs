//! The on-disk unit database and its read-only runtime view.
//!
//! The database is a single little-endian file: a 64-byte header, an index
//! table, a chained hash table, a NUL-terminated string pool, and a flat
//! 16-bit PCM sample pool. The file is memory-mapped at open; the header,
//! index, and hash table are copied out into aligned structures and
//! bounds-checked once, so every later access can slice without
//! re-validation. The sample pool (the bulk of the file) stays in the map.

use std::path::Path;

use memmap2::Mmap;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Format constants
// ─────────────────────────────────────────────────────────────────────────────

/// `"CTTS"` in little-endian.
pub const MAGIC: u32 = 0x5354_5443;
pub const VERSION: u32 = 1;
/// Sample rate of every unit database and of the synthesized output.
pub const SAMPLE_RATE: u32 = 22_050;
pub const BITS_PER_SAMPLE: u32 = 16;

/// Sentinel for an empty hash bucket / end of a chain.
pub const EMPTY: u32 = 0xFFFF_FFFF;

pub const HEADER_SIZE: usize = 64;
pub const INDEX_ENTRY_SIZE: usize = 32;
/// The hash table is sized to the next power of two at or above
/// `unit_count / HASH_TABLE_LOAD`.
pub const HASH_TABLE_LOAD: f64 = 0.7;

/// FNV-1a 32-bit hash, the index key for unit texts.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;
    let mut hash = OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// Header and index entry
// ─────────────────────────────────────────────────────────────────────────────

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(word)
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    let mut word = [0u8; 2];
    word.copy_from_slice(&bytes[offset..offset + 2]);
    u16::from_le_bytes(word)
}

/// The fixed-size database header.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub unit_count: u32,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub index_offset: u32,
    pub strings_offset: u32,
    pub audio_offset: u32,
    pub total_samples: u32,
    pub max_unit_chars: u32,
    pub hash_table_size: u32,
    pub hash_table_offset: u32,
}

impl Header {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            magic: read_u32(bytes, 0),
            version: read_u32(bytes, 4),
            unit_count: read_u32(bytes, 8),
            sample_rate: read_u32(bytes, 12),
            bits_per_sample: read_u32(bytes, 16),
            index_offset: read_u32(bytes, 20),
            strings_offset: read_u32(bytes, 24),
            audio_offset: read_u32(bytes, 28),
            total_samples: read_u32(bytes, 32),
            max_unit_chars: read_u32(bytes, 36),
            hash_table_size: read_u32(bytes, 40),
            hash_table_offset: read_u32(bytes, 44),
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let fields = [
            self.magic,
            self.version,
            self.unit_count,
            self.sample_rate,
            self.bits_per_sample,
            self.index_offset,
            self.strings_offset,
            self.audio_offset,
            self.total_samples,
            self.max_unit_chars,
            self.hash_table_size,
            self.hash_table_offset,
        ];
        for (i, field) in fields.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&field.to_le_bytes());
        }
        // remaining 16 bytes stay reserved (zero)
        out
    }
}

/// One unit's index record.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub hash: u32,
    pub string_offset: u32,
    pub string_len: u16,
    pub char_count: u16,
    pub audio_offset: u32,
    pub sample_count: u32,
    pub flags: u32,
    pub next_hash: u32,
}

impl IndexEntry {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hash: read_u32(bytes, 0),
            string_offset: read_u32(bytes, 4),
            string_len: read_u16(bytes, 8),
            char_count: read_u16(bytes, 10),
            audio_offset: read_u32(bytes, 12),
            sample_count: read_u32(bytes, 16),
            flags: read_u32(bytes, 20),
            next_hash: read_u32(bytes, 24),
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut out = [0u8; INDEX_ENTRY_SIZE];
        out[0..4].copy_from_slice(&self.hash.to_le_bytes());
        out[4..8].copy_from_slice(&self.string_offset.to_le_bytes());
        out[8..10].copy_from_slice(&self.string_len.to_le_bytes());
        out[10..12].copy_from_slice(&self.char_count.to_le_bytes());
        out[12..16].copy_from_slice(&self.audio_offset.to_le_bytes());
        out[16..20].copy_from_slice(&self.sample_count.to_le_bytes());
        out[20..24].copy_from_slice(&self.flags.to_le_bytes());
        out[24..28].copy_from_slice(&self.next_hash.to_le_bytes());
        // final 4 bytes reserved
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// UnitStore
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only view over a mapped unit database.
///
/// Immutable after [`UnitStore::open`]; safe to share by reference between
/// threads.
#[derive(Debug)]
pub struct UnitStore {
    map: Mmap,
    header: Header,
    index: Vec<IndexEntry>,
    buckets: Vec<u32>,
    /// Unit texts, decoded out of the string pool in index order.
    texts: Vec<String>,
}

impl UnitStore {
    /// Map a database file and validate its entire index.
    ///
    /// Any inconsistency — bad magic, wrong version, truncated region,
    /// out-of-range string or audio window, chain link past the index,
    /// non-UTF-8 unit text — fails here so later accesses need no checks.
    pub fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Read(err)
            }
        })?;
        // Safety: the map is read-only and the builder never rewrites a
        // database in place; external truncation while open is undefined
        // behaviour shared with every mmap consumer.
        let map = unsafe { Mmap::map(&file) }.map_err(Error::Read)?;

        if map.len() < HEADER_SIZE {
            return Err(Error::InvalidFormat(format!(
                "file is {} bytes, smaller than the header",
                map.len()
            )));
        }
        let header = Header::from_bytes(&map[..HEADER_SIZE]);
        if header.magic != MAGIC {
            return Err(Error::InvalidFormat(format!(
                "bad magic 0x{:08x}",
                header.magic
            )));
        }
        if header.version != VERSION {
            return Err(Error::VersionMismatch {
                found: header.version,
                expected: VERSION,
            });
        }
        if header.hash_table_size == 0 {
            return Err(Error::InvalidFormat("hash table size is zero".into()));
        }

        let file_len = map.len() as u64;
        let unit_count = header.unit_count as usize;

        let index_end =
            header.index_offset as u64 + unit_count as u64 * INDEX_ENTRY_SIZE as u64;
        let buckets_end = header.hash_table_offset as u64 + header.hash_table_size as u64 * 4;
        let audio_end = header.audio_offset as u64 + header.total_samples as u64 * 2;
        if index_end > file_len || buckets_end > file_len || audio_end > file_len {
            return Err(Error::InvalidFormat("region extends past end of file".into()));
        }
        if header.strings_offset > header.audio_offset || header.audio_offset as u64 > file_len {
            return Err(Error::InvalidFormat("string pool region is inconsistent".into()));
        }
        let strings_size = (header.audio_offset - header.strings_offset) as u64;

        let index_bytes = &map[header.index_offset as usize..index_end as usize];
        let mut index = Vec::with_capacity(unit_count);
        let mut texts = Vec::with_capacity(unit_count);
        for i in 0..unit_count {
            let entry = IndexEntry::from_bytes(&index_bytes[i * INDEX_ENTRY_SIZE..]);
            // strict: the NUL terminator must also fit inside the pool
            if entry.string_offset as u64 + entry.string_len as u64 >= strings_size {
                return Err(Error::InvalidFormat(format!(
                    "unit {} string window out of range",
                    i
                )));
            }
            if entry.audio_offset as u64 + entry.sample_count as u64
                > header.total_samples as u64
            {
                return Err(Error::InvalidFormat(format!(
                    "unit {} audio window out of range",
                    i
                )));
            }
            if entry.next_hash != EMPTY && entry.next_hash as usize >= unit_count {
                return Err(Error::InvalidFormat(format!(
                    "unit {} chain link out of range",
                    i
                )));
            }
            let start = header.strings_offset as usize + entry.string_offset as usize;
            let text = std::str::from_utf8(&map[start..start + entry.string_len as usize])
                .map_err(|_| Error::InvalidFormat(format!("unit {} text is not UTF-8", i)))?;
            texts.push(text.to_string());
            index.push(entry);
        }

        let bucket_bytes =
            &map[header.hash_table_offset as usize..buckets_end as usize];
        let mut buckets = Vec::with_capacity(header.hash_table_size as usize);
        for i in 0..header.hash_table_size as usize {
            let head = read_u32(bucket_bytes, i * 4);
            if head != EMPTY && head as usize >= unit_count {
                return Err(Error::InvalidFormat(format!(
                    "bucket {} head out of range",
                    i
                )));
            }
            buckets.push(head);
        }

        Ok(Self {
            map,
            header,
            index,
            buckets,
            texts,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn unit_count(&self) -> u32 {
        self.header.unit_count
    }

    /// Longest unit text in the database, in characters.
    pub fn max_unit_chars(&self) -> usize {
        self.header.max_unit_chars as usize
    }

    /// Find the unit whose (folded) text equals `text`. Expected O(1);
    /// never fails — an unknown text is simply absent.
    pub fn lookup(&self, text: &[u8]) -> Option<u32> {
        let hash = fnv1a(text);
        let mut idx = self.buckets[(hash % self.header.hash_table_size) as usize];

        // Chains produced by the builder are acyclic; the step bound keeps a
        // corrupted database from hanging the walk.
        let mut steps = 0usize;
        while idx != EMPTY && steps <= self.index.len() {
            let entry = &self.index[idx as usize];
            if entry.hash == hash
                && entry.string_len as usize == text.len()
                && self.texts[idx as usize].as_bytes() == text
            {
                return Some(idx);
            }
            idx = entry.next_hash;
            steps += 1;
        }
        None
    }

    /// The unit's folded text.
    pub fn unit_text(&self, idx: u32) -> &str {
        &self.texts[idx as usize]
    }

    pub fn index_entry(&self, idx: u32) -> &IndexEntry {
        &self.index[idx as usize]
    }

    /// Decode the unit's samples out of the mapped pool.
    ///
    /// The pool is not guaranteed to be 2-byte aligned in the map, so the
    /// window is copied into an owned, aligned vector; the synthesis path
    /// needs its own mutable copy anyway.
    pub fn unit_samples(&self, idx: u32) -> Vec<i16> {
        let entry = &self.index[idx as usize];
        let start = self.header.audio_offset as usize + entry.audio_offset as usize * 2;
        let end = start + entry.sample_count as usize * 2;
        self.map[start..end]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
