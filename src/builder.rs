//! Offline database builder.
//!
//! Reads per-unit WAV recordings plus a pipe-delimited index
//! (`filename|text|display`), folds the unit texts onto the lookup alphabet,
//! and packs everything into the single-file database the engine maps at
//! runtime. Units are sorted longest-text-first, and the chained hash table
//! is written ready to use.

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};
use crate::store::{
    fnv1a, Header, IndexEntry, BITS_PER_SAMPLE, EMPTY, HASH_TABLE_LOAD, HEADER_SIZE,
    INDEX_ENTRY_SIZE, MAGIC, SAMPLE_RATE, VERSION,
};
use crate::text::fold;
use crate::wav::read_wav;

/// One unit waiting to be packed.
#[derive(Debug)]
pub struct BuildUnit {
    text: String,
    char_count: usize,
    hash: u32,
    samples: Vec<i16>,
}

impl BuildUnit {
    /// Create a unit from its display text and samples. The text is folded
    /// here, with the same fold the engine applies to lookups.
    pub fn new(text: &str, samples: Vec<i16>) -> Self {
        let folded = fold(text);
        let char_count = folded.chars().count();
        let hash = fnv1a(folded.as_bytes());
        Self {
            text: folded,
            char_count,
            hash,
            samples,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Totals reported after a successful build.
#[derive(Debug, Clone, Copy)]
pub struct BuildSummary {
    pub unit_count: usize,
    pub max_unit_chars: usize,
    pub total_samples: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Index file loading
// ─────────────────────────────────────────────────────────────────────────────

/// Load units listed in an index file, reading `<wav_dir>/<filename>.wav`
/// for each line. A WAV that fails to decode is logged and skipped; the
/// build continues with the remaining units.
pub fn load_units_from_index(wav_dir: &Path, index_file: &Path) -> Result<Vec<BuildUnit>> {
    let content = std::fs::read_to_string(index_file).map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(index_file.to_path_buf())
        } else {
            Error::Read(err)
        }
    })?;

    let mut units = Vec::new();
    for line in content.lines() {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('|');
        let (Some(filename), Some(text)) = (fields.next(), fields.next()) else {
            continue;
        };
        if filename.is_empty() || text.is_empty() {
            continue;
        }

        let path = wav_dir.join(format!("{filename}.wav"));
        match read_wav(&path) {
            Ok(samples) => units.push(BuildUnit::new(text, samples)),
            Err(err) => {
                log::warn!("skipping {}: {}", path.display(), err);
            }
        }
    }
    Ok(units)
}

// ─────────────────────────────────────────────────────────────────────────────
// Database writing
// ─────────────────────────────────────────────────────────────────────────────

/// Sort the units, build the chained hash index, and write the database
/// file. The unit vector is sorted in place (longest text first, then
/// lexicographic) so the index order matches the string and sample pools.
pub fn write_database(units: &mut Vec<BuildUnit>, output: &Path) -> Result<BuildSummary> {
    units.sort_by(|a, b| {
        b.char_count
            .cmp(&a.char_count)
            .then_with(|| a.text.cmp(&b.text))
    });

    let unit_count = units.len();
    let mut strings_size = 0u64;
    let mut total_samples = 0u64;
    let mut max_unit_chars = 0usize;
    for unit in units.iter() {
        if unit.text.len() > u16::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "unit text too long: {}",
                unit.text
            )));
        }
        strings_size += unit.text.len() as u64 + 1;
        total_samples += unit.samples.len() as u64;
        max_unit_chars = max_unit_chars.max(unit.char_count);
    }
    if total_samples > u32::MAX as u64 {
        return Err(Error::InvalidArgument(
            "sample pool exceeds the 32-bit format limit".into(),
        ));
    }

    let mut hash_table_size = 1u64;
    while (hash_table_size as f64) < unit_count as f64 / HASH_TABLE_LOAD {
        hash_table_size *= 2;
    }

    let index_offset = HEADER_SIZE as u64;
    let hash_table_offset = index_offset + unit_count as u64 * INDEX_ENTRY_SIZE as u64;
    let strings_offset = hash_table_offset + hash_table_size * 4;
    let audio_offset = strings_offset + strings_size;
    if audio_offset + total_samples * 2 > u32::MAX as u64 {
        return Err(Error::InvalidArgument(
            "database exceeds the 32-bit format limit".into(),
        ));
    }

    // Index entries plus the bucket chains.
    let mut entries = Vec::with_capacity(unit_count);
    let mut string_pos = 0u32;
    let mut audio_pos = 0u32;
    for unit in units.iter() {
        entries.push(IndexEntry {
            hash: unit.hash,
            string_offset: string_pos,
            string_len: unit.text.len() as u16,
            char_count: unit.char_count as u16,
            audio_offset: audio_pos,
            sample_count: unit.samples.len() as u32,
            flags: 0,
            next_hash: EMPTY,
        });
        string_pos += unit.text.len() as u32 + 1;
        audio_pos += unit.samples.len() as u32;
    }

    let mut buckets = vec![EMPTY; hash_table_size as usize];
    for i in 0..unit_count {
        let slot = (entries[i].hash % hash_table_size as u32) as usize;
        if buckets[slot] == EMPTY {
            buckets[slot] = i as u32;
        } else {
            let mut tail = buckets[slot] as usize;
            while entries[tail].next_hash != EMPTY {
                tail = entries[tail].next_hash as usize;
            }
            entries[tail].next_hash = i as u32;
        }
    }

    let header = Header {
        magic: MAGIC,
        version: VERSION,
        unit_count: unit_count as u32,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        index_offset: index_offset as u32,
        strings_offset: strings_offset as u32,
        audio_offset: audio_offset as u32,
        total_samples: total_samples as u32,
        max_unit_chars: max_unit_chars as u32,
        hash_table_size: hash_table_size as u32,
        hash_table_offset: hash_table_offset as u32,
    };

    let file = std::fs::File::create(output).map_err(Error::Write)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(&header.to_bytes()).map_err(Error::Write)?;
    for entry in &entries {
        writer.write_all(&entry.to_bytes()).map_err(Error::Write)?;
    }
    for &bucket in &buckets {
        writer
            .write_all(&bucket.to_le_bytes())
            .map_err(Error::Write)?;
    }
    for unit in units.iter() {
        writer.write_all(unit.text.as_bytes()).map_err(Error::Write)?;
        writer.write_all(&[0]).map_err(Error::Write)?;
    }
    for unit in units.iter() {
        for &sample in &unit.samples {
            writer
                .write_all(&sample.to_le_bytes())
                .map_err(Error::Write)?;
        }
    }
    writer.flush().map_err(Error::Write)?;

    Ok(BuildSummary {
        unit_count,
        max_unit_chars,
        total_samples,
    })
}

/// Build a database from letter and syllable datasets.
///
/// A missing syllable index degrades to a letters-only database, mirroring
/// datasets recorded in stages.
pub fn build_database(
    letters_dir: &Path,
    letters_index: &Path,
    syllables_dir: &Path,
    syllables_index: &Path,
    output: &Path,
) -> Result<BuildSummary> {
    let mut units = load_units_from_index(letters_dir, letters_index)?;
    log::info!("loaded {} letter units", units.len());

    match load_units_from_index(syllables_dir, syllables_index) {
        Ok(syllables) => {
            log::info!("loaded {} syllable units", syllables.len());
            units.extend(syllables);
        }
        Err(err) => {
            log::warn!("no syllable units ({}), continuing with letters only", err);
        }
    }

    write_database(&mut units, output)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UnitStore;

    #[test]
    fn test_units_sorted_longest_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.db");
        let mut units = vec![
            BuildUnit::new("a", vec![1]),
            BuildUnit::new("abc", vec![2]),
            BuildUnit::new("ab", vec![3]),
        ];
        write_database(&mut units, &path).unwrap();
        let store = UnitStore::open(&path).unwrap();
        assert_eq!(store.unit_text(0), "abc");
        assert_eq!(store.unit_text(1), "ab");
        assert_eq!(store.unit_text(2), "a");
    }

    #[test]
    fn test_build_folds_texts() {
        let unit = BuildUnit::new("ÇA", vec![]);
        assert_eq!(unit.text(), "ça");
    }

    #[test]
    fn test_summary_totals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.db");
        let mut units = vec![
            BuildUnit::new("lha", vec![0; 30]),
            BuildUnit::new("o", vec![0; 12]),
        ];
        let summary = write_database(&mut units, &path).unwrap();
        assert_eq!(summary.unit_count, 2);
        assert_eq!(summary.max_unit_chars, 3);
        assert_eq!(summary.total_samples, 42);

        let store = UnitStore::open(&path).unwrap();
        assert_eq!(store.header().total_samples, 42);
        assert_eq!(store.header().sample_rate, SAMPLE_RATE);
    }

    #[test]
    fn test_load_units_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let wavs = dir.path().join("wavs");
        std::fs::create_dir(&wavs).unwrap();

        let tone: Vec<i16> = (0..500).map(|i| (i % 100) as i16 * 100).collect();
        crate::wav::write_wav(&wavs.join("u_ba.wav"), &tone, SAMPLE_RATE).unwrap();

        let index = dir.path().join("letters.txt");
        std::fs::write(
            &index,
            "u_ba|ba|BA\n\nmissing|zz|ZZ\nmalformed line without pipes\n",
        )
        .unwrap();

        let units = load_units_from_index(&wavs, &index).unwrap();
        // the missing WAV is skipped, the malformed line ignored
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text(), "ba");
        assert_eq!(units[0].samples.len(), 500);
    }

    #[test]
    fn test_missing_index_file() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            load_units_from_index(dir.path(), &dir.path().join("none.txt")).unwrap_err();
        assert_eq!(err.code(), -2);
    }
}
