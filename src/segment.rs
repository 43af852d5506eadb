//! Unit selection: greedy matching with phonotactic scoring and one-step
//! look-ahead.
//!
//! At each position the segmenter gathers every database hit from the
//! longest candidate down to a single character, drops candidates the
//! Portuguese rules forbid, and ranks the survivors. Look-ahead measures how
//! much of the following text the best plain match would cover if this
//! candidate were taken, so the choice avoids leaving an awkward remainder.

use crate::phonotactics::{rejects_single_consonant, syllable_score};
use crate::store::UnitStore;

/// Maximum candidates examined per position.
const MAX_CANDIDATES: usize = 64;

/// A chosen unit and how far to advance the cursor.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    /// Bytes consumed from the input text.
    pub advance: usize,
    /// Index of the chosen unit in the store.
    pub unit: u32,
}

struct Candidate {
    byte_len: usize,
    char_count: usize,
    unit: u32,
    score: i32,
    lookahead: usize,
}

/// Byte offsets of the first `max_chars` character boundaries at `pos`,
/// stopping at ASCII whitespace. `boundaries[i]` is the byte length of an
/// `i`-character candidate.
fn char_boundaries(text: &str, pos: usize, max_chars: usize) -> Vec<usize> {
    let mut boundaries = vec![0];
    for (offset, c) in text[pos..].char_indices() {
        if c.is_ascii_whitespace() || boundaries.len() > max_chars {
            break;
        }
        boundaries.push(offset + c.len_utf8());
    }
    boundaries
}

/// Plain longest-match length in bytes at `pos`, with no phonotactic
/// filtering. Returns 0 when nothing matches.
fn longest_match(store: &UnitStore, text: &str, pos: usize, max_chars: usize) -> usize {
    let mut ends = Vec::new();
    for (offset, c) in text[pos..].char_indices() {
        if ends.len() == max_chars {
            break;
        }
        ends.push(offset + c.len_utf8());
    }
    for &len in ends.iter().rev() {
        if store.lookup(text[pos..pos + len].as_bytes()).is_some() {
            return len;
        }
    }
    0
}

/// Select the unit to emit at `pos`, or `None` when no candidate survives
/// (the caller emits unknown-silence and advances one character).
pub fn select_next(
    store: &UnitStore,
    text: &str,
    pos: usize,
    at_word_start: bool,
    max_chars: usize,
) -> Option<Selection> {
    let boundaries = char_boundaries(text, pos, max_chars);
    let try_chars = boundaries.len() - 1;
    if try_chars == 0 {
        return None;
    }

    // Candidates from longest to shortest.
    let mut candidates: Vec<Candidate> = Vec::new();
    for char_count in (1..=try_chars).rev() {
        if candidates.len() >= MAX_CANDIDATES {
            break;
        }
        let byte_len = boundaries[char_count];
        let candidate = &text[pos..pos + byte_len];
        let Some(unit) = store.lookup(candidate.as_bytes()) else {
            continue;
        };
        if char_count == 1 {
            let c = candidate.chars().next().expect("one char");
            let following = text[pos + byte_len..].chars().next();
            if rejects_single_consonant(c, following, at_word_start) {
                continue;
            }
        }
        candidates.push(Candidate {
            byte_len,
            char_count,
            unit,
            score: syllable_score(candidate, at_word_start),
            lookahead: 0,
        });
    }

    if candidates.is_empty() {
        return None;
    }
    if candidates.len() == 1 {
        return Some(Selection {
            advance: candidates[0].byte_len,
            unit: candidates[0].unit,
        });
    }

    // One-step look-ahead: length of the best plain match right after each
    // candidate, skipping any whitespace in between.
    for candidate in &mut candidates {
        let mut next = pos + candidate.byte_len;
        while next < text.len() && matches!(text.as_bytes()[next], b' ' | b'\t' | b'\n') {
            next += 1;
        }
        if next < text.len() {
            candidate.lookahead = longest_match(store, text, next, max_chars);
        }
    }

    // Ordered keys: score, then combined coverage, then end-of-word rules.
    let mut best = 0;
    for i in 1..candidates.len() {
        let (cur, top) = (&candidates[i], &candidates[best]);
        let cur_total = cur.char_count + cur.lookahead;
        let top_total = top.char_count + top.lookahead;

        if cur.score > top.score {
            best = i;
        } else if cur.score == top.score {
            if cur_total > top_total {
                best = i;
            } else if cur_total == top_total {
                let top_at_end = top.lookahead == 0;
                let cur_at_end = cur.lookahead == 0;
                if !top_at_end && cur_at_end {
                    best = i;
                } else if top_at_end == cur_at_end {
                    let prefer_current = if cur_at_end {
                        cur.char_count > top.char_count
                    } else {
                        cur.lookahead > top.lookahead
                    };
                    if prefer_current {
                        best = i;
                    }
                }
            }
        }
    }

    Some(Selection {
        advance: candidates[best].byte_len,
        unit: candidates[best].unit,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BuildUnit;

    fn store_with(units: &[&str]) -> (tempfile::TempDir, UnitStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("units.db");
        let mut build: Vec<BuildUnit> = units
            .iter()
            .map(|text| BuildUnit::new(text, vec![100; 64]))
            .collect();
        crate::builder::write_database(&mut build, &path).unwrap();
        let store = UnitStore::open(&path).unwrap();
        (dir, store)
    }

    fn selected_text<'s>(store: &'s UnitStore, text: &str, at_word_start: bool) -> Option<&'s str> {
        select_next(store, text, 0, at_word_start, store.max_unit_chars())
            .map(|sel| store.unit_text(sel.unit))
    }

    #[test]
    fn test_longest_match_wins_alone() {
        let (_dir, store) = store_with(&["ba", "bala"]);
        assert_eq!(selected_text(&store, "bala", true), Some("bala"));
    }

    #[test]
    fn test_no_match_returns_none() {
        let (_dir, store) = store_with(&["ba"]);
        assert_eq!(selected_text(&store, "xyz", true), None);
        assert_eq!(selected_text(&store, "", true), None);
    }

    #[test]
    fn test_candidates_stop_at_whitespace() {
        let (_dir, store) = store_with(&["a b", "a"]);
        // "a b" is in the store but candidates never span whitespace
        assert_eq!(selected_text(&store, "a b", true), Some("a"));
    }

    #[test]
    fn test_single_consonant_rejected_at_word_start() {
        let (_dir, store) = store_with(&["b", "a"]);
        assert_eq!(selected_text(&store, "ba", true), None);
        // mid-word the same consonant is allowed
        assert_eq!(selected_text(&store, "b", false), Some("b"));
    }

    #[test]
    fn test_digraph_not_split() {
        let (_dir, store) = store_with(&["c", "h", "a", "ch"]);
        // "cha": selecting "c" would split the digraph; "ch" must win
        assert_eq!(selected_text(&store, "cha", true), Some("ch"));
        assert_eq!(selected_text(&store, "cha", false), Some("ch"));
    }

    #[test]
    fn test_lookahead_prefers_clean_continuation() {
        // "paca": "pa" leaves "ca" (2-char look-ahead, total 4);
        // "pac" leaves "a" (total 4); same score? "pa" 20+25cv+10open=55,
        // "pac" 30+25=55 — coverage ties at 4, neither at end,
        // look-ahead 2 beats 1, so "pa" wins.
        let (_dir, store) = store_with(&["pa", "pac", "ca", "a"]);
        assert_eq!(selected_text(&store, "paca", true), Some("pa"));
    }

    #[test]
    fn test_end_hitting_tiebreak() {
        // "cem" vs "ce"+"m": both score 55 at word start and cover 3 chars;
        // only "cem" reaches the end of the word and is preferred.
        let (_dir, store) = store_with(&["cem", "ce", "m"]);
        assert_eq!(selected_text(&store, "cem", true), Some("cem"));
    }

    #[test]
    fn test_lookahead_skips_whitespace() {
        // at "ba" in "ba ca": look-ahead jumps the space and sees "ca"
        let (_dir, store) = store_with(&["b", "ba", "ca"]);
        let sel = select_next(&store, "ba ca", 0, false, store.max_unit_chars()).unwrap();
        assert_eq!(store.unit_text(sel.unit), "ba");
        assert_eq!(sel.advance, 2);
    }

    #[test]
    fn test_multibyte_candidates() {
        let (_dir, store) = store_with(&["çã", "o"]);
        let sel = select_next(&store, "não", 1, false, store.max_unit_chars());
        assert!(sel.is_none()); // "ão" is not in the store
        let sel = select_next(&store, "ção", 0, false, store.max_unit_chars()).unwrap();
        assert_eq!(store.unit_text(sel.unit), "çã");
        assert_eq!(sel.advance, "çã".len());
    }
}
