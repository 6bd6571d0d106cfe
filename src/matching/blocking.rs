// src/matching/blocking.rs - Candidate generation through overlapping block keys
//
// Two records are only ever compared when they share at least one key. This
// trades recall for tractability.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::core::NormalizedRecord;
use crate::utils::pipeline_state::ScanCursor;
use crate::utils::constants::{
    CATCH_ALL_BLOCK, FIRST_NAME_PREFIX_LEN, LOCATION_PREFIX_LEN, PHONE_BLOCK_SUFFIX_LEN,
};

/// Multi-map from block key to the positions of the records carrying it.
/// Positions within a block are ascending.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BlockIndex {
    blocks: BTreeMap<String, Vec<usize>>,
}

impl BlockIndex {
    pub fn insert(&mut self, key: String, position: usize) {
        let members = self.blocks.entry(key).or_default();
        if members.last() != Some(&position) {
            members.push(position);
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[usize]> {
        self.blocks.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.blocks.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Blocks with at least two members; only these produce pairs.
    pub fn candidate_blocks(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.iter().filter(|(_, members)| members.len() >= 2)
    }

    pub fn largest_block(&self) -> usize {
        self.blocks.values().map(Vec::len).max().unwrap_or(0)
    }
}

fn prefix(s: &str, len: usize) -> String {
    s.chars().take(len).collect()
}

fn digits_suffix(s: &str, len: usize) -> Option<&str> {
    (s.len() >= len).then(|| &s[s.len() - len..])
}

/// All block keys of one record, deduplicated and ordered.
pub fn block_keys(record: &NormalizedRecord) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    let woman = &record.woman_tokens;
    let husband = &record.husband_tokens;

    if let Some(first) = woman.first() {
        keys.insert(format!("wf:{}", prefix(first, FIRST_NAME_PREFIX_LEN)));
    }
    if let Some(father) = woman.get(1) {
        keys.insert(format!("wfa:{}", father));
    }
    if woman.len() >= 2 {
        keys.insert(format!("wl:{}", record.woman_last_token()));
    }
    if woman.len() >= 2 {
        let mut sorted: Vec<&str> = woman.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        keys.insert(format!("wsig:{}", sorted.join(" ")));
    }
    if let Some(first) = husband.first() {
        keys.insert(format!("hf:{}", first));
    }
    if husband.len() >= 2 {
        keys.insert(format!("hl:{}", record.husband_last_token()));
    }
    if !record.village.is_empty() {
        keys.insert(format!("v:{}", prefix(&record.village, LOCATION_PREFIX_LEN)));
    }
    if !record.subdistrict.is_empty() {
        keys.insert(format!(
            "sd:{}",
            prefix(&record.subdistrict, LOCATION_PREFIX_LEN)
        ));
    }
    if let (Some(father), Some(husband_first)) = (woman.get(1), husband.first()) {
        keys.insert(format!("c:{}|{}", father, husband_first));
    }
    if !record.national_id.is_empty() {
        keys.insert(format!("nid:{}", record.national_id));
    }
    if let Some(tail) = digits_suffix(&record.phone_digits, PHONE_BLOCK_SUFFIX_LEN) {
        keys.insert(format!("ph:{}", tail));
    }

    if keys.is_empty() {
        keys.insert(CATCH_ALL_BLOCK.to_string());
    }
    keys
}

pub fn build_blocks(records: &[NormalizedRecord]) -> BlockIndex {
    let mut index = BlockIndex::default();
    for (position, record) in records.iter().enumerate() {
        for key in block_keys(record) {
            index.insert(key, position);
        }
    }
    index
}

/// Streams unique candidate pairs `(i, j)`, `i < j`, in ascending order
/// without materializing them.
///
/// Pairs are produced anchor by anchor. For anchor `i`, each of its blocks is
/// read at most `chunk_size` members at a time past the cursor, so an
/// oversized block never holds more than one chunk of partners in memory.
#[derive(Debug, Clone)]
pub struct CandidatePairStream {
    blocks: Vec<Vec<usize>>,
    memberships: Vec<Vec<usize>>,
    chunk_size: usize,
    cursor: ScanCursor,
    partners: Vec<usize>,
    peak_held: usize,
}

impl CandidatePairStream {
    pub fn new(index: &BlockIndex, chunk_size: usize) -> Self {
        let blocks: Vec<Vec<usize>> = index
            .candidate_blocks()
            .map(|(_, members)| members.to_vec())
            .collect();
        let record_count = blocks
            .iter()
            .filter_map(|members| members.last())
            .max()
            .map_or(0, |&last| last + 1);
        let mut memberships = vec![Vec::new(); record_count];
        for (block, members) in blocks.iter().enumerate() {
            for &position in members {
                memberships[position].push(block);
            }
        }
        Self {
            blocks,
            memberships,
            chunk_size: chunk_size.max(1),
            cursor: ScanCursor::default(),
            partners: Vec::new(),
            peak_held: 0,
        }
    }

    /// Where the next batch starts. Every pair before it has been yielded.
    pub fn cursor(&self) -> ScanCursor {
        self.cursor
    }

    /// Skips every pair ordered before `cursor`.
    pub fn seek(&mut self, cursor: ScanCursor) {
        self.cursor = cursor;
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.i >= self.memberships.len()
    }

    /// Largest number of candidate partners buffered at once so far.
    pub fn peak_held(&self) -> usize {
        self.peak_held
    }

    // Loads the next partners of the current anchor into `partners` and
    // moves the cursor past them, or on to the next anchor when none remain.
    fn step(&mut self, want: usize) -> usize {
        let ScanCursor { i, j } = self.cursor;
        let from = j.max(i + 1);
        self.partners.clear();
        for &block in &self.memberships[i] {
            let members = &self.blocks[block];
            let start = members.partition_point(|&m| m < from);
            self.partners.extend(members[start..].iter().take(want));
        }
        self.peak_held = self.peak_held.max(self.partners.len());
        // the `want` smallest of the union lie within each block's first `want`
        self.partners.sort_unstable();
        self.partners.dedup();
        self.partners.truncate(want);

        match self.partners.last() {
            Some(&last) => self.cursor.j = last + 1,
            None => {
                self.cursor.i += 1;
                self.cursor.j = 0;
            }
        }
        self.partners.len()
    }

    /// Up to `limit` further pairs, in order. Empty once the scan is done.
    pub fn next_batch(&mut self, limit: usize) -> Vec<(usize, usize)> {
        let limit = limit.max(1);
        let mut batch = Vec::new();
        while batch.len() < limit && !self.is_exhausted() {
            let anchor = self.cursor.i;
            let want = (limit - batch.len()).min(self.chunk_size);
            if self.step(want) > 0 {
                batch.extend(self.partners.iter().map(|&j| (anchor, j)));
            }
        }
        batch
    }

    /// Counts every pair from the start of the scan, then restores the cursor.
    pub fn total_pairs(&mut self) -> usize {
        let saved = self.cursor;
        self.cursor = ScanCursor::default();
        let mut total = 0;
        while !self.is_exhausted() {
            total += self.step(self.chunk_size);
        }
        self.cursor = saved;
        total
    }
}

/// Collects every candidate pair. Only meant for small inputs; the pipeline
/// reads a [`CandidatePairStream`] batch by batch.
pub fn candidate_pairs(index: &BlockIndex, chunk_size: usize) -> Vec<(usize, usize)> {
    let mut stream = CandidatePairStream::new(index, chunk_size);
    let mut pairs = Vec::new();
    loop {
        let batch = stream.next_batch(chunk_size.max(1));
        if batch.is_empty() {
            return pairs;
        }
        pairs.extend(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::similarity::test_support::person;

    #[test]
    fn test_keys_cover_name_parts_and_contacts() {
        let mut rec = person(0, "فاطمه احمد علي", "حسن محمود");
        rec.village = "الميدان الشرقي".into();
        rec.national_id = "123456".into();
        rec.phone_digits = "0944123456".into();
        let keys = block_keys(&rec);
        for expected in [
            "wf:فاط",
            "wfa:احمد",
            "wl:علي",
            "wsig:احمد علي فاطمه",
            "hf:حسن",
            "hl:محمود",
            "v:المي",
            "c:احمد|حسن",
            "nid:123456",
            "ph:123456",
        ] {
            assert!(keys.contains(expected), "missing {expected} in {keys:?}");
        }
        assert!(!keys.contains(CATCH_ALL_BLOCK));
    }

    #[test]
    fn test_keyless_records_share_catch_all() {
        let records = vec![person(0, "", ""), person(1, "", ""), person(2, "سلمى", "")];
        let index = build_blocks(&records);
        assert_eq!(index.get(CATCH_ALL_BLOCK), Some(&[0, 1][..]));
        assert_eq!(candidate_pairs(&index, 10), vec![(0, 1)]);
    }

    #[test]
    fn test_reordered_names_share_signature_block() {
        let records = vec![
            person(0, "احمد علي فاطمة", ""),
            person(1, "فاطمة احمد علي", ""),
        ];
        let index = build_blocks(&records);
        assert_eq!(candidate_pairs(&index, 1500), vec![(0, 1)]);
    }

    #[test]
    fn test_unrelated_records_are_never_paired() {
        let mut a = person(0, "رقيه سليمان داود", "طارق منصور");
        let mut b = person(1, "جميله عثمان بكر", "وليد شريف");
        a.village = "القصور".into();
        b.village = "الميدان".into();
        let index = build_blocks(&[a, b]);
        assert_eq!(index.candidate_blocks().count(), 0);
        assert!(candidate_pairs(&index, 1500).is_empty());
    }

    #[test]
    fn test_chunking_does_not_change_pairs() {
        let records: Vec<NormalizedRecord> = (0..23)
            .map(|i| {
                let mut r = person(i, &format!("نور {}", ["احمد", "علي", "حسن"][i % 3]), "");
                r.village = "الميدان".into();
                r
            })
            .collect();
        let index = build_blocks(&records);
        let unchunked = candidate_pairs(&index, usize::MAX);
        assert_eq!(unchunked.len(), 23 * 22 / 2);
        for chunk in [1, 2, 5, 7, 22] {
            assert_eq!(candidate_pairs(&index, chunk), unchunked, "chunk {chunk}");
        }
    }

    #[test]
    fn test_pairs_are_unique_and_ordered() {
        let mut a = person(0, "مريم خالد", "سامر");
        let mut b = person(1, "مريم خالد", "سامر");
        a.village = "القصور".into();
        b.village = "القصور".into();
        let index = build_blocks(&[a, b]);
        assert!(index.candidate_blocks().count() > 3);
        assert_eq!(candidate_pairs(&index, 1500), vec![(0, 1)]);
    }

    fn one_village(n: usize) -> Vec<NormalizedRecord> {
        (0..n)
            .map(|i| {
                let mut r = person(i, &format!("اسم{}", i), "");
                r.village = "الميدان".into();
                r
            })
            .collect()
    }

    fn drain(stream: &mut CandidatePairStream, limit: usize) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        loop {
            let batch = stream.next_batch(limit);
            assert!(batch.len() <= limit);
            if batch.is_empty() {
                return pairs;
            }
            pairs.extend(batch);
        }
    }

    #[test]
    fn test_large_block_is_streamed_in_bounded_batches() {
        let n = 300;
        let index = build_blocks(&one_village(n));
        // every record sits in the village block and the first-name block
        assert_eq!(index.largest_block(), n);
        assert_eq!(index.candidate_blocks().count(), 2);

        let chunk = 10;
        let mut stream = CandidatePairStream::new(&index, chunk);
        assert_eq!(stream.total_pairs(), n * (n - 1) / 2);

        let pairs = drain(&mut stream, 25);
        assert_eq!(pairs.len(), n * (n - 1) / 2);
        assert!(pairs.windows(2).all(|w| w[0] < w[1]));
        assert!(stream.peak_held() <= 2 * chunk);
        assert!(stream.is_exhausted());
    }

    #[test]
    fn test_chunk_size_bounds_buffered_partners() {
        let index = build_blocks(&one_village(120));
        let mut small = CandidatePairStream::new(&index, 4);
        let mut large = CandidatePairStream::new(&index, 1500);
        assert_eq!(drain(&mut small, 1000), drain(&mut large, 1000));
        assert!(small.peak_held() <= 8);
        assert!(large.peak_held() > 8);
    }

    #[test]
    fn test_seek_resumes_after_yielded_pairs() {
        let index = build_blocks(&one_village(40));
        let all = candidate_pairs(&index, 7);

        let mut first = CandidatePairStream::new(&index, 7);
        let mut consumed = Vec::new();
        for _ in 0..5 {
            consumed.extend(first.next_batch(33));
        }

        let mut resumed = CandidatePairStream::new(&index, 7);
        resumed.seek(first.cursor());
        let rest = drain(&mut resumed, 33);
        assert_eq!(consumed.len() + rest.len(), all.len());
        assert_eq!(&all[..consumed.len()], consumed.as_slice());
        assert_eq!(&all[consumed.len()..], rest.as_slice());
    }

    #[test]
    fn test_total_pairs_keeps_cursor() {
        let index = build_blocks(&one_village(12));
        let mut stream = CandidatePairStream::new(&index, 3);
        let head = stream.next_batch(5);
        let cursor = stream.cursor();
        assert_eq!(stream.total_pairs(), 66);
        assert_eq!(stream.cursor(), cursor);
        assert_eq!(head.len() + drain(&mut stream, 5).len(), 66);
    }
}
