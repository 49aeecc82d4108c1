use std::fmt;

use ahash::AHashSet as HashSet;
use itertools::Itertools;

use crate::error::{ActiveRegionError, Result};
use crate::seq;


#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Snv {
    pub pos: usize,
    pub base: u8,
}

impl fmt::Display for Snv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}>{}", self.pos, self.base as char)
    }
}


/// Substitutions confirmed by a selected haplotype, per sample and merged
/// over all samples.
///
/// Entries are only removed on explicit request of the owner of the buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSnvBuffer {
    samples: Vec<HashSet<Snv>>,
    any_sample: HashSet<Snv>,
}

impl CandidateSnvBuffer {

    pub fn new(sample_count:usize) -> Self {
        Self {
            samples: vec![HashSet::new(); sample_count],
            any_sample: HashSet::new(),
        }
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }
    pub fn len(&self) -> usize { self.any_sample.len() }
    pub fn is_empty(&self) -> bool { self.any_sample.is_empty() }

    pub fn mark_candidate(&mut self, sample_index:usize, pos:usize, base:u8) -> Result<()> {
        let sample_count = self.samples.len();
        let base = seq::normalize_base(base).ok_or(ActiveRegionError::invalid_base(base))?;
        let sample = self.samples.get_mut(sample_index)
            .ok_or(ActiveRegionError::SampleOutOfRange { sample_index, sample_count })?;
        let snv = Snv { pos, base };
        sample.insert(snv);
        self.any_sample.insert(snv);
        Ok(())
    }

    /// Always false for a sample index outside of the configured range
    pub fn is_candidate_snv(&self, sample_index:usize, pos:usize, base:u8) -> bool {
        let snv = Snv { pos, base: base.to_ascii_uppercase() };
        self.samples.get(sample_index).is_some_and(|sample| sample.contains(&snv))
    }

    pub fn is_candidate_snv_any_sample(&self, pos:usize, base:u8) -> bool {
        self.any_sample.contains(&Snv { pos, base: base.to_ascii_uppercase() })
    }

    pub fn candidates(&self, sample_index:usize) -> Vec<Snv> {
        self.samples.get(sample_index)
            .map(|sample| sample.iter().copied().sorted_unstable().collect_vec())
            .unwrap_or_default()
    }

    pub fn any_sample_candidates(&self) -> Vec<Snv> {
        self.any_sample.iter().copied().sorted_unstable().collect_vec()
    }

    /// Forgets every candidate located before `pos`
    pub fn clear_before(&mut self, pos:usize) {
        self.samples.iter_mut().for_each(|sample| sample.retain(|snv| snv.pos >= pos));
        self.any_sample.retain(|snv| snv.pos >= pos);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_sets_sample_and_any_sample() {
        let mut buffer = CandidateSnvBuffer::new(3);
        buffer.mark_candidate(1, 42, b'g').unwrap();
        buffer.mark_candidate(1, 42, b'G').unwrap();

        assert!(buffer.is_candidate_snv(1, 42, b'G'));
        assert!(!buffer.is_candidate_snv(0, 42, b'G'));
        assert!(!buffer.is_candidate_snv(2, 42, b'G'));
        assert!(!buffer.is_candidate_snv(7, 42, b'G'));
        assert!(buffer.is_candidate_snv_any_sample(42, b'g'));
        assert!(!buffer.is_candidate_snv_any_sample(42, b'A'));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_mark_preconditions() {
        let mut buffer = CandidateSnvBuffer::new(1);
        assert_eq!(
            buffer.mark_candidate(1, 3, b'A'),
            Err(ActiveRegionError::SampleOutOfRange { sample_index: 1, sample_count: 1 })
        );
        assert_eq!(buffer.mark_candidate(0, 3, b'*'), Err(ActiveRegionError::InvalidBase { base: '*' }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_candidates_are_sorted_and_evictable() {
        let mut buffer = CandidateSnvBuffer::new(2);
        buffer.mark_candidate(0, 30, b'T').unwrap();
        buffer.mark_candidate(0, 10, b'C').unwrap();
        buffer.mark_candidate(1, 20, b'A').unwrap();

        assert_eq!(buffer.candidates(0), vec![Snv { pos: 10, base: b'C' }, Snv { pos: 30, base: b'T' }]);
        assert_eq!(buffer.any_sample_candidates().len(), 3);

        buffer.clear_before(20);
        assert!(!buffer.is_candidate_snv(0, 10, b'C'));
        assert!(buffer.is_candidate_snv(1, 20, b'A'));
        assert!(buffer.is_candidate_snv_any_sample(30, b'T'));
        assert!(!buffer.is_candidate_snv_any_sample(10, b'C'));
    }
}
