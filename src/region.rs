pub mod haplotype;
pub mod window;

use std::ops::Range;

use itertools::Itertools;

use crate::cli::{DetectorOptions, DEFAULT_PLOIDY};
use crate::error::{ActiveRegionError, Result};
use crate::indel::IndelBuffer;
use crate::readbuffer::{PositionSummary, ReadBuffer};
use crate::seq::{self, ReferenceSequence};
use crate::variant::CandidateSnvBuffer;

use haplotype::{HaplotypeDiff, HaplotypeSet};
use window::RegionTracker;


/// Streaming detector of active regions over one reference segment.
///
/// Reads are written into the per-sample [`ReadBuffer`]s, then the caller
/// advances the frontier with [`ActiveRegionDetector::update_end_position`].
/// Every finalized region is resolved into haplotypes, and the variants of
/// the selected haplotypes are promoted into the indel and SNV buffers
/// borrowed by the detector.
pub struct ActiveRegionDetector<'a, R: ReferenceSequence + ?Sized> {
    reference: &'a R,
    indel_buffer: &'a mut IndelBuffer,
    snv_buffer: &'a mut CandidateSnvBuffer,
    read_buffers: Vec<ReadBuffer>,
    // one per sample, or a single joint tracker in merge mode
    trackers: Vec<RegionTracker>,
    opts: DetectorOptions,
    sample_count: usize,
    frontier: Option<usize>,
    nb_regions: usize,
}

impl<'a, R: ReferenceSequence + ?Sized> ActiveRegionDetector<'a, R> {

    pub fn new(
        reference: &'a R,
        indel_buffer: &'a mut IndelBuffer,
        snv_buffer: &'a mut CandidateSnvBuffer,
        max_indel_size: usize,
        sample_count: usize,
        is_merge_mode: bool,
        default_ploidy: Option<usize>,
    ) -> Result<Self> {
        let opts = DetectorOptions {
            max_indel_size,
            merge_samples: is_merge_mode,
            default_ploidy: default_ploidy.unwrap_or(DEFAULT_PLOIDY),
            ..Default::default()
        };
        Self::from_options(reference, indel_buffer, snv_buffer, sample_count, &opts)
    }

    pub fn from_options(
        reference: &'a R,
        indel_buffer: &'a mut IndelBuffer,
        snv_buffer: &'a mut CandidateSnvBuffer,
        sample_count: usize,
        opts: &DetectorOptions,
    ) -> Result<Self> {
        opts.validate()?;
        if sample_count == 0 {
            return Err(ActiveRegionError::invalid_option("at least one sample is required"))
        }
        if !indel_buffer.is_finalized() {
            return Err(ActiveRegionError::SamplesNotFinalized)
        }
        if indel_buffer.sample_count() != sample_count {
            return Err(ActiveRegionError::SampleCountMismatch { buffer: "indel buffer", expected: sample_count, found: indel_buffer.sample_count() })
        }
        if snv_buffer.sample_count() != sample_count {
            return Err(ActiveRegionError::SampleCountMismatch { buffer: "candidate SNV buffer", expected: sample_count, found: snv_buffer.sample_count() })
        }

        let nb_trackers = if opts.merge_samples { 1 } else { sample_count };
        let tracker = RegionTracker::new(opts.window, opts.min_variant_positions, opts.max_region_span());

        Ok(Self {
            reference,
            indel_buffer,
            snv_buffer,
            read_buffers: (0..sample_count).map(|s| ReadBuffer::new(s, opts.max_read_depth)).collect(),
            trackers: vec![tracker; nb_trackers],
            opts: opts.clone(),
            sample_count,
            frontier: None,
            nb_regions: 0,
        })
    }

    pub fn sample_count(&self) -> usize { self.sample_count }
    pub fn is_merge_mode(&self) -> bool { self.opts.merge_samples }
    pub fn options(&self) -> &DetectorOptions { &self.opts }

    /// Last evaluated position, `None` before the first update or after a clear
    pub fn frontier(&self) -> Option<usize> { self.frontier }

    /// Number of regions finalized so far
    pub fn region_count(&self) -> usize { self.nb_regions }

    pub fn read_buffer(&mut self, sample_index:usize) -> Result<&mut ReadBuffer> {
        let sample_count = self.sample_count;
        self.read_buffers.get_mut(sample_index)
            .ok_or(ActiveRegionError::SampleOutOfRange { sample_index, sample_count })
    }

    pub fn read_buffers(&self) -> &[ReadBuffer] { &self.read_buffers }

    /// Evaluates every position after the current frontier up to `pos`
    pub fn update_end_position(&mut self, pos:usize) -> Result<()> {
        let first = match self.frontier {
            None => pos,
            Some(frontier) if pos == frontier => { return Ok(()) }
            Some(frontier) if pos < frontier => {
                return Err(ActiveRegionError::OutOfOrderPosition { frontier, requested: pos })
            }
            Some(frontier) => frontier + 1,
        };

        for p in first..=pos {
            self.evaluate_position(p)?;
            self.frontier = Some(p);
        }
        self.retire();
        Ok(())
    }

    /// Closes open regions at the frontier and resets the stream state.
    /// Promoted indels and SNVs are kept.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(frontier) = self.frontier {
            for idx in 0..self.trackers.len() {
                self.trackers[idx].close();
                if let Some(span) = self.trackers[idx].take_finalized() {
                    self.process_region(span, self.tracker_sample(idx))?;
                }
            }
            self.read_buffers.iter_mut().for_each(|buffer| {
                buffer.retire_through(frontier);
                buffer.rewind();
            });
            spdlog::debug!("cleared detector at position {frontier} ({} regions so far)", self.nb_regions);
        }
        self.trackers.iter_mut().for_each(|tracker| tracker.reset());
        self.frontier = None;
        Ok(())
    }

    fn tracker_sample(&self, idx:usize) -> Option<usize> {
        if self.opts.merge_samples { None } else { Some(idx) }
    }

    fn evaluate_position(&mut self, pos:usize) -> Result<()> {
        for idx in 0..self.trackers.len() {
            let summary = match self.tracker_sample(idx) {
                Some(s) => self.read_buffers[s].summarize(pos),
                None => self.read_buffers.iter()
                    .map(|buffer| buffer.summarize(pos))
                    .fold(PositionSummary::default(), PositionSummary::merge),
            };
            let is_variant = self.is_variant_position(pos, &summary);
            self.trackers[idx].advance(pos, is_variant);
            if let Some(span) = self.trackers[idx].take_finalized() {
                self.process_region(span, self.tracker_sample(idx))?;
            }
        }
        Ok(())
    }

    fn is_variant_position(&self, pos:usize, summary:&PositionSummary) -> bool {
        let alt_count = summary.alt_count;
        if alt_count == 0 || alt_count < self.opts.min_alt_count {
            return false
        }
        if (alt_count as f64) < self.opts.min_alt_frac * summary.depth as f64 {
            return false
        }
        // mismatch-only positions at homopolymers are ignored
        summary.indel_count > 0 || !seq::in_homopolymer(self.reference, pos, self.opts.homopolymer_length)
    }

    fn process_region(&mut self, span:Range<usize>, sample:Option<usize>) -> Result<()> {
        self.nb_regions += 1;

        let reads = match sample {
            Some(s) => self.read_buffers[s].slice_reads(span.start, span.end),
            None => self.read_buffers.iter()
                .flat_map(|buffer| buffer.slice_reads(span.start, span.end))
                .collect_vec(),
        };
        let nb_reads = reads.len();
        let haplotypes = HaplotypeSet::build(span.start, self.sample_count, reads, self.reference);
        let nb_haplotypes = haplotypes.len();
        let selected = haplotypes.select(self.opts.ploidy());

        spdlog::debug!(
            "active region {}-{} (sample {}): {nb_reads} reads, {nb_haplotypes} haplotypes, {} selected",
            span.start, span.end,
            sample.map_or("all".to_string(), |s| s.to_string()),
            selected.len()
        );

        for haplotype in selected {
            let samples = haplotype.supporting_samples().collect_vec();
            for diff in haplotype.diffs(self.reference) {
                match diff {
                    HaplotypeDiff::Snv(snv) => {
                        spdlog::trace!("candidate SNV {snv} supported by {} reads", haplotype.support());
                        for &s in samples.iter() {
                            self.snv_buffer.mark_candidate(s, snv.pos, snv.base)?;
                        }
                    }
                    HaplotypeDiff::Indel(key) => {
                        let key = key.left_shifted(self.reference);
                        spdlog::trace!("confirmed indel {key} supported by {} reads", haplotype.support());
                        for &s in samples.iter() {
                            self.indel_buffer.add_observations(&key, s, haplotype.sample_support(s))?;
                        }
                        self.indel_buffer.confirm(&key)?;
                    }
                }
            }
        }
        Ok(())
    }

    // keeps the open regions and the trailing density window
    fn retire(&mut self) {
        let Some(frontier) = self.frontier else { return };
        let window_start = (frontier + 1).saturating_sub(self.opts.window);
        let keep_from = self.trackers.iter()
            .filter_map(|tracker| tracker.active_beg())
            .min()
            .map_or(window_start, |beg| beg.min(window_start));
        if keep_from > 0 {
            self.read_buffers.iter_mut().for_each(|buffer| buffer.retire_through(keep_from - 1));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::indel::{AlignType, IndelKey, IndelObservation};
    use crate::seq::ReferenceSegment;

    fn buffers(sample_count:usize) -> (IndelBuffer, CandidateSnvBuffer) {
        let indels = IndelBuffer::with_depth_caps(&vec![100; sample_count]).unwrap();
        (indels, CandidateSnvBuffer::new(sample_count))
    }

    #[test]
    fn test_construction_checks_buffers() {
        let reference = ReferenceSegment::new("ACGT");
        let (mut indels, mut snvs) = buffers(2);
        assert!(matches!(
            ActiveRegionDetector::new(&reference, &mut indels, &mut snvs, 50, 3, false, None),
            Err(ActiveRegionError::SampleCountMismatch { buffer: "indel buffer", .. })
        ));
        let mut unfinalized = IndelBuffer::new();
        assert!(matches!(
            ActiveRegionDetector::new(&reference, &mut unfinalized, &mut snvs, 50, 2, false, None),
            Err(ActiveRegionError::SamplesNotFinalized)
        ));
        let detector = ActiveRegionDetector::new(&reference, &mut indels, &mut snvs, 50, 2, true, Some(4)).unwrap();
        assert!(detector.is_merge_mode());
        assert_eq!(detector.options().default_ploidy, 4);
        assert_eq!(detector.options().max_region_span(), 64);
    }

    #[test]
    fn test_frontier_rules() {
        let reference = ReferenceSegment::new("ACGTACGT");
        let (mut indels, mut snvs) = buffers(1);
        let mut detector = ActiveRegionDetector::new(&reference, &mut indels, &mut snvs, 50, 1, false, None).unwrap();
        assert_eq!(detector.frontier(), None);
        detector.update_end_position(3).unwrap();
        detector.update_end_position(3).unwrap();
        assert_eq!(detector.frontier(), Some(3));
        assert_eq!(
            detector.update_end_position(2),
            Err(ActiveRegionError::OutOfOrderPosition { frontier: 3, requested: 2 })
        );
        detector.update_end_position(7).unwrap();
        detector.clear().unwrap();
        assert_eq!(detector.frontier(), None);
        detector.update_end_position(0).unwrap();
        assert!(detector.read_buffer(1).is_err());
    }

    #[test]
    fn test_homopolymer_mismatches_do_not_open_regions() {
        let reference = ReferenceSegment::new("CAAAAAAAAAAC");
        let (mut indels, mut snvs) = buffers(1);
        {
            let mut detector = ActiveRegionDetector::new(&reference, &mut indels, &mut snvs, 50, 1, false, None).unwrap();
            let buffer = detector.read_buffer(0).unwrap();
            for read_id in 0..10 {
                buffer.set_align_info(read_id, 0, AlignType::GenomeTier1, true).unwrap();
                for pos in 0..12 {
                    if pos == 5 && read_id % 2 == 1 {
                        buffer.insert_mismatch(read_id, pos, b'G').unwrap();
                    } else {
                        buffer.insert_match(read_id, pos).unwrap();
                    }
                }
            }
            for pos in 0..12 {
                detector.update_end_position(pos).unwrap();
            }
            detector.clear().unwrap();
            assert_eq!(detector.region_count(), 0);
        }
        assert!(snvs.is_empty());
    }

    #[test]
    fn test_homopolymer_indels_still_count() {
        let reference = ReferenceSegment::new("CAAAAAAAAAAC");
        let (mut indels, mut snvs) = buffers(1);
        {
            let mut detector = ActiveRegionDetector::new(&reference, &mut indels, &mut snvs, 50, 1, false, None).unwrap();
            let buffer = detector.read_buffer(0).unwrap();
            for read_id in 0..10 {
                buffer.set_align_info(read_id, 0, AlignType::GenomeTier1, true).unwrap();
                for pos in 0..12 {
                    if pos == 8 && read_id % 2 == 1 {
                        let deletion = IndelObservation::new(IndelKey::deletion(8, 1), read_id, AlignType::GenomeTier1);
                        buffer.insert_indel(&deletion).unwrap();
                    } else {
                        buffer.insert_match(read_id, pos).unwrap();
                    }
                }
            }
            for pos in 0..12 {
                detector.update_end_position(pos).unwrap();
            }
            detector.clear().unwrap();
        }
        // a deleted A within the run is reported at the start of the run
        let key = IndelKey::deletion(1, 1);
        let data = indels.lookup(&key).unwrap();
        assert!(data.is_confirmed_in_active_region());
        assert_eq!(data.sample_count(0), 5);
    }

    #[test]
    fn test_tier2_reads_are_ignored() {
        let reference = ReferenceSegment::new("GATCTGT");
        let (mut indels, mut snvs) = buffers(1);
        {
            let mut detector = ActiveRegionDetector::new(&reference, &mut indels, &mut snvs, 50, 1, false, None).unwrap();
            let buffer = detector.read_buffer(0).unwrap();
            for read_id in 0..20 {
                let align_type = if read_id % 2 == 0 { AlignType::GenomeTier1 } else { AlignType::GenomeTier2 };
                buffer.set_align_info(read_id, 0, align_type, true).unwrap();
                for pos in 0..7 {
                    if pos == 3 && read_id % 2 == 1 {
                        buffer.insert_mismatch(read_id, pos, b'A').unwrap();
                    } else {
                        buffer.insert_match(read_id, pos).unwrap();
                    }
                }
            }
            for pos in 0..7 {
                detector.update_end_position(pos).unwrap();
            }
            detector.clear().unwrap();
        }
        assert!(!snvs.is_candidate_snv_any_sample(3, b'A'));
    }
}
