use ahash::AHashMap as HashMap;
use itertools::Itertools;
use tinyvec::TinyVec;

use crate::indel::IndelKey;
use crate::readbuffer::{CellBase, RealizedRead, SpanCell};
use crate::seq::ReferenceSequence;
use crate::variant::Snv;


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaplotypeDiff {
    Snv(Snv),
    Indel(IndelKey),
}


/// One distinct read sequence over an active region.
#[derive(Debug, Clone)]
pub struct Haplotype {
    beg: usize,
    cells: Vec<SpanCell>,
    sample_support: TinyVec<[u32;4]>,
    forward_support: u32,
}

impl Haplotype {

    fn new(beg:usize, cells:Vec<SpanCell>, sample_count:usize) -> Self {
        let mut sample_support = TinyVec::new();
        sample_support.resize(sample_count, 0);
        Self { beg, cells, sample_support, forward_support: 0 }
    }

    pub fn beg(&self) -> usize { self.beg }
    pub fn end(&self) -> usize { self.beg + self.cells.len() }
    pub fn cells(&self) -> &[SpanCell] { &self.cells }
    pub fn forward_support(&self) -> u32 { self.forward_support }
    pub fn support(&self) -> u32 { self.sample_support.iter().sum() }

    pub fn sample_support(&self, sample_index:usize) -> u32 {
        self.sample_support.get(sample_index).copied().unwrap_or(0)
    }

    pub fn supporting_samples(&self) -> impl Iterator<Item=usize> + '_ {
        self.sample_support.iter()
            .positions(|&count| count > 0)
    }

    pub fn is_reference(&self) -> bool {
        self.cells.iter().all(|cell| cell.insertion.is_none() && cell.base == CellBase::Ref)
    }

    /// Differences from the reference, left to right. A deletion spanning
    /// several positions is reported once; substitutions equal to the
    /// reference base are skipped.
    pub fn diffs<R: ReferenceSequence + ?Sized>(&self, reference:&R) -> Vec<HaplotypeDiff> {
        let mut diffs = vec![];
        let mut last_deletion: Option<&IndelKey> = None;

        for (pos, cell) in (self.beg..).zip(self.cells.iter()) {
            if let Some(key) = &cell.insertion {
                diffs.push(HaplotypeDiff::Indel(key.clone()));
            }
            match &cell.base {
                CellBase::Ref => { last_deletion = None; }
                CellBase::Alt(base) => {
                    last_deletion = None;
                    if reference.base(pos) != Some(*base) {
                        diffs.push(HaplotypeDiff::Snv(Snv { pos, base: *base }));
                    }
                }
                CellBase::Deleted(key) => {
                    if last_deletion != Some(key) {
                        diffs.push(HaplotypeDiff::Indel(key.clone()));
                    }
                    last_deletion = Some(key);
                }
            }
        }
        diffs
    }

    fn add_read(&mut self, read:&RealizedRead) {
        if let Some(count) = self.sample_support.get_mut(read.info.sample_index) {
            *count += 1;
        }
        if read.info.is_forward_strand {
            self.forward_support += 1;
        }
    }
}


// Sequence spelled by a read over the region
fn realized_sequence<R: ReferenceSequence + ?Sized>(beg:usize, cells:&[SpanCell], reference:&R) -> Vec<u8> {
    let mut seq = Vec::with_capacity(cells.len());
    for (pos, cell) in (beg..).zip(cells.iter()) {
        if let Some(key) = &cell.insertion {
            seq.extend_from_slice(key.insert_seq());
        }
        match &cell.base {
            CellBase::Ref => seq.push(reference.base(pos).unwrap_or(b'N')),
            CellBase::Alt(base) => seq.push(*base),
            CellBase::Deleted(_) => {}
        }
    }
    seq
}


/// Reads of a region grouped by identical sequence, in first-observed order.
/// Each haplotype keeps the cells of its first read.
#[derive(Debug, Clone, Default)]
pub struct HaplotypeSet {
    haplotypes: Vec<Haplotype>,
}

impl HaplotypeSet {

    pub fn build<R>(beg:usize, sample_count:usize, reads:impl IntoIterator<Item=RealizedRead>, reference:&R) -> Self
    where R: ReferenceSequence + ?Sized
    {
        let mut index: HashMap<Vec<u8>,usize> = HashMap::new();
        let mut haplotypes: Vec<Haplotype> = vec![];

        for read in reads {
            let seq = realized_sequence(beg, &read.cells, reference);
            let idx = *index.entry(seq).or_insert_with(|| {
                haplotypes.push(Haplotype::new(beg, read.cells.clone(), sample_count));
                haplotypes.len() - 1
            });
            haplotypes[idx].add_read(&read);
        }

        Self { haplotypes }
    }

    pub fn len(&self) -> usize { self.haplotypes.len() }
    pub fn is_empty(&self) -> bool { self.haplotypes.is_empty() }
    pub fn haplotypes(&self) -> &[Haplotype] { &self.haplotypes }

    /// Keeps the `max(ploidy,1)` best supported haplotypes; equally supported
    /// haplotypes keep their first-observed order.
    pub fn select(self, ploidy:usize) -> Vec<Haplotype> {
        let mut haplotypes = self.haplotypes;
        haplotypes.sort_by(|a,b| b.support().cmp(&a.support()));
        haplotypes.truncate(ploidy.max(1));
        haplotypes
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::indel::AlignType;
    use crate::readbuffer::ReadInfo;
    use crate::seq::ReferenceSegment;

    fn cell(base:CellBase) -> SpanCell {
        SpanCell { insertion: None, base }
    }

    fn read(read_id:usize, sample_index:usize, cells:Vec<SpanCell>) -> RealizedRead {
        let info = ReadInfo { sample_index, align_type: AlignType::GenomeTier1, is_forward_strand: read_id % 2 == 0 };
        RealizedRead { read_id, info, cells }
    }

    #[test]
    fn test_grouping_and_support() {
        let reference_cells = vec![cell(CellBase::Ref), cell(CellBase::Ref)];
        let alt_cells = vec![cell(CellBase::Alt(b'A')), cell(CellBase::Ref)];
        let reads = vec![
            read(0, 0, alt_cells.clone()),
            read(1, 1, reference_cells.clone()),
            read(2, 1, alt_cells.clone()),
            read(3, 1, alt_cells.clone()),
        ];
        let set = HaplotypeSet::build(10, 2, reads, &ReferenceSegment::new("GATCTGTAACGTAC"));
        assert_eq!(set.len(), 2);

        let alt = &set.haplotypes()[0];
        assert_eq!(alt.support(), 3);
        assert_eq!(alt.sample_support(0), 1);
        assert_eq!(alt.sample_support(1), 2);
        assert_eq!(alt.forward_support(), 2);
        assert_eq!(alt.supporting_samples().collect_vec(), vec![0, 1]);
        assert!(set.haplotypes()[1].is_reference());
        assert_eq!(set.haplotypes()[1].supporting_samples().collect_vec(), vec![1]);
    }

    #[test]
    fn test_selection_is_stable_on_ties() {
        let reads = (0..6).map(|read_id| {
            let base = match read_id % 3 {
                0 => CellBase::Alt(b'C'),
                1 => CellBase::Alt(b'G'),
                _ => CellBase::Ref,
            };
            read(read_id, 0, vec![cell(base)])
        });
        let selected = HaplotypeSet::build(0, 1, reads, &ReferenceSegment::new("T")).select(2);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].cells()[0].base, CellBase::Alt(b'C'));
        assert_eq!(selected[1].cells()[0].base, CellBase::Alt(b'G'));
    }

    #[test]
    fn test_zero_ploidy_keeps_one() {
        let reads = vec![read(0, 0, vec![cell(CellBase::Ref)])];
        assert_eq!(HaplotypeSet::build(0, 1, reads, &ReferenceSegment::new("T")).select(0).len(), 1);
    }

    #[test]
    fn test_diffs() {
        let reference = ReferenceSegment::new("GATCTGT");
        let deletion = IndelKey::deletion(3, 2);
        let insertion = IndelKey::insertion(2, "CC");
        let cells = vec![
            SpanCell { insertion: Some(insertion.clone()), base: CellBase::Alt(b'A') },
            cell(CellBase::Deleted(deletion.clone())),
            cell(CellBase::Deleted(deletion.clone())),
            cell(CellBase::Alt(b'G')),
        ];
        let set = HaplotypeSet::build(2, 1, vec![read(0, 0, cells)], &reference);
        let diffs = set.haplotypes()[0].diffs(&reference);
        assert_eq!(diffs, vec![
            HaplotypeDiff::Indel(insertion),
            HaplotypeDiff::Snv(Snv { pos: 2, base: b'A' }),
            HaplotypeDiff::Indel(deletion),
        ]);
    }

    #[test]
    fn test_equivalent_deletions_group_together() {
        // GCAAAT: deleting any A spells GCAAT
        let reference = ReferenceSegment::new("GCAAATGCT");
        let at = |pos:usize| {
            (2..6).map(|p| if p == pos { cell(CellBase::Deleted(IndelKey::deletion(pos, 1))) } else { cell(CellBase::Ref) }).collect_vec()
        };
        let reads = vec![
            read(0, 0, at(3)),
            read(1, 0, at(4)),
            read(2, 0, at(2)),
            read(3, 0, vec![cell(CellBase::Ref); 4]),
        ];
        let set = HaplotypeSet::build(2, 1, reads, &reference);
        assert_eq!(set.len(), 2);
        assert_eq!(set.haplotypes()[0].support(), 3);
        assert_eq!(set.haplotypes()[0].diffs(&reference), vec![HaplotypeDiff::Indel(IndelKey::deletion(3, 1))]);
        assert!(set.haplotypes()[1].is_reference());
    }

    #[test]
    fn test_substitution_equal_to_reference_is_reference() {
        let reference = ReferenceSegment::new("GATC");
        let reads = vec![
            read(0, 0, vec![cell(CellBase::Ref), cell(CellBase::Ref)]),
            read(1, 0, vec![cell(CellBase::Alt(b'A')), cell(CellBase::Ref)]),
        ];
        let set = HaplotypeSet::build(1, 1, reads, &reference);
        assert_eq!(set.len(), 1);
        assert_eq!(set.haplotypes()[0].support(), 2);
    }
}
