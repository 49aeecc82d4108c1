use std::collections::VecDeque;

use ahash::AHashMap as HashMap;
use itertools::Itertools;

use crate::error::{ActiveRegionError, Result};
use crate::indel::{AlignType, IndelKey, IndelObservation};
use crate::seq;

pub type ReadId = usize;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadInfo {
    pub sample_index: usize,
    pub align_type: AlignType,
    pub is_forward_strand: bool,
}


/// What a read shows at one reference position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Observation {
    Match,
    Mismatch(u8),
    IndelPart { key: IndelKey, align_type: AlignType },
}

impl Observation {
    pub fn is_variant(&self) -> bool { !matches!(self, Observation::Match) }
}


/// Base emitted by a read at one position of a span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellBase {
    Ref,
    Alt(u8),
    Deleted(IndelKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanCell {
    /// insertion placed before the base of this position
    pub insertion: Option<IndelKey>,
    pub base: CellBase,
}

/// Sequence of one read over a span, one cell per reference position.
#[derive(Debug, Clone)]
pub struct RealizedRead {
    pub read_id: ReadId,
    pub info: ReadInfo,
    pub cells: Vec<SpanCell>,
}


/// Tier-1 read counts at a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionSummary {
    pub depth: usize,
    pub alt_count: usize,
    pub indel_count: usize,
}

impl PositionSummary {
    pub fn merge(mut self, other:PositionSummary) -> PositionSummary {
        self.depth += other.depth;
        self.alt_count += other.alt_count;
        self.indel_count += other.indel_count;
        self
    }
}


#[derive(Debug)]
struct ReadState {
    info: ReadInfo,
    rank: usize,
    // buffer origin when the read was registered
    registered_at: usize,
    // last position written or dropped for this read
    last_pos: Option<usize>,
    // excluded from haplotypes: depth-capped or carrying a breakpoint
    is_truncated: bool,
}

#[derive(Debug, Default)]
struct PositionSlot {
    bases: HashMap<ReadId,Observation>,
    insertions: HashMap<ReadId,Observation>,
}


/// Observations of the reads of one sample, indexed by position.
///
/// Positions are kept in a window starting at `origin`; everything before
/// it has been retired by the detector and can no longer be written.
#[derive(Debug)]
pub struct ReadBuffer {
    sample_index: usize,
    max_depth: usize,
    reads: HashMap<ReadId,ReadState>,
    next_rank: usize,
    origin: usize,
    slots: VecDeque<PositionSlot>,
    dropped: usize,
}

impl ReadBuffer {

    pub fn new(sample_index:usize, max_depth:usize) -> Self {
        Self {
            sample_index,
            max_depth,
            reads: HashMap::new(),
            next_rank: 0,
            origin: 0,
            slots: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn sample_index(&self) -> usize { self.sample_index }
    pub fn read_count(&self) -> usize { self.reads.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
    pub fn dropped_observations(&self) -> usize { self.dropped }

    /// First position still held by the buffer
    pub fn origin(&self) -> usize { self.origin }

    pub fn read_info(&self, read_id:ReadId) -> Option<ReadInfo> {
        self.reads.get(&read_id).map(|state| state.info)
    }

    pub fn set_align_info(&mut self, read_id:ReadId, sample_index:usize, align_type:AlignType, is_forward_strand:bool) -> Result<()> {
        if sample_index != self.sample_index {
            return Err(ActiveRegionError::WrongSampleBuffer { read_id, read_sample: sample_index, buffer_sample: self.sample_index })
        }
        let info = ReadInfo { sample_index, align_type, is_forward_strand };
        if let Some(state) = self.reads.get(&read_id) {
            return if state.info == info { Ok(()) } else { Err(ActiveRegionError::ReadIdentityConflict { read_id }) }
        }
        self.reads.insert(read_id, ReadState { info, rank: self.next_rank, registered_at: self.origin, last_pos: None, is_truncated: false });
        self.next_rank += 1;
        Ok(())
    }

    pub fn insert_match(&mut self, read_id:ReadId, pos:usize) -> Result<()> {
        self.insert_base(read_id, pos, Observation::Match)
    }

    pub fn insert_mismatch(&mut self, read_id:ReadId, pos:usize, base:u8) -> Result<()> {
        let base = seq::normalize_base(base).ok_or(ActiveRegionError::invalid_base(base))?;
        self.insert_base(read_id, pos, Observation::Mismatch(base))
    }

    pub fn insert_indel(&mut self, observation:&IndelObservation) -> Result<()> {
        let key = &observation.key;
        key.validate()?;
        let read_id = observation.data.id;
        let part = Observation::IndelPart { key: key.clone(), align_type: observation.data.align_type };

        if key.deletion_length() > 0 {
            for pos in key.pos()..key.ref_end() {
                self.insert_base(read_id, pos, part.clone())?;
            }
        }
        if key.insert_length() > 0 || key.is_breakpoint() {
            self.insert_anchored(read_id, key.pos(), part)?;
        }
        if key.is_breakpoint() {
            if let Some(state) = self.reads.get_mut(&read_id) {
                state.is_truncated = true;
            }
        }
        Ok(())
    }

    /// Observations of every read at `pos`, ordered by read id
    pub fn query(&self, pos:usize) -> Vec<(ReadId,Observation)> {
        let Some(slot) = self.slot(pos) else { return vec![] };
        slot.bases.iter()
            .chain(slot.insertions.iter())
            .map(|(&read_id, obs)| (read_id, obs.clone()))
            .sorted_by_key(|(read_id,_)| *read_id)
            .collect_vec()
    }

    pub fn summarize(&self, pos:usize) -> PositionSummary {
        let mut summary = PositionSummary::default();
        let Some(slot) = self.slot(pos) else { return summary };

        for (read_id, obs) in slot.bases.iter() {
            if !self.is_tier1(read_id) {
                continue
            }
            summary.depth += 1;
            let has_insertion = slot.insertions.contains_key(read_id);
            if obs.is_variant() || has_insertion {
                summary.alt_count += 1;
            }
            if matches!(obs, Observation::IndelPart{..}) || has_insertion {
                summary.indel_count += 1;
            }
        }
        for read_id in slot.insertions.keys() {
            if self.is_tier1(read_id) && !slot.bases.contains_key(read_id) {
                summary.depth += 1;
                summary.alt_count += 1;
                summary.indel_count += 1;
            }
        }
        summary
    }

    /// Sequences of the tier-1 reads that cover every position of `[beg,end)`,
    /// in registration order
    pub fn slice_reads(&self, beg:usize, end:usize) -> Vec<RealizedRead> {
        if beg >= end {
            return vec![]
        }
        let Some(first_slot) = self.slot(beg) else { return vec![] };

        let candidates = first_slot.bases.keys()
            .filter_map(|read_id| self.reads.get(read_id).map(|state| (*read_id, state)))
            .filter(|(_,state)| state.info.align_type.is_tier1() && !state.is_truncated)
            .sorted_by_key(|(_,state)| state.rank)
            .collect_vec();

        let mut realized = Vec::with_capacity(candidates.len());
        'reads: for (read_id, state) in candidates {
            let mut cells = Vec::with_capacity(end-beg);
            for pos in beg..end {
                let Some(slot) = self.slot(pos) else { continue 'reads };
                let base = match slot.bases.get(&read_id) {
                    Some(Observation::Match) => CellBase::Ref,
                    Some(Observation::Mismatch(base)) => CellBase::Alt(*base),
                    Some(Observation::IndelPart{key,..}) => CellBase::Deleted(key.clone()),
                    None => continue 'reads
                };
                let insertion = match slot.insertions.get(&read_id) {
                    Some(Observation::IndelPart{key,..}) => Some(key.clone()),
                    _ => None
                };
                cells.push(SpanCell { insertion, base });
            }
            realized.push(RealizedRead { read_id, info: state.info, cells });
        }
        realized
    }

    /// Drops every position up to `pos` included, and the reads that end there.
    /// A read that was never observed is dropped once `pos` reaches the origin
    /// it was registered at.
    pub fn retire_through(&mut self, pos:usize) {
        while self.origin <= pos && !self.slots.is_empty() {
            self.slots.pop_front();
            self.origin += 1;
        }
        if self.slots.is_empty() {
            self.origin = self.origin.max(pos + 1);
        }
        self.reads.retain(|_,state| state.last_pos.unwrap_or(state.registered_at) > pos);
    }

    /// Lets an emptied buffer start over at any position
    pub fn rewind(&mut self) {
        if self.slots.is_empty() {
            self.origin = 0;
        }
    }

    fn is_tier1(&self, read_id:&ReadId) -> bool {
        self.reads.get(read_id).is_some_and(|state| state.info.align_type.is_tier1())
    }

    fn slot(&self, pos:usize) -> Option<&PositionSlot> {
        pos.checked_sub(self.origin).and_then(|idx| self.slots.get(idx))
    }

    fn slot_index(slots:&mut VecDeque<PositionSlot>, origin:&mut usize, pos:usize) -> Result<usize> {
        if slots.is_empty() && pos >= *origin {
            *origin = pos;
        }
        if pos < *origin {
            return Err(ActiveRegionError::RetiredPosition { position: pos, origin: *origin })
        }
        let idx = pos - *origin;
        if idx >= slots.len() {
            slots.resize_with(idx + 1, PositionSlot::default);
        }
        Ok(idx)
    }

    fn insert_base(&mut self, read_id:ReadId, pos:usize, obs:Observation) -> Result<()> {
        let state = self.reads.get_mut(&read_id).ok_or(ActiveRegionError::UnregisteredRead { read_id })?;
        let idx = Self::slot_index(&mut self.slots, &mut self.origin, pos)?;
        let slot = &mut self.slots[idx];
        state.last_pos = state.last_pos.max(Some(pos));

        match slot.bases.get(&read_id) {
            Some(existing) if *existing == obs => return Ok(()),
            Some(_) => return Err(ActiveRegionError::ConflictingObservation { read_id, position: pos }),
            None => {}
        }
        if slot.bases.len() >= self.max_depth {
            self.dropped += 1;
            state.is_truncated = true;
            return Ok(())
        }
        slot.bases.insert(read_id, obs);
        Ok(())
    }

    fn insert_anchored(&mut self, read_id:ReadId, pos:usize, obs:Observation) -> Result<()> {
        let state = self.reads.get_mut(&read_id).ok_or(ActiveRegionError::UnregisteredRead { read_id })?;
        let idx = Self::slot_index(&mut self.slots, &mut self.origin, pos)?;
        let slot = &mut self.slots[idx];
        state.last_pos = state.last_pos.max(Some(pos));

        match slot.insertions.get(&read_id) {
            Some(existing) if *existing == obs => return Ok(()),
            Some(_) => return Err(ActiveRegionError::ConflictingObservation { read_id, position: pos }),
            None => {}
        }
        if slot.insertions.len() >= self.max_depth {
            self.dropped += 1;
            state.is_truncated = true;
            return Ok(())
        }
        slot.insertions.insert(read_id, obs);
        Ok(())
    }
}
