use std::sync::mpsc;
use std::thread;

use itertools::Itertools;

use crate::cli::DetectorOptions;
use crate::error::Result;
use crate::indel::{AlignType, IndelBuffer, IndelClass, IndelKey, IndelObservation, IndelSeq};
use crate::readbuffer::{ReadBuffer, ReadId};
use crate::region::ActiveRegionDetector;
use crate::seq::{ReferenceSegment, SeqInterval};
use crate::variant::CandidateSnvBuffer;


/// Alignment operation of a read against the reference, cigar-like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignOp {
    /// bases equal to the reference
    Match(usize),
    /// one substituted base
    Mismatch(u8),
    /// bases inserted before the current reference position
    Insertion(IndelSeq),
    Deletion(usize),
    /// unaligned read end at the current reference position
    Breakpoint(IndelClass, IndelSeq),
    SoftClip(usize),
}

impl AlignOp {
    pub fn ref_length(&self) -> usize {
        match self {
            AlignOp::Match(len) | AlignOp::Deletion(len) => *len,
            AlignOp::Mismatch(_) => 1,
            AlignOp::Insertion(_) | AlignOp::Breakpoint(..) | AlignOp::SoftClip(_) => 0,
        }
    }
}


#[derive(Debug, Clone)]
pub struct AlignedRead {
    pub id: ReadId,
    pub sample_index: usize,
    pub align_type: AlignType,
    pub is_forward_strand: bool,
    pub pos: usize,
    pub ops: Vec<AlignOp>,
}

impl AlignedRead {

    pub fn new(id:ReadId, sample_index:usize, pos:usize, ops:Vec<AlignOp>) -> Self {
        Self { id, sample_index, align_type: AlignType::GenomeTier1, is_forward_strand: true, pos, ops }
    }

    pub fn with_strand(mut self, is_forward_strand:bool) -> Self {
        self.is_forward_strand = is_forward_strand;
        self
    }

    pub fn with_align_type(mut self, align_type:AlignType) -> Self {
        self.align_type = align_type;
        self
    }

    /// First reference position after the alignment
    pub fn end(&self) -> usize {
        self.pos + self.ops.iter().map(AlignOp::ref_length).sum::<usize>()
    }

    /// Registers the read and writes all of its observations
    pub fn replay(&self, buffer:&mut ReadBuffer) -> Result<()> {
        buffer.set_align_info(self.id, self.sample_index, self.align_type, self.is_forward_strand)?;
        let observation = |key:IndelKey| IndelObservation::new(key, self.id, self.align_type);

        let mut pos = self.pos;
        for op in self.ops.iter() {
            match op {
                AlignOp::Match(len) => {
                    for p in pos..pos+len {
                        buffer.insert_match(self.id, p)?;
                    }
                }
                AlignOp::Mismatch(base) => { buffer.insert_mismatch(self.id, pos, *base)?; }
                AlignOp::Insertion(seq) => { buffer.insert_indel(&observation(IndelKey::insertion(pos, seq)))?; }
                AlignOp::Deletion(len) => { buffer.insert_indel(&observation(IndelKey::deletion(pos, *len)))?; }
                AlignOp::Breakpoint(class, seq) => { buffer.insert_indel(&observation(IndelKey::new(pos, *class, 0, seq)))?; }
                AlignOp::SoftClip(_) => {}
            }
            pos += op.ref_length();
        }
        Ok(())
    }
}


/// Reference bases of one segment and the reads aligned to it.
#[derive(Debug, Clone)]
pub struct Segment {
    pub interval: SeqInterval,
    pub reference: ReferenceSegment,
    pub reads: Vec<AlignedRead>,
}

impl Segment {
    pub fn new(tid:usize, reference:ReferenceSegment, reads:Vec<AlignedRead>) -> Self {
        let interval = SeqInterval { tid, beg: reference.beg(), end: reference.end() };
        Self { interval, reference, reads }
    }
}


#[derive(Debug)]
pub struct SegmentCalls {
    pub interval: SeqInterval,
    pub indels: IndelBuffer,
    pub snvs: CandidateSnvBuffer,
}


/// Streams a segment through a fresh detector. Reads are replayed when the
/// frontier reaches their start position.
pub fn process_segment(segment:&Segment, sample_count:usize, opts:&DetectorOptions) -> Result<SegmentCalls> {
    let depth_cap = u32::try_from(opts.max_read_depth).unwrap_or(u32::MAX);
    let mut indels = IndelBuffer::with_depth_caps(&vec![depth_cap; sample_count])?;
    let mut snvs = CandidateSnvBuffer::new(sample_count);

    {
        let mut detector = ActiveRegionDetector::from_options(&segment.reference, &mut indels, &mut snvs, sample_count, opts)?;
        let reads = segment.reads.iter()
            .sorted_by_key(|read| read.pos)
            .collect_vec();

        let mut next_read = 0;
        for pos in segment.interval.range() {
            while next_read < reads.len() && reads[next_read].pos <= pos {
                let read = reads[next_read];
                read.replay(detector.read_buffer(read.sample_index)?)?;
                next_read += 1;
            }
            detector.update_end_position(pos)?;
        }
        detector.clear()?;
        spdlog::debug!("segment {}: {} reads, {} active regions", segment.interval, reads.len(), detector.region_count());
    }

    Ok(SegmentCalls { interval: segment.interval, indels, snvs })
}


/// Processes independent segments on `nb_threads` workers; results are
/// returned in input order.
pub fn process_segments(segments:&[Segment], sample_count:usize, opts:&DetectorOptions, nb_threads:usize) -> Result<Vec<SegmentCalls>> {
    let nb_threads = nb_threads.clamp(1, segments.len().max(1));
    spdlog::info!("processing {} segments using {nb_threads} threads", segments.len());

    let (tx, rx) = mpsc::channel();
    thread::scope(|scope| {
        for thread_id in 0..nb_threads {
            let sender = tx.clone();
            scope.spawn(move || {
                for (idx, segment) in segments.iter().enumerate().skip(thread_id).step_by(nb_threads) {
                    let calls = process_segment(segment, sample_count, opts);
                    if sender.send((idx, calls)).is_err() {
                        break
                    }
                }
            });
        }
    });
    drop(tx);

    rx.into_iter()
        .sorted_unstable_by_key(|(idx,_)| *idx)
        .map(|(_,calls)| calls)
        .collect()
}
