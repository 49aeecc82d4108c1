pub mod buffer;

use std::fmt;

use tinyvec::TinyVec;

use crate::error::{ActiveRegionError, Result};
use crate::readbuffer::ReadId;
use crate::seq::{self, ReferenceSequence};

pub use buffer::{IndelBuffer, IndelData};

pub type IndelSeq = TinyVec<[u8;8]>;


#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum IndelClass {
    Indel,
    BreakpointLeft,
    BreakpointRight,
}

impl fmt::Display for IndelClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IndelClass::Indel => { write!(f, "INDEL") }
            IndelClass::BreakpointLeft => { write!(f, "BP_LEFT") }
            IndelClass::BreakpointRight => { write!(f, "BP_RIGHT") }
        }
    }
}


/// Alignment tier of a read as classified by the upstream aligner.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlignType {
    #[default] GenomeTier1,
    GenomeTier2,
    GenomeSubmap,
}

impl AlignType {
    pub fn is_tier1(&self) -> bool { matches!(self, AlignType::GenomeTier1) }
}


/// Identity of an indel: anchor position, class, number of deleted reference
/// bases and inserted sequence.
///
/// Insertions are anchored *before* `pos`; deletions remove the reference
/// bases in `[pos, pos + deletion_length)`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndelKey {
    pos: usize,
    class: IndelClass,
    deletion_length: usize,
    insert_seq: IndelSeq,
}

impl fmt::Display for IndelKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let insert = String::from_utf8_lossy(&self.insert_seq);
        write!(f, "{}:{}:{}D:{}", self.pos, self.class, self.deletion_length, insert)
    }
}

impl IndelKey {

    pub fn new(pos:usize, class:IndelClass, deletion_length:usize, insert_seq: impl AsRef<[u8]>) -> Self {
        let insert_seq = insert_seq.as_ref().iter()
            .map(|b| b.to_ascii_uppercase())
            .collect();
        Self { pos, class, deletion_length, insert_seq }
    }

    pub fn insertion(pos:usize, insert_seq: impl AsRef<[u8]>) -> Self {
        Self::new(pos, IndelClass::Indel, 0, insert_seq)
    }

    pub fn deletion(pos:usize, deletion_length:usize) -> Self {
        Self::new(pos, IndelClass::Indel, deletion_length, b"")
    }

    pub fn pos(&self) -> usize { self.pos }
    pub fn class(&self) -> IndelClass { self.class }
    pub fn deletion_length(&self) -> usize { self.deletion_length }
    pub fn insert_seq(&self) -> &[u8] { &self.insert_seq }
    pub fn insert_length(&self) -> usize { self.insert_seq.len() }

    /// First reference position after the deleted bases
    pub fn ref_end(&self) -> usize { self.pos + self.deletion_length }

    pub fn is_breakpoint(&self) -> bool { self.class != IndelClass::Indel }

    pub fn is_insertion(&self) -> bool {
        self.class == IndelClass::Indel && self.deletion_length == 0 && !self.insert_seq.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        self.class == IndelClass::Indel && self.deletion_length > 0 && self.insert_seq.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let reason = match self.class {
            IndelClass::Indel if self.deletion_length == 0 && self.insert_seq.is_empty() => Some("zero-length change"),
            IndelClass::BreakpointLeft | IndelClass::BreakpointRight if self.deletion_length > 0 => Some("breakpoints cannot delete reference bases"),
            _ if self.insert_seq.iter().any(|&b| seq::normalize_base(b).is_none()) => Some("inserted sequence contains a non-nucleotide symbol"),
            _ => None
        };
        match reason {
            Some(reason) => Err(ActiveRegionError::InvalidIndelKey { key: self.clone(), reason }),
            None => Ok(())
        }
    }

    /// Leftmost representation producing the same sequence change.
    ///
    /// Only simple insertions and deletions move; complex substitutions and
    /// breakpoints are returned unchanged. Shifting stops at the first base
    /// of the reference segment and never crosses an `N`.
    pub fn left_shifted<R: ReferenceSequence + ?Sized>(&self, reference:&R) -> IndelKey {
        let mut key = self.clone();
        let first = reference.range().start;

        if key.is_deletion() {
            while key.pos > first {
                match (reference.base(key.pos-1), reference.base(key.ref_end()-1)) {
                    (Some(a), Some(b)) if a == b && a != b'N' => { key.pos -= 1; }
                    _ => break
                }
            }
        } else if key.is_insertion() {
            while key.pos > first {
                let Some(&last) = key.insert_seq.last() else { break };
                match reference.base(key.pos-1) {
                    Some(b) if b == last && b != b'N' => {
                        key.insert_seq.rotate_right(1);
                        key.pos -= 1;
                    }
                    _ => break
                }
            }
        }

        key
    }

    pub fn is_equivalent<R: ReferenceSequence + ?Sized>(&self, other:&IndelKey, reference:&R) -> bool {
        self.class == other.class
            && self.deletion_length == other.deletion_length
            && self.insert_seq.len() == other.insert_seq.len()
            && self.left_shifted(reference) == other.left_shifted(reference)
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndelObservationData {
    pub id: ReadId,
    pub align_type: AlignType,
}

/// One read carrying one indel, as produced by the upstream realigner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndelObservation {
    pub key: IndelKey,
    pub data: IndelObservationData,
}

impl IndelObservation {
    pub fn new(key:IndelKey, id:ReadId, align_type:AlignType) -> Self {
        Self { key, data: IndelObservationData { id, align_type } }
    }
}
