use std::fmt;
use std::ops::Range;


/// Read-only random access to the reference bases of a segment.
pub trait ReferenceSequence {

    /// Upper-case base at `pos`, `None` outside of the loaded range
    fn base(&self, pos:usize) -> Option<u8>;

    fn range(&self) -> Range<usize>;

    fn is_empty(&self) -> bool { self.range().is_empty() }
}


#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeqInterval {
    pub tid: usize,
    pub beg: usize,
    pub end: usize,
}

impl fmt::Display for SeqInterval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}-{}", self.tid, self.beg, self.end)
    }
}

impl SeqInterval {
    pub fn range(&self) -> Range<usize> { self.beg..self.end }
}


/// In-memory reference bases starting at an arbitrary contig offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSegment {
    beg: usize,
    sequence: Vec<u8>,
}

impl ReferenceSegment {

    pub fn new(sequence: impl AsRef<[u8]>) -> Self {
        Self::with_offset(0, sequence)
    }

    pub fn with_offset(beg:usize, sequence: impl AsRef<[u8]>) -> Self {
        let sequence = sequence.as_ref().iter()
            .map(|b| b.to_ascii_uppercase())
            .collect();
        Self { beg, sequence }
    }

    pub fn beg(&self) -> usize { self.beg }
    pub fn end(&self) -> usize { self.beg + self.sequence.len() }
    pub fn len(&self) -> usize { self.sequence.len() }

    pub fn subseq(&self, beg:usize, end:usize) -> Option<&[u8]> {
        if beg < self.beg || end > self.end() || beg > end {
            return None
        }
        Some(&self.sequence[beg-self.beg..end-self.beg])
    }
}

impl ReferenceSequence for ReferenceSegment {

    #[inline(always)]
    fn base(&self, pos:usize) -> Option<u8> {
        pos.checked_sub(self.beg).and_then(|idx| self.sequence.get(idx).copied())
    }

    fn range(&self) -> Range<usize> { self.beg..self.end() }
}


pub fn normalize_base(base:u8) -> Option<u8> {
    match base.to_ascii_uppercase() {
        b @ (b'A' | b'C' | b'G' | b'T' | b'N') => Some(b),
        _ => None
    }
}


// length of the run of identical bases containing `pos`, counted up to `cap`
fn run_length<R: ReferenceSequence + ?Sized>(reference:&R, pos:usize, cap:usize) -> usize {
    let Some(base) = reference.base(pos) else { return 0 };
    let mut length = 1;
    let mut left = pos;
    while length < cap && left > 0 && reference.base(left-1) == Some(base) {
        left -= 1;
        length += 1;
    }
    let mut right = pos;
    while length < cap && reference.base(right+1) == Some(base) {
        right += 1;
        length += 1;
    }
    length
}


/// Whether `pos` lies inside a homopolymer run of at least `hp_len` bases or
/// right next to one. `hp_len == 0` disables the rule.
pub fn in_homopolymer<R: ReferenceSequence + ?Sized>(reference:&R, pos:usize, hp_len:usize) -> bool {
    if hp_len == 0 {
        return false
    }
    if run_length(reference, pos, hp_len) >= hp_len {
        return true
    }
    let left_flank = pos > 0 && run_length(reference, pos-1, hp_len) >= hp_len;
    left_flank || run_length(reference, pos+1, hp_len) >= hp_len
}
