pub mod cli;
pub mod error;
pub mod indel;
pub mod readbuffer;
pub mod region;
pub mod segment;
pub mod seq;
pub mod variant;


pub use self::cli::DetectorOptions;
pub use self::error::{ActiveRegionError, Result};
pub use self::indel::{AlignType, IndelBuffer, IndelClass, IndelData, IndelKey, IndelObservation};
pub use self::readbuffer::{ReadBuffer, ReadId};
pub use self::region::ActiveRegionDetector;
pub use self::segment::{process_segment, process_segments, AlignOp, AlignedRead, Segment, SegmentCalls};
pub use self::seq::{ReferenceSegment, ReferenceSequence, SeqInterval};
pub use self::variant::{CandidateSnvBuffer, Snv};
