use thiserror::Error;

use crate::indel::IndelKey;
use crate::readbuffer::ReadId;

pub type Result<T> = std::result::Result<T, ActiveRegionError>;

/// Precondition violations reported by the observation store, the result
/// buffers and the detector. None of them is recoverable by retrying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActiveRegionError {
    #[error("position {requested} precedes the processing frontier {frontier}")]
    OutOfOrderPosition { frontier: usize, requested: usize },

    #[error("position {position} was already retired (buffer starts at {origin})")]
    RetiredPosition { position: usize, origin: usize },

    #[error("sample index {sample_index} is out of range ({sample_count} samples)")]
    SampleOutOfRange { sample_index: usize, sample_count: usize },

    #[error("read {read_id} is not registered")]
    UnregisteredRead { read_id: ReadId },

    #[error("read {read_id} is already registered with a different identity")]
    ReadIdentityConflict { read_id: ReadId },

    #[error("read {read_id} belongs to sample {read_sample}, not to sample {buffer_sample}")]
    WrongSampleBuffer { read_id: ReadId, read_sample: usize, buffer_sample: usize },

    #[error("conflicting observation for read {read_id} at position {position}")]
    ConflictingObservation { read_id: ReadId, position: usize },

    #[error("invalid base {base:?}")]
    InvalidBase { base: char },

    #[error("invalid indel key {key}: {reason}")]
    InvalidIndelKey { key: IndelKey, reason: &'static str },

    #[error("indel buffer samples are already finalized")]
    SamplesFinalized,

    #[error("indel buffer samples are not finalized")]
    SamplesNotFinalized,

    #[error("{buffer} is configured for {found} samples, expected {expected}")]
    SampleCountMismatch { buffer: &'static str, expected: usize, found: usize },

    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl ActiveRegionError {

    pub fn invalid_base(base: u8) -> Self {
        Self::InvalidBase { base: base as char }
    }

    pub fn invalid_option(message: impl Into<String>) -> Self {
        Self::InvalidOption(message.into())
    }
}
