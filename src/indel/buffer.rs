use ahash::AHashMap as HashMap;
use itertools::Itertools;

use crate::error::{ActiveRegionError, Result};
use super::IndelKey;


/// Per-indel state shared by every sample of a segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndelData {
    sample_counts: Vec<u32>,
    pub is_confirmed_in_active_region: bool,
}

impl IndelData {

    fn new(sample_count:usize) -> Self {
        Self { sample_counts: vec![0; sample_count], is_confirmed_in_active_region: false }
    }

    pub fn sample_count(&self, sample_index:usize) -> u32 {
        self.sample_counts.get(sample_index).copied().unwrap_or(0)
    }

    pub fn total_count(&self) -> u32 { self.sample_counts.iter().sum() }

    pub fn is_confirmed_in_active_region(&self) -> bool { self.is_confirmed_in_active_region }
}


/// Registry of canonical indels and their confirmation status.
///
/// Samples are registered once with their maximum tracked depth and the
/// sample set is then frozen with [`IndelBuffer::finalize_samples`]; only
/// after that can indels be observed or confirmed.
#[derive(Debug, Default)]
pub struct IndelBuffer {
    depth_caps: Vec<u32>,
    is_finalized: bool,
    indels: HashMap<IndelKey,IndelData>,
}

impl IndelBuffer {

    pub fn new() -> Self { Self::default() }

    pub fn with_depth_caps(depth_caps:&[u32]) -> Result<Self> {
        let mut buffer = Self::new();
        for &max_depth in depth_caps {
            buffer.register_sample(max_depth)?;
        }
        buffer.finalize_samples()?;
        Ok(buffer)
    }

    /// Registers a new sample and returns its index
    pub fn register_sample(&mut self, max_depth:u32) -> Result<usize> {
        if self.is_finalized {
            return Err(ActiveRegionError::SamplesFinalized)
        }
        if max_depth == 0 {
            return Err(ActiveRegionError::invalid_option("sample depth cap must be positive"))
        }
        self.depth_caps.push(max_depth);
        Ok(self.depth_caps.len() - 1)
    }

    pub fn finalize_samples(&mut self) -> Result<()> {
        if self.is_finalized {
            return Err(ActiveRegionError::SamplesFinalized)
        }
        if self.depth_caps.is_empty() {
            return Err(ActiveRegionError::invalid_option("indel buffer needs at least one sample"))
        }
        self.is_finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool { self.is_finalized }
    pub fn sample_count(&self) -> usize { self.depth_caps.len() }
    pub fn len(&self) -> usize { self.indels.len() }
    pub fn is_empty(&self) -> bool { self.indels.is_empty() }

    pub fn observe(&mut self, key:&IndelKey, sample_index:usize) -> Result<()> {
        self.add_observations(key, sample_index, 1)
    }

    /// Counts beyond the sample's depth cap are dropped
    pub fn add_observations(&mut self, key:&IndelKey, sample_index:usize, count:u32) -> Result<()> {
        let max_depth = self.check_sample(sample_index)?;
        let data = self.entry(key)?;
        let sample_count = &mut data.sample_counts[sample_index];
        *sample_count = sample_count.saturating_add(count).min(max_depth);
        Ok(())
    }

    pub fn confirm(&mut self, key:&IndelKey) -> Result<()> {
        self.entry(key)?.is_confirmed_in_active_region = true;
        Ok(())
    }

    pub fn lookup(&self, key:&IndelKey) -> Option<&IndelData> {
        self.indels.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item=(&IndelKey,&IndelData)> {
        self.indels.iter()
    }

    pub fn confirmed_indels(&self) -> Vec<&IndelKey> {
        self.indels.iter()
            .filter(|(_,data)| data.is_confirmed_in_active_region)
            .map(|(key,_)| key)
            .sorted_unstable()
            .collect_vec()
    }

    fn check_sample(&self, sample_index:usize) -> Result<u32> {
        if !self.is_finalized {
            return Err(ActiveRegionError::SamplesNotFinalized)
        }
        self.depth_caps.get(sample_index).copied().ok_or(ActiveRegionError::SampleOutOfRange {
            sample_index,
            sample_count: self.depth_caps.len()
        })
    }

    fn entry(&mut self, key:&IndelKey) -> Result<&mut IndelData> {
        if !self.is_finalized {
            return Err(ActiveRegionError::SamplesNotFinalized)
        }
        key.validate()?;
        let sample_count = self.depth_caps.len();
        Ok(self.indels.entry(key.clone()).or_insert_with(|| IndelData::new(sample_count)))
    }
}
