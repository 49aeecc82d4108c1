use clap::Args;

use crate::error::{ActiveRegionError, Result};

pub const DEFAULT_PLOIDY: usize = 2;


/// Active-region detection parameters, flattenable into a host command line
#[derive(Args, Debug, Clone, PartialEq)]
pub struct DetectorOptions {

    /// Maximum indel size considered by the realigner
    #[arg(long = "max-indel-size", value_name = "NUM", default_value_t = 50)]
    pub max_indel_size: usize,

    /// Maximum number of haplotypes retained per active region
    #[arg(long = "ploidy", value_name = "NUM", default_value_t = DEFAULT_PLOIDY)]
    pub default_ploidy: usize,

    /// Detect active regions jointly over all samples
    #[arg(long = "merge-samples")]
    pub merge_samples: bool,

    /// Minimum number of alternative-allele observations at a variant position
    #[arg(long = "min-alt-count", value_name = "NUM", default_value_t = 2)]
    pub min_alt_count: usize,

    /// Minimum fraction of alternative-allele observations at a variant position
    #[arg(long = "min-alt-frac", value_name = "FLOAT", default_value_t = 0.1)]
    pub min_alt_frac: f64,

    /// Width of the trailing window used to measure variant density
    #[arg(long = "window", value_name = "NUM", default_value_t = 14)]
    pub window: usize,

    /// Minimum number of variant positions in the window to keep a region open
    #[arg(long = "min-variant-positions", value_name = "NUM", default_value_t = 1)]
    pub min_variant_positions: usize,

    /// Ignore mismatches in or next to homopolymers of this length (0 disables)
    #[arg(long = "hp-length", value_name = "NUM", default_value_t = 8)]
    pub homopolymer_length: usize,

    /// Maximum number of reads tracked at a position, per sample
    #[arg(long = "max-read-depth", value_name = "NUM", default_value_t = 1000)]
    pub max_read_depth: usize,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_indel_size: 50,
            default_ploidy: DEFAULT_PLOIDY,
            merge_samples: false,
            min_alt_count: 2,
            min_alt_frac: 0.1,
            window: 14,
            min_variant_positions: 1,
            homopolymer_length: 8,
            max_read_depth: 1000,
        }
    }
}

impl DetectorOptions {

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(ActiveRegionError::invalid_option("window must be positive"))
        }
        if self.min_variant_positions == 0 {
            return Err(ActiveRegionError::invalid_option("min-variant-positions must be positive"))
        }
        if self.max_read_depth == 0 {
            return Err(ActiveRegionError::invalid_option("max-read-depth must be positive"))
        }
        if !(0.0..=1.0).contains(&self.min_alt_frac) {
            return Err(ActiveRegionError::invalid_option(format!("min-alt-frac must be in [0,1], got {}", self.min_alt_frac)))
        }
        Ok(())
    }

    /// Longest span a single active region may cover
    pub fn max_region_span(&self) -> usize { self.max_indel_size + self.window }

    pub fn ploidy(&self) -> usize { self.default_ploidy.max(1) }
}
