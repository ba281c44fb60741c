use rand::Rng;

use crate::reads::Mate;

/// Offset of the Sanger / Illumina 1.8 quality encoding.
pub const PHRED_OFFSET: u8 = 33;

/// Source of per base quality values for emitted reads.
pub trait QualityModel {
    /// Phred+33 encoded qualities for one mate of a read of `length` bases.
    fn generate_qualities<R: Rng>(&self, mate: Mate, length: usize, rng: &mut R) -> Vec<u8>;
}

/// Qualities drawn uniformly from an inclusive Phred range.
#[derive(Debug, Clone, Copy)]
pub struct UniformQualities {
    min: u8,
    max: u8,
}

impl UniformQualities {
    pub fn new(min: u8, max: u8) -> UniformQualities {
        UniformQualities {
            min: min.min(max),
            max: max.max(min),
        }
    }
}

impl QualityModel for UniformQualities {
    fn generate_qualities<R: Rng>(&self, _mate: Mate, length: usize, rng: &mut R) -> Vec<u8> {
        (0..length)
            .map(|_| rng.gen_range(self.min..=self.max) + PHRED_OFFSET)
            .collect()
    }
}
