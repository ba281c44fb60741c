//! # Error
//!
//! Covers all errors raised while simulating a ddRAD dataset. Configuration
//! errors are raised once before any output is written; locus errors are raised
//! while growing an allele tree and abort the whole run.

use std::io;
use thiserror::Error;

/// Enum that covers errors in our crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A probability parameter is outside of [0, 1]
    #[error("invalid probability for `{name}`: {value} (must be within [0, 1])")]
    InvalidProbability { name: String, value: f64 },

    /// A probability map does not sum up to one
    #[error("probabilities for `{name}` sum up to {sum}, expected 1.0")]
    ProbabilitiesDoNotSumToOne { name: String, sum: f64 },

    /// A label of a probability map is not known
    #[error("unknown label `{0}`")]
    UnknownLabel(String),

    /// Read length cannot hold barcodes, spacers, DBR and overhangs
    #[error(
        "read length {read_length} is too short, at least {needed} bases are needed \
         for the auxiliary sequences and the genomic part"
    )]
    ReadLengthTooShort { read_length: usize, needed: usize },

    /// Beta-binomial parameters leave too few successes per trial
    #[error(
        "beta-binomial coverage model is degenerate: n = {n} exceeds 5 x {ds}; \
         increase alpha or decrease beta"
    )]
    DegenerateBetaBinomial { n: usize, ds: usize },

    /// Unknown coverage model name
    #[error("invalid coverage model `{0}`, choose `poisson` or `betabinomial`")]
    InvalidCoverageModel(String),

    /// Diversity must be strictly positive
    #[error("diversity must be > 0, got {0}")]
    NonPositiveDiversity(f64),

    /// Any other numeric parameter outside of its domain
    #[error("invalid value for `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Allele tree growth ran out of mutable positions
    #[error(
        "ran out of mutable positions at locus {locus}: {detail}. \
         Use longer reads or a lower diversity"
    )]
    NoPositionsLeft { locus: String, detail: String },

    /// All mutation types with non-zero probability are prohibited
    #[error("no mutation type can be drawn, all remaining types are prohibited: {0}")]
    NoMutationTypeAvailable(String),

    /// A rejection sampling loop hit its cap
    #[error("gave up after {tries} tries while {what}")]
    ResampleLimitExceeded { what: String, tries: usize },

    /// Fragment is shorter than two read lengths
    #[error("fragment `{name}` has length {length}, at least {needed} is required")]
    FragmentTooShort {
        name: String,
        length: usize,
        needed: usize,
    },

    /// Mutation annotation could not be parsed
    #[error("invalid mutation annotation `{0}`")]
    InvalidAnnotation(String),

    /// Locus operation called in the wrong lifecycle state
    #[error("locus {locus} is {state}, cannot {operation}")]
    InvalidLocusState {
        locus: String,
        state: String,
        operation: String,
    },

    /// Error while writing FASTQ or ground truth
    #[error("io error: `{0}`")]
    Io(#[from] io::Error),

    /// Error while serialising the ground truth
    #[error("yaml error: `{0}`")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_positions_left_recommends_fix() {
        let err = Error::NoPositionsLeft {
            locus: "Locus 3".to_string(),
            detail: "no parent allele has free positions".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Locus 3"));
        assert!(msg.contains("longer reads"));
        assert!(msg.contains("lower diversity"));
    }

    #[test]
    fn io_errors_convert() {
        fn fails() -> Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(Error::Io(_))));
    }
}
