//! Simulation of ddRADseq datasets with a ground truth for every injected
//! artifact: mutations, null alleles, incomplete digestion, PCR copies,
//! sequencing errors, singletons and highly repetitive loci.

#[macro_use]
extern crate log;

pub mod config;
pub mod distributions;
pub mod error;
pub mod fragments;
pub mod individuals;
pub mod mutation;
pub mod output;
pub mod postprocessing;
pub mod quality;
pub mod rad_locus;
pub mod reads;
pub mod sequence;
pub mod simulation;
pub mod statistics;
