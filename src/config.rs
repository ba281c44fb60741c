use std::fmt;
use std::hash::Hash;

use rand::Rng;

use crate::distributions::{BetaBinomialCoverage, CategoricalTable, Coverage, PoissonCoverage};
use crate::error::{Error, Result};
use crate::individuals::Individual;
use crate::mutation::MutationKind;

/// Tolerance when checking that a probability map sums up to one
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-6;

/// A probability value that is known to lie within [0, 1].
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct Probability(f64);

impl Probability {
    pub const MIN: f64 = 0.0;
    pub const MAX: f64 = 1.0;

    pub fn new(value: f64) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Probability(value))
        } else {
            None
        }
    }

    /// Like `new`, but reports the offending parameter by name.
    pub fn checked(name: &str, value: f64) -> Result<Self> {
        Probability::new(value).ok_or_else(|| Error::InvalidProbability {
            name: name.to_string(),
            value,
        })
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// Closed set of labels that can be drawn from a `ProbabilityMap`.
pub trait Label: Copy + Eq + Hash + fmt::Debug + 'static {
    fn label(&self) -> &'static str;

    fn all() -> &'static [Self];

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::all().iter().copied().find(|x| x.label() == label)
    }
}

/// Per individual event drawn at each locus.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Common,
    Dropout,
    Mutation,
}

impl Label for EventType {
    fn label(&self) -> &'static str {
        match self {
            EventType::Common => "common",
            EventType::Dropout => "dropout",
            EventType::Mutation => "mutation",
        }
    }

    fn all() -> &'static [Self] {
        &[EventType::Common, EventType::Dropout, EventType::Mutation]
    }
}

/// Named categorical distribution over labels, validated to sum up to one.
#[derive(Clone)]
pub struct ProbabilityMap<K: Label> {
    name: String,
    entries: Vec<(K, f64)>,
    table: CategoricalTable,
}

impl<K: Label> ProbabilityMap<K> {
    pub fn new(name: &str, entries: Vec<(K, f64)>) -> Result<Self> {
        for (label, p) in &entries {
            Probability::checked(&format!("{} {}", name, label.label()), *p)?;
        }
        let sum: f64 = entries.iter().map(|(_, p)| p).sum();
        if entries.is_empty() || (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(Error::ProbabilitiesDoNotSumToOne {
                name: name.to_string(),
                sum,
            });
        }
        let table = CategoricalTable::new(name, entries.iter().map(|(_, p)| *p).collect())?;
        Ok(ProbabilityMap {
            name: name.to_string(),
            entries,
            table,
        })
    }

    /// Parse `label=value` pairs separated by commas. Labels not listed get probability 0.
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let mut entries: Vec<(K, f64)> = K::all().iter().map(|k| (*k, 0.0)).collect();
        for pair in text.split(',').filter(|x| !x.trim().is_empty()) {
            let (label, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::UnknownLabel(pair.to_string()))?;
            let key = K::from_label(label).ok_or_else(|| Error::UnknownLabel(label.to_string()))?;
            let value: f64 = value.trim().parse().map_err(|_| Error::InvalidParameter {
                name: format!("{} {}", name, label.trim()),
                reason: format!("`{}` is not a number", value.trim()),
            })?;
            if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
                entry.1 = value;
            }
        }
        ProbabilityMap::new(name, entries)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[(K, f64)] {
        &self.entries
    }

    pub fn probability(&self, key: K) -> f64 {
        self.entries
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, p)| *p)
            .sum()
    }

    pub fn draw<R: Rng>(&self, rng: &mut R) -> K {
        self.entries[self.table.draw(rng)].0
    }
}

impl<K: Label> fmt::Debug for ProbabilityMap<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbabilityMap")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .finish()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CoverageModel {
    Poisson,
    BetaBinomial { alpha: f64, beta: f64 },
}

impl CoverageModel {
    pub fn from_name(name: &str, alpha: f64, beta: f64) -> Result<CoverageModel> {
        match name.to_ascii_lowercase().as_str() {
            "poisson" => Ok(CoverageModel::Poisson),
            "betabinomial" | "bbd" => Ok(CoverageModel::BetaBinomial { alpha, beta }),
            _ => Err(Error::InvalidCoverageModel(name.to_string())),
        }
    }
}

/// Everything the simulation core needs to know about a run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub nr_loci: usize,
    pub nr_individuals: usize,
    pub read_length: usize,
    pub coverage: usize,
    pub coverage_model: CoverageModel,
    pub hrl_max_coverage: usize,
    pub nr_hrl_loci: usize,
    pub nr_singletons: usize,
    pub diversity: f64,
    pub gc_content: f64,
    pub prob_seq_error: f64,
    pub prob_heterozygocity: f64,
    pub prob_incomplete_digestion: f64,
    pub rate_incomplete_digestion: f64,
    pub prob_pcr_copy: f64,
    pub max_pcr_copy_nr: usize,
    pub single_end: bool,
    pub multiple_p7_bcs: bool,
    pub event_probabilities: ProbabilityMap<EventType>,
    pub mutation_type_probabilities: ProbabilityMap<MutationKind>,
    pub p5_overhang: Vec<u8>,
    pub p7_overhang: Vec<u8>,
    pub dbr: Vec<u8>,
    pub p5_recognition_site: Vec<u8>,
    pub p7_recognition_site: Vec<u8>,
    pub quality_range: (u8, u8),
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let event_probabilities = ProbabilityMap::new(
            "event probabilities",
            vec![
                (EventType::Common, 0.9),
                (EventType::Dropout, 0.05),
                (EventType::Mutation, 0.05),
            ],
        )
        .expect("default event probabilities sum up to one");
        let mutation_type_probabilities = ProbabilityMap::new(
            "mutation type probabilities",
            vec![
                (MutationKind::Snp, 0.94),
                (MutationKind::Insertion, 0.01),
                (MutationKind::Deletion, 0.01),
                (MutationKind::P5NaAlternative, 0.01),
                (MutationKind::P7NaAlternative, 0.01),
                (MutationKind::P5NaDropout, 0.01),
                (MutationKind::P7NaDropout, 0.01),
            ],
        )
        .expect("default mutation type probabilities sum up to one");

        SimulationConfig {
            nr_loci: 3,
            nr_individuals: 3,
            read_length: 100,
            coverage: 30,
            coverage_model: CoverageModel::BetaBinomial {
                alpha: 6.0,
                beta: 2.0,
            },
            hrl_max_coverage: 1000,
            nr_hrl_loci: 0,
            nr_singletons: 0,
            diversity: 1.0,
            gc_content: 0.5,
            prob_seq_error: 0.01,
            prob_heterozygocity: 0.5,
            prob_incomplete_digestion: 0.1,
            rate_incomplete_digestion: 0.2,
            prob_pcr_copy: 0.2,
            max_pcr_copy_nr: 3,
            single_end: false,
            multiple_p7_bcs: false,
            event_probabilities,
            mutation_type_probabilities,
            // NsiI leaves TGCA^T, Csp6I leaves TA^C
            p5_overhang: b"TGCAT".to_vec(),
            p7_overhang: b"TAC".to_vec(),
            dbr: b"NNNNNNMMGGACG".to_vec(),
            p5_recognition_site: b"ATGCAT".to_vec(),
            p7_recognition_site: b"GTAC".to_vec(),
            quality_range: (20, 40),
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Check every parameter that would make the run infeasible. Called before
    /// any output file is created.
    pub fn validate(&self) -> Result<()> {
        Probability::checked("gc content", self.gc_content)?;
        Probability::checked("prob seq error", self.prob_seq_error)?;
        Probability::checked("prob heterozygocity", self.prob_heterozygocity)?;
        Probability::checked("prob incomplete digestion", self.prob_incomplete_digestion)?;
        Probability::checked("rate incomplete digestion", self.rate_incomplete_digestion)?;
        Probability::checked("prob pcr copy", self.prob_pcr_copy)?;

        if !(self.diversity > 0.0) {
            return Err(Error::NonPositiveDiversity(self.diversity));
        }
        if self.coverage == 0 {
            return Err(Error::InvalidParameter {
                name: "coverage".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.prob_pcr_copy > 0.0 && self.max_pcr_copy_nr == 0 {
            return Err(Error::InvalidParameter {
                name: "max pcr copy nr".to_string(),
                reason: "must be at least 1 when PCR copies are enabled".to_string(),
            });
        }
        if self.quality_range.0 > self.quality_range.1 || self.quality_range.1 > 93 {
            return Err(Error::InvalidParameter {
                name: "quality range".to_string(),
                reason: format!("{:?} is not a valid Phred range", self.quality_range),
            });
        }
        if self.p5_recognition_site.is_empty() || self.p7_recognition_site.is_empty() {
            return Err(Error::InvalidParameter {
                name: "recognition site".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let normal = self.coverage_generator()?;
        if self.nr_hrl_loci > 0 {
            crate::distributions::UniformCoverage::from_coverage_generator(&normal, self.hrl_max_coverage)?;
        }
        Ok(())
    }

    /// Check that every individual's auxiliary sequences leave room for genomic bases.
    pub fn check_read_length(&self, individuals: &[Individual]) -> Result<()> {
        let longest = individuals
            .iter()
            .map(|ind| {
                let (p5, p7) = self.aux_lengths(ind);
                p5.max(p7)
            })
            .max()
            .unwrap_or(0);
        // at least one mutable genomic base per mate
        let needed = longest + 1;
        if self.read_length < needed {
            return Err(Error::ReadLengthTooShort {
                read_length: self.read_length,
                needed,
            });
        }
        Ok(())
    }

    /// Lengths of everything that precedes the genomic sequence on (p5, p7).
    pub fn aux_lengths(&self, individual: &Individual) -> (usize, usize) {
        let p5 = individual.p5_barcode.len() + individual.p5_spacer.len() + self.p5_overhang.len();
        let p7 = individual.p7_spacer.len() + self.dbr.len() + self.p7_overhang.len();
        (p5, p7)
    }

    pub fn coverage_generator(&self) -> Result<Coverage> {
        match self.coverage_model {
            CoverageModel::Poisson => Ok(Coverage::Poisson(PoissonCoverage::new(self.coverage, 2, None))),
            CoverageModel::BetaBinomial { alpha, beta } => Ok(Coverage::BetaBinomial(
                BetaBinomialCoverage::new(self.coverage, alpha, beta)?,
            )),
        }
    }

    pub fn excluded_motifs(&self) -> Vec<Vec<u8>> {
        vec![self.p5_recognition_site.clone(), self.p7_recognition_site.clone()]
    }
}
