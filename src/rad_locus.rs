//! A single RAD locus: one genomic fragment shared by all individuals, the
//! allele tree grown on it and the reads every individual contributes.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::{EventType, SimulationConfig};
use crate::distributions::{
    distributed_events, heterozygous_mutation_distribution, incomplete_digestion_coverage, ztpd, CoverageGenerator,
    IndelLengthGenerator,
};
use crate::error::{Error, Result};
use crate::individuals::Individual;
use crate::mutation::{AssignedAllele, LocusTemplate, MutationModel, COMMON_ALLELE};
use crate::quality::QualityModel;
use crate::reads::{AuxSegments, FastqEntry, Mate, ProtoRead, RadRead};
use crate::sequence::{random_seq, reverse_complement};

/// Probability that an incomplete digestion hits the p5 side.
pub const P5_ID_PROBABILITY: f64 = 0.01;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LocusState {
    Constructed,
    EventsSimulated,
    Burned,
}

impl fmt::Display for LocusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocusState::Constructed => write!(f, "constructed"),
            LocusState::EventsSimulated => write!(f, "simulated"),
            LocusState::Burned => write!(f, "burned"),
        }
    }
}

/// What happened to an individual at this locus.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndividualEvent {
    Common,
    Dropout,
    Heterozygous,
    Homozygous,
}

impl fmt::Display for IndividualEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndividualEvent::Common => write!(f, "common"),
            IndividualEvent::Dropout => write!(f, "dropout"),
            IndividualEvent::Heterozygous => write!(f, "mutation heterozygous"),
            IndividualEvent::Homozygous => write!(f, "mutation homozygous"),
        }
    }
}

/// Alleles and coverage of one individual. A `None` second slot means the
/// first allele is carried on both chromosomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleAssignment {
    pub coverage: (usize, usize),
    pub alleles: (AssignedAllele, AssignedAllele),
    pub annotations: (Vec<String>, Vec<String>),
    pub id_reads: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlleleFrequency {
    pub allele_frequencies: BTreeMap<String, f64>,
    pub coverage_frequencies: BTreeMap<String, f64>,
}

/// Read counts of a locus, kept after the locus is burned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocusSummary {
    pub normal_reads: usize,
    pub pcr_copies: usize,
    pub id_reads: usize,
    pub seq_errors: usize,
    pub nr_alleles: usize,
    pub events: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndividualAlleleEntry {
    pub cov: usize,
    pub mutations: Vec<String>,
}

/// Ground truth of one locus as written to the YAML file.
#[derive(Debug, Clone, Serialize)]
pub struct LocusGroundTruth {
    #[serde(rename = "p5 seq")]
    pub p5_seq: String,
    #[serde(rename = "p7 seq")]
    pub p7_seq: String,
    pub coverage: usize,
    #[serde(rename = "allele frequencies")]
    pub allele_frequencies: BTreeMap<String, f64>,
    #[serde(rename = "allele coverages")]
    pub allele_coverages: BTreeMap<String, f64>,
    #[serde(rename = "id reads")]
    pub id_reads: usize,
    pub individuals: BTreeMap<String, BTreeMap<String, IndividualAlleleEntry>>,
}

#[derive(Debug)]
pub struct RadLocus {
    name: String,
    state: LocusState,
    fragment: Vec<u8>,
    individuals: Vec<Individual>,
    /// unmutated read of every individual, same order as `individuals`
    templates: Vec<RadRead>,
    model: Option<MutationModel>,
    reads: Vec<RadRead>,
    assigned_types: FxHashMap<String, IndividualEvent>,
    assigned_alleles: FxHashMap<String, AlleleAssignment>,
    allele_frequency: OnceCell<AlleleFrequency>,
    summary: LocusSummary,
}

impl RadLocus {
    /// Build the templates of all individuals and grow the allele tree.
    ///
    /// The p5 read starts at the beginning of `fragment`, the p7 read at the
    /// beginning of its reverse complement. Behind the genomic window of the
    /// individual with the shortest auxiliary sequences, each mate reserves
    /// spare bases to refill reads shortened by deletions.
    pub fn new<R: Rng>(
        name: &str,
        fragment: Vec<u8>,
        individuals: &[Individual],
        config: &SimulationConfig,
        rng: &mut R,
    ) -> Result<RadLocus> {
        let read_length = config.read_length;
        if fragment.len() < 2 * read_length {
            return Err(Error::FragmentTooShort {
                name: name.to_string(),
                length: fragment.len(),
                needed: 2 * read_length,
            });
        }
        config.check_read_length(individuals)?;

        let aux = individuals.iter().map(|ind| config.aux_lengths(ind)).collect::<Vec<_>>();
        let shortest = [
            aux.iter().map(|a| a.0).min().unwrap_or(0),
            aux.iter().map(|a| a.1).min().unwrap_or(0),
        ];
        let longest = [
            aux.iter().map(|a| a.0).max().unwrap_or(0),
            aux.iter().map(|a| a.1).max().unwrap_or(0),
        ];
        let window = [read_length - shortest[0], read_length - shortest[1]];
        let mutable_length = [read_length - longest[0], read_length - longest[1]];

        let nr_alleles = ztpd(config.diversity, rng)?;
        let free = (fragment.len() - window[0] - window[1]) / 2;
        let spare = (IndelLengthGenerator::new().longest_possible_deletion() * nr_alleles).min(free);

        let sources = [fragment.clone(), reverse_complement(&fragment)];
        let locus_spares = [
            Rc::new(sources[0][window[0]..window[0] + spare].to_vec()),
            Rc::new(sources[1][window[1]..window[1] + spare].to_vec()),
        ];

        let templates = individuals
            .iter()
            .zip(aux.iter())
            .map(|(ind, (p5_aux, p7_aux))| {
                let protoread = |mate: Mate, aux_len: usize, segments: AuxSegments| {
                    let slot = mate.index();
                    let own = read_length - aux_len;
                    ProtoRead::new(
                        mate,
                        read_length,
                        segments,
                        sources[slot][..own].to_vec(),
                        sources[slot][own..window[slot]].to_vec(),
                        Rc::clone(&locus_spares[slot]),
                    )
                };
                let p5 = protoread(
                    Mate::P5,
                    *p5_aux,
                    AuxSegments::new(&ind.p5_barcode, &ind.p5_spacer, b"", &config.p5_overhang),
                );
                let p7 = protoread(
                    Mate::P7,
                    *p7_aux,
                    AuxSegments::new(b"", &ind.p7_spacer, &config.dbr, &config.p7_overhang),
                );
                RadRead::new(p5, p7, Rc::from(ind.name.as_str()))
            })
            .collect::<Vec<RadRead>>();

        let template = LocusTemplate {
            genomic: [
                Rc::new(sources[0][..window[0]].to_vec()),
                Rc::new(sources[1][..window[1]].to_vec()),
            ],
            mutable_length,
            spare_length: [spare, spare],
        };
        let model = MutationModel::new(name, template, config, nr_alleles, rng)?;
        debug!("{}: {} alleles, {} spare bases per mate", name, model.nr_alleles(), spare);

        Ok(RadLocus {
            name: name.to_string(),
            state: LocusState::Constructed,
            fragment,
            individuals: individuals.to_vec(),
            templates,
            model: Some(model),
            reads: Vec::new(),
            assigned_types: FxHashMap::default(),
            assigned_alleles: FxHashMap::default(),
            allele_frequency: OnceCell::new(),
            summary: LocusSummary::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LocusState {
        self.state
    }

    pub fn fragment(&self) -> &[u8] {
        &self.fragment
    }

    pub fn reads(&self) -> &[RadRead] {
        &self.reads
    }

    pub fn templates(&self) -> &[RadRead] {
        &self.templates
    }

    pub fn model(&self) -> Option<&MutationModel> {
        self.model.as_ref()
    }

    pub fn summary(&self) -> &LocusSummary {
        &self.summary
    }

    pub fn assigned_types(&self) -> &FxHashMap<String, IndividualEvent> {
        &self.assigned_types
    }

    pub fn assigned_alleles(&self) -> &FxHashMap<String, AlleleAssignment> {
        &self.assigned_alleles
    }

    pub fn classify_type(&self, individual_name: &str) -> Option<IndividualEvent> {
        self.assigned_types.get(individual_name).copied()
    }

    fn require(&self, state: LocusState, operation: &str) -> Result<()> {
        if self.state != state {
            return Err(Error::InvalidLocusState {
                locus: self.name.clone(),
                state: self.state.to_string(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn model_mut(&mut self) -> Result<&mut MutationModel> {
        let (locus, state) = (self.name.clone(), self.state.to_string());
        self.model.as_mut().ok_or(Error::InvalidLocusState {
            locus,
            state,
            operation: "use the mutation model".to_string(),
        })
    }

    /// Apply `allele` to a copy of the template of individual `index`.
    fn allele_read(&mut self, index: usize, allele: usize) -> Result<(RadRead, Vec<String>, bool)> {
        let mut read = self.templates[index].shallow_copy();
        let model = self.model_mut()?;
        let annotations = model.apply_allele(allele, &mut read);
        let dropout = model.allele(allele).is_dropout();
        Ok((read, annotations, dropout))
    }

    /// Draw the event, coverage and alleles of every individual and create
    /// all reads, including incomplete digestion reads, PCR copies and
    /// sequencing errors. May only be called once.
    pub fn simulate_individual_events<G: CoverageGenerator, R: Rng>(
        &mut self,
        config: &SimulationConfig,
        coverage: &G,
        rng: &mut R,
    ) -> Result<()> {
        self.require(LocusState::Constructed, "simulate individual events")?;
        let events = distributed_events(self.individuals.len(), &config.event_probabilities, rng);
        let excluded_motifs = config.excluded_motifs();

        let mut reads: Vec<RadRead> = Vec::new();
        for (index, event) in events.into_iter().enumerate() {
            let name = self.individuals[index].name.clone();
            let total = coverage.get(rng);
            let (normal, id_coverage) = if rng.gen::<f64>() < config.prob_incomplete_digestion {
                incomplete_digestion_coverage(total, config.rate_incomplete_digestion, rng)
            } else {
                (total, 0)
            };

            // reads usable as a base for incomplete digestion
            let mut id_bases: Vec<RadRead> = Vec::new();
            let (individual_event, assignment) = match event {
                EventType::Common => {
                    let (read, annotations, _) = self.allele_read(index, COMMON_ALLELE)?;
                    reads.extend((0..normal).map(|_| read.shallow_copy()));
                    id_bases.push(read);
                    (
                        IndividualEvent::Common,
                        AlleleAssignment {
                            coverage: (normal, 0),
                            alleles: (AssignedAllele::Allele(COMMON_ALLELE), AssignedAllele::None),
                            annotations: (annotations, Vec::new()),
                            id_reads: 0,
                        },
                    )
                }
                EventType::Dropout => (
                    IndividualEvent::Dropout,
                    AlleleAssignment {
                        coverage: (0, 0),
                        alleles: (AssignedAllele::Dropout, AssignedAllele::Dropout),
                        annotations: (Vec::new(), Vec::new()),
                        id_reads: 0,
                    },
                ),
                EventType::Mutation if rng.gen::<f64>() < config.prob_heterozygocity => {
                    let model = self.model_mut()?;
                    let (first, second) = model.get_random_genotype(rng);
                    let (cov_first, cov_second) = heterozygous_mutation_distribution(normal, rng);
                    let (read_first, ann_first, drop_first) = self.allele_read(index, first)?;
                    let (read_second, ann_second, drop_second) = self.allele_read(index, second)?;
                    let cov_first = if drop_first { 0 } else { cov_first };
                    let cov_second = if drop_second { 0 } else { cov_second };
                    reads.extend((0..cov_first).map(|_| read_first.shallow_copy()));
                    reads.extend((0..cov_second).map(|_| read_second.shallow_copy()));
                    if !drop_first {
                        id_bases.push(read_first);
                    }
                    if !drop_second {
                        id_bases.push(read_second);
                    }
                    (
                        IndividualEvent::Heterozygous,
                        AlleleAssignment {
                            coverage: (cov_first, cov_second),
                            alleles: (AssignedAllele::Allele(first), AssignedAllele::Allele(second)),
                            annotations: (ann_first, ann_second),
                            id_reads: 0,
                        },
                    )
                }
                EventType::Mutation => {
                    let model = self.model_mut()?;
                    let allele = if config.single_end {
                        model.get_random_allele_p5(true, rng)
                    } else {
                        model.get_random_allele(true, rng)
                    };
                    let (read, annotations, dropout) = self.allele_read(index, allele)?;
                    let cov = if dropout { 0 } else { normal };
                    reads.extend((0..cov).map(|_| read.shallow_copy()));
                    if !dropout {
                        id_bases.push(read);
                    }
                    (
                        IndividualEvent::Homozygous,
                        AlleleAssignment {
                            coverage: (cov, 0),
                            alleles: (AssignedAllele::Allele(allele), AssignedAllele::None),
                            annotations: (annotations, Vec::new()),
                            id_reads: 0,
                        },
                    )
                }
            };

            let mut assignment = assignment;
            if id_coverage > 0 && individual_event != IndividualEvent::Dropout && !id_bases.is_empty() {
                for _ in 0..id_coverage {
                    let mate = if rng.gen::<f64>() < P5_ID_PROBABILITY {
                        Mate::P5
                    } else {
                        Mate::P7
                    };
                    let mut read = match id_bases.choose(rng) {
                        Some(base) => base.shallow_copy(),
                        None => break,
                    };
                    let length = read.protoread(mate).genomic_target_length();
                    let seq = random_seq(length, config.gc_content, &excluded_motifs, rng)?;
                    read.make_incomplete_digestion(mate, seq);
                    reads.push(read);
                    assignment.id_reads += 1;
                }
            }

            self.summary.normal_reads += assignment.coverage.0 + assignment.coverage.1;
            self.summary.id_reads += assignment.id_reads;
            *self.summary.events.entry(individual_event.to_string()).or_insert(0) += 1;
            self.assigned_types.insert(name.clone(), individual_event);
            self.assigned_alleles.insert(name, assignment);
        }

        for read in reads.iter_mut() {
            read.finalize_dbr(rng);
        }

        let mut copies = Vec::new();
        if config.prob_pcr_copy > 0.0 {
            for read in reads.iter() {
                if rng.gen::<f64>() < config.prob_pcr_copy {
                    let nr_copies = rng.gen_range(1..=config.max_pcr_copy_nr.max(1));
                    copies.extend((0..nr_copies).map(|_| read.pcr_copy()));
                }
            }
        }
        self.summary.pcr_copies = copies.len();
        reads.extend(copies);

        for read in reads.iter_mut() {
            self.summary.seq_errors += read.add_seq_errors(config.prob_seq_error, rng);
        }

        self.summary.nr_alleles = self.model.as_ref().map_or(0, |m| m.nr_alleles());
        self.reads = reads;
        self.state = LocusState::EventsSimulated;
        debug!(
            "{}: {} reads, {} PCR copies, {} incomplete digestion reads",
            self.name, self.summary.normal_reads, self.summary.pcr_copies, self.summary.id_reads
        );
        Ok(())
    }

    /// Number of allele copies at the locus. Every individual that is not
    /// dropped out carries two.
    pub fn get_total_alleles(&self) -> usize {
        self.assigned_alleles
            .values()
            .map(|a| match a.alleles {
                (AssignedAllele::Dropout, _) => 0,
                _ => 2,
            })
            .sum()
    }

    fn allele_name(&self, allele: usize) -> String {
        match &self.model {
            Some(model) => model.allele(allele).name(),
            None => format!("allele {}", allele),
        }
    }

    /// Relative frequency of every allele among all allele copies and among all
    /// normal reads. Computed from the simulated assignments on the first call
    /// and cached; fails before the individual events are simulated.
    pub fn get_allele_frequency(&self) -> Result<&AlleleFrequency> {
        if let Some(frequency) = self.allele_frequency.get() {
            return Ok(frequency);
        }
        self.require(LocusState::EventsSimulated, "compute allele frequencies")?;
        Ok(self.allele_frequency.get_or_init(|| self.compute_allele_frequency()))
    }

    fn compute_allele_frequency(&self) -> AlleleFrequency {
        let mut copies: BTreeMap<String, usize> = BTreeMap::new();
        let mut coverages: BTreeMap<String, usize> = BTreeMap::new();
        for assignment in self.assigned_alleles.values() {
            match assignment.alleles {
                (AssignedAllele::Allele(first), AssignedAllele::None) => {
                    let name = self.allele_name(first);
                    *copies.entry(name.clone()).or_insert(0) += 2;
                    *coverages.entry(name).or_insert(0) += assignment.coverage.0;
                }
                (AssignedAllele::Allele(first), AssignedAllele::Allele(second)) => {
                    let name_first = self.allele_name(first);
                    let name_second = self.allele_name(second);
                    *copies.entry(name_first.clone()).or_insert(0) += 1;
                    *copies.entry(name_second.clone()).or_insert(0) += 1;
                    *coverages.entry(name_first).or_insert(0) += assignment.coverage.0;
                    *coverages.entry(name_second).or_insert(0) += assignment.coverage.1;
                }
                _ => {}
            }
        }
        let total_copies: usize = copies.values().sum();
        let total_coverage: usize = coverages.values().sum();
        let normalize = |counts: BTreeMap<String, usize>, total: usize| {
            counts
                .into_iter()
                .map(|(k, v)| (k, if total > 0 { v as f64 / total as f64 } else { 0.0 }))
                .collect::<BTreeMap<String, f64>>()
        };
        AlleleFrequency {
            allele_frequencies: normalize(copies, total_copies),
            coverage_frequencies: normalize(coverages, total_coverage),
        }
    }

    /// FASTQ records of all reads of this locus.
    pub fn fastq_entries<Q: QualityModel, R: Rng>(
        &self,
        quality: &Q,
        multiple_p7_bcs: bool,
        rng: &mut R,
    ) -> Result<Vec<(FastqEntry, FastqEntry)>> {
        self.require(LocusState::EventsSimulated, "write reads")?;
        let p7_barcodes = self
            .individuals
            .iter()
            .map(|ind| (ind.name.as_str(), ind.p7_barcode.as_slice()))
            .collect::<FxHashMap<&str, &[u8]>>();
        Ok(self
            .reads
            .iter()
            .enumerate()
            .map(|(i, read)| {
                let p5_qual = quality.generate_qualities(Mate::P5, read.p5.total_length(), rng);
                let p7_qual = quality.generate_qualities(Mate::P7, read.p7.total_length(), rng);
                let barcode = if multiple_p7_bcs {
                    p7_barcodes.get(&*read.individual_name).copied()
                } else {
                    None
                };
                read.fastq_entries(&format!("{}_{}", self.name, i), p5_qual, p7_qual, barcode)
            })
            .collect())
    }

    /// Ground truth entry of this locus.
    pub fn yaml_entry(&self) -> Result<LocusGroundTruth> {
        self.require(LocusState::EventsSimulated, "create a ground truth entry")?;
        let model = self.model.as_ref().ok_or_else(|| Error::InvalidLocusState {
            locus: self.name.clone(),
            state: self.state.to_string(),
            operation: "create a ground truth entry".to_string(),
        })?;
        let frequency = self.get_allele_frequency()?;

        let mut individuals = BTreeMap::new();
        for (name, assignment) in self.assigned_alleles.iter() {
            let mut entries: BTreeMap<String, IndividualAlleleEntry> = BTreeMap::new();
            let slots = [
                (assignment.alleles.0, assignment.coverage.0, &assignment.annotations.0),
                (assignment.alleles.1, assignment.coverage.1, &assignment.annotations.1),
            ];
            for (allele, cov, annotations) in slots {
                let key = match allele {
                    AssignedAllele::Allele(id) => model.allele(id).name(),
                    AssignedAllele::Dropout => "dropout".to_string(),
                    AssignedAllele::None => continue,
                };
                let entry = entries.entry(key).or_insert(IndividualAlleleEntry {
                    cov: 0,
                    mutations: annotations.clone(),
                });
                entry.cov += cov;
            }
            individuals.insert(name.clone(), entries);
        }

        Ok(LocusGroundTruth {
            p5_seq: String::from_utf8_lossy(&model.template().genomic[0]).into_owned(),
            p7_seq: String::from_utf8_lossy(&model.template().genomic[1]).into_owned(),
            coverage: self.summary.normal_reads,
            allele_frequencies: frequency.allele_frequencies.clone(),
            allele_coverages: frequency.coverage_frequencies.clone(),
            id_reads: self.summary.id_reads,
            individuals,
        })
    }

    /// Drop reads, templates and the allele tree. Only the summary, the event
    /// types and the allele frequencies survive.
    pub fn burn(&mut self) {
        if self.state == LocusState::Burned {
            return;
        }
        if self.state == LocusState::EventsSimulated {
            self.allele_frequency.get_or_init(|| self.compute_allele_frequency());
        }
        self.reads = Vec::new();
        self.templates = Vec::new();
        self.fragment = Vec::new();
        self.assigned_alleles = FxHashMap::default();
        self.model = None;
        self.state = LocusState::Burned;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProbabilityMap;
    use crate::distributions::PoissonCoverage;
    use crate::individuals::generate_individuals;
    use crate::mutation::parse_annotation_list;
    use crate::quality::UniformQualities;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(events: &str, seed: u64) -> (SimulationConfig, Vec<Individual>, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut config = SimulationConfig::default();
        config.event_probabilities = ProbabilityMap::parse("events", events).unwrap();
        let individuals = generate_individuals(3, false, &config.excluded_motifs(), &mut rng).unwrap();
        (config, individuals, rng)
    }

    fn locus(config: &SimulationConfig, individuals: &[Individual], rng: &mut StdRng) -> RadLocus {
        let fragment = random_seq(2 * (config.read_length + 60), 0.5, &config.excluded_motifs(), rng).unwrap();
        RadLocus::new("locus_1", fragment, individuals, config, rng).unwrap()
    }

    #[test]
    fn common_locus() {
        let (config, individuals, mut rng) = setup("common=1.0", 71);
        let mut locus = locus(&config, &individuals, &mut rng);
        let coverage = config.coverage_generator().unwrap();
        locus.simulate_individual_events(&config, &coverage, &mut rng).unwrap();
        for ind in individuals.iter() {
            assert_eq!(locus.classify_type(&ind.name), Some(IndividualEvent::Common));
        }
        assert_eq!(locus.get_total_alleles(), 2 * individuals.len());
        let frequency = locus.get_allele_frequency().unwrap();
        assert_eq!(frequency.allele_frequencies.get("common"), Some(&1.0));
        assert!(locus.reads().iter().all(|r| r.is_length_consistent()));
    }

    #[test]
    fn forced_dropout() {
        let (config, individuals, mut rng) = setup("dropout=1.0", 72);
        let mut locus = locus(&config, &individuals, &mut rng);
        let coverage = config.coverage_generator().unwrap();
        locus.simulate_individual_events(&config, &coverage, &mut rng).unwrap();
        assert!(locus.reads().is_empty());
        for ind in individuals.iter() {
            assert_eq!(locus.classify_type(&ind.name), Some(IndividualEvent::Dropout));
        }
        assert_eq!(locus.get_total_alleles(), 0);
    }

    #[test]
    fn mutated_reads_keep_length_and_reproduce_annotations() {
        let (mut config, individuals, mut rng) = setup("mutation=1.0", 73);
        config.diversity = 6.0;
        config.prob_seq_error = 0.0;
        config.prob_incomplete_digestion = 0.0;
        config.mutation_type_probabilities = ProbabilityMap::parse(
            "mutation types",
            "snp=0.4,insertion=0.25,deletion=0.25,p5 na alternative=0.05,p7 na dropout=0.05",
        )
        .unwrap();
        let coverage = PoissonCoverage::new(20, 2, Some(40));
        for _ in 0..20 {
            let mut locus = locus(&config, &individuals, &mut rng);
            locus.simulate_individual_events(&config, &coverage, &mut rng).unwrap();
            for read in locus.reads() {
                assert!(read.is_length_consistent());
                assert_eq!(read.p5.total_length(), config.read_length);
                assert_eq!(read.p7.total_length(), config.read_length);
                if let Some(text) = read
                    .meta_info
                    .iter()
                    .find_map(|m| m.strip_prefix("mutations:'").and_then(|x| x.strip_suffix('\'')))
                {
                    assert!(!parse_annotation_list(text).unwrap().is_empty());
                }
            }
            for assignment in locus.assigned_alleles().values() {
                if let (AssignedAllele::Allele(a), AssignedAllele::Allele(b)) = assignment.alleles {
                    let model = locus.model().unwrap();
                    assert_ne!(a, b);
                    if !model.allele(a).is_dropout() && !model.allele(b).is_dropout() {
                        assert!(assignment.coverage.0 + assignment.coverage.1 >= 2);
                    }
                }
            }
        }
    }

    #[test]
    fn heterozygous_coverage_is_conserved() {
        let (mut config, individuals, mut rng) = setup("mutation=1.0", 74);
        config.prob_heterozygocity = 1.0;
        config.prob_incomplete_digestion = 0.0;
        config.prob_pcr_copy = 0.0;
        config.mutation_type_probabilities = ProbabilityMap::parse("mutation types", "snp=1.0").unwrap();
        let coverage = UniformCoverageFixed(25);
        let mut locus = locus(&config, &individuals, &mut rng);
        locus.simulate_individual_events(&config, &coverage, &mut rng).unwrap();
        for assignment in locus.assigned_alleles().values() {
            assert_eq!(assignment.coverage.0 + assignment.coverage.1, 25);
        }
        assert_eq!(locus.reads().len(), 25 * individuals.len());
    }

    struct UniformCoverageFixed(usize);

    impl CoverageGenerator for UniformCoverageFixed {
        fn mean(&self) -> f64 {
            self.0 as f64
        }

        fn variance(&self) -> f64 {
            0.0
        }

        fn get<R: Rng>(&self, _rng: &mut R) -> usize {
            self.0
        }
    }

    #[test]
    fn pcr_copies_are_tagged() {
        let (mut config, individuals, mut rng) = setup("common=1.0", 75);
        config.prob_pcr_copy = 1.0;
        config.max_pcr_copy_nr = 3;
        config.prob_incomplete_digestion = 0.0;
        let mut locus = locus(&config, &individuals, &mut rng);
        locus
            .simulate_individual_events(&config, &UniformCoverageFixed(10), &mut rng)
            .unwrap();
        let originals = locus.reads().iter().filter(|r| !r.is_pcr_copy()).count();
        let copies = locus.reads().iter().filter(|r| r.is_pcr_copy()).count();
        assert_eq!(originals, 30);
        assert!(copies >= originals && copies <= 3 * originals);
        assert_eq!(locus.summary().pcr_copies, copies);
    }

    #[test]
    fn every_read_gets_its_own_pcr_copies() {
        let (mut config, individuals, mut rng) = setup("common=1.0", 80);
        config.prob_pcr_copy = 1.0;
        config.max_pcr_copy_nr = 3;
        config.prob_incomplete_digestion = 0.0;
        config.prob_seq_error = 0.0;
        // a long random DBR tells the originals apart
        config.dbr = b"NNNNNNNNNNNNNNNNNN".to_vec();
        let mut locus = locus(&config, &individuals, &mut rng);
        locus
            .simulate_individual_events(&config, &UniformCoverageFixed(10), &mut rng)
            .unwrap();

        let key = |r: &RadRead| (r.p5.joined(), r.p7.joined());
        let mut copies_per_read: FxHashMap<(Vec<u8>, Vec<u8>), usize> = FxHashMap::default();
        for read in locus.reads().iter().filter(|r| !r.is_pcr_copy()) {
            assert!(copies_per_read.insert(key(read), 0).is_none());
        }
        assert_eq!(copies_per_read.len(), 30);
        for copy in locus.reads().iter().filter(|r| r.is_pcr_copy()) {
            *copies_per_read.get_mut(&key(copy)).unwrap() += 1;
        }
        for count in copies_per_read.values() {
            assert!((1..=3).contains(count), "{} copies", count);
        }
    }

    #[test]
    fn incomplete_digestion_reads_are_counted() {
        let (mut config, individuals, mut rng) = setup("common=1.0", 76);
        config.prob_incomplete_digestion = 1.0;
        config.rate_incomplete_digestion = 0.5;
        config.prob_pcr_copy = 0.0;
        let mut locus = locus(&config, &individuals, &mut rng);
        locus
            .simulate_individual_events(&config, &UniformCoverageFixed(40), &mut rng)
            .unwrap();
        let id_reads = locus
            .reads()
            .iter()
            .filter(|r| r.meta_info.iter().any(|m| m.starts_with("type:'incomplete digestion'")))
            .count();
        assert!(id_reads > 0);
        assert_eq!(id_reads, locus.summary().id_reads);
        assert_eq!(locus.reads().len(), 40 * individuals.len());
    }

    #[test]
    fn allele_frequency_is_cached() {
        let (config, individuals, mut rng) = setup("common=0.5,mutation=0.5", 77);
        let mut locus = locus(&config, &individuals, &mut rng);
        let coverage = config.coverage_generator().unwrap();
        locus.simulate_individual_events(&config, &coverage, &mut rng).unwrap();
        let first = locus.get_allele_frequency().unwrap() as *const AlleleFrequency;
        let second = locus.get_allele_frequency().unwrap() as *const AlleleFrequency;
        assert_eq!(first, second);
        let sum: f64 = locus.get_allele_frequency().unwrap().allele_frequencies.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn allele_frequency_waits_for_simulated_events() {
        let (config, individuals, mut rng) = setup("common=1.0", 70);
        let mut locus = locus(&config, &individuals, &mut rng);
        assert!(matches!(
            locus.get_allele_frequency(),
            Err(Error::InvalidLocusState { .. })
        ));
        let coverage = config.coverage_generator().unwrap();
        locus.simulate_individual_events(&config, &coverage, &mut rng).unwrap();
        assert!(!locus.reads().is_empty());
        let truth = locus.yaml_entry().unwrap();
        assert_eq!(truth.allele_frequencies.get("common"), Some(&1.0));
        assert_eq!(truth.allele_coverages.get("common"), Some(&1.0));
    }

    #[test]
    fn lifecycle_is_enforced() {
        let (config, individuals, mut rng) = setup("common=1.0", 78);
        let mut locus = locus(&config, &individuals, &mut rng);
        assert!(locus.yaml_entry().is_err());
        let coverage = config.coverage_generator().unwrap();
        locus.simulate_individual_events(&config, &coverage, &mut rng).unwrap();
        assert!(matches!(
            locus.simulate_individual_events(&config, &coverage, &mut rng),
            Err(Error::InvalidLocusState { .. })
        ));
        let quality = UniformQualities::new(20, 40);
        let entries = locus.fastq_entries(&quality, false, &mut rng).unwrap();
        assert_eq!(entries.len(), locus.reads().len());
        let truth = locus.yaml_entry().unwrap();
        assert_eq!(truth.individuals.len(), individuals.len());
        assert_eq!(truth.p5_seq.len(), locus.model().unwrap().template().genomic[0].len());
        locus.burn();
        assert_eq!(locus.state(), LocusState::Burned);
        assert!(locus.reads().is_empty());
        assert!(locus.fastq_entries(&quality, false, &mut rng).is_err());
        assert_eq!(locus.get_allele_frequency().unwrap().allele_frequencies.get("common"), Some(&1.0));
    }

    #[test]
    fn short_fragment_is_rejected() {
        let (config, individuals, mut rng) = setup("common=1.0", 79);
        let res = RadLocus::new("short", vec![b'A'; 150], &individuals, &config, &mut rng);
        assert!(matches!(res, Err(Error::FragmentTooShort { .. })));
    }
}
