//! Reads without a shared allele tree: singletons and highly repetitive loci.
//! Both are produced in blocks so that only one block is held in memory
//! while it is written.

use std::rc::Rc;

use rand::Rng;

use crate::config::SimulationConfig;
use crate::distributions::{CoverageGenerator, UniformCoverage};
use crate::error::Result;
use crate::individuals::Individual;
use crate::reads::{AuxSegments, Mate, ProtoRead, RadRead};
use crate::sequence::{random_seq, reverse_complement};

pub const SINGLETON_MARKER: &str = "type:'singleton'";
pub const HRL_MARKER: &str = "type:'HRL'";

/// Singletons are duplicated at a tenth of the normal PCR copy rate.
pub const SINGLETON_PCR_RATE_FACTOR: f64 = 0.1;

/// Unmutated read of `individual` on `fragment`, without spare sequence.
fn plain_read(individual: &Individual, config: &SimulationConfig, fragment: &[u8], rev: &[u8]) -> RadRead {
    let (p5_aux, p7_aux) = config.aux_lengths(individual);
    let p5 = ProtoRead::new(
        Mate::P5,
        config.read_length,
        AuxSegments::new(&individual.p5_barcode, &individual.p5_spacer, b"", &config.p5_overhang),
        fragment[..config.read_length - p5_aux].to_vec(),
        Vec::new(),
        Rc::new(Vec::new()),
    );
    let p7 = ProtoRead::new(
        Mate::P7,
        config.read_length,
        AuxSegments::new(b"", &individual.p7_spacer, &config.dbr, &config.p7_overhang),
        rev[..config.read_length - p7_aux].to_vec(),
        Vec::new(),
        Rc::new(Vec::new()),
    );
    RadRead::new(p5, p7, Rc::from(individual.name.as_str()))
}

/// Finalize the DBR, add PCR copies and sequencing errors.
fn finish_reads<R: Rng>(read: RadRead, prob_pcr_copy: f64, config: &SimulationConfig, rng: &mut R) -> Vec<RadRead> {
    let mut read = read;
    read.finalize_dbr(rng);
    let mut reads = vec![read];
    if rng.gen::<f64>() < prob_pcr_copy {
        let nr_copies = rng.gen_range(1..=config.max_pcr_copy_nr.max(1));
        let copy = reads[0].pcr_copy();
        reads.extend((0..nr_copies).map(|_| copy.shallow_copy()));
    }
    for read in reads.iter_mut() {
        read.add_seq_errors(config.prob_seq_error, rng);
    }
    reads
}

/// Anything that hands out groups of reads until it runs dry.
pub trait ReadProducer {
    /// The next group of reads, `None` when exhausted.
    fn produce<R: Rng>(&mut self, rng: &mut R) -> Option<Result<Vec<RadRead>>>;
}

/// Iterator over blocks of at least `blocksize` reads. Groups are never split,
/// so a block may exceed `blocksize` by the PCR copies of its last read. The
/// final block may be smaller.
pub struct ReadBlocks<'g, P: ReadProducer, R: Rng> {
    producer: &'g mut P,
    rng: &'g mut R,
    blocksize: usize,
}

impl<'g, P: ReadProducer, R: Rng> Iterator for ReadBlocks<'g, P, R> {
    type Item = Result<Vec<RadRead>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut block = Vec::with_capacity(self.blocksize);
        while block.len() < self.blocksize.max(1) {
            match self.producer.produce(&mut *self.rng) {
                Some(Ok(reads)) => block.extend(reads),
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }
        if block.is_empty() {
            None
        } else {
            Some(Ok(block))
        }
    }
}

/// Reads of one random individual on a fresh random fragment each, modelling
/// contamination.
pub struct SingletonGenerator<'a> {
    config: &'a SimulationConfig,
    individuals: &'a [Individual],
    excluded_motifs: Vec<Vec<u8>>,
    remaining: usize,
}

impl<'a> SingletonGenerator<'a> {
    pub fn new(config: &'a SimulationConfig, individuals: &'a [Individual], nr_singletons: usize) -> Self {
        SingletonGenerator {
            config,
            individuals,
            excluded_motifs: config.excluded_motifs(),
            remaining: nr_singletons,
        }
    }

    pub fn read_blocks<'g, R: Rng>(&'g mut self, blocksize: usize, rng: &'g mut R) -> ReadBlocks<'g, Self, R> {
        ReadBlocks {
            producer: self,
            rng,
            blocksize,
        }
    }
}

impl<'a> ReadProducer for SingletonGenerator<'a> {
    fn produce<R: Rng>(&mut self, rng: &mut R) -> Option<Result<Vec<RadRead>>> {
        if self.remaining == 0 || self.individuals.is_empty() {
            return None;
        }
        self.remaining -= 1;
        let individual = &self.individuals[rng.gen_range(0..self.individuals.len())];
        let fragment = match random_seq(
            2 * self.config.read_length,
            self.config.gc_content,
            &self.excluded_motifs,
            rng,
        ) {
            Ok(seq) => seq,
            Err(e) => return Some(Err(e)),
        };
        let mut read = plain_read(individual, self.config, &fragment, &reverse_complement(&fragment));
        read.meta_info.push(SINGLETON_MARKER.to_string());
        let prob_pcr_copy = self.config.prob_pcr_copy * SINGLETON_PCR_RATE_FACTOR;
        Some(Ok(finish_reads(read, prob_pcr_copy, self.config, rng)))
    }
}

/// Synthetic loci that every individual covers with abnormally high coverage.
pub struct HighlyRepetitiveLocusGenerator<'a> {
    config: &'a SimulationConfig,
    individuals: &'a [Individual],
    coverage: UniformCoverage,
    excluded_motifs: Vec<Vec<u8>>,
    remaining_loci: usize,
    templates: Vec<RadRead>,
    next_individual: usize,
}

impl<'a> HighlyRepetitiveLocusGenerator<'a> {
    /// Coverage is drawn uniformly between the upper end of `normal` and
    /// `config.hrl_max_coverage`.
    pub fn new<G: CoverageGenerator>(
        config: &'a SimulationConfig,
        individuals: &'a [Individual],
        normal: &G,
        nr_loci: usize,
    ) -> Result<Self> {
        let coverage = UniformCoverage::from_coverage_generator(normal, config.hrl_max_coverage)?;
        debug!("HRL coverage within {:?}", coverage.bounds());
        Ok(HighlyRepetitiveLocusGenerator {
            config,
            individuals,
            coverage,
            excluded_motifs: config.excluded_motifs(),
            remaining_loci: nr_loci,
            templates: Vec::new(),
            next_individual: 0,
        })
    }

    pub fn read_blocks<'g, R: Rng>(&'g mut self, blocksize: usize, rng: &'g mut R) -> ReadBlocks<'g, Self, R> {
        ReadBlocks {
            producer: self,
            rng,
            blocksize,
        }
    }

    fn next_locus<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let fragment = random_seq(
            2 * self.config.read_length,
            self.config.gc_content,
            &self.excluded_motifs,
            rng,
        )?;
        let rev = reverse_complement(&fragment);
        self.templates = self
            .individuals
            .iter()
            .map(|ind| plain_read(ind, self.config, &fragment, &rev))
            .collect();
        self.next_individual = 0;
        self.remaining_loci -= 1;
        Ok(())
    }
}

impl<'a> ReadProducer for HighlyRepetitiveLocusGenerator<'a> {
    fn produce<R: Rng>(&mut self, rng: &mut R) -> Option<Result<Vec<RadRead>>> {
        if self.next_individual >= self.templates.len() {
            if self.remaining_loci == 0 || self.individuals.is_empty() {
                return None;
            }
            if let Err(e) = self.next_locus(rng) {
                return Some(Err(e));
            }
        }
        let template = &self.templates[self.next_individual];
        self.next_individual += 1;

        let cov = self.coverage.get(rng);
        let mut reads = Vec::with_capacity(cov);
        for _ in 0..cov {
            let mut read = template.shallow_copy();
            read.meta_info.push(HRL_MARKER.to_string());
            reads.extend(finish_reads(read, self.config.prob_pcr_copy, self.config, rng));
        }
        Some(Ok(reads))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individuals::generate_individuals;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(seed: u64) -> (SimulationConfig, Vec<Individual>, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = SimulationConfig::default();
        let individuals = generate_individuals(4, false, &config.excluded_motifs(), &mut rng).unwrap();
        (config, individuals, rng)
    }

    #[test]
    fn singletons_come_in_blocks() {
        let (mut config, individuals, mut rng) = setup(81);
        config.prob_pcr_copy = 0.0;
        let mut generator = SingletonGenerator::new(&config, &individuals, 25);
        let blocks = generator
            .read_blocks(10, &mut rng)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(blocks.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![10, 10, 5]);
        for read in blocks.iter().flatten() {
            assert!(read.meta_info.iter().any(|m| m == SINGLETON_MARKER));
            assert_eq!(read.p5.total_length(), config.read_length);
            assert_eq!(read.p7.total_length(), config.read_length);
            assert!(read.p7.joined().iter().all(|b| b"ACGT".contains(b)));
        }
        // exhausted
        assert!(generator.read_blocks(10, &mut rng).next().is_none());
    }

    #[test]
    fn hrl_reads_exceed_normal_coverage() {
        let (mut config, individuals, mut rng) = setup(82);
        config.prob_pcr_copy = 0.0;
        config.hrl_max_coverage = 200;
        let normal = config.coverage_generator().unwrap();
        let mut generator = HighlyRepetitiveLocusGenerator::new(&config, &individuals, &normal, 2).unwrap();
        let (low, _) = generator.coverage.bounds();
        let reads = generator
            .read_blocks(100, &mut rng)
            .collect::<Result<Vec<_>>>()
            .unwrap()
            .into_iter()
            .flatten()
            .collect::<Vec<RadRead>>();
        assert!(reads.len() >= 2 * individuals.len() * low);
        assert!(reads.iter().all(|r| r.meta_info.iter().any(|m| m == HRL_MARKER)));
        for ind in individuals.iter() {
            assert!(reads.iter().any(|r| &*r.individual_name == ind.name.as_str()));
        }
    }

    #[test]
    fn no_hrl_loci_means_no_reads() {
        let (config, individuals, mut rng) = setup(83);
        let normal = config.coverage_generator().unwrap();
        let mut generator = HighlyRepetitiveLocusGenerator::new(&config, &individuals, &normal, 0).unwrap();
        assert!(generator.read_blocks(5, &mut rng).next().is_none());
    }
}
