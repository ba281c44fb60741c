//! Drives a whole run: normal loci first, then singletons, then highly
//! repetitive loci.

use rand::Rng;
use rustc_hash::FxHashMap;

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::fragments::FragmentSource;
use crate::individuals::Individual;
use crate::output::ReadSink;
use crate::postprocessing::{HighlyRepetitiveLocusGenerator, SingletonGenerator};
use crate::quality::QualityModel;
use crate::rad_locus::RadLocus;
use crate::reads::{Mate, RadRead};
use crate::statistics::SimulationStatistics;

/// Number of singleton and HRL reads held in memory at once.
pub const READ_BLOCK_SIZE: usize = 10_000;

/// Writes a block of reads that do not belong to a normal locus.
struct BlockWriter<'a> {
    prefix: &'static str,
    written: usize,
    p7_barcodes: Option<FxHashMap<&'a str, &'a [u8]>>,
}

impl<'a> BlockWriter<'a> {
    fn new(prefix: &'static str, individuals: &'a [Individual], multiple_p7_bcs: bool) -> Self {
        let p7_barcodes = if multiple_p7_bcs {
            Some(
                individuals
                    .iter()
                    .map(|ind| (ind.name.as_str(), ind.p7_barcode.as_slice()))
                    .collect(),
            )
        } else {
            None
        };
        BlockWriter {
            prefix,
            written: 0,
            p7_barcodes,
        }
    }

    fn write<S: ReadSink, Q: QualityModel, R: Rng>(
        &mut self,
        reads: &[RadRead],
        sink: &mut S,
        qualities: &Q,
        rng: &mut R,
    ) -> Result<()> {
        for read in reads {
            let p5_qual = qualities.generate_qualities(Mate::P5, read.p5.total_length(), rng);
            let p7_qual = qualities.generate_qualities(Mate::P7, read.p7.total_length(), rng);
            let barcode = self
                .p7_barcodes
                .as_ref()
                .and_then(|map| map.get(&*read.individual_name).copied());
            let name = format!("{}_{}", self.prefix, self.written);
            let (p5, p7) = read.fastq_entries(&name, p5_qual, p7_qual, barcode);
            sink.write_pair(&p5, &p7)?;
            self.written += 1;
        }
        Ok(())
    }
}

/// Simulate `config.nr_loci` loci for `individuals` and write all reads and
/// the ground truth to `sink`.
///
/// Configuration errors are returned before anything is written. Stops early
/// with a warning when `fragments` runs dry.
pub fn run_simulation<S: ReadSink, Q: QualityModel, R: Rng>(
    config: &SimulationConfig,
    fragments: &mut FragmentSource,
    individuals: &[Individual],
    sink: &mut S,
    qualities: &Q,
    rng: &mut R,
) -> Result<SimulationStatistics> {
    config.validate()?;
    config.check_read_length(individuals)?;
    let coverage = config.coverage_generator()?;
    let mut stats = SimulationStatistics::new(config.nr_loci);

    for nr in 0..config.nr_loci {
        let fragment = match fragments.next_fragment(rng)? {
            Some(fragment) => fragment,
            None => {
                warn!(
                    "fragment source exhausted after {} loci, {} were requested ({} records too short)",
                    nr,
                    config.nr_loci,
                    fragments.skipped()
                );
                break;
            }
        };
        let mut locus = RadLocus::new(&fragment.name, fragment.seq, individuals, config, rng)?;
        locus.simulate_individual_events(config, &coverage, rng)?;
        for (p5, p7) in locus.fastq_entries(qualities, config.multiple_p7_bcs, rng)? {
            sink.write_pair(&p5, &p7)?;
        }
        sink.write_ground_truth(locus.name(), &locus.yaml_entry()?)?;
        stats.add_locus(&locus);
        locus.burn();
        if (nr + 1) % 1000 == 0 {
            info!("simulated {} loci", nr + 1);
        }
    }

    if config.nr_singletons > 0 {
        let mut generator = SingletonGenerator::new(config, individuals, config.nr_singletons);
        let mut writer = BlockWriter::new("singleton", individuals, config.multiple_p7_bcs);
        loop {
            let block = match generator.read_blocks(READ_BLOCK_SIZE, &mut *rng).next() {
                Some(block) => block?,
                None => break,
            };
            writer.write(&block, sink, qualities, rng)?;
            stats.singleton_reads += block.len();
        }
    }

    if config.nr_hrl_loci > 0 {
        let mut generator = HighlyRepetitiveLocusGenerator::new(config, individuals, &coverage, config.nr_hrl_loci)?;
        let mut writer = BlockWriter::new("hrl", individuals, config.multiple_p7_bcs);
        loop {
            let block = match generator.read_blocks(READ_BLOCK_SIZE, &mut *rng).next() {
                Some(block) => block?,
                None => break,
            };
            writer.write(&block, sink, qualities, rng)?;
            stats.hrl_reads += block.len();
        }
    }

    sink.finish()?;
    stats.log();
    Ok(stats)
}
