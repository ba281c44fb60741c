extern crate ddrage;
#[macro_use]
extern crate log;

use std::process;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use ddrage::config::{CoverageModel, ProbabilityMap, SimulationConfig};
use ddrage::error::Result;
use ddrage::fragments::FragmentSource;
use ddrage::individuals::generate_individuals;
use ddrage::output::FileSink;
use ddrage::quality::UniformQualities;
use ddrage::simulation::run_simulation;

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Simulate a ddRAD dataset with ground truth
    Simulate {
        /// prefix of the output files
        #[clap(long, default_value = "ddrage")]
        output: String,

        #[clap(long, default_value_t = 3)]
        nr_individuals: usize,

        #[clap(long, default_value_t = 3)]
        nr_loci: usize,

        #[clap(long, default_value_t = 100)]
        read_length: usize,

        /// target coverage of a normal locus
        #[clap(long, default_value_t = 30)]
        coverage: usize,

        /// poisson or betabinomial
        #[clap(long, default_value = "betabinomial")]
        coverage_model: String,

        #[clap(long, default_value_t = 6.0)]
        bbd_alpha: f64,

        #[clap(long, default_value_t = 2.0)]
        bbd_beta: f64,

        #[clap(long, default_value_t = 1000)]
        hrl_max_coverage: usize,

        #[clap(long, default_value_t = 0)]
        nr_hrl_loci: usize,

        #[clap(long, default_value_t = 0)]
        nr_singletons: usize,

        /// mean number of alleles per locus besides the common one
        #[clap(long, default_value_t = 1.0)]
        diversity: f64,

        #[clap(long, default_value_t = 0.5)]
        gc_content: f64,

        #[clap(long, default_value_t = 0.01)]
        prob_seq_error: f64,

        #[clap(long, default_value_t = 0.5)]
        prob_heterozygocity: f64,

        #[clap(long, default_value_t = 0.1)]
        prob_incomplete_digestion: f64,

        #[clap(long, default_value_t = 0.2)]
        rate_incomplete_digestion: f64,

        #[clap(long, default_value_t = 0.2)]
        prob_pcr_copy: f64,

        #[clap(long, default_value_t = 3)]
        max_pcr_copy_nr: usize,

        /// e.g. "common=0.9,dropout=0.05,mutation=0.05"
        #[clap(long)]
        event_probabilities: Option<String>,

        /// e.g. "snp=0.94,insertion=0.01,deletion=0.01,p5 na alternative=0.01,..."
        #[clap(long)]
        mutation_type_probabilities: Option<String>,

        #[clap(long)]
        p5_overhang: Option<String>,

        #[clap(long)]
        p7_overhang: Option<String>,

        #[clap(long)]
        dbr: Option<String>,

        #[clap(long)]
        p5_recognition_site: Option<String>,

        #[clap(long)]
        p7_recognition_site: Option<String>,

        #[clap(long, default_value_t = 20)]
        min_quality: u8,

        #[clap(long, default_value_t = 40)]
        max_quality: u8,

        /// genomic fragments to use instead of random sequence
        #[clap(long)]
        fasta: Option<String>,

        #[clap(long)]
        single_end: bool,

        #[clap(long)]
        multiple_p7_bcs: bool,

        #[clap(long)]
        seed: Option<u64>,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Cmd,
}

fn bytes(value: &Option<String>, default: &[u8]) -> Vec<u8> {
    value
        .as_ref()
        .map_or_else(|| default.to_vec(), |v| v.to_ascii_uppercase().into_bytes())
}

fn build_config(cmd: &Cmd) -> Result<(SimulationConfig, String, Option<String>)> {
    let Cmd::Simulate {
        output,
        nr_individuals,
        nr_loci,
        read_length,
        coverage,
        coverage_model,
        bbd_alpha,
        bbd_beta,
        hrl_max_coverage,
        nr_hrl_loci,
        nr_singletons,
        diversity,
        gc_content,
        prob_seq_error,
        prob_heterozygocity,
        prob_incomplete_digestion,
        rate_incomplete_digestion,
        prob_pcr_copy,
        max_pcr_copy_nr,
        event_probabilities,
        mutation_type_probabilities,
        p5_overhang,
        p7_overhang,
        dbr,
        p5_recognition_site,
        p7_recognition_site,
        min_quality,
        max_quality,
        fasta,
        single_end,
        multiple_p7_bcs,
        seed,
    } = cmd;

    let defaults = SimulationConfig::default();
    let config = SimulationConfig {
        nr_loci: *nr_loci,
        nr_individuals: *nr_individuals,
        read_length: *read_length,
        coverage: *coverage,
        coverage_model: CoverageModel::from_name(coverage_model, *bbd_alpha, *bbd_beta)?,
        hrl_max_coverage: *hrl_max_coverage,
        nr_hrl_loci: *nr_hrl_loci,
        nr_singletons: *nr_singletons,
        diversity: *diversity,
        gc_content: *gc_content,
        prob_seq_error: *prob_seq_error,
        prob_heterozygocity: *prob_heterozygocity,
        prob_incomplete_digestion: *prob_incomplete_digestion,
        rate_incomplete_digestion: *rate_incomplete_digestion,
        prob_pcr_copy: *prob_pcr_copy,
        max_pcr_copy_nr: *max_pcr_copy_nr,
        single_end: *single_end,
        multiple_p7_bcs: *multiple_p7_bcs,
        event_probabilities: match event_probabilities {
            Some(text) => ProbabilityMap::parse("event probabilities", text)?,
            None => defaults.event_probabilities.clone(),
        },
        mutation_type_probabilities: match mutation_type_probabilities {
            Some(text) => ProbabilityMap::parse("mutation type probabilities", text)?,
            None => defaults.mutation_type_probabilities.clone(),
        },
        p5_overhang: bytes(p5_overhang, &defaults.p5_overhang),
        p7_overhang: bytes(p7_overhang, &defaults.p7_overhang),
        dbr: bytes(dbr, &defaults.dbr),
        p5_recognition_site: bytes(p5_recognition_site, &defaults.p5_recognition_site),
        p7_recognition_site: bytes(p7_recognition_site, &defaults.p7_recognition_site),
        quality_range: (*min_quality, *max_quality),
        seed: *seed,
    };
    Ok((config, output.clone(), fasta.clone()))
}

fn simulate(cmd: &Cmd) -> Result<()> {
    let (config, output, fasta) = build_config(cmd)?;
    config.validate()?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let individuals = generate_individuals(
        config.nr_individuals,
        config.multiple_p7_bcs,
        &config.excluded_motifs(),
        &mut rng,
    )?;
    config.check_read_length(&individuals)?;

    // room for the reads of both mates plus spare sequence behind them
    let fragment_length = 2 * config.read_length + 200;
    let mut fragments = match &fasta {
        Some(path) => FragmentSource::from_fasta(path, 2 * config.read_length)?,
        None => FragmentSource::random(fragment_length, config.gc_content, config.excluded_motifs()),
    };

    let mut sink = FileSink::create(&output, config.single_end)?;
    let qualities = UniformQualities::new(config.quality_range.0, config.quality_range.1);
    let stats = run_simulation(&config, &mut fragments, &individuals, &mut sink, &qualities, &mut rng)?;
    info!("wrote {} read pairs to {:?}", stats.total_reads(), sink.paths());
    Ok(())
}

/// Entry point of the ddRAD simulator.
///
/// Sets up logging, parses the command line and runs the simulation. Any
/// error is logged and ends the process with a non-zero exit code.
fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::init_timed();

    let parameters = Args::parse();
    trace!("{:?}", &parameters.cmd);

    if let Err(e) = simulate(&parameters.cmd) {
        error!("{}", e);
        process::exit(1);
    }
}
