//! Random generators used by the locus simulation: coverage models, indel
//! lengths, categorical event draws and binomial coverage splits.

use std::fmt;

use rand::Rng;
use rand_distr::{Binomial, Distribution, Poisson, WeightedAliasIndex};
use rustc_hash::FxHashSet;
use statrs::function::beta::ln_beta;
use statrs::function::factorial::ln_binomial;
use weighted_rand::builder::{NewBuilder, WalkerTableBuilder};
use weighted_rand::table::WalkerTable;

use crate::config::{Label, ProbabilityMap};
use crate::error::{Error, Result};

/// Cap for every rejection sampling loop in the crate.
pub const MAX_RESAMPLE_TRIES: usize = 10_000;

/// Above this diversity the zero truncated Poisson is drawn by rejection,
/// P(0) is below 1e-13 there.
const ZTPD_INVERSION_LIMIT: f64 = 30.0;

/// Alias table over exact `f64` weights. Weights need not be normalized.
#[derive(Debug, Clone)]
pub struct CategoricalTable {
    table: WeightedAliasIndex<f64>,
}

impl CategoricalTable {
    pub fn new(name: &str, weights: Vec<f64>) -> Result<CategoricalTable> {
        let table = WeightedAliasIndex::new(weights).map_err(|e| Error::InvalidParameter {
            name: name.to_string(),
            reason: format!("cannot build a sampling table: {}", e),
        })?;
        Ok(CategoricalTable { table })
    }

    /// Index of the drawn weight.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> usize {
        self.table.sample(rng)
    }
}

/// Smallest coverage the beta-binomial model hands out.
pub const MIN_BBD_COVERAGE: usize = 2;

pub trait CoverageGenerator {
    fn mean(&self) -> f64;

    fn variance(&self) -> f64;

    fn get<R: Rng>(&self, rng: &mut R) -> usize;

    fn get_multiple<R: Rng>(&self, n: usize, rng: &mut R) -> Vec<usize> {
        (0..n).map(|_| self.get(rng)).collect()
    }
}

/// Beta-binomial coverage with a precomputed pmf over `0..=n`.
pub struct BetaBinomialCoverage {
    ds: usize,
    alpha: f64,
    beta: f64,
    n: usize,
    pmf: Vec<f64>,
    table: CategoricalTable,
}

impl BetaBinomialCoverage {
    /// `n` is chosen so that the mean coverage equals `ds`.
    pub fn new(ds: usize, alpha: f64, beta: f64) -> Result<BetaBinomialCoverage> {
        if !(alpha > 0.0) || !(beta > 0.0) {
            return Err(Error::InvalidParameter {
                name: "beta-binomial alpha/beta".to_string(),
                reason: format!("both must be > 0, got alpha={} beta={}", alpha, beta),
            });
        }
        let n = (ds as f64 * (alpha + beta) / alpha).floor() as usize;
        if n > 5 * ds {
            return Err(Error::DegenerateBetaBinomial { n, ds });
        }
        let norm = ln_beta(alpha, beta);
        let pmf = (0..=n)
            .map(|k| {
                (ln_binomial(n as u64, k as u64) + ln_beta(k as f64 + alpha, (n - k) as f64 + beta) - norm).exp()
            })
            .collect::<Vec<f64>>();
        let table = CategoricalTable::new("beta-binomial coverage", pmf.clone())?;
        Ok(BetaBinomialCoverage {
            ds,
            alpha,
            beta,
            n,
            pmf,
            table,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn pmf(&self) -> &[f64] {
        &self.pmf
    }
}

impl fmt::Debug for BetaBinomialCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BetaBinomialCoverage")
            .field("ds", &self.ds)
            .field("alpha", &self.alpha)
            .field("beta", &self.beta)
            .field("n", &self.n)
            .finish()
    }
}

impl CoverageGenerator for BetaBinomialCoverage {
    fn mean(&self) -> f64 {
        self.n as f64 * self.alpha / (self.alpha + self.beta)
    }

    fn variance(&self) -> f64 {
        let (a, b, n) = (self.alpha, self.beta, self.n as f64);
        n * a * b * (a + b + n) / ((a + b).powi(2) * (a + b + 1.0))
    }

    fn get<R: Rng>(&self, rng: &mut R) -> usize {
        self.table.draw(rng).max(MIN_BBD_COVERAGE)
    }
}

/// Poisson draw re-centred on the target depth.
#[derive(Debug, Clone)]
pub struct PoissonCoverage {
    target_depth: usize,
    lambda: f64,
    min_cov: usize,
    max_cov: Option<usize>,
    distribution: Poisson<f64>,
}

impl PoissonCoverage {
    pub fn new(target_depth: usize, min_cov: usize, max_cov: Option<usize>) -> PoissonCoverage {
        let t = target_depth as f64;
        // low depths get a narrower distribution so fewer draws hit min_cov
        let lambda = if t <= 10.0 {
            (2.0 + (t - 2.0) * t / 10.0).max(1.0)
        } else {
            t
        };
        let distribution = Poisson::new(lambda).expect("lambda is at least 1");
        PoissonCoverage {
            target_depth,
            lambda,
            min_cov,
            max_cov,
            distribution,
        }
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl CoverageGenerator for PoissonCoverage {
    fn mean(&self) -> f64 {
        self.target_depth as f64
    }

    fn variance(&self) -> f64 {
        self.lambda
    }

    fn get<R: Rng>(&self, rng: &mut R) -> usize {
        let draw = self.distribution.sample(rng) as i64;
        let centred = self.target_depth as i64 + (draw - self.lambda.round() as i64);
        let mut cov = centred.max(self.min_cov as i64) as usize;
        if let Some(max_cov) = self.max_cov {
            cov = cov.min(max_cov);
        }
        cov
    }
}

/// Uniform integer coverage in `[min_cov, max_cov)`.
#[derive(Debug, Clone)]
pub struct UniformCoverage {
    min_cov: usize,
    max_cov: usize,
}

impl UniformCoverage {
    pub fn new(min_cov: usize, max_cov: usize) -> Result<UniformCoverage> {
        if min_cov >= max_cov {
            return Err(Error::InvalidParameter {
                name: "uniform coverage".to_string(),
                reason: format!("min {} must be smaller than max {}", min_cov, max_cov),
            });
        }
        Ok(UniformCoverage { min_cov, max_cov })
    }

    /// Coverage far above what `donor` produces: starts at mean + 2 sd, capped at `cap`.
    pub fn from_coverage_generator<G: CoverageGenerator>(donor: &G, cap: usize) -> Result<UniformCoverage> {
        let min_cov = (donor.mean() + 2.0 * donor.variance().sqrt()).ceil() as usize;
        if cap <= min_cov {
            return Err(Error::InvalidParameter {
                name: "hrl max coverage".to_string(),
                reason: format!("must exceed mean + 2 sd of the normal coverage ({})", min_cov),
            });
        }
        UniformCoverage::new(min_cov, cap)
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.min_cov, self.max_cov)
    }
}

impl CoverageGenerator for UniformCoverage {
    fn mean(&self) -> f64 {
        (self.min_cov + self.max_cov - 1) as f64 / 2.0
    }

    fn variance(&self) -> f64 {
        let width = (self.max_cov - self.min_cov) as f64;
        (width * width - 1.0) / 12.0
    }

    fn get<R: Rng>(&self, rng: &mut R) -> usize {
        rng.gen_range(self.min_cov..self.max_cov)
    }
}

/// The coverage models selectable for normal loci.
#[derive(Debug)]
pub enum Coverage {
    BetaBinomial(BetaBinomialCoverage),
    Poisson(PoissonCoverage),
    Uniform(UniformCoverage),
}

impl CoverageGenerator for Coverage {
    fn mean(&self) -> f64 {
        match self {
            Coverage::BetaBinomial(c) => c.mean(),
            Coverage::Poisson(c) => c.mean(),
            Coverage::Uniform(c) => c.mean(),
        }
    }

    fn variance(&self) -> f64 {
        match self {
            Coverage::BetaBinomial(c) => c.variance(),
            Coverage::Poisson(c) => c.variance(),
            Coverage::Uniform(c) => c.variance(),
        }
    }

    fn get<R: Rng>(&self, rng: &mut R) -> usize {
        match self {
            Coverage::BetaBinomial(c) => c.get(rng),
            Coverage::Poisson(c) => c.get(rng),
            Coverage::Uniform(c) => c.get(rng),
        }
    }
}

// Indel length counts, index i holds the count for length i + 1.
// Coding regions are enriched for frame-preserving lengths.
const CODING_INSERTION_COUNTS: [u32; 21] = [
    40, 15, 120, 10, 8, 60, 4, 3, 30, 2, 2, 15, 1, 1, 8, 1, 1, 5, 0, 0, 3,
];
const CODING_DELETION_COUNTS: [u32; 21] = [
    45, 18, 130, 12, 9, 55, 5, 4, 28, 3, 2, 14, 1, 1, 7, 1, 1, 4, 0, 0, 2,
];
const NONCODING_INSERTION_COUNTS: [u32; 20] = [
    2410, 640, 290, 260, 110, 90, 50, 45, 30, 25, 15, 14, 10, 9, 7, 6, 5, 4, 3, 3,
];
const NONCODING_DELETION_COUNTS: [u32; 20] = [
    2750, 780, 340, 300, 140, 110, 65, 55, 38, 30, 20, 18, 13, 11, 9, 8, 6, 5, 4, 4,
];

struct LengthHistogram {
    total: u32,
    longest: usize,
    table: WalkerTable,
}

impl LengthHistogram {
    fn new(counts: &[u32]) -> LengthHistogram {
        let longest = counts.iter().rposition(|c| *c > 0).map_or(0, |i| i + 1);
        LengthHistogram {
            total: counts.iter().sum(),
            longest,
            table: WalkerTableBuilder::new(counts).build(),
        }
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> usize {
        self.table.next_rng(rng) + 1
    }
}

/// Samples insertion and deletion lengths from fixed empirical histograms.
pub struct IndelLengthGenerator {
    coding_insertions: LengthHistogram,
    noncoding_insertions: LengthHistogram,
    coding_deletions: LengthHistogram,
    noncoding_deletions: LengthHistogram,
}

impl IndelLengthGenerator {
    pub fn new() -> IndelLengthGenerator {
        IndelLengthGenerator {
            coding_insertions: LengthHistogram::new(&CODING_INSERTION_COUNTS),
            noncoding_insertions: LengthHistogram::new(&NONCODING_INSERTION_COUNTS),
            coding_deletions: LengthHistogram::new(&CODING_DELETION_COUNTS),
            noncoding_deletions: LengthHistogram::new(&NONCODING_DELETION_COUNTS),
        }
    }

    fn draw<R: Rng>(coding: &LengthHistogram, noncoding: &LengthHistogram, rng: &mut R) -> usize {
        let p_coding = coding.total as f64 / (coding.total + noncoding.total) as f64;
        if rng.gen::<f64>() < p_coding {
            coding.draw(rng)
        } else {
            noncoding.draw(rng)
        }
    }

    pub fn get_insert_length<R: Rng>(&self, rng: &mut R) -> usize {
        IndelLengthGenerator::draw(&self.coding_insertions, &self.noncoding_insertions, rng)
    }

    pub fn get_deletion_length<R: Rng>(&self, rng: &mut R) -> usize {
        IndelLengthGenerator::draw(&self.coding_deletions, &self.noncoding_deletions, rng)
    }

    pub fn longest_possible_deletion(&self) -> usize {
        self.coding_deletions.longest.max(self.noncoding_deletions.longest)
    }
}

impl Default for IndelLengthGenerator {
    fn default() -> Self {
        IndelLengthGenerator::new()
    }
}

impl fmt::Debug for IndelLengthGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndelLengthGenerator")
            .field("longest_possible_deletion", &self.longest_possible_deletion())
            .finish()
    }
}

/// Draw `n` independent labels.
pub fn distributed_events<K: Label, R: Rng>(n: usize, probabilities: &ProbabilityMap<K>, rng: &mut R) -> Vec<K> {
    (0..n).map(|_| probabilities.draw(rng)).collect()
}

/// Draw a label that is not in `prohibited`, resampling on rejection.
pub fn distributed_mutation_type<K: Label, R: Rng>(
    probabilities: &ProbabilityMap<K>,
    prohibited: &FxHashSet<K>,
    rng: &mut R,
) -> Result<K> {
    let allowed_mass: f64 = probabilities
        .entries()
        .iter()
        .filter(|(k, _)| !prohibited.contains(k))
        .map(|(_, p)| *p)
        .sum();
    if allowed_mass <= 0.0 {
        let mut names = prohibited.iter().map(|k| k.label()).collect::<Vec<&str>>();
        names.sort_unstable();
        return Err(Error::NoMutationTypeAvailable(names.join(", ")));
    }
    if allowed_mass < 0.01 {
        warn!(
            "only {:.4} of the {} mass is allowed, drawing a type may take many tries",
            allowed_mass,
            probabilities.name()
        );
    }
    for _ in 0..MAX_RESAMPLE_TRIES {
        let drawn = probabilities.draw(rng);
        if !prohibited.contains(&drawn) {
            return Ok(drawn);
        }
    }
    Err(Error::ResampleLimitExceeded {
        what: format!("drawing from {}", probabilities.name()),
        tries: MAX_RESAMPLE_TRIES,
    })
}

fn binomial<R: Rng>(n: usize, p: f64, rng: &mut R) -> usize {
    if n == 0 || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    // p is within (0, 1) here, so construction cannot fail
    Binomial::new(n as u64, p).map_or(0, |d| d.sample(rng) as usize)
}

/// Split `coverage` into (normal, incomplete digestion) reads.
pub fn incomplete_digestion_coverage<R: Rng>(coverage: usize, rate: f64, rng: &mut R) -> (usize, usize) {
    let id = binomial(coverage, rate, rng);
    (coverage - id, id)
}

/// Split the coverage of a heterozygous individual between both alleles.
pub fn heterozygous_mutation_distribution<R: Rng>(coverage: usize, rng: &mut R) -> (usize, usize) {
    let first = binomial(coverage, 0.5, rng);
    (first, coverage - first)
}

/// Zero truncated Poisson draw.
///
/// Inverts the Poisson CDF from k = 1 with `u` uniform in (P(0), 1), so even
/// tiny diversities draw in one pass.
pub fn ztpd<R: Rng>(lambda: f64, rng: &mut R) -> Result<usize> {
    if !(lambda > 0.0) || !lambda.is_finite() {
        return Err(Error::NonPositiveDiversity(lambda));
    }
    if lambda > ZTPD_INVERSION_LIMIT {
        let poisson = Poisson::new(lambda).map_err(|_| Error::NonPositiveDiversity(lambda))?;
        loop {
            let draw = poisson.sample(rng) as usize;
            if draw > 0 {
                return Ok(draw);
            }
        }
    }
    let p0 = (-lambda).exp();
    let u = p0 + (1.0 - p0) * rng.gen::<f64>();
    let (mut k, mut p, mut cdf) = (0usize, p0, p0);
    loop {
        k += 1;
        p *= lambda / k as f64;
        cdf += p;
        // past the mode the remaining mass can drop below rounding error
        if cdf >= u || (k as f64 > lambda && p <= f64::EPSILON * cdf) {
            return Ok(k);
        }
    }
}
