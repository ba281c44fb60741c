use rand::Rng;
use rustc_hash::FxHashSet;

use crate::distributions::MAX_RESAMPLE_TRIES;
use crate::error::{Error, Result};
use crate::sequence::random_seq;

pub const BARCODE_LENGTH: usize = 6;
pub const MAX_SPACER_LENGTH: usize = 3;

/// A sequenced individual: its barcode pair, the spacers in front of the
/// overhangs and a name. Read-only during the simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    pub p5_barcode: Vec<u8>,
    pub p7_barcode: Vec<u8>,
    pub p5_spacer: Vec<u8>,
    pub p7_spacer: Vec<u8>,
    pub name: String,
    pub population: String,
}

impl Individual {
    pub fn new(
        p5_barcode: &[u8],
        p7_barcode: &[u8],
        p5_spacer: &[u8],
        p7_spacer: &[u8],
        name: &str,
        population: &str,
    ) -> Individual {
        Individual {
            p5_barcode: p5_barcode.to_vec(),
            p7_barcode: p7_barcode.to_vec(),
            p5_spacer: p5_spacer.to_vec(),
            p7_spacer: p7_spacer.to_vec(),
            name: name.to_string(),
            population: population.to_string(),
        }
    }
}

/// Synthesize `n` individuals with distinct p5 barcodes. All individuals share
/// one p7 barcode unless `multiple_p7_bcs` is set, then the barcode pairs
/// are distinct through their p7 barcode as well.
pub fn generate_individuals<R: Rng>(
    n: usize,
    multiple_p7_bcs: bool,
    excluded_motifs: &[Vec<u8>],
    rng: &mut R,
) -> Result<Vec<Individual>> {
    if n > 4usize.pow(BARCODE_LENGTH as u32) / 2 {
        return Err(Error::InvalidParameter {
            name: "nr individuals".to_string(),
            reason: format!("cannot create {} distinct barcodes of length {}", n, BARCODE_LENGTH),
        });
    }
    let mut seen: FxHashSet<Vec<u8>> = FxHashSet::default();
    let mut draw_barcode = |rng: &mut R| -> Result<Vec<u8>> {
        for _ in 0..MAX_RESAMPLE_TRIES {
            let barcode = random_seq(BARCODE_LENGTH, 0.5, excluded_motifs, rng)?;
            if seen.insert(barcode.clone()) {
                return Ok(barcode);
            }
        }
        Err(Error::ResampleLimitExceeded {
            what: "drawing distinct barcodes".to_string(),
            tries: MAX_RESAMPLE_TRIES,
        })
    };

    let shared_p7 = draw_barcode(&mut *rng)?;
    let mut individuals = Vec::with_capacity(n);
    for i in 0..n {
        let p5_barcode = draw_barcode(&mut *rng)?;
        let p7_barcode = if multiple_p7_bcs {
            draw_barcode(&mut *rng)?
        } else {
            shared_p7.clone()
        };
        let p5_spacer_len = rng.gen_range(0..=MAX_SPACER_LENGTH);
        let p7_spacer_len = rng.gen_range(0..=MAX_SPACER_LENGTH);
        let p5_spacer = random_seq(p5_spacer_len, 0.5, excluded_motifs, rng)?;
        let p7_spacer = random_seq(p7_spacer_len, 0.5, excluded_motifs, rng)?;
        individuals.push(Individual::new(
            &p5_barcode,
            &p7_barcode,
            &p5_spacer,
            &p7_spacer,
            &format!("Individual {}", i + 1),
            "Population 1",
        ));
    }
    debug!("generated {} individuals", individuals.len());
    Ok(individuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn barcodes_are_distinct() {
        let mut rng = StdRng::seed_from_u64(41);
        let individuals = generate_individuals(96, false, &[b"GTAC".to_vec()], &mut rng).unwrap();
        assert_eq!(individuals.len(), 96);
        let p5 = individuals.iter().map(|i| i.p5_barcode.clone()).collect::<FxHashSet<_>>();
        assert_eq!(p5.len(), 96);
        assert!(individuals.iter().all(|i| i.p7_barcode == individuals[0].p7_barcode));
        assert!(individuals.iter().all(|i| i.p5_spacer.len() <= MAX_SPACER_LENGTH));
        assert_eq!(individuals[4].name, "Individual 5");
    }

    #[test]
    fn multiple_p7_barcodes() {
        let mut rng = StdRng::seed_from_u64(42);
        let individuals = generate_individuals(10, true, &[], &mut rng).unwrap();
        let p7 = individuals.iter().map(|i| i.p7_barcode.clone()).collect::<FxHashSet<_>>();
        assert_eq!(p7.len(), 10);
    }

    #[test]
    fn too_many_individuals() {
        let mut rng = StdRng::seed_from_u64(43);
        assert!(generate_individuals(10_000, false, &[], &mut rng).is_err());
    }
}
