//! Low level sequence helpers: random DNA with GC control and motif exclusion,
//! IUPAC resolution for degenerate base regions and base substitution.

use bio::alphabets::dna;
use bio::pattern_matching::horspool::Horspool;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::distributions::{CategoricalTable, MAX_RESAMPLE_TRIES};
use crate::error::{Error, Result};

pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Per base probabilities in `BASES` order for a given GC content.
pub fn base_probabilities(gc_content: f64) -> [f64; 4] {
    let at = (1.0 - gc_content) / 2.0;
    let gc = gc_content / 2.0;
    [at, gc, gc, at]
}

fn draw_base<R: Rng>(bases: &CategoricalTable, rng: &mut R) -> u8 {
    BASES[bases.draw(rng)]
}

fn first_motif_hit(seq: &[u8], excluded_motifs: &[Vec<u8>]) -> Option<(usize, usize)> {
    excluded_motifs
        .iter()
        .filter(|m| !m.is_empty() && m.len() <= seq.len())
        .filter_map(|m| Horspool::new(m).find_all(seq).next().map(|start| (start, m.len())))
        .min()
}

/// Random sequence of `length` bases without any of the excluded motifs.
/// Offending windows are redrawn in place rather than the whole sequence.
pub fn random_seq<R: Rng>(length: usize, gc_content: f64, excluded_motifs: &[Vec<u8>], rng: &mut R) -> Result<Vec<u8>> {
    let bases = CategoricalTable::new("gc content", base_probabilities(gc_content).to_vec())?;
    let mut seq = (0..length).map(|_| draw_base(&bases, rng)).collect::<Vec<u8>>();
    for _ in 0..MAX_RESAMPLE_TRIES {
        match first_motif_hit(&seq, excluded_motifs) {
            None => return Ok(seq),
            Some((start, len)) => {
                for base in seq[start..start + len].iter_mut() {
                    *base = draw_base(&bases, rng);
                }
            }
        }
    }
    Err(Error::ResampleLimitExceeded {
        what: format!("removing restriction sites from a {} bp sequence", length),
        tries: MAX_RESAMPLE_TRIES,
    })
}

/// Concrete bases an IUPAC code may stand for.
pub fn iupac_bases(code: u8) -> &'static [u8] {
    match code.to_ascii_uppercase() {
        b'A' => b"A",
        b'C' => b"C",
        b'G' => b"G",
        b'T' | b'U' => b"T",
        b'R' => b"AG",
        b'Y' => b"CT",
        b'S' => b"CG",
        b'W' => b"AT",
        b'K' => b"GT",
        b'M' => b"AC",
        b'B' => b"CGT",
        b'D' => b"AGT",
        b'H' => b"ACT",
        b'V' => b"ACG",
        _ => b"ACGT",
    }
}

/// Replace every ambiguity code by one of the bases it stands for.
pub fn resolve_ambiguous<R: Rng>(seq: &[u8], rng: &mut R) -> Vec<u8> {
    seq.iter()
        .map(|code| *iupac_bases(*code).choose(rng).unwrap_or(&b'N'))
        .collect()
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    dna::revcomp(seq)
}

/// A base different from `old`, uniformly chosen.
pub fn substitute_base<R: Rng>(old: u8, rng: &mut R) -> u8 {
    let candidates = BASES.iter().copied().filter(|b| *b != old.to_ascii_uppercase()).collect::<Vec<u8>>();
    *candidates.choose(rng).unwrap_or(&b'N')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_seq_has_requested_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(1);
        let seq = random_seq(500, 0.5, &[], &mut rng).unwrap();
        assert_eq!(seq.len(), 500);
        assert!(seq.iter().all(|b| BASES.contains(b)));
    }

    #[test]
    fn gc_content_is_respected() {
        let mut rng = StdRng::seed_from_u64(2);
        let seq = random_seq(20_000, 0.8, &[], &mut rng).unwrap();
        let gc = seq.iter().filter(|b| **b == b'G' || **b == b'C').count() as f64 / seq.len() as f64;
        assert!((gc - 0.8).abs() < 0.02, "gc was {}", gc);
        let seq = random_seq(1000, 0.0, &[], &mut rng).unwrap();
        assert!(seq.iter().all(|b| *b == b'A' || *b == b'T'));
        assert!(matches!(
            random_seq(10, 1.5, &[], &mut rng),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn excluded_motifs_never_occur() {
        let mut rng = StdRng::seed_from_u64(3);
        let motifs = vec![b"ATGCAT".to_vec(), b"GTAC".to_vec()];
        for _ in 0..50 {
            let seq = random_seq(2000, 0.5, &motifs, &mut rng).unwrap();
            assert!(first_motif_hit(&seq, &motifs).is_none());
        }
    }

    #[test]
    fn impossible_motif_exclusion_is_capped() {
        let mut rng = StdRng::seed_from_u64(4);
        // with gc 0 every base is A or T, a motif of a single A cannot be avoided
        let res = random_seq(50, 0.0, &[b"A".to_vec(), b"T".to_vec()], &mut rng);
        assert!(matches!(res, Err(Error::ResampleLimitExceeded { .. })));
    }

    #[test]
    fn ambiguous_codes_resolve_to_allowed_bases() {
        let mut rng = StdRng::seed_from_u64(5);
        let dbr = b"NNNNNNMMGGACG";
        for _ in 0..200 {
            let resolved = resolve_ambiguous(dbr, &mut rng);
            assert_eq!(resolved.len(), dbr.len());
            assert!(resolved[6] == b'A' || resolved[6] == b'C');
            assert_eq!(&resolved[8..], b"GGACG");
            assert!(resolved.iter().all(|b| BASES.contains(b)));
        }
    }

    #[test]
    fn substitution_changes_base() {
        let mut rng = StdRng::seed_from_u64(6);
        for base in BASES.iter() {
            for _ in 0..100 {
                let new = substitute_base(*base, &mut rng);
                assert_ne!(new, *base);
                assert!(BASES.contains(&new));
            }
        }
    }

    #[test]
    fn reverse_complement_roundtrip() {
        assert_eq!(reverse_complement(b"AACGTT"), b"AACGTT".to_vec());
        assert_eq!(reverse_complement(b"ATGCC"), b"GGCAT".to_vec());
    }
}
